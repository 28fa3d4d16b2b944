//! EPG (Electronic Program Guide) retrieval
//!
//! Pulls timeline pages for every channel of a region across consecutive
//! twelve-hour windows. Each window starts where the upstream said the previous
//! one ended, so the three windows form one contiguous guide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, DurationRound, Utc};
use log::info;
use serde_json::Value;

use crate::channels::{Channel, ChannelResolver};
use crate::error::{GuideError, Result};
use crate::session::{system_clock, Clock, SessionCache};
use crate::upstream::Upstream;

/// Channel ids per timeline request
pub const PAGE_SIZE: usize = 100;
pub const WINDOW_COUNT: usize = 3;
pub const WINDOW_MINUTES: u32 = 720;

/// Raw timeline pages for one region, complete across all windows
#[derive(Debug, Clone)]
pub struct EpgBatch {
    /// Region code the batch was fetched for
    pub region: String,
    /// Channel list the pages were requested for
    pub channels: Vec<Channel>,
    /// Raw timeline responses, window by window
    pub pages: Vec<Value>,
    /// Start of each window, on the hour
    pub window_starts: Vec<DateTime<Utc>>,
    /// When the fetch began
    pub fetched_at: DateTime<Utc>,
}

fn top_of_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::hours(1)).unwrap_or(t)
}

/// Window start as the timelines endpoint expects it
pub fn format_window_start(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:00:00.000Z").to_string()
}

/// `meta.endDateTime` of a timeline page, truncated to the hour
pub fn window_end(page: &Value) -> Result<DateTime<Utc>> {
    let end = page
        .pointer("/meta/endDateTime")
        .and_then(Value::as_str)
        .ok_or_else(|| GuideError::Decode("timeline page has no meta.endDateTime".to_string()))?;
    let end = DateTime::parse_from_rfc3339(end)
        .map_err(|e| GuideError::Decode(format!("bad endDateTime {:?}: {}", end, e)))?;
    Ok(top_of_hour(end.with_timezone(&Utc)))
}

pub struct EpgFetcher {
    sessions: Arc<SessionCache>,
    resolver: Arc<ChannelResolver>,
    upstream: Arc<Upstream>,
    clock: Clock,
    /// Last complete batch per region
    batches: Mutex<HashMap<String, Arc<EpgBatch>>>,
}

impl EpgFetcher {
    pub fn new(sessions: Arc<SessionCache>, resolver: Arc<ChannelResolver>, upstream: Arc<Upstream>) -> Self {
        Self {
            sessions,
            resolver,
            upstream,
            clock: system_clock(),
            batches: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// One window: a request per page of channel ids. Stops at the first failure.
    pub fn fetch_window(&self, region: &str, channel_ids: &[String], start: DateTime<Utc>) -> Result<Vec<Value>> {
        let session = self.sessions.get_session(region)?;
        let token = session.bearer()?;
        let start = format_window_start(start);

        channel_ids
            .chunks(PAGE_SIZE)
            .map(|page| {
                self.upstream
                    .timelines(region, token, &start, WINDOW_MINUTES, page)
            })
            .collect()
    }

    /// Fetch every window for the region. The stored batch is only replaced
    /// once all windows succeeded.
    pub fn build_epg_batch(&self, region: &str) -> Result<Arc<EpgBatch>> {
        let channels = self.resolver.list_channels(region)?;
        let ids: Vec<String> = channels.iter().map(|c| c.id.clone()).collect();

        let fetched_at = (self.clock)();
        let mut start = top_of_hour(fetched_at);
        let mut pages = Vec::new();
        let mut window_starts = Vec::with_capacity(WINDOW_COUNT);

        for window in 0..WINDOW_COUNT {
            info!("Retrieving {} EPG data for {}", region, format_window_start(start));
            let responses = self.fetch_window(region, &ids, start)?;
            window_starts.push(start);

            if window + 1 < WINDOW_COUNT {
                start = match responses.last() {
                    Some(last) => window_end(last)?,
                    None => start + Duration::minutes(WINDOW_MINUTES as i64),
                };
            }
            pages.extend(responses);
        }

        let batch = Arc::new(EpgBatch {
            region: region.to_string(),
            channels,
            pages,
            window_starts,
            fetched_at,
        });
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(region.to_string(), Arc::clone(&batch));
        Ok(batch)
    }

    /// Most recent complete batch, if any build has succeeded for the region
    pub fn last_batch(&self, region: &str) -> Option<Arc<EpgBatch>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(region)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{categories_json, channels_json, timelines_json, MockTransport, BOOT_OK};
    use chrono::TimeZone;
    use serde_json::json;

    fn fetcher(mock: &Arc<MockTransport>) -> EpgFetcher {
        let upstream = Arc::new(Upstream::new(mock.clone(), "dev", HashMap::new()));
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 34, 56).unwrap();
        let clock: Clock = Arc::new(move || now);
        let sessions = Arc::new(SessionCache::new(upstream.clone()).with_clock(clock.clone()));
        let resolver = Arc::new(ChannelResolver::new(sessions.clone(), upstream.clone()));
        EpgFetcher::new(sessions, resolver, upstream).with_clock(clock)
    }

    fn script_listings(mock: &MockTransport) {
        mock.respond("/v4/start", 200, BOOT_OK);
        mock.respond("/guide/channels", 200, &channels_json());
        mock.respond("/guide/categories", 200, &categories_json());
    }

    #[test]
    fn test_window_end_truncates_to_hour() {
        let page = json!({"meta": {"endDateTime": "2024-01-16T00:47:12.345Z"}});
        assert_eq!(
            window_end(&page).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap()
        );
        assert!(window_end(&json!({"data": []})).is_err());
    }

    #[test]
    fn test_windows_chain_on_reported_end() {
        let mock = Arc::new(MockTransport::new());
        script_listings(&mock);
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-16T00:10:00.000Z"));
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-16T12:05:00.000Z"));
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-17T00:00:00.000Z"));

        let batch = fetcher(&mock).build_epg_batch("local").unwrap();

        let hour = |d, h| Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap();
        assert_eq!(batch.window_starts, vec![hour(15, 12), hour(16, 0), hour(16, 12)]);
        assert_eq!(
            mock.calls_to("/guide/timelines")[1].query_value("start"),
            Some("2024-01-16T00:00:00.000Z")
        );
        assert_eq!(batch.pages.len(), 3);
        assert_eq!(batch.channels.len(), 3);
    }

    #[test]
    fn test_channel_ids_paged_by_hundred() {
        let mock = Arc::new(MockTransport::new());
        let data: Vec<Value> = (0..250)
            .map(|i| json!({"id": format!("id{}", i), "name": "x", "number": i}))
            .collect();
        mock.respond("/v4/start", 200, BOOT_OK);
        mock.respond("/guide/channels", 200, &json!({ "data": data }).to_string());
        mock.respond("/guide/categories", 200, r#"{"data":[]}"#);
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-16T00:00:00.000Z"));

        let batch = fetcher(&mock).build_epg_batch("local").unwrap();

        let calls = mock.calls_to("/guide/timelines");
        assert_eq!(calls.len(), 9);
        assert_eq!(batch.pages.len(), 9);
        let sizes: Vec<usize> = calls[..3]
            .iter()
            .map(|c| c.query_value("channelIds").unwrap().split(',').count())
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(calls[0].query_value("channelIds").unwrap().starts_with("id0,id1,"));
    }

    #[test]
    fn test_failed_page_keeps_previous_batch() {
        let mock = Arc::new(MockTransport::new());
        script_listings(&mock);
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-16T00:00:00.000Z"));
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-16T12:00:00.000Z"));
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-17T00:00:00.000Z"));
        mock.respond("/guide/timelines", 200, &timelines_json("2024-01-16T00:00:00.000Z"));
        mock.respond("/guide/timelines", 503, "unavailable");
        let fetcher = fetcher(&mock);

        let first = fetcher.build_epg_batch("local").unwrap();
        let err = fetcher.build_epg_batch("local").unwrap_err();

        assert!(matches!(err, GuideError::UpstreamStatus { status: 503, .. }));
        assert!(Arc::ptr_eq(&fetcher.last_batch("local").unwrap(), &first));
        assert!(fetcher.last_batch("uk").is_none());
    }

    #[test]
    fn test_channel_failure_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("/v4/start", 200, BOOT_OK);
        mock.fail("/guide/channels", "reset by peer");

        let err = fetcher(&mock).build_epg_batch("local").unwrap_err();
        assert!(matches!(err, GuideError::Transport(_)));
        assert!(mock.calls_to("/guide/timelines").is_empty());
    }
}
