//! Pluto TV upstream API client
//!
//! All HTTP traffic goes through the [`Transport`] trait so the session cache,
//! channel resolver and EPG fetcher can be driven by a scripted transport in tests.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::error::{GuideError, Result};

const BOOT_URL: &str = "https://boot.pluto.tv/v4/start";
const CHANNELS_URL: &str = "https://service-channels.clusters.pluto.tv/v2/guide/channels";
const CATEGORIES_URL: &str = "https://service-channels.clusters.pluto.tv/v2/guide/categories";
const TIMELINES_URL: &str = "https://service-channels.clusters.pluto.tv/v2/guide/timelines";

const APP_VERSION: &str = "7.9.0-a9cca6b89aea4dc0998b92a51989d2adb9a9025d";

/// Bootstrap replies outside this range are failures
const BOOT_OK_STATUS: RangeInclusive<u16> = 200..=201;
const GUIDE_OK_STATUS: RangeInclusive<u16> = 200..=299;

/// Guide timelines for a few hundred channels easily exceed ureq's 10MB default
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Raw HTTP reply: status code and body text
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Blocking GET transport
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, String)], headers: &[(&str, String)]) -> Result<HttpReply>;
}

/// ureq-backed transport. Non-2xx statuses are returned as replies, not errors,
/// so callers can report the upstream body.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout_secs: u64) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(30)))
            .http_status_as_error(false)
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, query: &[(&str, String)], headers: &[(&str, String)]) -> Result<HttpReply> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(*key, value.as_str());
        }
        for (key, value) in headers {
            request = request.header(*key, value.as_str());
        }

        let mut response = request
            .call()
            .map_err(|e| GuideError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| GuideError::Transport(format!("Read failed: {}", e)))?;

        Ok(HttpReply { status, body })
    }
}

pub struct Upstream {
    transport: Arc<dyn Transport>,
    device_id: String,
    /// Region code -> X-Forwarded-For address
    forwarded: HashMap<String, String>,
}

impl Upstream {
    pub fn new(transport: Arc<dyn Transport>, device_id: &str, forwarded: HashMap<String, String>) -> Self {
        Self {
            transport,
            device_id: device_id.to_string(),
            forwarded,
        }
    }

    fn headers(&self, region: &str, authority: &str, token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("authority", authority.to_string()),
            ("accept", "*/*".to_string()),
            ("accept-language", "en-US,en;q=0.9".to_string()),
            ("origin", "https://pluto.tv".to_string()),
            ("referer", "https://pluto.tv/".to_string()),
        ];
        if let Some(token) = token {
            headers.push(("authorization", format!("Bearer {}", token)));
        }
        if let Some(addr) = self.forwarded.get(region).filter(|a| !a.is_empty()) {
            headers.push(("X-Forwarded-For", addr.clone()));
        }
        headers
    }

    fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        accepted: RangeInclusive<u16>,
    ) -> Result<Value> {
        debug!("GET {}", url);
        let reply = self.transport.get(url, query, headers)?;
        if !accepted.contains(&reply.status) {
            return Err(GuideError::UpstreamStatus {
                status: reply.status,
                body: reply.body,
            });
        }
        Ok(serde_json::from_str(&reply.body)?)
    }

    /// Bootstrap a new session; the payload carries `sessionToken` and `stitcherParams`
    pub fn start_session(&self, region: &str) -> Result<Value> {
        let query = [
            ("appName", "web".to_string()),
            ("appVersion", APP_VERSION.to_string()),
            ("deviceVersion", "120.0.0".to_string()),
            ("deviceModel", "web".to_string()),
            ("deviceMake", "chrome".to_string()),
            ("deviceType", "web".to_string()),
            ("clientID", self.device_id.clone()),
            ("clientModelNumber", "1.0.0".to_string()),
            ("drmCapabilities", "widevine:L3".to_string()),
        ];
        let headers = self.headers(region, "boot.pluto.tv", None);
        self.get_json(BOOT_URL, &query, &headers, BOOT_OK_STATUS)
    }

    fn listing_query() -> [(&'static str, String); 4] {
        [
            ("channelIds", String::new()),
            ("offset", "0".to_string()),
            ("limit", "1000".to_string()),
            ("sort", "number:asc".to_string()),
        ]
    }

    pub fn channels(&self, region: &str, token: &str) -> Result<Value> {
        let headers = self.headers(region, "service-channels.clusters.pluto.tv", Some(token));
        self.get_json(CHANNELS_URL, &Self::listing_query(), &headers, GUIDE_OK_STATUS)
    }

    pub fn categories(&self, region: &str, token: &str) -> Result<Value> {
        let headers = self.headers(region, "service-channels.clusters.pluto.tv", Some(token));
        self.get_json(CATEGORIES_URL, &Self::listing_query(), &headers, GUIDE_OK_STATUS)
    }

    /// One timeline page: `start` is already formatted, duration in minutes
    pub fn timelines(
        &self,
        region: &str,
        token: &str,
        start: &str,
        duration_minutes: u32,
        channel_ids: &[String],
    ) -> Result<Value> {
        let query = [
            ("start", start.to_string()),
            ("channelIds", channel_ids.join(",")),
            ("duration", duration_minutes.to_string()),
        ];
        let headers = self.headers(region, "service-channels.clusters.pluto.tv", Some(token));
        self.get_json(TIMELINES_URL, &query, &headers, GUIDE_OK_STATUS)
    }
}
