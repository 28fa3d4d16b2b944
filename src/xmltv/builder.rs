//! Turns raw timeline pages into a [`GuideDocument`]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use super::document::{
    EpisodeNum, GuideChannel, GuideDocument, Programme, SYSTEM_AIR_DATE, SYSTEM_ONSCREEN, SYSTEM_PLUTO,
};
use super::publish::{ArtifactPaths, Publisher};
use super::writer;
use crate::channels::Channel;
use crate::epg::EpgFetcher;
use crate::error::{GuideError, Result};
use crate::genre;

#[derive(Debug, Deserialize)]
struct TimelinePage {
    #[serde(default)]
    data: Vec<ChannelTimelines>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelTimelines {
    channel_id: String,
    #[serde(default)]
    timelines: Vec<Timeline>,
}

#[derive(Debug, Deserialize)]
struct Timeline {
    start: String,
    stop: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    episode: Episode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Episode {
    #[serde(rename = "_id")]
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    season: Option<i64>,
    number: Option<i64>,
    genre: Option<String>,
    sub_genre: Option<String>,
    series: Option<Series>,
    clip: Option<Clip>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    tile: Option<Tile>,
}

#[derive(Debug, Deserialize)]
struct Tile {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Clip {
    original_release_date: Option<String>,
}

fn parse_upstream_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| GuideError::Decode(format!("bad timestamp {:?}: {}", value, e)))
}

/// Upstream UTC timestamp -> `YYYYMMDDhhmmss +0000`
pub fn xmltv_time(value: &str) -> Result<String> {
    Ok(parse_upstream_time(value)?.format("%Y%m%d%H%M%S +0000").to_string())
}

/// Drop repeated entries, keeping the first occurrence
fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

fn programme(channel_id: &str, timeline: Timeline) -> Result<Programme> {
    let episode = timeline.episode;
    let series_type = episode
        .series
        .as_ref()
        .and_then(|s| s.kind.as_deref())
        .unwrap_or("");

    let mut entry = Programme {
        channel: channel_id.to_string(),
        start: xmltv_time(&timeline.start)?,
        stop: xmltv_time(&timeline.stop)?,
        ..Programme::default()
    };

    match series_type {
        "live" => entry.live = true,
        "tv" => {
            if let (Some(season), Some(number)) = (episode.season, episode.number) {
                entry
                    .episode_nums
                    .push(EpisodeNum::new(SYSTEM_ONSCREEN, format!("S{:02}E{:02}", season, number)));
            }
            if let Some(id) = &episode.id {
                entry.episode_nums.push(EpisodeNum::new(SYSTEM_PLUTO, id.as_str()));
            }
        }
        _ => {}
    }

    let released = episode
        .clip
        .as_ref()
        .and_then(|c| c.original_release_date.as_deref());
    if let Some(released) = released {
        match parse_upstream_time(released) {
            Ok(t) => {
                entry.episode_nums.push(EpisodeNum::new(
                    SYSTEM_AIR_DATE,
                    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                ));
                entry.date = Some(t.format("%Y%m%d").to_string());
            }
            Err(e) => debug!("Ignoring release date on {}: {}", timeline.title, e),
        }
    }

    // Upstream double-encodes quotes
    entry.description = episode.description.map(|d| d.replace("&quot;", "\""));

    if let Some(series) = &episode.series {
        entry.icon = series.tile.as_ref().and_then(|t| t.path.clone());
        entry.series_id = series.id.clone();
    }

    if let Some(name) = episode.name {
        if timeline.title.to_lowercase() != name.to_lowercase() {
            entry.sub_title = Some(name);
        }
    }

    let mut categories = Vec::new();
    if let Some(genre) = &episode.genre {
        categories.extend(genre::normalize(genre));
    }
    match series_type {
        "tv" => categories.push("Series".to_string()),
        "film" => categories.push("Movie".to_string()),
        _ => {}
    }
    if let Some(sub_genre) = &episode.sub_genre {
        categories.extend(genre::normalize(sub_genre));
    }
    entry.categories = dedup_in_order(categories);

    entry.title = timeline.title;
    Ok(entry)
}

/// Assemble the guide for `channels` from the raw timeline `pages`
pub fn build_document(channels: &[Channel], pages: &[Value]) -> Result<GuideDocument> {
    let mut document = GuideDocument::new();

    document.channels = channels
        .iter()
        .map(|c| GuideChannel {
            id: c.id.clone(),
            display_name: c.name.clone(),
            icon: c.logo.clone(),
        })
        .collect();

    for page in pages {
        let page = TimelinePage::deserialize(page)?;
        for entry in page.data {
            for timeline in entry.timelines {
                document.programmes.push(programme(&entry.channel_id, timeline)?);
            }
        }
    }

    Ok(document)
}

/// Outcome of a successful guide refresh
#[derive(Debug, Clone)]
pub struct Published {
    pub paths: ArtifactPaths,
    /// Channel count of the published guide
    pub channels: usize,
    /// Programme count of the published guide
    pub programmes: usize,
}

pub struct GuideBuilder {
    fetcher: Arc<EpgFetcher>,
    publisher: Publisher,
}

impl GuideBuilder {
    pub fn new(fetcher: Arc<EpgFetcher>, publisher: Publisher) -> Self {
        Self { fetcher, publisher }
    }

    pub fn build(&self, region: &str) -> Result<GuideDocument> {
        let batch = self.fetcher.build_epg_batch(region)?;
        build_document(&batch.channels, &batch.pages)
    }

    pub fn persist(&self, region: &str, document: &GuideDocument) -> Result<ArtifactPaths> {
        let xml = writer::to_xml(document)?;
        self.publisher.publish(region, &xml)
    }

    /// Build and publish the guide for `region`
    pub fn refresh(&self, region: &str) -> Result<Published> {
        let document = self.build(region)?;
        let paths = self.persist(region, &document)?;
        info!(
            "Published {} ({} channels, {} programmes)",
            paths.xml.display(),
            document.channels.len(),
            document.programme_count()
        );
        Ok(Published {
            paths,
            channels: document.channels.len(),
            programmes: document.programme_count(),
        })
    }
}
