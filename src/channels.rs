//! Channel catalog resolution
//!
//! Merges the channel listing with the category listing, gives every channel a
//! unique display number and picks its logo.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GuideError, Result};
use crate::session::SessionCache;
use crate::upstream::Upstream;

/// Image type tag of the channel logo
const LOGO_IMAGE_TYPE: &str = "colorLogoPNG";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    /// Upstream channel id
    pub id: String,
    /// Display name
    pub name: String,
    /// URL-safe name
    pub slug: String,
    /// Gracenote/TMS station id, when the upstream has one
    pub tmsid: Option<String>,
    /// Category name, `None` when the channel is in no category
    pub category: Option<String>,
    /// Display number, unique within one resolution pass
    pub number: i64,
    pub logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    tmsid: Option<String>,
    #[serde(default)]
    number: i64,
    #[serde(default)]
    images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    #[serde(rename = "channelIDs", default)]
    channel_ids: Vec<String>,
}

fn listing_data<'a>(listing: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    listing
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| GuideError::Decode(format!("{} listing has no data array", what)))
}

/// Channel id -> category name. Malformed category entries are skipped;
/// when an id appears in several categories the last one wins.
pub fn category_map(categories: &Value) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for entry in listing_data(categories, "category")? {
        let category: RawCategory = match serde_json::from_value(entry.clone()) {
            Ok(c) => c,
            Err(e) => {
                debug!("Skipping malformed category entry: {}", e);
                continue;
            }
        };
        for id in category.channel_ids {
            map.insert(id, category.name.clone());
        }
    }
    Ok(map)
}

/// Preferred number, or the next free number above it
fn assign_number(preferred: i64, taken: &HashSet<i64>) -> i64 {
    let mut number = preferred;
    while taken.contains(&number) {
        number += 1;
    }
    number
}

/// Merge the two upstream listings into a channel list sorted by display number
pub fn resolve_channels(channels: &Value, categories: &Value) -> Result<Vec<Channel>> {
    let groups = category_map(categories)?;
    let mut taken = HashSet::new();
    let mut stations = Vec::new();

    for entry in listing_data(channels, "channel")? {
        let raw: RawChannel = serde_json::from_value(entry.clone())?;

        let number = assign_number(raw.number, &taken);
        if number != raw.number {
            debug!("Channel {} moved from number {} to {}", raw.name, raw.number, number);
        }
        taken.insert(number);

        let logo = raw
            .images
            .into_iter()
            .find(|image| image.kind == LOGO_IMAGE_TYPE)
            .and_then(|image| image.url);

        stations.push(Channel {
            category: groups.get(&raw.id).cloned(),
            id: raw.id,
            name: raw.name,
            slug: raw.slug,
            tmsid: raw.tmsid,
            number,
            logo,
        });
    }

    stations.sort_by_key(|c| c.number);
    Ok(stations)
}

pub struct ChannelResolver {
    sessions: Arc<SessionCache>,
    upstream: Arc<Upstream>,
}

impl ChannelResolver {
    pub fn new(sessions: Arc<SessionCache>, upstream: Arc<Upstream>) -> Self {
        Self { sessions, upstream }
    }

    pub fn list_channels(&self, region: &str) -> Result<Vec<Channel>> {
        let session = self.sessions.get_session(region)?;
        let token = session.bearer()?;

        let channels = self.upstream.channels(region, token)?;
        let categories = self.upstream.categories(region, token)?;
        resolve_channels(&channels, &categories)
    }
}
