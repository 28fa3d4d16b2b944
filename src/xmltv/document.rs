//! In-memory XMLTV document

pub const SYSTEM_ONSCREEN: &str = "onscreen";
pub const SYSTEM_PLUTO: &str = "pluto";
pub const SYSTEM_AIR_DATE: &str = "original-air-date";

pub const GENERATOR_NAME: &str = "pluto_guide";

/// A `<channel>` entry
#[derive(Debug, Clone, PartialEq)]
pub struct GuideChannel {
    /// Upstream channel id, referenced by `Programme::channel`
    pub id: String,
    /// Channel name as shown in guide apps
    pub display_name: String,
    /// Logo URL
    pub icon: Option<String>,
}

/// An `<episode-num>` in one numbering system
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeNum {
    /// `onscreen`, `pluto` or `original-air-date`
    pub system: String,
    pub value: String,
}

impl EpisodeNum {
    pub fn new(system: &str, value: impl Into<String>) -> Self {
        Self {
            system: system.to_string(),
            value: value.into(),
        }
    }
}

/// A single `<programme>` entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Programme {
    /// Id of the channel airing this programme
    pub channel: String,
    /// Start time, `YYYYMMDDhhmmss +0000`
    pub start: String,
    /// End time, same format as `start`
    pub stop: String,
    /// Programme (series or film) title
    pub title: String,
    /// Episode name, only when it differs from the title
    pub sub_title: Option<String>,
    /// Episode description
    pub description: Option<String>,
    /// Original release day, `YYYYMMDD`
    pub date: Option<String>,
    /// De-duplicated, first occurrence kept
    pub categories: Vec<String>,
    /// Series tile image URL
    pub icon: Option<String>,
    /// Episode numbers, one per system
    pub episode_nums: Vec<EpisodeNum>,
    /// Live broadcast marker
    pub live: bool,
    /// Upstream series id
    pub series_id: Option<String>,
}

impl Programme {
    pub fn episode_num(&self, system: &str) -> Option<&str> {
        self.episode_nums
            .iter()
            .find(|e| e.system == system)
            .map(|e| e.value.as_str())
    }
}

/// A complete XMLTV guide for one region
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuideDocument {
    /// `generator-info-name` of the `<tv>` root
    pub generator: String,
    /// Channels in display-number order
    pub channels: Vec<GuideChannel>,
    /// Programmes in upstream page order
    pub programmes: Vec<Programme>,
}

impl GuideDocument {
    pub fn new() -> Self {
        Self {
            generator: GENERATOR_NAME.to_string(),
            ..Self::default()
        }
    }

    pub fn programme_count(&self) -> usize {
        self.programmes.len()
    }
}
