//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::{GuideError, Result};

/// Every region the upstream can be asked for, with its X-Forwarded-For override
const KNOWN_REGIONS: &[(&str, Option<&str>)] = &[
    ("local", None),
    ("us_east", Some("108.82.206.181")),
    ("us_west", Some("76.81.9.69")),
    ("ca", Some("192.206.151.131")),
    ("uk", Some("178.238.11.6")),
    ("fr", None),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_device_file")]
    pub device_file: PathBuf,
    /// Public address of the stream redirect service, used in playlist links
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_regions() -> Vec<String> {
    KNOWN_REGIONS.iter().map(|(code, _)| code.to_string()).collect()
}
fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_interval_hours() -> u64 { 2 }
fn default_device_file() -> PathBuf { PathBuf::from("pluto-device.json") }
fn default_base_url() -> String { "http://localhost:7777".to_string() }
fn default_timeout_secs() -> u64 { 60 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            output_dir: default_output_dir(),
            interval_hours: default_interval_hours(),
            device_file: default_device_file(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| GuideError::Config(format!("{} must be a positive integer, got {:?}", name, value)))
}

impl AppConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("pluto_guide");
        path.push("config.json");
        path
    }

    /// Config file if present, defaults otherwise
    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = serde_json::from_str(&content) {
                    return config;
                }
            }
        }

        Self::default()
    }

    /// Apply `PLUTO_*` overrides, reading variables through `var`
    pub fn with_overrides<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(codes) = var("PLUTO_CODE") {
            self.regions = codes
                .split(',')
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(dir) = var("PLUTO_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(hours) = var("PLUTO_INTERVAL_HOURS") {
            self.interval_hours = parse_number("PLUTO_INTERVAL_HOURS", &hours)?;
        }
        if let Some(file) = var("PLUTO_DEVICE_FILE") {
            self.device_file = PathBuf::from(file);
        }
        if let Some(url) = var("PLUTO_BASE_URL") {
            self.base_url = url;
        }
        if let Some(secs) = var("PLUTO_TIMEOUT_SECS") {
            self.timeout_secs = parse_number("PLUTO_TIMEOUT_SECS", &secs)?;
        }
        Ok(self)
    }

    pub fn from_env() -> Result<Self> {
        Self::load().with_overrides(|name| std::env::var(name).ok())
    }

    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(GuideError::Config("no regions configured".to_string()));
        }
        for region in &self.regions {
            ensure_known(region)?;
        }
        if self.interval_hours == 0 || self.timeout_secs == 0 {
            return Err(GuideError::Config("interval and timeout must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Region code -> forwarded address, for regions that have one
    pub fn forwarded_addresses(&self) -> HashMap<String, String> {
        KNOWN_REGIONS
            .iter()
            .filter_map(|(code, addr)| addr.map(|a| (code.to_string(), a.to_string())))
            .collect()
    }
}

/// Reject region codes outside the closed set
pub fn ensure_known(region: &str) -> Result<()> {
    if KNOWN_REGIONS.iter().any(|(code, _)| *code == region) {
        Ok(())
    } else {
        Err(GuideError::UnknownRegion(region.to_string()))
    }
}
