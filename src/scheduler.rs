//! Periodic guide refresh for every configured region

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::ensure_known;
use crate::error::Result;
use crate::xmltv::{GuideBuilder, Published};

pub struct Scheduler {
    builder: Arc<GuideBuilder>,
    regions: Vec<String>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(builder: Arc<GuideBuilder>, regions: Vec<String>, interval_hours: u64) -> Self {
        Self {
            builder,
            regions,
            interval: Duration::from_secs(interval_hours * 3600),
        }
    }

    fn refresh_region(&self, region: &str) -> Result<Published> {
        ensure_known(region)?;
        self.builder.refresh(region)
    }

    /// Refresh each region in turn. A failed region keeps its previous
    /// artifacts; the rest of the tick carries on.
    pub fn run_tick(&self) -> Vec<(String, Result<Published>)> {
        info!("Guide refresh started for {} region(s)", self.regions.len());

        let results: Vec<(String, Result<Published>)> = self
            .regions
            .iter()
            .map(|region| {
                let outcome = self.refresh_region(region);
                if let Err(ref e) = outcome {
                    warn!("Guide refresh for {} failed: {}", region, e);
                }
                (region.clone(), outcome)
            })
            .collect();

        let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!("Guide refresh finished: {}/{} regions published", ok, results.len());
        results
    }

    pub fn run_forever(&self) -> ! {
        loop {
            self.run_tick();
            thread::sleep(self.interval);
        }
    }
}
