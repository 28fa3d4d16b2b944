//! Pluto Guide - Rust Edition
//! Builds per-region XMLTV guides and M3U playlists from the Pluto TV API

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::Path;
use std::process;
use std::sync::Arc;

use log::{error, info};

mod channels;
mod config;
mod device;
mod epg;
mod error;
mod genre;
mod playlist;
mod scheduler;
mod session;
mod upstream;
mod xmltv;

#[cfg(test)]
mod test_support;

use channels::ChannelResolver;
use config::AppConfig;
use epg::EpgFetcher;
use error::{GuideError, Result};
use playlist::{render_m3u, ChannelIdFormat};
use scheduler::Scheduler;
use session::SessionCache;
use upstream::{UreqTransport, Upstream};
use xmltv::{GuideBuilder, Publisher};

const USAGE: &str = "usage: pluto_guide [run | once | playlist <region> [slug|id|slug_only] | inspect <file>]";

/// Everything the sub-commands need, wired once from the config
struct App {
    config: AppConfig,
    resolver: Arc<ChannelResolver>,
    builder: Arc<GuideBuilder>,
}

impl App {
    fn new(config: AppConfig) -> Result<Self> {
        let device_id = device::load_or_create(&config.device_file)?;
        let transport = Arc::new(UreqTransport::new(config.timeout_secs));
        let upstream = Arc::new(Upstream::new(transport, &device_id, config.forwarded_addresses()));

        let sessions = Arc::new(SessionCache::new(upstream.clone()));
        let resolver = Arc::new(ChannelResolver::new(sessions.clone(), upstream.clone()));
        let fetcher = Arc::new(EpgFetcher::new(sessions, resolver.clone(), upstream));
        let builder = Arc::new(GuideBuilder::new(fetcher, Publisher::new(&config.output_dir)));

        Ok(Self {
            config,
            resolver,
            builder,
        })
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.builder.clone(),
            self.config.regions.clone(),
            self.config.interval_hours,
        )
    }
}

fn load_config() -> Result<AppConfig> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    Ok(config)
}

fn inspect(path: &Path) -> Result<()> {
    let doc = xmltv::reader::parse_file(path)?;
    println!("{}", path.display());
    println!("  generator:  {}", doc.generator);
    println!("  channels:   {}", doc.channels.len());
    println!("  programmes: {}", doc.programme_count());
    Ok(())
}

fn run(args: &[String]) -> Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("run");

    match command {
        "run" => {
            let app = App::new(load_config()?)?;
            info!(
                "Refreshing {} every {} hour(s) into {}",
                app.config.regions.join(","),
                app.config.interval_hours,
                app.config.output_dir.display()
            );
            app.scheduler().run_forever()
        }
        "once" => {
            let app = App::new(load_config()?)?;
            let results = app.scheduler().run_tick();
            // The first failure decides the exit status
            results
                .into_iter()
                .find_map(|(_, outcome)| outcome.err())
                .map_or(Ok(()), Err)
        }
        "playlist" => {
            let region = args
                .get(1)
                .ok_or_else(|| GuideError::Config(USAGE.to_string()))?;
            config::ensure_known(region)?;
            let format = args
                .get(2)
                .map(|f| ChannelIdFormat::from_option(f))
                .unwrap_or_default();

            let app = App::new(load_config()?)?;
            let channels = app.resolver.list_channels(region)?;
            print!("{}", render_m3u(&channels, region, &app.config.base_url, format));
            Ok(())
        }
        "inspect" => {
            let file = args
                .get(1)
                .ok_or_else(|| GuideError::Config(USAGE.to_string()))?;
            inspect(Path::new(file))
        }
        other => Err(GuideError::Config(format!("unknown command {:?}\n{}", other, USAGE))),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}
