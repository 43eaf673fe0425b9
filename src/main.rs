use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use spear::application::{Delivery, LoadListener, LoadRequest, Spear};
use spear::domain::LoadedImage;
use spear::infrastructure::{CliArgs, ConfigStore, SpearConfig};
use spear::LoadError;

fn init_logging(config: &SpearConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> SpearConfig {
    let loaded = ConfigStore::new().and_then(|store| store.load_config(args.config.as_deref()));
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}. Using defaults.");
        SpearConfig::default()
    });
    config.merge_with_args(args);
    config
}

/// Prints one line per finished resource.
struct Report {
    uri: String,
    finished: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl LoadListener for Report {
    fn on_completed(&self, image: LoadedImage) {
        println!(
            "{}\t{}x{}\t{}",
            self.uri,
            image.image.width(),
            image.image.height(),
            image.source
        );
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failed(&self, error: LoadError) {
        eprintln!("{}\tfailed: {error}", self.uri);
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args);
    init_logging(&config)?;

    info!(version = spear::VERSION, "Starting Spear");

    let (delivery, mut events) = Delivery::channel();
    let spear = Spear::new(&config, delivery).await?;

    if args.clear_cache {
        spear.clear_all_cache().await?;
        info!("Cleared caches");
    }

    // Keep submissions within the smallest queue so none are discarded.
    let pools = &config.pools;
    let window = pools.dispatch.queue.min(pools.network.queue).min(pools.local.queue).max(1);

    let total = args.uris.len();
    let finished = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let mut pending: VecDeque<String> = args.uris.into_iter().collect();
    let mut submitted = 0;

    while finished.load(Ordering::SeqCst) < total {
        while submitted - finished.load(Ordering::SeqCst) < window
            && let Some(uri) = pending.pop_front()
        {
            let report = Arc::new(Report {
                uri: uri.clone(),
                finished: finished.clone(),
                failed: failed.clone(),
            });
            spear.load(LoadRequest::new(uri).listener(report));
            submitted += 1;
        }
        if !events.next().await {
            warn!("Delivery closed before all resources finished");
            break;
        }
    }

    info!(stats = %spear.memory_cache_stats(), "Finished");
    spear.shutdown();

    let failed = failed.load(Ordering::SeqCst);
    if failed > 0 {
        bail!("{failed} of {total} resources failed");
    }
    Ok(())
}
