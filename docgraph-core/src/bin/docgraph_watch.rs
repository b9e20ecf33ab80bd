//! Watch a document tree and log every change batch it produces.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use docgraph_core::{ChangeSource, FsSource, SourceConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docgraph-watch", about = "Log debounced document changes under a directory")]
struct Args {
    /// Directory to watch. Ignored when --config is given.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// JSON source configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Document file extension.
    #[arg(long)]
    suffix: Option<String>,

    /// Quiet window in milliseconds before a batch is emitted.
    #[arg(long)]
    quiet_ms: Option<u64>,
}

impl Args {
    fn source_config(&self) -> Result<SourceConfig, docgraph_core::SourceError> {
        let mut config = match &self.config {
            Some(path) => SourceConfig::load(path)?,
            None => SourceConfig::new(&self.root),
        };
        if let Some(suffix) = &self.suffix {
            config = config.with_suffix(suffix.as_str());
        }
        if let Some(ms) = self.quiet_ms {
            config = config.with_quiet_window(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let source = FsSource::spawn(args.source_config()?)?;
    let mut batches = source.watch().ok_or("change stream unavailable")?;
    info!(documents = source.names().len(), "watching; press Ctrl-C to stop");

    loop {
        tokio::select! {
            batch = batches.recv() => match batch {
                Some(batch) => match serde_json::to_string(&batch) {
                    Ok(json) => info!(changes = batch.len(), batch = %json, "update"),
                    Err(err) => error!(%err, "could not encode batch"),
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                source.close();
            }
        }
    }

    info!("change stream closed");
    Ok(())
}
