use std::path::PathBuf;

use anyhow::{Context, Result};
use hotreload::ShutdownToken;
use preprocess::CHANNEL_COUNT;
use renderer::{ChannelSource, Renderer, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let config = build_config(&args);
    tracing::info!(
        shader = %config.shader.display(),
        channels = config.channels.len(),
        auto_reload = config.auto_reload,
        "starting shaderlive"
    );

    let token = ShutdownToken::new();
    install_signal_handler(&token)?;
    Renderer::new(config).run(token)
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn install_signal_handler(token: &ShutdownToken) -> Result<()> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        tracing::info!("termination requested; shutting down");
        token.cancel();
    })
    .context("failed to install termination handler")
}

fn build_config(args: &Args) -> RendererConfig {
    let mut config = RendererConfig::new(&args.shader);
    config.channels = select_channels(&args.channels);
    config.surface_size = args.size;
    config.auto_reload = !args.no_auto_reload;
    config.watch_interval = args.watch_interval();
    config.allow_includes = !args.no_includes;
    config.title = args.title.clone();
    config
}

/// Classifies channel arguments in order. Missing paths and anything past
/// the last channel slot are logged and dropped; later channels move up.
fn select_channels(paths: &[PathBuf]) -> Vec<ChannelSource> {
    let mut channels = Vec::with_capacity(paths.len().min(CHANNEL_COUNT));
    for path in paths {
        if !path.exists() {
            tracing::error!(path = %path.display(), "channel resource does not exist; skipping");
            continue;
        }
        if channels.len() == CHANNEL_COUNT {
            tracing::warn!(
                path = %path.display(),
                limit = CHANNEL_COUNT,
                "all channel slots are taken; skipping"
            );
            continue;
        }
        let source = ChannelSource::from_path(path);
        tracing::debug!(
            channel = channels.len(),
            kind = ?source.kind(),
            path = %path.display(),
            "channel argument"
        );
        channels.push(source);
    }
    channels
}
