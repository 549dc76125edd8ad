//! emoji-replace - replace emoji markers in an HTML file
//!
//! Usage: `emoji-replace <page.html> [config.json]`
//!
//! The rewritten document is printed to stdout. Logging goes to stderr and
//! honours `RUST_LOG`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use emoji_net::{HttpConfig, HttpFetcher};
use emoji_replacer::{Config, EmojiEngine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(page_path) = args.next() else {
        bail!("usage: emoji-replace <page.html> [config.json]");
    };

    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            Config::from_json(&json)?
        }
        None => Config::default(),
    };
    let html =
        std::fs::read_to_string(&page_path).with_context(|| format!("reading page {page_path}"))?;

    tracing::info!("emoji-replace v{}", emoji_replacer::VERSION);
    let fetcher = Arc::new(HttpFetcher::new(HttpConfig::default())?);
    let mut engine = EmojiEngine::new(config, fetcher);
    let mut doc = emoji_html::parse(&html)?;

    smol::block_on(async {
        engine.init(&mut doc).await?;
        let report = engine.replace_all(&mut doc).await;
        tracing::info!(
            "{} markers: {} replaced, {} kept",
            report.markers,
            report.replaced,
            report.placeholders
        );
        anyhow::Ok(())
    })?;

    let root = doc.tree().root();
    println!("{}", doc.tree().inner_html(root));
    Ok(())
}
