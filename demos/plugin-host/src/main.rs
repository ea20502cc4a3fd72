//! End-to-end example host: wires the real cache/loader/streaming-driver
//! stack against an in-memory "counter" plugin.
//!
//! A small CLI entry point built with `clap` + `anyhow` that drives the
//! runtime the way a real host would, rather than a unit test.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use forge_framework::{stream_procedure, RegistryEntry, StreamOptions};
use forge_loader::memory::InMemoryRemoteLoader;
use forge_runtime::Runtime;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Drives the bundled counter plugin through the Forge plugin runtime.
#[derive(Parser, Debug)]
struct Cli {
    /// Amount the counter advances by on each streaming invocation.
    #[arg(long, default_value_t = 1)]
    step: i64,

    /// Stop the stream once the counter reaches this value.
    #[arg(long, default_value_t = 5)]
    limit: i64,

    /// Cap on items pulled from the stream, independent of `limit`.
    #[arg(long, default_value_t = 100)]
    max_items: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forge_runtime::logging::init_forge_defaults();

    let cli = Cli::parse();

    let loader = Arc::new(InMemoryRemoteLoader::new());
    loader.insert(
        "counter",
        Arc::new(|| -> Result<Arc<dyn forge_core::PluginDefinition>, forge_core::BoxError> {
            Ok(Arc::new(counter_plugin::CounterPlugin))
        }),
    );

    let registry: HashMap<String, RegistryEntry> = [(
        "counter".to_string(),
        RegistryEntry {
            remote_url: "mem://counter".to_string(),
            version: Some("0.1.0".to_string()),
            description: Some("demo counter plugin".to_string()),
        },
    )]
    .into_iter()
    .collect();

    let runtime = Runtime::new(loader, registry);

    let bundle = runtime
        .use_plugin(
            "counter",
            serde_json::json!({ "step": cli.step, "limit": cli.limit }),
            serde_json::json!({}),
        )
        .await?;

    let pong = bundle.client.call("ping", serde_json::json!({})).await?;
    tracing::info!(?pong, "called non-streamable procedure");

    let stream = stream_procedure(
        bundle.client.clone(),
        "tail".to_string(),
        serde_json::json!({}),
        serde_json::json!({ "n": 0 }),
        StreamOptions::new().with_max_items(cli.max_items),
        CancellationToken::new(),
    );
    tokio::pin!(stream);

    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item?);
    }
    tracing::info!(?items, "streaming procedure completed");

    // A second call with the same structural config hits the cache: no
    // second `initialize` runs, and the returned instance is the same one.
    let second = runtime
        .use_plugin(
            "counter",
            serde_json::json!({ "limit": cli.limit, "step": cli.step }),
            serde_json::json!({}),
        )
        .await?;
    assert!(Arc::ptr_eq(&bundle.initialized, &second.initialized));

    runtime.shutdown().await;
    Ok(())
}
