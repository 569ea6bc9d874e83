//! http-engine demo server.
//!
//! Serves an echo handler on the configured engine: every request is
//! answered with a JSON description of itself.
//!
//! ```text
//! http-engine --config engine.toml
//! http-engine --engine buffered --address :3000
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use http_engine::config::{load_config, ServerConfig};
use http_engine::observability::{init_logging, metrics};
use http_engine::{handler_fn, new_engine, EngineKind, Logger, Request, Response};

#[derive(Debug, Parser)]
#[command(name = "http-engine", version, about = "Echo server on a pluggable HTTP engine")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine implementation, overriding the config file.
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Listen address, overriding the config file.
    #[arg(long)]
    address: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(engine) = args.engine {
        config.engine = engine;
    }
    if let Some(address) = args.address {
        config.server.address = address;
    }

    init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        engine = %config.engine,
        address = %config.server.address,
        tls = config.server.tls_enabled(),
        "http-engine starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut engine = new_engine(config.engine, config.server);
    engine.set_logger(Logger::current());
    engine.set_handler(Arc::new(handler_fn(echo)));
    engine.start()?;

    tracing::info!("http-engine stopped");
    Ok(())
}

/// Answer with a JSON description of the request.
fn echo(req: &mut dyn Request, res: &mut dyn Response) {
    let mut body = Vec::new();
    if let Err(e) = req.body().read_to_end(&mut body) {
        tracing::warn!(error = %e, "Failed to read request body");
    }

    let headers: serde_json::Map<String, serde_json::Value> = req
        .header()
        .object()
        .downcast_ref::<http::HeaderMap>()
        .map(|map| {
            map.keys()
                .map(|name| {
                    let values = req.header().get_all(name.as_str());
                    (name.to_string(), json!(values))
                })
                .collect()
        })
        .unwrap_or_default();

    let report = json!({
        "method": req.method(),
        "scheme": req.scheme(),
        "host": req.host(),
        "uri": req.uri(),
        "path": req.url().path(),
        "remote_address": req.remote_address(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
        "body_bytes": body.len(),
    });

    let payload = match serde_json::to_vec_pretty(&report) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode echo report");
            res.write_header(500);
            return;
        }
    };

    if let Err(e) = res.header().set("Content-Type", "application/json") {
        tracing::warn!(error = %e, "Failed to set content type");
    }
    res.write_header(200);
    if let Err(e) = res.write(&payload) {
        tracing::debug!(error = %e, "Client went away during echo");
    }
}
