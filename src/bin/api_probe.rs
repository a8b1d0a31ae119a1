//! api-probe: issue one GET through the data-access facade and print the result.
//!
//! Usage:
//!   api-probe <url> [--store] [--param key=value]... [--no-cache]
//!
//! `<url>` is routed like any facade call: `/path` or `http…` goes over HTTP,
//! a bare name is a query-store table. `--store` forces the query store.
//!
//! Environment:
//!   FAIT_API_BASE_URL, FAIT_API_TIMEOUT_MS, FAIT_API_CACHE_TTL_MS,
//!   FAIT_STORE_URL, FAIT_STORE_KEY, RUST_LOG

use anyhow::{anyhow, bail, Context};
use fait_api::{ApiServiceBuilder, Payload, RequestConfig, TransportKind};
use serde_json::{json, Value};

struct Args {
    url: String,
    store: bool,
    no_cache: bool,
    params: Vec<(String, Value)>,
}

fn print_usage() {
    println!(
        r#"api-probe {}

USAGE:
    api-probe <url> [--store] [--param key=value]... [--no-cache]

OPTIONS:
    --store             Route to the query store regardless of URL shape
    --param key=value   Add a request param; values that parse as JSON are sent as JSON
    --no-cache          Bypass the response cache
    -h, --help          Show this help message"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn parse_args(raw: &[String]) -> anyhow::Result<Option<Args>> {
    let mut url = None;
    let mut store = false;
    let mut no_cache = false;
    let mut params = Vec::new();

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--store" => store = true,
            "--no-cache" => no_cache = true,
            "--param" => {
                let pair = iter.next().ok_or_else(|| anyhow!("--param needs key=value"))?;
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--param expects key=value, got '{}'", pair))?;
                let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
                params.push((key.to_string(), value));
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            positional => {
                if url.replace(positional.to_string()).is_some() {
                    bail!("Only one <url> may be given");
                }
            }
        }
    }

    let url = url.ok_or_else(|| anyhow!("Missing <url>"))?;
    Ok(Some(Args {
        url,
        store,
        no_cache,
        params,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw)? {
        Some(args) => args,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let api = ApiServiceBuilder::from_env()
        .build()
        .context("failed to build the API service")?;

    let mut config = RequestConfig::get(args.url.as_str());
    for (key, value) in args.params {
        config = config.with_param(key, value);
    }
    if args.store {
        config = config.with_client(TransportKind::Store);
    }
    if args.no_cache {
        config = config.without_cache();
    }

    let resp = api.request_raw(&config).await.map_err(|e| {
        anyhow!(
            "{} (status: {}, code: {})",
            e.message,
            e.status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            e.code.as_deref().unwrap_or("-")
        )
    })?;

    let data = match &resp.data {
        Payload::Json(v) => v.clone(),
        Payload::Text(s) => Value::String(s.clone()),
        Payload::Binary(b) => json!({ "binary_bytes": b.len() }),
        Payload::Empty => Value::Null,
    };
    let out = json!({
        "status": resp.status,
        "statusText": resp.status_text,
        "cached": resp.cached,
        "headers": resp.headers,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
