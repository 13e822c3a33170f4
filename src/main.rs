use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use mediarelay::metrics::{init_metrics, start_metrics_server, MetricsConfig};
use mediarelay::network::TransferRateLimiter;
use mediarelay::provider::DirectLinkProvider;
use mediarelay::upload::{
    BackoffSink, FinalizeRequest, Finalizer, HttpUploadSink, InputFileFinalizer,
};
use mediarelay::{
    ProgressFn, ProviderRegistry, RelayConfig, ResolveOptions, TransferError, TransferManager,
    UploadSink,
};

const USAGE: &str = "usage: mediarelay <url> [--audio-only]";

struct Args {
    url: String,
    audio_only: bool,
}

fn parse_args() -> Result<Args> {
    let mut url = None;
    let mut audio_only = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--audio-only" => audio_only = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown flag {flag}\n{USAGE}"),
            _ if url.is_some() => bail!("only one URL may be given\n{USAGE}"),
            _ => url = Some(arg),
        }
    }

    let url = url.context(USAGE)?;
    Ok(Args { url, audio_only })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = RelayConfig::from_env().context("loading configuration")?;

    match config.metrics_addr {
        Some(addr) => {
            start_metrics_server(MetricsConfig::with_addr(addr))?;
        }
        None => init_metrics(),
    }

    let client = config.http.build_client()?;
    let endpoint = config.require_upload_endpoint()?;
    let sink: Arc<dyn UploadSink> = Arc::new(BackoffSink::new(HttpUploadSink::new(
        client.clone(),
        endpoint,
    )?));

    let manager = TransferManager::with_client(
        config.pipeline.clone(),
        config.http.clone(),
        client.clone(),
    )
    .with_rate_limiter(TransferRateLimiter::new(config.rate_limit_bytes_per_sec));
    let providers = ProviderRegistry::new().with(Arc::new(DirectLinkProvider::new(
        client,
        config.http.clone(),
    )));

    let resolved = providers
        .resolve(
            &args.url,
            &ResolveOptions {
                audio_only: args.audio_only,
            },
        )
        .await
        .map_err(TransferError::from)?;
    tracing::info!(
        provider = %resolved.provider,
        count = resolved.descriptors.len(),
        "streaming media"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling transfers");
                cancel.cancel();
            }
        });
    }

    let relayed = Arc::new(AtomicU64::new(0));
    let progress: ProgressFn = {
        let relayed = relayed.clone();
        Arc::new(move |bytes, total| {
            let done = relayed.fetch_add(bytes, Ordering::Relaxed) + bytes;
            tracing::debug!(done, total, "progress");
        })
    };

    let transfers = resolved.descriptors.iter().map(|descriptor| {
        let manager = &manager;
        let cancel = &cancel;
        let sink = sink.clone();
        let progress = progress.clone();
        async move {
            let outcome = manager
                .stream(cancel, descriptor, sink, Some(progress))
                .await
                .with_context(|| format!("relaying {}", descriptor.filename))?;
            let request = FinalizeRequest::new(&outcome, descriptor);
            let finished = InputFileFinalizer.finalize(request)?;
            anyhow::Ok(finished)
        }
    });
    let finished = futures::future::try_join_all(transfers).await?;

    println!("{}", serde_json::to_string_pretty(&finished)?);
    tracing::info!(
        bytes = relayed.load(Ordering::Relaxed),
        files = finished.len(),
        "done"
    );

    Ok(())
}
