//! Alert Core Service
//!
//! Wires the in-memory stores into a running process: logging, metrics
//! export, periodic garbage collection, reload on SIGHUP and a log-only
//! consumer of pending alerts.

use alert_mem_provider::MemProvider;
use alert_model::{Alert, Muter, SystemClock};
use alert_provider::{AlertIterator, Alerts, LogSettings, ReloadCoordinator, Settings};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .with_context(|| format!("invalid log level {:?}", settings.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {e}"))
}

/// Serve Prometheus metrics on `addr`
pub fn install_metrics(addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid metrics address {addr:?}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    info!(%addr, "metrics exporter listening");
    Ok(())
}

/// Drain `pending`, then follow `live`, reporting each alert with its mute
/// status. Returns when the live iterator ends.
pub async fn consume_alerts<F>(
    mut pending: AlertIterator,
    mut live: AlertIterator,
    muter: &dyn Muter,
    mut sink: F,
) where
    F: FnMut(&Alert, bool),
{
    while let Some(alert) = pending.next().await {
        sink(&alert, muter.mutes(&alert.labels));
    }
    while let Some(alert) = live.next().await {
        sink(&alert, muter.mutes(&alert.labels));
    }
    if let Some(err) = live.err() {
        warn!(error = %err, "alert subscription ended");
    }
}

fn spawn_log_consumer(alerts: Arc<dyn Alerts>, muter: Arc<dyn Muter>) -> JoinHandle<()> {
    // Subscribe before the snapshot so nothing falls between the two
    let live = alerts.subscribe();
    let pending = alerts.get_pending();

    tokio::spawn(async move {
        consume_alerts(pending, live, muter.as_ref(), |alert, muted| {
            info!(
                fingerprint = %alert.fingerprint(),
                labels = %alert.labels,
                muted,
                "pending alert"
            );
        })
        .await;
    })
}

/// Reload on SIGHUP until Ctrl-C
#[cfg(unix)]
async fn wait_for_signals(coordinator: &ReloadCoordinator) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to listen for SIGHUP")?;
    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("SIGHUP received, reloading");
                if let Err(e) = coordinator.reload_registered() {
                    error!(error = %e, "reload failed");
                }
            }
            result = tokio::signal::ctrl_c() => {
                return result.context("failed to listen for Ctrl-C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(_coordinator: &ReloadCoordinator) -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")
}

/// Run the service until Ctrl-C
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = Settings::load(config_path.as_deref()).context("failed to load settings")?;
    init_logging(&settings.log)?;

    info!("=== alertd v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(addr) = &settings.metrics_addr {
        install_metrics(addr)?;
    }

    let provider = MemProvider::new(&settings, Arc::new(SystemClock));
    let coordinator = ReloadCoordinator::new(config_path, settings);
    provider.register_with(&coordinator);

    let gc = provider.spawn_gc();
    let consumer = spawn_log_consumer(provider.alerts.clone(), provider.silences.clone());

    wait_for_signals(&coordinator).await?;

    info!("shutting down");
    consumer.abort();
    gc.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_model::{LabelSet, ManualClock, Matcher, Silence};
    use alert_provider::Silences;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_consumer_reports_backlog_then_live_alerts() {
        let now = Utc.with_ymd_and_hms(2024, 11, 5, 14, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let provider = MemProvider::new(&Settings::default(), clock);

        provider
            .silences
            .set(Silence::new(
                vec![Matcher::equal("alertname", "Backlog")],
                now,
                now + Duration::hours(1),
            ))
            .unwrap();
        provider
            .alerts
            .put(vec![Alert::new(LabelSet::new().with("alertname", "Backlog"), now)])
            .unwrap();

        let mut live = provider.alerts.subscribe();
        let pending = provider.alerts.get_pending();
        provider
            .alerts
            .put(vec![Alert::new(LabelSet::new().with("alertname", "Live"), now)])
            .unwrap();
        // Stop after the live alert already queued
        let queued = live.try_next().unwrap();
        live.close();
        let live = AlertIterator::snapshot(queued.into_iter().collect());

        let mut seen = Vec::new();
        consume_alerts(pending, live, provider.silences.as_ref(), |alert, muted| {
            seen.push((alert.labels.get("alertname").unwrap_or("").to_string(), muted));
        })
        .await;

        assert_eq!(
            seen,
            vec![("Backlog".to_string(), true), ("Live".to_string(), false)]
        );
    }

    #[test]
    fn test_install_metrics_rejects_bad_address() {
        assert!(install_metrics("not-an-address").is_err());
    }

    #[tokio::test]
    async fn test_run_fails_on_missing_settings_file() {
        let result = run(Some(PathBuf::from("/nonexistent/alertd-settings.toml"))).await;
        assert!(result.is_err());
    }
}
