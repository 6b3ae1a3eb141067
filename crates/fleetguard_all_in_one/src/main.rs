mod config;
mod telemetry;

use chrono::{Duration as ChronoDuration, Utc};
use config::ServiceConfig;
use fleetguard_api::{
    run_http_server, ApiState, HttpServerConfig, IpRateLimiter, LogEmailSender, PlainTextRenderer,
    RateLimitConfig, ShareReportReader,
};
use fleetguard_domain::{
    CompactionLimits, CredentialStore, DeviceInfo, DriverInfo, FixedWeatherProvider, GpsPoint,
    IncidentEvent, InMemoryCredentialStore, InMemoryTelematicsApi, ShareTokenCodec, TelematicsApi,
    TenantCredentials, WeatherProvider, WeatherSnapshot,
};
use fleetguard_runner::Runner;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tenant_poller::{TenantPoller, TenantPollerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    telemetry::init_telemetry(&config.log_level);
    info!(run_mode = %config.run_mode, "Starting fleetguard service");

    // Demo wiring: one seeded in-memory tenant. A deployment substitutes
    // real CredentialStore and TelematicsApi implementations here.
    let credentials: Arc<dyn CredentialStore> = Arc::new(demo_credentials());
    let telematics = Arc::new(demo_telematics().await);
    let api: Arc<dyn TelematicsApi> = telematics;
    let weather: Arc<dyn WeatherProvider> = Arc::new(FixedWeatherProvider::new(Some(
        WeatherSnapshot {
            condition: "clear".to_string(),
            temperature_c: 15.0,
            visibility_km: Some(10.0),
        },
    )));

    let poller = Arc::new(TenantPoller::new(
        Arc::clone(&credentials),
        Arc::clone(&api),
        weather,
        TenantPollerConfig {
            window_before_secs: config.window_before_secs,
            window_after_secs: config.window_after_secs,
            session_ttl_minutes: config.session_ttl_minutes,
            public_base_url: config.public_base_url.clone(),
            share_secret: config.share_secret.clone(),
            compaction: CompactionLimits {
                max_trail_points: config.max_trail_points,
                max_diagnostics: config.max_diagnostics,
                max_record_bytes: config.max_record_bytes,
            },
        },
    ));

    let api_state = ApiState {
        reader: Arc::new(ShareReportReader::new(
            Arc::clone(&credentials),
            Arc::clone(&api),
            ShareTokenCodec::new(&config.share_secret),
            ChronoDuration::minutes(config.session_ttl_minutes),
            Duration::from_secs(config.report_cache_ttl_secs),
        )),
        renderer: Arc::new(PlainTextRenderer),
        email: Arc::new(LogEmailSender),
        limiter: Arc::new(IpRateLimiter::new(RateLimitConfig {
            max_requests: config.rate_limit_max_requests,
            window_secs: config.rate_limit_window_secs,
            ..Default::default()
        })),
    };

    let http_config = HttpServerConfig {
        host: config.http_host.clone(),
        port: config.http_port,
    };
    let poll_interval = Duration::from_secs(config.poll_interval_secs);

    let mut runner = Runner::new();
    match config.run_mode.as_str() {
        "poll" => {
            let poller = Arc::clone(&poller);
            runner = runner.with_process(move |token| async move {
                poller.run_once(token).await?;
                Ok(())
            });
        }
        "serve" => {
            runner = runner.with_process(move |token| async move {
                run_http_server(http_config, api_state, token).await
            });
        }
        "all" => {
            let poller = Arc::clone(&poller);
            runner = runner
                .with_process(move |token| async move {
                    poll_loop(poller, poll_interval, token).await
                })
                .with_process(move |token| async move {
                    run_http_server(http_config, api_state, token).await
                });
        }
        other => {
            error!("Unknown run mode: {}", other);
            std::process::exit(1);
        }
    }

    runner = runner
        .with_closer(|| async move {
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    if let Err(e) = runner.run().await {
        error!("Service exiting with error: {:#}", e);
        std::process::exit(1);
    }
    info!("Service exiting normally");
}

async fn poll_loop(
    poller: Arc<TenantPoller>,
    interval: Duration,
    token: CancellationToken,
) -> Result<(), anyhow::Error> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Poll loop stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                poller.run_once(token.clone()).await?;
            }
        }
    }
}

fn demo_credentials() -> InMemoryCredentialStore {
    let mut tenants = HashMap::new();
    tenants.insert(
        "demo".to_string(),
        TenantCredentials {
            endpoint: "in-memory".to_string(),
            database: "demo".to_string(),
            username: "svc-reports".to_string(),
            secret: "demo-secret".to_string(),
        },
    );
    InMemoryCredentialStore::new(tenants)
}

/// Seed one tenant with a device, driver, trail and a collision incident so
/// a fresh start produces a report end to end.
async fn demo_telematics() -> InMemoryTelematicsApi {
    let api = InMemoryTelematicsApi::new();
    let now = Utc::now();

    api.seed_device(
        "demo",
        DeviceInfo {
            id: "device-1".to_string(),
            name: "Truck 12".to_string(),
            vin: Some("1FTSW21R08ED12345".to_string()),
        },
    )
    .await;
    api.seed_driver(
        "demo",
        DriverInfo {
            id: "driver-1".to_string(),
            name: "J. Doe".to_string(),
            license_state: Some("ON".to_string()),
        },
    )
    .await;

    let trail = (-60..60)
        .map(|i| GpsPoint {
            timestamp: now + ChronoDuration::seconds(i * 2),
            latitude: 45.4215 + i as f64 * 0.0001,
            longitude: -75.6972,
            speed_kmh: Some(if i < 0 { 62.0 } else { 8.0 }),
        })
        .collect();
    api.seed_trail("demo", "device-1", trail).await;

    api.seed_incident(
        "demo",
        IncidentEvent {
            id: "incident-1".to_string(),
            device_id: "device-1".to_string(),
            driver_id: Some("driver-1".to_string()),
            rule_name: "Collision Detected".to_string(),
            active_from: now,
            active_to: now + ChronoDuration::seconds(10),
        },
    )
    .await;

    api
}
