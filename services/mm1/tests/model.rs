//! Full M/M/1 runs and the shipped configuration

mod common;

use common::idle_config;
use des_actors::{DispatchMode, KernelConfig};
use des_config::ConfigLoader;
use mm1::{simulate, Mm1Config, Mm1Outcome, Mm1Settings};
use std::path::PathBuf;
use std::time::Duration;

fn settings(seed: u64) -> Mm1Settings {
    Mm1Settings {
        arrival_rate: 1.0,
        service_rate: 2.0,
        num_arrivals: 200,
        seed,
        report_delay: 1_000.0,
        ..Default::default()
    }
}

async fn run(settings: &Mm1Settings, kernel: KernelConfig) -> Mm1Outcome {
    tokio::time::timeout(Duration::from_secs(30), simulate(settings, kernel))
        .await
        .expect("simulation finished in time")
        .expect("simulation succeeded")
}

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/mm1.toml")
}

#[tokio::test]
async fn test_fixed_seed_is_reproducible() {
    let first = run(&settings(333), KernelConfig::default()).await;
    let second = run(&settings(333), KernelConfig::default()).await;
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.run.final_clock, second.run.final_clock);
}

#[tokio::test]
async fn test_different_seeds_differ() {
    let a = run(&settings(1), KernelConfig::default()).await;
    let b = run(&settings(2), KernelConfig::default()).await;
    assert_ne!(a.summary, b.summary);
}

#[tokio::test]
async fn test_every_entity_served_before_report() {
    let outcome = run(&settings(333), KernelConfig::default()).await;
    let summary = &outcome.summary;

    assert_eq!(summary.arrivals, 200);
    assert_eq!(summary.served, 200);
    assert!(summary.mean_service > 0.0);
    assert!(summary.mean_wait >= 0.0);
    assert!(summary.max_wait >= summary.mean_wait);
    assert!(summary.utilisation > 0.0 && summary.utilisation < 1.0);
    assert!(summary.mean_queue_depth <= summary.max_queue_depth as f64);

    assert_eq!(outcome.run.shutdown_reason.as_deref(), Some("statistics reported"));
    assert_eq!(outcome.run.final_clock.as_f64(), summary.simulated_time);
    assert_eq!(outcome.run.metrics.routing_failures, 0);
    assert_eq!(outcome.run.metrics.messages_rejected, 0);
    assert_eq!(outcome.run.metrics.late_events, 0);
    assert_eq!(outcome.run.metrics.processing_failures, 0);
}

#[tokio::test]
async fn test_duration_sets_arrival_count() {
    let settings = Mm1Settings {
        duration: Some(50.0),
        arrival_rate: 2.0,
        service_rate: 4.0,
        ..settings(9)
    };
    let outcome = run(&settings, KernelConfig::default()).await;
    assert_eq!(outcome.summary.arrivals, 100);
    assert_eq!(outcome.summary.served, 100);
}

#[tokio::test]
async fn test_invalid_settings_fail_before_running() {
    let settings = Mm1Settings {
        service_rate: -1.0,
        ..settings(1)
    };
    let err = simulate(&settings, KernelConfig::default()).await.unwrap_err();
    assert!(format!("{err:#}").contains("service_rate"));
}

#[tokio::test]
async fn test_horizon_before_report_is_an_error() {
    let mut kernel = idle_config(200);
    kernel.scheduler.horizon = Some(10.0);
    let err = simulate(&settings(3), kernel).await.unwrap_err();
    assert!(format!("{err:#}").contains("without a statistics report"));
}

#[tokio::test]
async fn test_shipped_config_matches_defaults() {
    let config: Mm1Config = ConfigLoader::new(shipped_config())
        .env_prefix("MM1TEST_SHIPPED")
        .load()
        .unwrap();
    assert_eq!(config.model, Mm1Settings::default());
    assert_eq!(config.kernel, KernelConfig::default());
    assert_eq!(config.kernel.scheduler.dispatch, DispatchMode::AwaitProcessed);
    assert_eq!(config.logging.level, "info");
}

#[tokio::test]
async fn test_ci_environment_overlay() {
    let config: Mm1Config = ConfigLoader::new(shipped_config())
        .environment(Some("ci"))
        .env_prefix("MM1TEST_CI")
        .load()
        .unwrap();
    assert_eq!(config.model.num_arrivals, 200);
    assert_eq!(config.model.seed, 333);
    assert_eq!(config.kernel.scheduler.idle_stop_ms, Some(2_000));
    assert_eq!(config.logging.level, "warn");

    let outcome = run(&config.model, config.kernel).await;
    assert_eq!(outcome.summary.arrivals, 200);
}

#[tokio::test]
async fn test_config_file_and_env_override_drive_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mm1.toml");
    std::fs::write(
        &path,
        r#"
[kernel.scheduler]
dispatch = "await_processed"

[model]
arrival_rate = 0.5
service_rate = 2.0
num_arrivals = 40
report_delay = 500.0
"#,
    )
    .unwrap();

    std::env::set_var("MM1TEST_FILE__MODEL__SEED", "77");
    let config: Mm1Config = ConfigLoader::new(&path)
        .env_prefix("MM1TEST_FILE")
        .load()
        .unwrap();
    std::env::remove_var("MM1TEST_FILE__MODEL__SEED");

    assert_eq!(config.model.seed, 77);
    assert_eq!(config.model.entity_name, "customer");

    let outcome = run(&config.model, config.kernel).await;
    assert_eq!(outcome.summary.arrivals, 40);
    assert_eq!(outcome.summary.served, 40);
}
