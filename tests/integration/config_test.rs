//! Configuration loading tests

use paper_risk::config::Config;
use paper_risk::telemetry::LogFormat;
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.risk.max_daily_loss_usd, dec!(500));
    assert_eq!(config.simulation.initial_balance_usd, dec!(10000));
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[risk]
max_position_size_usd = 2500
min_time_between_trades_ms = 1000

[telemetry]
log_format = "json"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.risk.max_position_size_usd, dec!(2500));
    assert_eq!(config.risk.min_time_between_trades_ms, 1_000);
    assert_eq!(config.risk.max_consecutive_losses, 5);
    assert_eq!(config.telemetry.log_format, LogFormat::Json);
}

#[test]
fn test_load_rejects_invalid_limits() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[risk]\nmax_daily_loss_usd = 0").unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_daily_loss_usd"));
}

#[test]
fn test_load_rejects_malformed_toml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[risk\nmax_daily_loss_usd = ").unwrap();
    assert!(Config::load(file.path()).is_err());
}
