use clap::Parser;
use paper_risk::cli::{Cli, Commands};
use paper_risk::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        eprintln!("Warning: {} not found, using default configuration", cli.config);
        Config::default()
    };

    paper_risk::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Replay(args) => {
            tracing::info!("Starting replay");
            args.execute(&config).await?;
        }
        Commands::Config => {
            let risk = &config.risk;
            let sim = &config.simulation;
            println!("Current configuration:");
            println!(
                "  Risk: daily loss ${}, drawdown {}%, position ${}",
                risk.max_daily_loss_usd, risk.max_drawdown_percent, risk.max_position_size_usd
            );
            println!(
                "  Limits: {} positions, {} trades/min, {} losses, {}ms cooldown",
                risk.max_positions_per_user,
                risk.max_trades_per_minute,
                risk.max_consecutive_losses,
                risk.min_time_between_trades_ms
            );
            println!(
                "  Simulation: balance ${}, noise ±{}bps, snapshot max age {}s, tick {}ms",
                sim.initial_balance_usd,
                sim.noise_bps,
                sim.max_snapshot_age_secs,
                sim.tick_interval_ms
            );
            println!(
                "  Telemetry: level {}, format {:?}, metrics port {:?}",
                config.telemetry.log_level, config.telemetry.log_format, config.telemetry.metrics_port
            );
        }
    }

    Ok(())
}
