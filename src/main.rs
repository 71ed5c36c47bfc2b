use clap::{Parser, Subcommand};
use ofqos::config;
use ofqos::runtime;
use ofqos::telemetry::init_logging;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "ofqos")]
#[command(about = "OpenFlow learning switch controller with QoS meters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Replay a recorded event stream through the controller
    Run {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// JSON-lines event file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        events: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config.toml
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config {
            action: ConfigAction::Validate { config },
        } => {
            init_logging(None);
            cmd_config_validate(&config)
        }
        Commands::Run { config, events } => cmd_run(&config, &events),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(config_path: &Path, events: &str) -> Result<(), String> {
    use tokio::io::BufReader;
    use tokio::runtime::Runtime;

    let config = config::load(config_path)
        .map_err(|e| format!("Failed to load {}: {}", config_path.display(), e))?;
    init_logging(Some(&config.logging));

    let validation = config::validate(&config);
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if validation.has_errors() {
        validation.print_diagnostics();
        return Err("Configuration has errors".to_string());
    }

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    let file = if events == "-" {
        None
    } else {
        let file = std::fs::File::open(events)
            .map_err(|e| format!("Failed to open {}: {}", events, e))?;
        Some(tokio::fs::File::from_std(file))
    };

    let summary = rt
        .block_on(async {
            let stdout = tokio::io::stdout();
            match file {
                Some(file) => runtime::replay(&config, BufReader::new(file), stdout).await,
                None => {
                    runtime::replay(&config, BufReader::new(tokio::io::stdin()), stdout).await
                }
            }
        })
        .map_err(|e| format!("Replay failed: {}", e))?;

    info!(
        "replayed {} event(s), {} command(s), {} rejected, {} bad line(s)",
        summary.events, summary.commands, summary.rejected, summary.skipped_lines
    );
    for (dpid, switch) in summary.fabric.switches() {
        info!(
            "[dpid={}] {} flow(s), {} meter(s)",
            dpid,
            switch.flow_count(),
            switch.meter_count()
        );
    }
    Ok(())
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    info!("Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;
    let result = config::validate(&cfg);
    result.print_diagnostics();

    if result.has_errors() {
        return Err("Configuration has errors".to_string());
    }

    println!("Configuration is valid.");
    Ok(())
}
