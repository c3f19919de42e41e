//! `roverlink` – runs the rover's RPC server, HTTP mirror and IMU sampler.
//!
//! 1. Initialises structured logging (see `roverlink_runtime::telemetry`).
//! 2. Loads `~/.roverlink/config.toml`, writing the defaults on first run.
//! 3. Starts the simulated rover hardware behind both servers.
//! 4. Intercepts **Ctrl-C** to end any stream with `STREAM_END` and exit.

mod config;

use std::process::ExitCode;

use colored::Colorize;
use roverlink_hal::{SimImu, SimRegistry};
use roverlink_runtime::{Rover, init_tracing};
use tokio::sync::watch;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // Built before the Tokio runtime so the OTLP exporter stays synchronous.
    let _tracing = init_tracing("roverlink");

    print_banner();

    let cfg = load_or_init_config();
    let settings = match cfg.to_settings() {
        Ok(settings) => settings,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Shutdown signal ───────────────────────────────────────────────────
    let (stop, shutdown) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        stop.send_replace(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "  RPC       {}",
        format!("{}:{}", settings.bind_address, settings.rpc_port).bold()
    );
    if settings.http_mirror {
        println!(
            "  Mirror    {}",
            format!("http://{}:{}", settings.bind_address, settings.http_port).bold()
        );
    }
    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());

    let hardware = SimRegistry::new().with_builtin_led().with_status_light().build();
    let rover = Rover::new(hardware, settings);
    let result = runtime.block_on(rover.run(Box::new(SimImu::new("sim-imu")), shutdown));

    match result {
        Ok(()) => {
            info!("roverlink exited cleanly");
            println!("{}", "  ✓ Rover stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "rover failed");
            println!("{}: {}", "Rover error".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_or_init_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___                    __    _       __  "#.bold().cyan());
    println!("{}", r#"   / _ \___ _  _____ ____ / /   (_)__   / /__"#.bold().cyan());
    println!("{}", r#"  / , _/ _ \ |/ / -_) __// /__ / / _ \ /  '_/"#.bold().cyan());
    println!("{}", r#" /_/|_|\___/___/\__/_/  /____//_/_//_//_/\_\ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "RoverLink".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  IMU telemetry and control for the rover");
    println!();
}
