mod config;
mod telemetry;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

/// Relays storefront support forms into the helpdesk as lead contacts and tickets.
#[derive(Parser)]
#[command(name = "deskrelay", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the form endpoint and the admin listener
    Run(ConfigArgs),
    /// Load and validate the configuration, then exit
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file. Without one, defaults plus environment variables are used.
    #[arg(long)]
    config_file: Option<PathBuf>,
}

fn load_config(args: &ConfigArgs) -> config::Config {
    match config::Config::load(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run(args) => {
            let config = load_config(&args);

            let telemetry_guard = match telemetry::init(&config.common) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Failed to initialize telemetry: {e}");
                    process::exit(1);
                }
            };

            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("Failed to start runtime: {e}");
                    process::exit(1);
                }
            };

            if let Err(e) = runtime.block_on(ticket_relay::run(config.relay)) {
                tracing::error!(error = %e, "Relay stopped");
                drop(telemetry_guard);
                process::exit(1);
            }
        }
        CliCommand::Validate(args) => {
            let config = load_config(&args);
            let helpdesk = &config.relay.helpdesk;

            println!("Config is valid");
            println!(
                "  listener: {}:{}{}",
                config.relay.listener.host, config.relay.listener.port, config.relay.path
            );
            println!("  helpdesk: {} (version {})", helpdesk.base_url, helpdesk.api_version);
            if !helpdesk.has_credentials() {
                println!("  warning: access token or ticket type id missing, submissions will fail");
            }
        }
    }
}
