mod cli;
mod error;
mod protocol;
mod server;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fbfuse_config::{Config, load_config};
use fbfuse_core::MasterController;

use crate::cli::{CheckConfigArgs, Cli, Command, LogFormat, ServeArgs};
use crate::error::CliError;
use crate::server::ControlServer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.global.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::CheckConfig(args) => check_config(&config, &args),
    }
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<(), CliError> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.dummy {
        config.controller.dummy = true;
    }

    let master = MasterController::new(config.master_config()?)?;
    master.start().await?;

    let server = ControlServer::bind(&config.listen_address(), master).await?;
    info!(address = %server.local_addr()?, "control server listening");

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            shutdown.cancel();
        }
    });

    server.run().await
}

fn check_config(config: &Config, args: &CheckConfigArgs) -> Result<(), CliError> {
    config.master_config()?;
    let rendered = if args.json {
        serde_json::to_string_pretty(config)?
    } else {
        config.to_toml()?
    };
    println!("{rendered}");
    Ok(())
}
