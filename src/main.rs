// ABOUTME: Main entry point for the parley chat client
// ABOUTME: Loads config, sets up logging, then runs the console or a health check

use anyhow::Result;
use clap::Parser;
use parley::cli::{Cli, Command};
use parley::console::{self, Console, ConsoleSettings};
use parley::{health, logging};
use parley_bus::backends::SocketIoBackend;
use parley_bus::TransportHandle;
use parley_core::config::Config;
use parley_core::{spawn_session, SessionConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.print_logs)?;

    let mut config = Config::load()?;
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        endpoint = %config.relay.endpoint,
        model = %config.chat.default_model,
        refresh_ms = config.refresh.interval_ms,
        "Configuration loaded"
    );

    match cli.command() {
        Command::Health => {
            let client = reqwest::Client::new();
            let status =
                health::check(&client, &config.relay.endpoint, config.health_timeout()).await;
            println!("{}: {}", config.relay.endpoint, status);
            if status != health::Health::Up {
                anyhow::bail!("relay at {} is not healthy", config.relay.endpoint);
            }
            Ok(())
        }
        Command::Chat => run_chat(config).await,
    }
}

async fn run_chat(config: Config) -> Result<()> {
    let transport = TransportHandle::spawn(SocketIoBackend::new(config.handshake_timeout()));
    let (session, refresh) = spawn_session(
        transport,
        SessionConfig {
            refresh: config.refresh_policy(),
            default_model: config.chat.default_model.clone(),
        },
    );

    let settings = ConsoleSettings {
        endpoint: config.relay.endpoint.clone(),
        username: config.chat.username.clone(),
        health_timeout: config.health_timeout(),
    };
    let mut console = Console::new(session, settings, std::io::stdout());

    println!("💬 parley · relay {} · /help for commands", config.relay.endpoint);
    match config.chat.username.clone() {
        Some(username) => {
            console
                .handle(console::Input::Connect(Some(username)))
                .await?;
        }
        None => console.show_health().await?,
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console::run(console, refresh, stdin).await?;

    tracing::info!("parley exiting");
    Ok(())
}
