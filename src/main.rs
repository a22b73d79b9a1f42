use std::net::IpAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crewledger::{api, config::Config, engine::Engine};

#[derive(Parser)]
#[command(name = "crewledger")]
#[command(about = "Employee, project and training ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API (overrides CREWLEDGER_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides CREWLEDGER_BIND)
        #[arg(short, long)]
        bind: Option<IpAddr>,
    },
    /// Check that every assignment is recorded on both sides
    Check,
    /// Complete a project and pay out its reward
    CompleteProject {
        /// Project id
        id: Uuid,
    },
    /// Withdraw an employee's balance
    Withdraw {
        employee_id: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "crewledger=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(mut config: Config, port: Option<u16>, bind: Option<IpAddr>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let engine = Engine::new(config.open_database()?);
    let app = api::create_router(engine);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("crewledger listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env()?;

    match cli.command {
        Some(Commands::Serve { port, bind }) => serve(config, port, bind).await?,
        None => serve(config, None, None).await?,
        Some(Commands::Check) => {
            let engine = Engine::new(config.open_database()?);
            let report = engine.check_consistency()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_consistent() {
                std::process::exit(1);
            }
        }
        Some(Commands::CompleteProject { id }) => {
            let engine = Engine::new(config.open_database()?);
            let report = engine.complete_project(id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(Commands::Withdraw { employee_id }) => {
            let engine = Engine::new(config.open_database()?);
            let withdrawal = engine.withdraw(&employee_id)?;
            println!("{}", serde_json::to_string_pretty(&withdrawal)?);
        }
    }

    Ok(())
}
