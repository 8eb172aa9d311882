use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use anyhow::Result;
use dotenvy::dotenv;
use std::env;

use subsync::{init, profile, subscription, telemetry};

#[derive(Parser)]
#[command(name = "subsync", about = "Proxy subscription sync CLI")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    Sub(subscription::SubCmd),
    Profile(profile::ProfileCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and SUBSYNC_LOG_FORMAT
    telemetry::config::init_tracing();
    let dsn = cli
        .dsn
        .or_else(|| env::var("DATABASE_URL").ok())
        .expect("Please provide --dsn or set DATABASE_URL in .env");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await?;

    match cli.command {
        Commands::Init(args) => init::run(&pool, args).await?,
        Commands::Sub(args) => subscription::run(&pool, args).await?,
        Commands::Profile(args) => profile::run(&pool, args).await?,
    }

    Ok(())
}
