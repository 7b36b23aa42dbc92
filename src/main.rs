use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creel::cli::{Cli, Commands};
use creel::commands;
use creel::config::Config;
use creel::db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| config.db_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;

    match cli.command {
        Commands::Register { name } => commands::register(&mut config, &db, &name).await,
        Commands::Login { name } => commands::login(&mut config, &db, &name).await,
        Commands::Users => commands::users(&config, &db).await,
        Commands::Reset => commands::reset(&db).await,
        Commands::AddFeed { name, url } => commands::add_feed(&config, &db, &name, &url).await,
        Commands::Feeds => commands::feeds(&db).await,
        Commands::Follow { url } => commands::follow(&config, &db, &url).await,
        Commands::Following => commands::following(&config, &db).await,
        Commands::Unfollow { url } => commands::unfollow(&config, &db, &url).await,
        Commands::Browse { limit } => commands::browse(&config, &db, limit).await,
        Commands::Agg { interval, no_overlap } => {
            commands::agg(Arc::new(db), &interval, no_overlap).await
        }
    }
}
