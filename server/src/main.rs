mod config;
mod graphql;
mod http;
mod seed;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, SeaOrmRecordStore};
use platform_obs::{ObsConfig, init_tracing};
use products_hr::{CascadeOptions, HrModule, InMemoryStore, RecordStore};
use tracing::info;

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "hr-server", version, about = "HR org chart and role changes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert the demo organization into an empty database.
    Seed,
    /// Print the GraphQL schema (SDL).
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
    #[arg(
        long,
        help = "Serve a seeded in-memory store instead of DATABASE_URL",
        conflicts_with = "allow_dirty"
    )]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed => run_seed(&app_config).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

fn hr_module(store: Arc<dyn RecordStore>, config: &AppConfig) -> HrModule {
    HrModule::new(store).with_options(CascadeOptions {
        repair_on_mismatch: config.repair_on_mismatch,
    })
}

async fn setup_pool() -> Result<DbPool> {
    DatabaseSettings::default()
        .connect()
        .await
        .context("database unavailable")
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, false).await?;
    let hr = hr_module(Arc::new(SeaOrmRecordStore::new(pool)), config);
    seed::seed_demo(&hr).await?;
    Ok(())
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let schema = graphql::build_schema(GraphqlData {
        hr: HrModule::new(Arc::new(InMemoryStore::new())),
    });
    let sdl = schema.sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            info!(path = %target.display(), "schema written");
        }
        None => print!("{sdl}"),
    }
    Ok(())
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let (pool, store): (Option<DbPool>, Arc<dyn RecordStore>) = if cmd.in_memory {
        (None, Arc::new(InMemoryStore::new()))
    } else {
        let pool = setup_pool().await?;
        ensure_migrations(&pool, cmd.allow_dirty).await?;
        (Some(pool.clone()), Arc::new(SeaOrmRecordStore::new(pool)))
    };
    let hr = hr_module(store, &config);
    if cmd.in_memory {
        seed::seed_demo(&hr).await?;
    }

    let schema = graphql::build_schema(GraphqlData { hr });
    let state = AppState {
        pool,
        schema,
        config: config.clone(),
    };
    http::serve(ServeConfig::new(cmd.host, cmd.port), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}
