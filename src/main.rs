use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use outreachd::config::Config;
use outreachd::{db, http};

#[derive(Parser)]
#[command(name = "outreachd")]
#[command(about = "Data-access API for the outreach dashboard")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "OUTREACHD_CONFIG", default_value = "outreachd.toml")]
    config: PathBuf,

    /// Address to listen on (overrides config file)
    #[arg(long, env = "OUTREACHD_BIND")]
    bind: Option<String>,

    /// SQLite database file (overrides config file)
    #[arg(long, env = "OUTREACHD_DB")]
    db: Option<PathBuf>,

    /// Do not create missing tables at startup
    #[arg(long)]
    no_bootstrap: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("outreachd=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(path) = cli.db {
        config.storage.path = path;
    }
    if cli.no_bootstrap {
        config.storage.bootstrap_schema = false;
    }

    info!(path = %config.storage.path.display(), bootstrap = config.storage.bootstrap_schema, "opening database");
    let conn = db::open_db(&config.storage.path, config.storage.bootstrap_schema)
        .with_context(|| format!("opening {}", config.storage.path.display()))?;

    let state = http::AppState::with_activity_writer(conn, config.activity);
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!("outreachd listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
