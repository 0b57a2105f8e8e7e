use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contract::ContractDocument;
use server::settings::{Settings, DEFAULT_CONFIG_FILE};
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "testforge")]
#[command(about = "Generate, validate and repair automated test projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file and create the local database
    Init,
    /// Start the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Reduce a contract document to the operations carrying the given tags
    Reduce {
        contract: PathBuf,

        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output file; `.json` selects JSON, anything else YAML
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored test cases
    Cases,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => init(&cli.config).await,
        Some(Commands::Serve { host, port }) => serve(&cli.config, host, port).await,
        Some(Commands::Reduce {
            contract,
            tags,
            output,
        }) => reduce(&contract, &tags, output.as_deref()).await,
        Some(Commands::Cases) => cases(&cli.config).await,
        None => serve(&cli.config, None, None).await,
    }
}

async fn init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Settings already present at {}", config_path.display());
    } else {
        let content = toml::to_string_pretty(&Settings::default())?;
        tokio::fs::write(config_path, content)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Wrote default settings to {}", config_path.display());
    }

    let settings = Settings::load(config_path).await;
    prepare_directories(&settings).await?;
    let pool = db::create_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    println!("Database ready at {}", settings.database.url);
    println!();
    println!("Next steps:");
    println!("  1. Set TESTFORGE_API_KEY (or add it to .env)");
    println!("  2. Place the API contract at {}", settings.contract.path.display());
    println!("  3. Run 'testforge serve'");

    Ok(())
}

async fn serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    init_tracing();

    let mut settings = Settings::load(config_path).await;
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }
    prepare_directories(&settings).await?;

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let prefix = settings.server.api_prefix.clone();
    tracing::info!("Database: {}", settings.database.url);
    tracing::info!("Workspace: {}", settings.workspace.base_dir.display());

    let state = AppState::from_settings(settings).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!();
    println!("testforge");
    println!("════════════════════════════════════════");
    println!();
    println!("  API:         http://{}{}", addr, prefix);
    println!("  Swagger UI:  http://{}/swagger-ui", addr);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}

async fn reduce(contract_path: &Path, tags: &[String], output: Option<&Path>) -> Result<()> {
    let document = ContractDocument::load(contract_path).await?;
    let reduced = document.reduce(tags);

    let as_json = output
        .and_then(|p| p.extension())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rendered = if as_json {
        serde_json::to_string_pretty(&reduced)?
    } else {
        ContractDocument::to_yaml(&reduced)?
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Reduced contract written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

async fn cases(config_path: &Path) -> Result<()> {
    let settings = Settings::load(config_path).await;
    let pool = db::create_pool(&settings.database.url)
        .await
        .context("Failed to open database, run 'testforge init' first")?;
    db::run_migrations(&pool).await?;

    let cases = db::CaseRepository::new(pool).find_all().await?;

    println!();
    if cases.is_empty() {
        println!("No cases yet.");
    } else {
        println!("Cases ({}):", cases.len());
        for case in &cases {
            let icon = match case.status.as_str() {
                "validated" => "●",
                "needs_review" => "◐",
                _ => "○",
            };
            println!(
                "  {} [{}] [{}] {}  {}",
                icon,
                case.case_type.as_str(),
                case.status.as_str(),
                case.name,
                case.id
            );
        }
    }
    println!();

    Ok(())
}

/// Create the workspace root and the parent of a file-backed database.
async fn prepare_directories(settings: &Settings) -> Result<()> {
    tokio::fs::create_dir_all(&settings.workspace.base_dir).await?;

    let db_file = settings
        .database
        .url
        .strip_prefix("sqlite://")
        .or_else(|| settings.database.url.strip_prefix("sqlite:"))
        .filter(|p| !p.starts_with(":memory:"));
    if let Some(parent) = db_file.and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "testforge=info,server=info,orchestrator=debug,tower_http=info".into()
            }),
        )
        .init();
}
