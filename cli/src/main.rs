mod commands;
mod config;
mod openfoodfacts;
mod server;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_barcode, cmd_cache, cmd_import_common, cmd_import_quick_start, cmd_search, cmd_summary,
};
use crate::config::Config;
use crate::openfoodfacts::{
    DEFAULT_BASE_URL, DEFAULT_SEARCH_URL, OffSettings, OpenFoodFactsClient, default_user_agent,
};
use fitplat_core::auth::TokenIssuer;
use fitplat_core::rate_limit::RateLimits;
use fitplat_core::service::{FoodLookupProvider, NutritionService};
use fitplat_core::users::UserService;

#[derive(Parser)]
#[command(
    name = "fitplat",
    version,
    about = "Nutrition and account services for a fitness tracker",
    long_about = "Nutrition and account services for a fitness tracker.\n\n\
        Food lookups check the local catalogue first and fall back to OpenFoodFacts,\n\
        caching usable results and spacing upstream requests to respect its quotas."
)]
struct Cli {
    /// Directory holding databases and secrets (default: platform data dir)
    #[arg(long, global = true, env = "FITPLAT_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(flatten)]
    off: OffArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OffArgs {
    /// OpenFoodFacts product API base URL
    #[arg(long = "off-base-url", env = "FITPLAT_OFF_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// OpenFoodFacts search API URL
    #[arg(long = "off-search-url", env = "FITPLAT_OFF_SEARCH_URL", default_value = DEFAULT_SEARCH_URL)]
    search_url: String,
    /// Basic auth user for the staging host
    #[arg(long = "off-user", env = "FITPLAT_OFF_USER", default_value = "off")]
    user: String,
    /// Basic auth password for the staging host
    #[arg(long = "off-password", env = "FITPLAT_OFF_PASSWORD", default_value = "off")]
    password: String,
    /// User-Agent sent upstream
    #[arg(long = "off-user-agent", env = "FITPLAT_OFF_USER_AGENT")]
    user_agent: Option<String>,
    /// Request timeout in seconds
    #[arg(long = "off-timeout-secs", env = "FITPLAT_OFF_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,
    /// Minimum spacing between search requests, in milliseconds
    #[arg(long = "off-search-interval-ms", env = "FITPLAT_OFF_SEARCH_INTERVAL_MS", default_value = "6100")]
    search_interval_ms: u64,
    /// Minimum spacing between product requests, in milliseconds
    #[arg(long = "off-product-interval-ms", env = "FITPLAT_OFF_PRODUCT_INTERVAL_MS", default_value = "700")]
    product_interval_ms: u64,
}

impl OffArgs {
    fn settings(&self) -> OffSettings {
        OffSettings {
            base_url: self.base_url.clone(),
            search_url: self.search_url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            user_agent: self.user_agent.clone().unwrap_or_else(default_user_agent),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn rate_limits(&self) -> RateLimits {
        RateLimits {
            search: Duration::from_millis(self.search_interval_ms),
            product: Duration::from_millis(self.product_interval_ms),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ServiceKind {
    Nutrition,
    Users,
}

impl ServiceKind {
    fn default_port(self) -> u16 {
        match self {
            Self::Nutrition => 8092,
            Self::Users => 8091,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a REST API server
    Serve {
        /// Which service to run
        #[arg(value_enum)]
        service: ServiceKind,
        /// Port to listen on (default: 8092 nutrition, 8091 users)
        #[arg(short, long, env = "FITPLAT_PORT")]
        port: Option<u16>,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, env = "FITPLAT_BIND", default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication on the nutrition service
        #[arg(long)]
        no_auth: bool,
    },
    /// Search foods locally, falling back to `OpenFoodFacts`
    Search {
        /// Search query
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a food by barcode
    Barcode {
        /// Barcode number
        code: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a product from `OpenFoodFacts` and store it locally
    Cache {
        /// Barcode number
        code: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Seed the food catalogue
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Show a user's daily nutrition summary (defaults to today)
    Summary {
        /// User ID
        #[arg(short, long)]
        user: i64,
        /// Date to show (YYYY-MM-DD, today or yesterday)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import the built-in list of common whole foods
    Common {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cache a fixed set of popular products from `OpenFoodFacts`
    QuickStart {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir)?;

    if let Commands::Serve {
        service: ServiceKind::Users,
        port,
        bind,
        ..
    } = &cli.command
    {
        let secret = config.load_or_create_jwt_secret()?;
        let tokens = TokenIssuer::new(secret.as_bytes());
        let service = UserService::new(&config.users_db_path(), tokens)?;
        let port = port.unwrap_or(ServiceKind::Users.default_port());
        let state = server::users::UserState::new(service);
        return server::users::start_server(state, port, bind).await;
    }

    let service = NutritionService::new(&config.nutrition_db_path(), cli.off.rate_limits())?;
    let off: Arc<dyn FoodLookupProvider> =
        Arc::new(OpenFoodFactsClient::new(cli.off.settings())?);

    match cli.command {
        Commands::Serve {
            service: kind,
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let port = port.unwrap_or(kind.default_port());
            let state = server::nutrition::NutritionState::new(service, off, api_key);
            server::nutrition::start_server(state, port, &bind).await
        }
        Commands::Search { query, limit, json } => {
            cmd_search(Arc::new(service), off, query, limit, json).await
        }
        Commands::Barcode { code, json } => cmd_barcode(Arc::new(service), off, code, json).await,
        Commands::Cache { code, json } => cmd_cache(Arc::new(service), off, code, json).await,
        Commands::Import { command } => match command {
            ImportCommands::Common { json } => cmd_import_common(Arc::new(service), json).await,
            ImportCommands::QuickStart { json } => {
                cmd_import_quick_start(Arc::new(service), off, json).await
            }
        },
        Commands::Summary { user, date, json } => {
            cmd_summary(Arc::new(service), user, date, json).await
        }
    }
}
