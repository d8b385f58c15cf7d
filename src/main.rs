use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use secrecy::SecretString;

use taxthink_advisor::ConversationService;
use taxthink_core::chat::ChatProvider;
use taxthink_llm::OpenAiProvider;
use taxthink_server::ServerConfig;
use taxthink_store::Database;

#[derive(Parser, Debug)]
#[command(name = "taxthink", about = "TaxThink conversation server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Database file. Defaults to ~/.taxthink/taxthink.db.
    #[arg(long, env = "TAXTHINK_DB")]
    database: Option<PathBuf>,

    /// Generation model name.
    #[arg(long, env = "TAXTHINK_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible chat-completions endpoint override.
    #[arg(long, env = "TAXTHINK_API_URL")]
    api_url: Option<String>,

    /// API key for the generation endpoint.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "default_key", hide_env_values = true)]
    api_key: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting TaxThink server");

    let db_path = args
        .database
        .unwrap_or_else(|| dirs_home().join(".taxthink").join("taxthink.db"));
    let db = Database::open(&db_path).expect("Failed to open database");
    tracing::info!(path = %db_path.display(), "Database opened");

    let provider = OpenAiProvider::new(
        SecretString::from(args.api_key),
        args.model.as_deref(),
        args.api_url.as_deref(),
    );
    tracing::info!(model = provider.model(), "Generation provider configured");

    let advisor = Arc::new(ConversationService::new(Arc::new(provider)));

    let config = ServerConfig { port: args.port };
    let handle = taxthink_server::start(config, db, advisor)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "TaxThink server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
