use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use casting_concierge::classifier::{ClassifyRequest, KeywordClassifier};
use casting_concierge::db::{EscalationRepo, EscalationStatus};
use casting_concierge::gateway::{self, Gateway};
use casting_concierge::{Config, db};

/// Casting concierge - chat assistant for a talent-casting agency
#[derive(Parser)]
#[command(name = "concierge", version, about)]
struct Cli {
    /// Port to listen on (overrides `CONCIERGE_PORT` and the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the webhook and admin API (default)
    Serve,
    /// Delete expired conversation entries and dedupe records now
    Cleanup,
    /// Classify a message and show the action it would get
    Classify {
        /// Message text
        text: String,
    },
    /// List escalations waiting for a human
    Escalations {
        /// Include resolved items
        #[arg(long)]
        all: bool,
        /// Maximum number of items
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,casting_concierge=info",
        1 => "info,casting_concierge=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Cleanup => cleanup(&config),
        Command::Classify { text } => classify(&config, &text).await,
        Command::Escalations { all, limit } => escalations(&config, all, limit),
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        database = %config.database_path.display(),
        "starting casting concierge"
    );

    let gateway = Gateway::build(config)?;

    tokio::select! {
        result = gateway.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

fn cleanup(config: &Config) -> anyhow::Result<()> {
    let gateway = Gateway::build(config)?;
    let report = gateway.state().sweeper.cleanup_now()?;
    println!(
        "Removed {} conversation entries and {} dedupe records",
        report.removed_logs, report.removed_dedupe
    );
    Ok(())
}

async fn classify(config: &Config, text: &str) -> anyhow::Result<()> {
    let policy = config.policy.decision_policy()?;
    let classifier = gateway::build_classifier(config)?;
    let request = ClassifyRequest {
        message: text,
        profile: None,
        recent: &[],
    };

    let (source, classification) = match classifier.classify(&request).await {
        Ok(c) => (classifier.name(), c),
        Err(e) => {
            println!("{} classifier failed ({e}); using keyword fallback", classifier.name());
            ("keyword", KeywordClassifier::new().classify_sync(&request))
        }
    };

    println!("classifier:  {source}");
    println!("intent:      {}", classification.intent);
    println!("confidence:  {:.2}", classification.confidence);
    println!("sensitive:   {}", classification.is_sensitive);
    println!("reason:      {}", classification.reason);
    println!("action:      {}", policy.decide(&classification));
    Ok(())
}

fn escalations(config: &Config, all: bool, limit: usize) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;
    let repo = EscalationRepo::new(pool);
    let status = if all { None } else { Some(EscalationStatus::Open) };
    let items = repo.list(status, limit)?;

    if items.is_empty() {
        println!("No escalations");
        return Ok(());
    }

    for item in items {
        let created = chrono::DateTime::from_timestamp_millis(item.created_at_ms)
            .map_or_else(|| item.created_at_ms.to_string(), |t| t.to_rfc3339());
        println!(
            "{}  {:?}  {}  user={}  intent={}  sensitive={}",
            item.id,
            item.status,
            created,
            item.user_id,
            item.classification.intent,
            item.classification.is_sensitive
        );
        println!("    {}", item.user_text);
        if !item.suggested_reply.is_empty() {
            println!("    draft: {}", item.suggested_reply);
        }
    }
    Ok(())
}
