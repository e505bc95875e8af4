use anyhow::Context;
use clap::{Parser, Subcommand};
use feedback_backend_api::{build_router, AppState};
use feedback_backend_runtime::{telemetry, BackendServices};
use feedback_config::{load as load_config, AppConfig};
use feedback_database::{FeedbackRepository, UserRepository};
use tokio::net::TcpListener;
use tracing::info;

const CONTENT_PREVIEW_CHARS: usize = 40;

#[derive(Parser)]
#[command(name = "feedback-server")]
#[command(about = "Feedback board backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Print users and feedback from the database
    DumpData,
    /// Delete expired login sessions
    PurgeSessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::DumpData => dump_data(config).await,
        Commands::PurgeSessions => purge_sessions(config).await,
    }
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting feedback board");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = AppState::new(
        services.db_pool.clone(),
        services.authenticator.clone(),
        &config.auth,
    );
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(feedback_backend_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    services.db_pool.close().await;
    info!("feedback board shut down");
    Ok(())
}

async fn dump_data(config: AppConfig) -> anyhow::Result<()> {
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let users = UserRepository::new(services.db_pool.clone())
        .list()
        .await
        .context("failed to fetch users")?;

    println!("=== USERS ===");
    if users.is_empty() {
        println!("No users found in database");
    } else {
        println!("Found {} users:", users.len());
        println!(
            "{:<20} {:<30} {:<50} {:<25}",
            "Username", "Name", "Email", "Created At"
        );
        println!("{}", "-".repeat(128));

        for user in users {
            println!(
                "{:<20} {:<30} {:<50} {:<25}",
                user.username,
                user.full_name(),
                user.email,
                user.created_at
            );
        }
    }

    let feedback = FeedbackRepository::new(services.db_pool.clone())
        .list()
        .await
        .context("failed to fetch feedback")?;

    println!("\n=== FEEDBACK ===");
    if feedback.is_empty() {
        println!("No feedback found in database");
    } else {
        println!("Found {} feedback entries:", feedback.len());
        println!(
            "{:<5} {:<20} {:<30} {:<42} {:<25}",
            "ID", "Username", "Title", "Content", "Updated At"
        );
        println!("{}", "-".repeat(125));

        for entry in feedback {
            println!(
                "{:<5} {:<20} {:<30} {:<42} {:<25}",
                entry.id,
                entry.username,
                entry.title,
                preview(&entry.content),
                entry.updated_at
            );
        }
    }

    services.db_pool.close().await;
    Ok(())
}

async fn purge_sessions(config: AppConfig) -> anyhow::Result<()> {
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let removed = services
        .authenticator
        .purge_expired_sessions()
        .await
        .context("failed to purge sessions")?;

    println!("Removed {removed} expired sessions");
    services.db_pool.close().await;
    Ok(())
}

/// First line of the content, cut to fit the table
fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > CONTENT_PREVIEW_CHARS {
        let cut: String = line.chars().take(CONTENT_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
