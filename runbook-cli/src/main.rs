//! # Runbook CLI
//!
//! Operator commands for a Runbook database.
//!
//! ## Usage
//!
//! ```bash
//! runbook migrate
//! runbook create-admin --email admin@school.edu
//! runbook pending --team 01-0001
//! runbook approve <USER_ID> --actor admin@school.edu
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use runbook_cli::commands::{self, CreateAdminOutcome};
use runbook_cli::config::Config;
use runbook_cli::{init_tracing, print_json};
use runbook_core::auth::password::PasswordParams;
use runbook_core::db::migrations::ensure_database_exists;
use runbook_core::db::pool::{close_pool, create_pool};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "runbook", version, about = "CyberPatriot Runbook operator CLI")]
struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Show database, schema and queue status
    Status,
    /// Create the bootstrap admin account if it doesn't exist
    CreateAdmin {
        /// Defaults to DEFAULT_ADMIN_EMAIL
        #[arg(long)]
        email: Option<String>,
        /// Defaults to DEFAULT_ADMIN_NAME
        #[arg(long)]
        name: Option<String>,
        /// Defaults to DEFAULT_ADMIN_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
    /// List teams
    Teams,
    /// List accounts waiting for approval
    Pending {
        /// Only accounts linked to this team code
        #[arg(long)]
        team: Option<String>,
    },
    /// Approve a pending account
    Approve {
        /// Account to approve
        user_id: Uuid,
        /// Email of the approving admin or coach
        #[arg(long)]
        actor: String,
    },
    /// Reject and delete a pending account
    Reject {
        /// Account to reject
        user_id: Uuid,
        /// Email of the rejecting admin or coach
        #[arg(long)]
        actor: String,
    },
    /// Show the most recent audit entries
    Audit {
        #[arg(long, default_value = "50")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    tracing::debug!(
        "Runbook CLI v{} using {}",
        env!("CARGO_PKG_VERSION"),
        config.database.url
    );

    ensure_database_exists(&config.database.url)
        .await
        .context("Failed to create database")?;
    let pool = create_pool(config.pool_config())
        .await
        .context("Failed to connect to database")?;

    let result = run(cli.command, &config, &pool).await;
    close_pool(pool).await;
    result
}

async fn run(command: Commands, config: &Config, pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            let status = commands::migrate(pool).await?;
            println!(
                "Applied {} of {} migrations",
                status.applied_migrations, status.known_migrations
            );
        }
        Commands::Status => {
            print_json(&commands::status(pool).await?)?;
        }
        Commands::CreateAdmin {
            email,
            name,
            password,
        } => {
            let email = email.unwrap_or_else(|| config.admin.email.clone());
            let name = name.unwrap_or_else(|| config.admin.name.clone());
            let password = password
                .or_else(|| config.admin.password.clone())
                .context("No password given; pass --password or set DEFAULT_ADMIN_PASSWORD")?;

            match commands::create_admin(pool, &email, &name, &password, PasswordParams::default())
                .await?
            {
                CreateAdminOutcome::Created { user } => {
                    println!("Created admin user: {} ({})", user.email, user.id)
                }
                CreateAdminOutcome::AlreadyExists { email } => {
                    println!("Admin user already exists: {}", email)
                }
            }
        }
        Commands::Teams => {
            print_json(&commands::teams(pool).await?)?;
        }
        Commands::Pending { team } => {
            print_json(&commands::pending(pool, team.as_deref()).await?)?;
        }
        Commands::Approve { user_id, actor } => {
            let user = commands::approve(pool, user_id, &actor).await?;
            println!("Approved {} ({})", user.email, user.role);
        }
        Commands::Reject { user_id, actor } => {
            commands::reject(pool, user_id, &actor).await?;
            println!("Rejected and removed {}", user_id);
        }
        Commands::Audit { limit } => {
            print_json(&commands::audit(pool, limit).await?)?;
        }
    }

    Ok(())
}
