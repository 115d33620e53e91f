use std::collections::HashSet;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use pov_gate::authz::{allowed, Permission};
use pov_gate::models::user::{DbUser, User};
use pov_gate::session::SessionConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "pov-gate admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mint a session token for a user
    Token { email: String },
    /// Grant a user membership of a pov record
    Grant { pov_id: String, email: String },
    /// Revoke a user's membership of a pov record
    Revoke { pov_id: String, email: String },
    /// Evaluate a permission against a comma-separated held set
    Check { held: String, requested: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Token { email } => {
            let pool = get_pool().await?;
            let user = fetch_user(&pool, &email).await?;
            let sessions =
                SessionConfig::from_env().map_err(|err| anyhow::anyhow!(err.to_string()))?;
            let token = sessions
                .encode(user.id, &user.email, &user.permissions)
                .map_err(|err| anyhow::anyhow!(err.to_string()))?;
            println!("{token}");
        }
        Commands::Grant { pov_id, email } => {
            let pool = get_pool().await?;
            let user = fetch_user(&pool, &email).await?;
            sqlx::query("INSERT OR IGNORE INTO pov_members (pov_id, user_id) VALUES (?, ?)")
                .bind(&pov_id)
                .bind(user.id.to_string())
                .execute(&pool)
                .await?;
            println!("Granted {} membership of pov {}", email, pov_id);
        }
        Commands::Revoke { pov_id, email } => {
            let pool = get_pool().await?;
            let user = fetch_user(&pool, &email).await?;
            let result = sqlx::query("DELETE FROM pov_members WHERE pov_id = ? AND user_id = ?")
                .bind(&pov_id)
                .bind(user.id.to_string())
                .execute(&pool)
                .await?;
            if result.rows_affected() == 0 {
                println!("No membership of pov {} for {}", pov_id, email);
            } else {
                println!("Revoked {} membership of pov {}", email, pov_id);
            }
        }
        Commands::Check { held, requested } => {
            let held: HashSet<Permission> = held
                .split(',')
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.trim()
                        .parse::<Permission>()
                        .map_err(|err| anyhow::anyhow!(err))
                })
                .collect::<Result<_, _>>()?;
            let requested = requested
                .parse::<Permission>()
                .map_err(|err| anyhow::anyhow!(err))?;

            if allowed(&held, requested) {
                println!("allow");
            } else {
                println!("deny");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn fetch_user(pool: &SqlitePool, email: &str) -> anyhow::Result<User> {
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, name, permissions, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no user with email {email}"))?;

    User::try_from(row).map_err(|err| anyhow::anyhow!(err.to_string()))
}
