use anyhow::Context;
use clap::{Parser, Subcommand};
use civisure_auth::PasswordService;
use civisure_common::{AuthConfig, DatabaseConfig};
use civisure_database::{create_pool, MigrationRunner};

#[derive(Parser)]
#[command(name = "db-cli")]
#[command(about = "CiviSure Database CLI Tool")]
struct Cli {
    /// SQLite file to operate on (defaults to DB_PATH, then civisure.db)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Check migration status
    Status,
    /// Seed the default accounts and sample lawyers
    Seed,
    /// Create an administrator, or promote an existing account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Administrator")]
        full_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = database_config(cli.database);
    let pool = create_pool(&config)
        .await
        .with_context(|| format!("Failed to open database at {}", config.path))?;
    let runner = MigrationRunner::new(pool, PasswordService::new(bcrypt_cost()));

    match cli.command {
        Commands::Migrate => {
            runner.run_all_migrations().await?;
            println!("✅ Migrations completed successfully");
        }
        Commands::Status => {
            let status = runner.check_migration_status().await?;
            println!("📊 {}", status);

            if status.is_up_to_date {
                println!("✅ Database is up to date");
            } else {
                println!("⚠️  Database needs migration");
            }
        }
        Commands::Seed => {
            runner.run_all_migrations().await?;
            let summary = runner.seed_initial_data().await?;
            println!(
                "✅ Seeded {} users and {} lawyers",
                summary.users, summary.lawyers
            );
        }
        Commands::CreateAdmin {
            email,
            password,
            full_name,
        } => {
            runner.run_all_migrations().await?;
            let id = runner.create_admin(&email, &password, &full_name).await?;
            println!("✅ Admin {} ready (id {})", email.trim().to_lowercase(), id);
        }
    }

    Ok(())
}

fn database_config(path: Option<String>) -> DatabaseConfig {
    let defaults = DatabaseConfig::default();
    let path = path
        .or_else(|| std::env::var("DB_PATH").ok())
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(defaults.path);

    DatabaseConfig { path, ..defaults }
}

fn bcrypt_cost() -> u32 {
    std::env::var("BCRYPT_ROUNDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| AuthConfig::default().bcrypt_cost)
}
