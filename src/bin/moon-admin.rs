use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderValue};
use clap::{Parser, Subcommand};
use moon::client_ip;
use moon::config::Config;
use moon::provision;
use moon::storage::{self, Storage};

#[derive(Parser)]
#[command(name = "moon-admin")]
#[command(about = "Moon visit counter admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and visits table if they are missing
    Provision,
    /// Print the current visit counter
    Counter,
    /// Show which client addresses a request with these values would report
    ResolveIp {
        /// Value of the X-Real-IP header
        #[arg(long)]
        real_ip: Option<String>,
        /// Value of the X-Forwarded-For header
        #[arg(long)]
        forwarded_for: Option<String>,
        /// Transport remote address, as host:port
        #[arg(long, default_value = "")]
        remote_addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Provision => {
            let config = Config::from_env()?;
            let provisioned = provision::provision(&config.database).await?;
            if provisioned.database_created {
                println!("✓ Created database '{}' and visits table", config.database.name);
            } else {
                println!(
                    "✓ Database '{}' already exists, visits table ensured",
                    config.database.name
                );
            }
        }
        Commands::Counter => {
            let config = Config::from_env()?;
            let storage = storage::open(&config.database).await?;
            let counter = storage.counter().await?;
            println!("Number of visits so far: {}", counter);
        }
        Commands::ResolveIp {
            real_ip,
            forwarded_for,
            remote_addr,
        } => {
            let mut headers = HeaderMap::new();
            if let Some(value) = real_ip {
                headers.insert(
                    "x-real-ip",
                    HeaderValue::from_str(&value).context("invalid X-Real-IP value")?,
                );
            }
            if let Some(value) = forwarded_for {
                headers.insert(
                    "x-forwarded-for",
                    HeaderValue::from_str(&value).context("invalid X-Forwarded-For value")?,
                );
            }

            match client_ip::resolve(&headers, &remote_addr) {
                Ok(findings) => {
                    println!("{:<22} {}", "Type", "Value");
                    println!("{}", "-".repeat(60));
                    for finding in findings {
                        println!("{:<22} {}", finding.source, finding.address);
                    }
                }
                Err(err) => {
                    println!("⚠ {}", err);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
