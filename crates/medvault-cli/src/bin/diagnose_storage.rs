use anyhow::Result;
use clap::Parser;

use medvault_cli::diagnose::{print_table, Diagnoser, DEFAULT_MAX_CHECKS};
use medvault_cli::{init_tracing, setup};
use medvault_core::Config;
use medvault_storage::{BackendClients, StorageBackend};

#[derive(Parser, Debug)]
#[command(name = "diagnose_storage")]
#[command(about = "Report which storage backend holds each referenced object")]
struct Args {
    /// Maximum number of references to check across all collections
    #[arg(long, default_value_t = DEFAULT_MAX_CHECKS)]
    max_checks: usize,

    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::from_env()?;
    let repo = setup::connect_repository(&config).await?;

    let clients = BackendClients::new(config.storage().clone());
    let s3 = setup::open_backend(&clients, StorageBackend::S3).await?;
    let platform = setup::open_backend(&clients, StorageBackend::Platform).await?;

    let report = Diagnoser::new(s3, platform, &repo, args.max_checks)
        .run()
        .await;

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_table(&report);
        }
    }

    Ok(())
}
