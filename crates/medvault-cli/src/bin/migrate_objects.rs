use anyhow::{bail, Context, Result};
use clap::Parser;

use medvault_cli::migrate::{print_summary, MigrationOptions, Migrator};
use medvault_cli::{init_tracing, setup};
use medvault_core::Config;
use medvault_storage::{storage_for, BackendClients, StorageBackend};

#[derive(Parser, Debug)]
#[command(name = "migrate_objects")]
#[command(about = "Copy referenced objects to another storage backend and repoint the references")]
struct Args {
    /// Backend the objects currently live on
    #[arg(long, default_value = "platform")]
    from: StorageBackend,

    /// Backend to copy the objects to
    #[arg(long, default_value = "s3")]
    to: StorageBackend,

    /// Report what would be copied without uploading or writing anything
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of references per collection to copy; already migrated rows do not count
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.from == args.to {
        bail!("--from and --to must name different backends");
    }

    let config = Config::from_env()?;
    let repo = setup::connect_repository(&config).await?;

    let clients = BackendClients::new(config.storage().clone());
    let source = storage_for(args.from, &clients)
        .await
        .with_context(|| format!("Source backend '{}' is unavailable", args.from))?;
    let target = storage_for(args.to, &clients)
        .await
        .with_context(|| format!("Target backend '{}' is unavailable", args.to))?;

    println!(
        "Migrating {} -> {}{}",
        args.from,
        args.to,
        if args.dry_run { " (dry run)" } else { "" }
    );

    let options = MigrationOptions {
        dry_run: args.dry_run,
        limit: args.limit,
    };
    let report = Migrator::new(source, target, &repo, options).run().await;
    print_summary(&report);

    Ok(())
}
