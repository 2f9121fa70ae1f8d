use anyhow::Result;
use clap::Parser;

use medvault_cli::repair::{print_summary, run_repair};
use medvault_cli::{init_tracing, setup};
use medvault_core::Config;

#[derive(Parser, Debug)]
#[command(name = "repair_references")]
#[command(about = "Rewrite stored object references into canonical /api/objects/... form")]
struct Args {
    /// Report intended changes without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::from_env()?;
    let repo = setup::connect_repository(&config).await?;

    if args.dry_run {
        println!("Dry run: no rows will be written");
    }
    let report = run_repair(&repo, args.dry_run).await;
    print_summary(&report);

    Ok(())
}
