use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser as _, Subcommand};
use highload_swap::assets::AssetCatalog;
use highload_swap::swap::SwapState;
use highload_swap::swap::eligibility::PriceSnapshot;
use highload_swap::swap::store::SqliteSwapStore;
use serde_json::json;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long)]
    store_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Queue a swap task. Without --from/--to a random distinct pair is
    /// picked, handy for smoke tests.
    AddTask {
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// Amount in whole units of the offered asset.
        #[arg(long, default_value_t = 0.5)]
        amount: f64,

        /// Hex-encoded price snapshot records.
        #[arg(long)]
        snapshot_hex: Option<String>,
    },
    /// Show queue states and tasks.
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete tasks older than the retention window.
    Prune {
        #[arg(long, default_value_t = 7)]
        days: u64,
    },
}

fn main() -> Result<()> {
    highload_swap::logging::init().ok();
    let args = Args::parse();

    let catalog = AssetCatalog::mainnet_extended();
    let mut store = SqliteSwapStore::open(args.store_path).context("open swap store")?;

    let out = match args.command {
        Command::AddTask {
            from,
            to,
            amount,
            snapshot_hex,
        } => {
            let symbols = catalog.symbols();
            anyhow::ensure!(symbols.len() >= 2, "catalog has fewer than two assets");

            let (mut offer_index, mut ask_index) = (0, 0);
            while offer_index == ask_index {
                offer_index = rand::random::<usize>() % symbols.len();
                ask_index = rand::random::<usize>() % symbols.len();
            }

            let offer_symbol = from.unwrap_or_else(|| symbols[offer_index].clone());
            let ask_symbol = to.unwrap_or_else(|| symbols[ask_index].clone());

            let offer = catalog
                .by_symbol(&offer_symbol)
                .with_context(|| format!("unknown asset '{offer_symbol}'"))?;
            let ask = catalog
                .by_symbol(&ask_symbol)
                .with_context(|| format!("unknown asset '{ask_symbol}'"))?;
            anyhow::ensure!(offer.id != ask.id, "offer and ask must differ");

            let snapshot = snapshot_hex
                .map(|s| -> Result<Vec<u8>> {
                    let bytes = hex::decode(s).context("decode snapshot hex")?;
                    PriceSnapshot::decode(&bytes).context("validate snapshot")?;
                    Ok(bytes)
                })
                .transpose()?;

            let task_id = store
                .create_task(offer.id, ask.id, offer.to_wei(amount), snapshot.as_deref())
                .context("create swap task")?;
            let task = store
                .get_task(task_id)
                .context("read back task")?
                .context("created task missing")?;

            json!({
              "task_id": task_id,
              "description": task.description(&catalog),
            })
        }
        Command::List { limit } => {
            let describe = |tasks: Vec<highload_swap::swap::SwapTask>| -> Vec<String> {
                tasks.iter().map(|t| t.description(&catalog)).collect()
            };

            json!({
              "states": store.states().context("list states")?,
              "pending": describe(
                  store.list_by_state(SwapState::Pending, limit).context("list pending")?),
              "sent": describe(
                  store.list_by_state(SwapState::Sent, limit).context("list sent")?),
              "processed": describe(
                  store.list_processed(limit).context("list processed")?),
            })
        }
        Command::Prune { days } => {
            let deleted = store
                .delete_older_than(Duration::from_secs(days * 24 * 60 * 60))
                .context("prune old tasks")?;
            json!({ "deleted": deleted })
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
