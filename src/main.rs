use clap::Parser;
use gridshare::application::config::CoordinatorConfig;
use gridshare::application::coordinator::RequestCoordinator;
use gridshare::domain::ports::{PartyDirectory, PartyDirectoryBox, RequestStoreBox};
use gridshare::infrastructure::channel_registry::ChannelRegistry;
use gridshare::infrastructure::dispatcher::RegistryDispatcher;
use gridshare::infrastructure::in_memory::{InMemoryPartyDirectory, InMemoryRequestStore};
#[cfg(feature = "storage-rocksdb")]
use gridshare::infrastructure::rocksdb::RocksDBStore;
use gridshare::interfaces::csv::command_reader::CommandReader;
use gridshare::interfaces::csv::party_reader::{Party, PartyReader};
use gridshare::interfaces::csv::request_writer::RequestWriter;
use gridshare::interfaces::replay::Replay;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Commands CSV file to replay
    commands: PathBuf,

    /// Parties CSV file seeding requesters and holders
    #[arg(long)]
    parties: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Number of digits in generated verification codes (4 to 6)
    #[arg(long, default_value_t = 4)]
    code_digits: u8,
}

/// Request store, the directory handed to the coordinator, and a second
/// handle on the same directory used for seeding.
type Storage = (RequestStoreBox, PartyDirectoryBox, PartyDirectoryBox);

fn in_memory() -> Storage {
    let parties = InMemoryPartyDirectory::new();
    (
        Box::new(InMemoryRequestStore::new()),
        Box::new(parties.clone()),
        Box::new(parties),
    )
}

fn open_storage(db_path: Option<PathBuf>) -> Result<Storage> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            ))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            warn!(
                path = %path.display(),
                "persistent storage requested but the storage-rocksdb feature is not enabled, falling back to in-memory storage"
            );
            Ok(in_memory())
        }
        None => Ok(in_memory()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let (requests, parties, seed) = open_storage(cli.db_path)?;

    let registry = Arc::new(ChannelRegistry::new());
    let coordinator = RequestCoordinator::with_config(
        requests,
        parties,
        Box::new(RegistryDispatcher::new(registry.clone())),
        CoordinatorConfig {
            code_digits: cli.code_digits,
        },
    )
    .into_diagnostic()?;
    let mut replay = Replay::new(coordinator, registry);

    // Parties already persisted keep their state across runs.
    let file = File::open(cli.parties).into_diagnostic()?;
    for party in PartyReader::new(file).parties() {
        let id = match party.into_diagnostic()? {
            Party::Requester(requester) => {
                let id = requester.id.clone();
                if seed.requester(&id).await.into_diagnostic()?.is_none() {
                    seed.store_requester(requester).await.into_diagnostic()?;
                }
                id
            }
            Party::Holder(holder) => {
                let id = holder.id.clone();
                if seed.holder(&id).await.into_diagnostic()?.is_none() {
                    seed.store_holder(holder).await.into_diagnostic()?;
                }
                id
            }
        };
        replay.join(id).await;
    }

    let file = File::open(cli.commands).into_diagnostic()?;
    for (line, command) in CommandReader::new(file).commands().enumerate() {
        match command {
            Ok(command) => {
                if let Err(e) = replay.apply(&command).await {
                    warn!(
                        line = line + 1,
                        op = ?command.op,
                        guard = e.is_guard(),
                        error = %e,
                        "command rejected"
                    );
                }
            }
            Err(e) => warn!(line = line + 1, error = %e, "unreadable command"),
        }
    }

    let snapshots = replay.snapshots().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = RequestWriter::new(stdout.lock());
    writer
        .write_requests(
            snapshots
                .iter()
                .map(|(label, request)| (label.as_str(), request)),
        )
        .into_diagnostic()?;

    Ok(())
}
