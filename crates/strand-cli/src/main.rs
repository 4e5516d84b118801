//! Strand command line tool.
//!
//! Operates a local sender key database. Binary values (chain keys,
//! plaintexts, ciphertexts) are hex on the command line and on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Start our own ratchet in a group and print the share for other members
//! strand --db keys.redb create --group g1 --sender me
//!
//! # Install a ratchet shared by another member
//! strand --db keys.redb install --group g1 --sender alice --chain-key <hex> --index 0
//!
//! # Encrypt with our ratchet, decrypt with alice's
//! strand --db keys.redb encrypt --group g1 --sender me --plaintext 68656c6c6f
//! strand --db keys.redb decrypt --group g1 --sender alice --index 3 --ciphertext <hex>
//! ```

use std::{
    io::{self, Write},
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, Parser, Subcommand};
use strand_core::{
    GroupId, RedbStorage, SenderIdentity, SenderKeyConfig, SenderKeyId, SenderKeyService,
    SenderKeyShare, SystemEnv,
};
use strand_crypto::ChainKey;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sender key ratchet tool
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(about = "Manage sender key ratchets in a local database")]
#[command(version)]
struct Cli {
    /// Path to the key database
    #[arg(long, default_value = "strand.redb")]
    db: PathBuf,

    /// Maximum number of indices a single decrypt may skip
    #[arg(long, default_value_t = SenderKeyConfig::default().max_skip)]
    max_skip: u32,

    /// Maximum number of skipped keys retained per ratchet
    #[arg(long, default_value_t = SenderKeyConfig::default().max_skipped_keys)]
    max_skipped_keys: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Ratchet address shared by most subcommands
#[derive(Args, Debug)]
struct Pair {
    /// Group identifier
    #[arg(long)]
    group: String,

    /// Sender identity
    #[arg(long)]
    sender: String,
}

impl Pair {
    fn id(&self) -> SenderKeyId {
        SenderKeyId::new(GroupId::new(&self.group), SenderIdentity::new(&self.sender))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a fresh ratchet and print its chain key and index
    Create(Pair),

    /// Install a ratchet shared by another member
    Install {
        #[command(flatten)]
        pair: Pair,

        /// Chain key (64 hex chars)
        #[arg(long)]
        chain_key: HexBytes,

        /// Index the chain key is positioned at
        #[arg(long, default_value_t = 0)]
        index: u32,
    },

    /// Print a ratchet's current chain key and index
    Export(Pair),

    /// Encrypt with our own ratchet; prints the index and ciphertext
    Encrypt {
        #[command(flatten)]
        pair: Pair,

        /// Plaintext (hex)
        #[arg(long)]
        plaintext: HexBytes,
    },

    /// Decrypt a message from a sender; prints the plaintext
    Decrypt {
        #[command(flatten)]
        pair: Pair,

        /// Index the message was sealed under
        #[arg(long)]
        index: u32,

        /// Ciphertext (hex)
        #[arg(long)]
        ciphertext: HexBytes,
    },

    /// Remove a ratchet
    Delete(Pair),

    /// List senders holding a ratchet in a group
    List {
        /// Group identifier
        #[arg(long)]
        group: String,
    },
}

/// Hex-encoded byte string argument.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexBytes(Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim()).map(Self)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = SenderKeyConfig { max_skip: cli.max_skip, max_skipped_keys: cli.max_skipped_keys };
    let storage = RedbStorage::open(&cli.db)?;
    let service = SenderKeyService::new(storage, SystemEnv::new(), config);

    tracing::debug!(db = %cli.db.display(), ?config, "opened key database");

    let mut out = io::stdout().lock();
    run(&service, cli.command, &mut out).await
}

async fn run(
    service: &SenderKeyService<RedbStorage, SystemEnv>,
    command: Command,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Create(pair) => {
            let share = service.create_sender_key(&pair.id()).await?;
            write_share(out, &share)?;
        },
        Command::Install { pair, chain_key, index } => {
            let chain_key = ChainKey::from_slice(&chain_key.0)?;
            service.install_sender_key(&pair.id(), &SenderKeyShare { chain_key, index }).await?;
        },
        Command::Export(pair) => {
            let share = service.export_sender_key(&pair.id()).await?;
            write_share(out, &share)?;
        },
        Command::Encrypt { pair, plaintext } => {
            let sealed = service.encrypt(&pair.id(), &plaintext.0).await?;
            writeln!(out, "{} {}", sealed.index, hex::encode(&sealed.ciphertext))?;
        },
        Command::Decrypt { pair, index, ciphertext } => {
            let plaintext = service.decrypt(&pair.id(), index, &ciphertext.0).await?;
            writeln!(out, "{}", hex::encode(plaintext))?;
        },
        Command::Delete(pair) => {
            let existed = service.delete_sender_key(&pair.id()).await?;
            writeln!(out, "{}", if existed { "deleted" } else { "not found" })?;
        },
        Command::List { group } => {
            let mut senders = service.list_senders(&GroupId::new(group))?;
            senders.sort();
            for sender in senders {
                writeln!(out, "{sender}")?;
            }
        },
    }

    Ok(())
}

fn write_share(out: &mut impl Write, share: &SenderKeyShare) -> io::Result<()> {
    writeln!(out, "{} {}", hex::encode(share.chain_key.as_bytes()), share.index)
}
