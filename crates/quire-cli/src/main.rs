//! `quire` admin command line.
//!
//! Runs one operation against the stores named in the config file and
//! prints the result as JSON.
//!
//! Usage:
//!   quire --config quire.toml --tenant 1 init
//!   quire --tenant 1 put /docs/report.pdf ./report.pdf
//!   quire --tenant 1 ls /docs
//!   quire --root quota 1 --set 1048576

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

use quire_kernel::config::IN_MEMORY;
use quire_kernel::{HookRegistry, Quire, QuireConfig, Session};
use quire_types::{AccountId, FileMode, Principal, TenantId};

/// Administer a quire file system.
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(about = "Admin tool for the quire multi-tenant file system")]
struct Args {
    /// TOML configuration file; defaults apply when it does not exist
    #[arg(long, default_value = "quire.toml")]
    config: PathBuf,

    /// Account to act as
    #[arg(long, default_value_t = AccountId::new(1))]
    account: AccountId,

    /// Tenant whose tree and files are addressed
    #[arg(long, default_value_t = TenantId::new(1))]
    tenant: TenantId,

    /// Act as super-user
    #[arg(long)]
    root: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the tenant's root directory if missing
    Init,

    /// Show, or with --set change, a tenant's quota
    Quota {
        tenant: TenantId,
        /// New limit in bytes (super-user only)
        #[arg(long)]
        set: Option<u64>,
    },

    /// Create a directory
    Mkdir {
        path: String,
        #[arg(long)]
        mode: Option<FileMode>,
    },

    /// Store a local file at a path
    Put {
        path: String,
        file: PathBuf,
        #[arg(long)]
        mode: Option<FileMode>,
    },

    /// Write a file's content to stdout
    Cat { path: String },

    /// List a directory tree
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Delete a node
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },

    /// Rename a node within its directory
    Mv { path: String, name: String },

    /// Change a node's mode bits (octal)
    Chmod { path: String, mode: FileMode },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(fs: &Session<'_>, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            fs.ensure_root()?;
            print_json(&fs.stat("/")?)
        }
        Command::Quota { tenant, set } => {
            let record = match set {
                Some(bytes) => fs.set_quota(tenant, bytes)?,
                None => fs.quota_of(tenant)?,
            };
            print_json(&record)
        }
        Command::Mkdir { path, mode } => print_json(&fs.mkdir(&path, mode)?),
        Command::Put { path, file, mode } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            print_json(&fs.write(&path, &bytes, mode)?)
        }
        Command::Cat { path } => {
            let bytes = fs.read(&path)?;
            std::io::stdout().lock().write_all(&bytes)?;
            Ok(())
        }
        Command::Ls { path } => print_json(&fs.list_dir(&path)?),
        Command::Rm { path, recursive } => {
            let removed = fs.remove(&path, recursive)?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::Mv { path, name } => print_json(&fs.rename(&path, &name)?),
        Command::Chmod { path, mode } => print_json(&fs.chmod(&path, mode)?),
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = QuireConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if config.storage.database.as_os_str() == IN_MEMORY {
        tracing::warn!("metadata database is in memory, changes will not persist");
    }

    let quire = Quire::open(config, HookRegistry::new())?;
    let principal = if args.root {
        Principal::superuser(args.account, args.tenant)
    } else {
        Principal::new(args.account, args.tenant)
    };
    tracing::debug!(account = %args.account, tenant = %args.tenant, root = args.root, "session");

    run(&quire.session(principal), args.command)
}
