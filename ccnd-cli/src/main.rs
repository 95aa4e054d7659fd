use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

const DEFAULT_LOCAL_IPC_PATH: &str = "/tmp/ccnd.sock";
const DEFAULT_SERVER: &str = "127.0.0.1:4485";

/// Forwarding daemon and thin client commands for the ccnb/CCNx forwarder.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forwarder daemon
    Serve {
        /// Unix domain socket path for the local-IPC face
        #[clap(long, default_value = DEFAULT_LOCAL_IPC_PATH)]
        local_ipc: PathBuf,

        /// Also run a repository worker alongside the forwarder
        #[clap(long)]
        with_repository: bool,
    },

    /// Publish a signed Content Object read from stdin
    Put {
        /// Name to publish under (ccnx URI)
        name: String,

        /// Forwarder address to publish to
        #[clap(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Fetch the first Content Object matching a name
    Get {
        /// Name to request (ccnx URI)
        name: String,

        /// Forwarder address to query
        #[clap(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Timeout in milliseconds
        #[clap(short, long, default_value = "4000")]
        timeout: u64,
    },

    /// Administer FIB entries on a running forwarder
    Fib {
        #[clap(subcommand)]
        cmd: FibCommands,
    },

    /// Administer a repository's policy.xml
    Repo {
        #[clap(subcommand)]
        cmd: RepoCommands,
    },
}

#[derive(Subcommand)]
enum FibCommands {
    /// Register a prefix to a next hop
    Add {
        /// Name prefix (ccnx URI)
        prefix: String,

        /// Forwarder address to administer
        #[clap(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Requested lifetime in seconds
        #[clap(short, long, default_value = "3600")]
        lifetime: u32,

        /// Register as a precise next hop: this face only answers
        /// Interests for exactly `prefix`, never names beneath it
        /// (§4.5's CHILD_INHERIT)
        #[clap(long)]
        no_child_inherit: bool,
    },

    /// Remove a prefix's registration
    Remove {
        /// Name prefix (ccnx URI)
        prefix: String,

        /// Forwarder address to administer
        #[clap(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Apply a policy update from an XML file
    SetPolicy {
        /// Repository data directory
        data_dir: PathBuf,

        /// Path to the policy update XML document
        xml_file: PathBuf,
    },

    /// Print the repository's current policy
    ShowPolicy {
        /// Repository data directory
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    match cli.command {
        Commands::Serve { local_ipc, with_repository } => {
            commands::serve::run(local_ipc, with_repository).await?;
        }
        Commands::Put { name, server } => {
            commands::put::run(name, server).await?;
        }
        Commands::Get { name, server, timeout } => {
            commands::get::run(name, server, timeout).await?;
        }
        Commands::Fib { cmd } => match cmd {
            FibCommands::Add { prefix, server, lifetime, no_child_inherit } => {
                commands::fib::add(prefix, server, lifetime, no_child_inherit).await?;
            }
            FibCommands::Remove { prefix, server } => {
                commands::fib::remove(prefix, server).await?;
            }
        },
        Commands::Repo { cmd } => match cmd {
            RepoCommands::SetPolicy { data_dir, xml_file } => {
                commands::repo::set_policy(data_dir, xml_file).await?;
            }
            RepoCommands::ShowPolicy { data_dir } => {
                commands::repo::show_policy(data_dir).await?;
            }
        },
    }

    Ok(())
}
