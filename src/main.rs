use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sshm::{ConfigStore, StoreConfig};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// SSH config file to use (default: ~/.ssh/config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every host in the config and its includes
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one host and the file it lives in
    Show { name: String },
    /// List the config files reachable through Include
    Files,
    /// Delete a host from the file that defines it
    Rm { name: String },
    /// Move a host into another config file
    Mv { name: String, target: PathBuf },
    /// Restore a config file from its backup
    Restore { file: Option<PathBuf> },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = StoreConfig::default_paths().context("resolve default paths")?;
    if let Some(path) = args.config {
        config = config.with_config_path(path);
    }
    let store = ConfigStore::open(config).context("open config store")?;

    match args.cmd {
        Command::List { json } => cmd_list(&store, json),
        Command::Show { name } => cmd_show(&store, &name),
        Command::Files => cmd_files(&store),
        Command::Rm { name } => {
            store.delete(&name).with_context(|| format!("delete host '{name}'"))?;
            println!("Deleted {name}");
            Ok(())
        }
        Command::Mv { name, target } => {
            store
                .move_host(&name, &target)
                .with_context(|| format!("move host '{name}'"))?;
            println!("Moved {name} to {}", target.display());
            Ok(())
        }
        Command::Restore { file } => {
            let file = file.unwrap_or_else(|| store.config_path().to_path_buf());
            let slot = store.backups().restore(&file).context("restore backup")?;
            println!("Restored {} from {}", file.display(), slot.display());
            Ok(())
        }
    }
}

fn cmd_list(store: &ConfigStore, json: bool) -> Result<()> {
    let report = store
        .parse_report(store.config_path())
        .context("read ssh config")?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report.hosts).context("serialize hosts")?
        );
        return Ok(());
    }
    if report.hosts.is_empty() {
        println!("No SSH hosts found in {}", store.config_path().display());
    }
    for host in &report.hosts {
        println!(
            "{:<24} {:<28} {:<12} {:<6} {}",
            host.name,
            host.hostname,
            host.user,
            host.port,
            host.tags.join(", ")
        );
    }
    for skipped in &report.skipped {
        eprintln!(
            "warning: skipped include {} in {}: {}",
            skipped.target,
            skipped.included_from.display(),
            skipped.error
        );
    }
    Ok(())
}

fn cmd_show(store: &ConfigStore, name: &str) -> Result<()> {
    let host = store
        .find_in_all_files(name)
        .with_context(|| format!("look up host '{name}'"))?;
    println!("# {}", host.source_file.display());
    for line in host.block_lines() {
        println!("{line}");
    }
    let options = host.command_options();
    if !options.is_empty() {
        println!("# ssh {options} {}", host.name);
    }
    Ok(())
}

fn cmd_files(store: &ConfigStore) -> Result<()> {
    for file in store.all_config_files().context("walk include tree")? {
        println!("{}", file.display());
    }
    Ok(())
}
