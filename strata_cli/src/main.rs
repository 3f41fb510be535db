use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use strata_capability::{CapabilityKeeper, GenesisState};
use strata_core::{init_tracing, LogLevel, MemStore, OptionMap, Result};
use strata_store::pruning::{
    FLAG_PRUNING, FLAG_PRUNING_INTERVAL, FLAG_PRUNING_KEEP_RECENT, FLAG_PRUNING_START_HEIGHT,
};
use strata_store::{MultiStore, PruningOptions, StoreUpgrades};

#[derive(Debug, Parser)]
#[command(name = "strata", version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace). RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve pruning options and print them as JSON
    Pruning {
        /// TOML file with application options
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pruning strategy (default, nothing, everything, custom)
        #[arg(long)]
        pruning: Option<String>,

        /// Recent versions to keep with the custom strategy
        #[arg(long)]
        pruning_keep_recent: Option<u64>,

        /// Heights between pruning passes with the custom strategy
        #[arg(long)]
        pruning_interval: Option<u64>,

        /// Height at which pruning starts
        #[arg(long)]
        pruning_start_height: Option<u64>,
    },
    /// Validate a store upgrade plan and show what happens to each store
    UpgradePlan {
        /// JSON upgrade plan
        #[arg(long)]
        plan: PathBuf,

        /// Store names committed before the upgrade
        #[arg(long = "store", required = true)]
        stores: Vec<String>,
    },
    /// Load capability genesis and list every capability with its owners
    Capabilities {
        /// JSON capability genesis
        #[arg(long)]
        genesis: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let result = match cli.command {
        Commands::Pruning {
            config,
            pruning,
            pruning_keep_recent,
            pruning_interval,
            pruning_start_height,
        } => {
            let mut flags = OptionMap::new();
            if let Some(strategy) = pruning {
                flags.set(FLAG_PRUNING, strategy);
            }
            if let Some(n) = pruning_keep_recent {
                flags.set(FLAG_PRUNING_KEEP_RECENT, n);
            }
            if let Some(n) = pruning_interval {
                flags.set(FLAG_PRUNING_INTERVAL, n);
            }
            if let Some(n) = pruning_start_height {
                flags.set(FLAG_PRUNING_START_HEIGHT, n);
            }
            resolve_pruning(config.as_deref(), flags)
        }
        Commands::UpgradePlan { plan, stores } => upgrade_plan(&plan, &stores),
        Commands::Capabilities { genesis } => list_capabilities(&genesis),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Resolve pruning options from an optional config file, with command-line
/// flags taking precedence.
fn resolve_pruning(config: Option<&Path>, flags: OptionMap) -> Result<String> {
    let mut options = match config {
        Some(path) => {
            debug!("Reading options from {}", path.display());
            OptionMap::from_file(path)?
        }
        None => OptionMap::new(),
    };
    options.merge(flags);

    let pruning = PruningOptions::from_app_options(&options)?;
    Ok(serde_json::to_string_pretty(&pruning)?)
}

/// Apply a plan to empty stores named `stores` and describe the outcome.
fn upgrade_plan(plan: &Path, stores: &[String]) -> Result<String> {
    let upgrades: StoreUpgrades = serde_json::from_str(&std::fs::read_to_string(plan)?)?;

    let committed = stores
        .iter()
        .map(|name| (name.clone(), MemStore::new()))
        .collect::<BTreeMap<_, _>>();
    let mut multistore = MultiStore::from_committed(committed);

    // The new binary mounts every store that survives the plan.
    for name in stores.iter().chain(&upgrades.added) {
        if !upgrades.is_deleted(name) && !upgrades.renamed.iter().any(|r| &r.old_name == name) {
            multistore.mount(name.clone());
        }
    }
    for rename in &upgrades.renamed {
        multistore.mount(rename.new_name.clone());
    }

    let report = multistore.load(Some(&upgrades))?;
    info!("Upgrade plan touches {} stores", report.actions.len());

    let mut lines: Vec<String> = report
        .actions
        .iter()
        .map(|(name, action)| format!("{}: {}", name, action))
        .collect();
    lines.extend(report.orphaned.iter().map(|name| format!("{}: orphaned", name)));
    Ok(lines.join("\n"))
}

/// Load genesis into a scratch keeper and list its capabilities.
fn list_capabilities(genesis: &Path) -> Result<String> {
    let state: GenesisState = serde_json::from_str(&std::fs::read_to_string(genesis)?)?;

    let keeper = CapabilityKeeper::load(MemStore::new())?;
    keeper.init_genesis(&state)?;

    let exported = keeper.export_genesis()?;
    let mut lines = vec![format!("latest index: {}", exported.index)];
    for entry in &exported.owners {
        let owners: Vec<String> = entry.owners.iter().map(ToString::to_string).collect();
        lines.push(format!("{}: {}", entry.index, owners.join(", ")));
    }
    Ok(lines.join("\n"))
}
