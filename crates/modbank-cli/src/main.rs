//! Minimal host binary exercising the modbank plugin bank against a real
//! directory of plugins. Installs a `tracing_subscriber` and enrolls its
//! own core module, then walks through init → load → enumerate → end.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use modbank::{
    end_bank, init_bank, list_all, list_by_capability, load_plugins, with_plugins, Capability,
    DylibLoader, EntryLoader, HostConfig, Module, StaticHostConfig,
};

fn describe_cli_core() -> Option<(Module, Vec<Module>)> {
    Some((
        Module::new("modbank-cli-core", Capability::new("core"), 0)
            .with_description("always-on core module for the modbank-cli host"),
        Vec::new(),
    ))
}

modbank::static_core_plugin!("modbank-cli-core", describe_cli_core);

#[derive(Parser)]
#[command(name = "modbank-cli", about = "Inspect a modbank plugin directory")]
struct Cli {
    /// Directory to search for plugins.
    #[arg(long, default_value = "./plugins")]
    plugin_dir: PathBuf,

    /// Path to the on-disk plugin cache.
    #[arg(long, default_value = "./plugins/plugins.dat")]
    cache_path: PathBuf,

    /// Disable the plugin cache entirely.
    #[arg(long)]
    no_cache: bool,

    /// Ignore any existing cache and rebuild it from scratch.
    #[arg(long)]
    reset_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every module every enrolled plugin advertises.
    List,
    /// List only modules advertising the given capability.
    Capability { name: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config: Arc<dyn HostConfig> = Arc::new(
        StaticHostConfig::from_env(&cli.plugin_dir, &cli.cache_path)
            .with_cache_enabled(!cli.no_cache)
            .with_reset_cache(cli.reset_cache),
    );
    let loader: Arc<dyn EntryLoader> = Arc::new(DylibLoader);

    let handle = init_bank(config, loader);
    load_plugins(handle);

    match cli.command {
        Command::List => {
            let entries = with_plugins(|plugins| list_all(plugins));
            for entry in &entries {
                println!(
                    "{:<24} {:<12} score={}",
                    entry.module.name,
                    entry.module.capability,
                    entry.module.score
                );
            }
            tracing::info!(count = entries.len(), "enumerated modules");
        }
        Command::Capability { name } => {
            let capability = Capability::new(name);
            let entries = with_plugins(|plugins| list_by_capability(plugins, &capability));
            for entry in &entries {
                println!("{:<24} score={}", entry.module.name, entry.module.score);
            }
        }
    }

    end_bank();
}
