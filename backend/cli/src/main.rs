mod builtin;
mod config_cmd;
mod console;
mod demo_plugins;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hark_assistant::{AssistantControl, DispatchInputs, DispatchSinks, Dispatcher, DispatcherSettings};
use hark_commands::{create_all, export_json, CommandRegistry, SharedRoster, TemplateHub, TemplateRegistry};
use hark_config::flags::SETTINGS_FILE_NAME;
use hark_config::{config_dir, config_file_path, load_and_prepare, log_dir, normalize_key, FlagStore};
use hark_core::{FlagSource, PhraseEvent, Roster, RosterObserver};
use hark_plugins::PluginHost;

use console::{ConsoleAcks, ConsoleKeywords, Input};

#[derive(Parser)]
#[command(name = "hark")]
#[command(about = "hark voice-command dispatcher (console host)")]
#[command(version)]
struct Cli {
    /// Config directory (default: $HARK_CONFIG_DIR, then ~/.hark)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read phrases from stdin and dispatch them
    Run,
    /// Print the assembled command catalog as JSON
    Commands {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show a feature flag, or set it when a value is given
    Flag {
        key: String,
        #[arg(action = clap::ArgAction::Set)]
        value: Option<bool>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config
    Show,
    /// Check the config file for errors
    Validate,
    /// Write a config file with every default filled in
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dir = cli.config_dir.unwrap_or_else(config_dir);
    let path = config_file_path(&dir);

    match cli.command {
        Commands::Run => run(&dir).await?,
        Commands::Commands { output } => export(&dir, output).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(&path).await?,
            ConfigAction::Validate => {
                if !config_cmd::check(&path).await? {
                    std::process::exit(1);
                }
            }
            ConfigAction::Init { force } => config_cmd::init(&path, force).await?,
        },
        Commands::Flag { key, value } => {
            let flags = FlagStore::open(&dir)?;
            if let Some(enabled) = value {
                flags.set_enabled(&key, enabled, true);
            }
            println!("{} = {}", normalize_key(&key), flags.is_enabled(&key));
        }
    }

    Ok(())
}

async fn run(dir: &Path) -> Result<()> {
    let config = load_and_prepare(&config_file_path(dir)).await?;
    hark_logging::init_logger(log_dir(&config, dir), &config.log_level(), config.log_json());
    info!(config_dir = %dir.display(), "Starting hark");

    let settings = DispatcherSettings::from_config(&config);
    let prefix = settings.assistant.quick_prefix.clone();
    let wake_words = settings.assistant.wake_words.clone();

    let flags = Arc::new(FlagStore::open(dir)?);
    let registry = CommandRegistry::new();
    let hub = TemplateHub::new();
    let roster = Arc::new(SharedRoster::new());
    let control = AssistantControl::new();
    let shutdown = CancellationToken::new();

    // Plugins load while the registry's seal window is open.
    let host = Arc::new(PluginHost::new(registry.clone(), hub.clone()));
    for plugin in demo_plugins::bundled() {
        host.add(plugin);
    }
    let loading = tokio::spawn({
        let host = host.clone();
        async move { host.load_all().await }
    });

    let main_sink = Arc::new(ConsoleKeywords::new("main"));
    let quick_sink = Arc::new(ConsoleKeywords::new("quick"));
    let sinks = DispatchSinks {
        main: main_sink.clone(),
        quick: quick_sink.clone(),
        acks: Arc::new(ConsoleAcks),
    };
    let catalog = builtin::catalog(control.clone(), flags.clone());
    let dispatcher = Arc::new(
        Dispatcher::start(settings, registry.clone(), catalog, flags.clone(), sinks, control, &shutdown).await,
    );

    match loading.await {
        Ok(states) => {
            for (name, state) in states {
                info!(plugin = %name, state = ?state, "Plugin status");
            }
        }
        Err(e) => warn!(error = %e, "Plugin loading task failed"),
    }

    let templates = Arc::new(TemplateRegistry::new(registry.clone(), roster.clone()));
    hub.attach(templates.clone());

    let (phrase_tx, phrases) = mpsc::channel(32);
    let (quick_tx, quick_phrases) = mpsc::channel(32);
    let (roster_tx, roster_events) = mpsc::channel(32);
    let inputs = DispatchInputs {
        phrases,
        quick_phrases,
        roster: roster_events,
        roster_observers: vec![
            roster.clone() as Arc<dyn RosterObserver>,
            templates.clone() as Arc<dyn RosterObserver>,
        ],
    };
    let run_loop = tokio::spawn(dispatcher.clone().run(inputs, shutdown.clone()));

    println!("hark is asleep. Wake it with: {}", wake_words.join(", "));
    println!("Type :help for directives.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let delivered = match console::parse_line(&line, &prefix) {
            Input::Empty => true,
            Input::Phrase(text) => phrase_tx.send(PhraseEvent::new(text)).await.is_ok(),
            Input::Quick(text) => quick_tx.send(PhraseEvent::new(text)).await.is_ok(),
            Input::Roster(event) => roster_tx.send(event).await.is_ok(),
            Input::Status => {
                print_status(&dispatcher, &main_sink, &quick_sink, &roster);
                true
            }
            Input::Help => {
                println!("{}", console::HELP);
                true
            }
            Input::Quit => break,
            Input::Invalid(message) => {
                println!("{message}");
                true
            }
        };
        if !delivered {
            warn!("Dispatch loop is gone, stopping input");
            break;
        }
    }

    shutdown.cancel();
    match run_loop.await {
        Ok(result) => result?,
        Err(e) => error!(error = %e, "Dispatch loop task failed"),
    }
    host.unload_all().await;
    info!("hark stopped");
    Ok(())
}

fn print_status(dispatcher: &Dispatcher, main: &ConsoleKeywords, quick: &ConsoleKeywords, roster: &SharedRoster) {
    let state = dispatcher.state();
    let members: Vec<String> = roster.members().into_iter().map(|e| e.display_name).collect();
    println!("state:   {:?} ({})", state, state.description());
    println!("members: {}", members.join(", "));
    println!("main:    {}", main.phrases().join(" | "));
    println!("quick:   {}", quick.phrases().join(" | "));
}

/// Assemble the catalog the way `run` would (without roster entities) and
/// write it as JSON.
async fn export(dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let flags = Arc::new(FlagStore::in_memory(dir.join(SETTINGS_FILE_NAME)));
    let registry = CommandRegistry::new();
    let host = PluginHost::new(registry.clone(), TemplateHub::new());
    for plugin in demo_plugins::bundled() {
        host.add(plugin);
    }
    host.load_all().await;

    let commands = create_all(&builtin::catalog(AssistantControl::new(), flags), &registry);
    let json = export_json(&commands)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} commands to {}", commands.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
