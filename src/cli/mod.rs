pub mod init;
pub mod toggle;
pub mod writeout;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use init::process_init_command;
use toggle::process_toggle_command;
use tracing::level_filters::LevelFilter;
use writeout::process_writeout_command;

use crate::{
    config::{load_config, ConfigError, ConfigPaths},
    daemon::start_daemon,
    utils::{
        dir::{application_config_path, create_application_state_path, default_deck_file},
        logging::{enable_logging, CLI_PREFIX, UI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "deckclock", version, long_about = None)]
#[command(about = "Start and stop time tracking entries from a button deck", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Print logs to the console at trace level")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Configuration directory. By default $DECKCLOCK_CONFIG_DIR, $XDG_CONFIG_HOME/deckclock or $HOME/.config/deckclock"
    )]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start the given project, or stop the running entry with \"none\"")]
    Toggle { project: String },
    #[command(about = "Lay out the project pages in a deck file")]
    Writeout {
        #[arg(help = "Deck file to read. Defaults to $HOME/.streamdeck_ui.json")]
        deckfile: Option<PathBuf>,
        #[arg(long, help = "Where to write the result. Defaults to the input file")]
        output: Option<PathBuf>,
    },
    #[command(about = "Keep the deck in sync, reading \"<device> <key>\" presses from stdin")]
    Ui {
        #[arg(long, help = "Deck file to keep in sync. Defaults to $HOME/.streamdeck_ui.json")]
        deck_file: Option<PathBuf>,
    },
    #[command(about = "Print the version")]
    Version,
    #[command(about = "Create the configuration from the projects of a workspace")]
    Init {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        workspace_id: String,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let state_dir = create_application_state_path()?;
    let logging_level = args.log.then_some(LevelFilter::TRACE);
    let prefix = match args.commands {
        Commands::Ui { .. } => UI_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &state_dir.join("logs"), logging_level, args.log)?;

    let paths = ConfigPaths::new(args.config_dir.map_or_else(application_config_path, Ok)?);

    let result = match args.commands {
        Commands::Toggle { project } => process_toggle_command(&paths, &project).await,
        Commands::Writeout { deckfile, output } => {
            let deckfile = deckfile.map_or_else(default_deck_file, Ok)?;
            process_writeout_command(&paths, deckfile, output, &state_dir).await
        }
        Commands::Ui { deck_file } => {
            let deck_file = deck_file.map_or_else(default_deck_file, Ok)?;
            let config = load_config(&paths)?;
            start_daemon(config, paths.clone(), deck_file, state_dir).await
        }
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Init {
            api_key,
            workspace_id,
        } => process_init_command(&paths, api_key, workspace_id).await,
    };

    if let Err(e) = &result {
        if let Some(ConfigError::NotInitialized { path }) = e.downcast_ref::<ConfigError>() {
            eprintln!(
                "{path:?} is missing. Run `deckclock init --api-key <key> --workspace-id <id>` first."
            );
        }
    }
    result
}
