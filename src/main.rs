use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing::info;

use cfgedit::{
    config::Settings,
    publish::Publisher,
    server::HttpServer,
    storage::ConfigStore,
    ConfigEditor, FieldUpdate,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (JSON, YAML or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct FileArg {
    /// Device configuration file to edit
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web editor and JSON API
    Serve {
        #[command(flatten)]
        file: FileArg,

        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,

        /// Number of HTTP worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Create the config file with demo content if it is missing
        #[arg(long)]
        seed: bool,

        /// Enable the save-and-push endpoint
        #[arg(long)]
        publish: bool,
    },

    /// Print the current hostname and MOTD as JSON
    Show {
        #[command(flatten)]
        file: FileArg,
    },

    /// Update hostname and/or MOTD in place
    Set {
        #[command(flatten)]
        file: FileArg,

        #[arg(long)]
        hostname: Option<String>,

        #[arg(long)]
        motd: Option<String>,

        /// Commit and push the result
        #[arg(long)]
        push: bool,
    },

    /// Write a default settings file and create the config file with demo content
    Init {
        #[command(flatten)]
        file: FileArg,
    },
}

fn load_settings(cli: &Cli, file: &FileArg) -> Result<Settings> {
    let mut settings =
        Settings::load_or_default(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(path) = &file.file {
        settings.config_file = path.clone();
    }
    Ok(settings)
}

fn build_editor(settings: &Settings) -> Result<ConfigEditor> {
    let editor = ConfigEditor::new(ConfigStore::new(&settings.config_file));
    let editor = match settings.publisher().context("Failed to configure publisher")? {
        Some(publisher) => {
            info!("Publishing enabled via {}", publisher.name());
            editor.with_publisher(publisher)
        }
        None => editor,
    };
    Ok(editor)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose && env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "cfgedit=debug");
    }
    cfgedit::init_with_logger(true).context("Failed to initialize logging")?;

    match &cli.command {
        Commands::Serve {
            file,
            bind,
            workers,
            seed,
            publish,
        } => {
            let mut settings = load_settings(&cli, file)?;
            if let Some(bind) = bind {
                settings.server.bind = bind.clone();
            }
            if let Some(workers) = workers {
                settings.server.workers = *workers;
            }
            settings.seed_default |= *seed;
            settings.publish.enabled |= *publish;
            settings.validate().context("Invalid settings")?;

            let editor = build_editor(&settings)?;
            if settings.seed_default {
                editor.store().seed_default()?;
            }
            info!("Editing {}", settings.config_file.display());

            let server = HttpServer::bind(editor, &settings.server)?;
            let shutdown = server.shutdown_handle();

            let mut serving = tokio::task::spawn_blocking(move || server.run());

            tokio::select! {
                result = &mut serving => {
                    result.context("HTTP server task failed")??;
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    shutdown.shutdown();
                    serving.await.context("HTTP server task failed")??;
                }
            }
        }

        Commands::Show { file } => {
            let settings = load_settings(&cli, file)?;
            let editor = build_editor(&settings)?;
            let fields = editor.fetch().await?;
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }

        Commands::Set {
            file,
            hostname,
            motd,
            push,
        } => {
            let mut settings = load_settings(&cli, file)?;
            settings.publish.enabled |= *push;
            let editor = build_editor(&settings)?;
            let update = FieldUpdate {
                hostname: hostname.clone(),
                motd: motd.clone(),
            };

            let outcome = if *push {
                editor.save_and_publish(&update).await?
            } else {
                editor.save(&update).await?
            };

            if outcome.changed {
                println!("Updated {}", settings.config_file.display());
            } else {
                println!("No changes to {}", settings.config_file.display());
            }
            if outcome.published {
                println!("Pushed to {}", settings.publish.branch);
            }
        }

        Commands::Init { file } => {
            let settings_path = cli
                .config
                .clone()
                .unwrap_or_else(Settings::default_config_path);
            let mut settings = if settings_path.exists() {
                Settings::load(&settings_path).context("Failed to load settings")?
            } else {
                Settings::default()
            };
            if let Some(path) = &file.file {
                settings.config_file = path.clone();
            }

            if !settings_path.exists() {
                settings
                    .save(&settings_path)
                    .context("Failed to write settings")?;
                println!("Wrote settings to {}", settings_path.display());
            }

            let store = ConfigStore::new(&settings.config_file);
            if store.seed_default()? {
                println!("Created {}", settings.config_file.display());
            } else {
                println!("{} already exists", settings.config_file.display());
            }
        }
    }

    Ok(())
}
