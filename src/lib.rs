// cfgedit - hostname and MOTD banner editor for network device configs

pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod publish;
pub mod server;
pub mod storage;

use anyhow::Result;
use tracing::info;

pub use editor::{ConfigEditor, SaveOutcome};
pub use engine::{parse, reassemble, FieldUpdate, ParsedFields};
pub use error::{EditorError, EditorResult};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Initialize tracing output on stderr
///
/// `RUST_LOG` overrides the default `cfgedit=info` filter.
pub fn init_with_logger(ansi_colors: bool) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cfgedit=info"));

    fmt::Subscriber::builder()
        .with_ansi(ansi_colors)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    info!("Initializing cfgedit v{}", version());
    Ok(())
}
