//! # Keystone - headless display server
//!
//! Runs the compositor core against headless outputs: buffer arbitration
//! across outputs, input dispatch and observer fan-out, driven by a TOML
//! configuration. `--demo` simulates a couple of clients before idling.

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use keystone::config::{KeystoneConfig, OutputConfig};
use keystone::geometry::Rectangle;
use keystone::{logging, DisplayServer};

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "Compositor core: multi-output buffer arbitration, input dispatch and observer fan-out")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/keystone/keystone.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Replace the configured outputs with this many side-by-side 1920x1080 outputs
    #[arg(short, long)]
    outputs: Option<u32>,

    /// Shut down after this many seconds
    #[arg(long)]
    run_for: Option<u64>,

    /// Simulate clients and input before idling
    #[arg(long)]
    demo: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration
    fn apply(&self, config: &mut KeystoneConfig) {
        if self.debug {
            config.general.debug = true;
        }
        if let Some(count) = self.outputs {
            config.outputs = (0..count.max(1))
                .map(|index| {
                    OutputConfig::new(
                        format!("HEADLESS-{}", index + 1),
                        Rectangle::new(index as i32 * 1920, 0, 1920, 1080),
                    )
                })
                .collect();
        }
        if self.run_for.is_some() {
            config.general.run_for_secs = self.run_for;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so `general.debug` can raise the level
    let loaded = KeystoneConfig::load(&cli.config);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => KeystoneConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(config.general.debug);

    info!("🚀 Starting Keystone display server");
    info!(
        "📄 Version: {} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT"),
        env!("BUILD_DATE")
    );
    match loaded {
        Ok(_) => info!("✅ Configuration loaded from: {}", cli.config),
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
        }
    }

    let mut server = DisplayServer::new(config)?;

    if cli.demo {
        server.run_demo().await?;
    }

    server.run().await?;
    info!("👋 Keystone shutting down");
    Ok(())
}
