//! # Keystone Compositor Core
//!
//! The parts of a display server that sit between clients and outputs:
//! arbitrating client buffers between several outputs, routing input to
//! the right surface, and fanning lifecycle events out to observers.
//!
//! ## Architecture
//!
//! - `compositor`: multi-monitor buffer arbiter, buffer streams and
//!   per-output compositing (occlusion, bypass, zoom)
//! - `input`: event model, dispatch state machine, devices and seat
//! - `observer`: weakly held observer fan-out with pluggable executors
//! - `scene`: surfaces in stacking order
//! - `platform`: headless display buffers and renderers
//! - `config`: TOML configuration
//! - `server`: wires everything into a running display server
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keystone::{DisplayServer, KeystoneConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = DisplayServer::new(KeystoneConfig::default())?;
//!     server.run().await
//! }
//! ```

pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod observer;
pub mod platform;
pub mod scene;
pub mod server;

// Re-export main types for easy access
pub use compositor::{MultiMonitorArbiter, MultiThreadedCompositor};
pub use config::KeystoneConfig;
pub use error::{CoreError, CoreResult};
pub use input::{DefaultInputDispatcher, InputDispatcher};
pub use observer::ObserverMultiplexer;
pub use scene::SurfaceStack;
pub use server::DisplayServer;

// Re-export common error types
pub use anyhow::{Context, Error, Result};
