//! Configuration management for Keystone
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It combines settings for compositing, outputs,
//! input dispatch and observer delivery.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::geometry::Rectangle;

/// Main configuration struct containing all Keystone settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeystoneConfig {
    /// Compositing behaviour shared by every output
    #[serde(default)]
    pub compositor: CompositorConfig,

    /// Outputs to composite, one task each
    #[serde(default = "default_outputs")]
    pub outputs: Vec<OutputConfig>,

    /// Input dispatch settings
    #[serde(default)]
    pub input: InputConfig,

    /// How observer notifications are delivered
    #[serde(default)]
    pub observers: ObserverConfig,

    /// General server settings
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompositorConfig {
    /// Allow posting a fullscreen client buffer directly to the display
    pub bypass: bool,

    /// Magnification factor (1.0 = no zoom)
    pub zoom: f32,

    /// Default frame dropping for new surfaces
    pub framedropping: bool,

    /// Expected number of outputs, used to size per-consumer bookkeeping
    pub max_outputs_hint: usize,
}

/// A single (headless) output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,

    /// Whether this output's display buffer can scan out client buffers
    #[serde(default = "default_true")]
    pub bypass: bool,
}

/// What to do with key repeats for keys the dispatcher knows are pressed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyRepeatPolicy {
    #[default]
    Deliver,
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub key_repeat: KeyRepeatPolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Observers run on the notifying thread
    #[default]
    Inline,
    /// Each multiplexer gets its own serial work queue
    Queue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ObserverConfig {
    #[serde(default)]
    pub executor: ExecutorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneralConfig {
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Shut down on its own after this many seconds
    #[serde(default)]
    pub run_for_secs: Option<u64>,
}

impl Default for KeystoneConfig {
    fn default() -> Self {
        Self {
            compositor: CompositorConfig::default(),
            outputs: default_outputs(),
            input: InputConfig::default(),
            observers: ObserverConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            bypass: true,
            zoom: 1.0,
            framedropping: false,
            max_outputs_hint: 6,
        }
    }
}

impl OutputConfig {
    pub fn new(name: impl Into<String>, area: Rectangle) -> Self {
        Self {
            name: name.into(),
            x: area.x,
            y: area.y,
            width: area.width,
            height: area.height,
            bypass: true,
        }
    }

    pub fn area(&self) -> Rectangle {
        Rectangle::new(self.x, self.y, self.width, self.height)
    }
}

fn default_true() -> bool {
    true
}

fn default_outputs() -> Vec<OutputConfig> {
    vec![OutputConfig::new("HEADLESS-1", Rectangle::new(0, 0, 1920, 1080))]
}

impl KeystoneConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Path::new(&home).join(path.strip_prefix("~").unwrap_or(path))
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: KeystoneConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.compositor.zoom.is_finite() || self.compositor.zoom < 1.0 {
            anyhow::bail!(
                "Invalid zoom {}: must be a finite value of at least 1.0",
                self.compositor.zoom
            );
        }

        if self.outputs.is_empty() {
            anyhow::bail!("At least one output must be configured");
        }

        let mut names = HashSet::new();
        for output in &self.outputs {
            if output.width == 0 || output.height == 0 {
                anyhow::bail!(
                    "Invalid size {}x{} for output '{}'",
                    output.width,
                    output.height,
                    output.name
                );
            }
            if !names.insert(output.name.as_str()) {
                anyhow::bail!("Duplicate output name: {}", output.name);
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Merge a partial configuration into this one.
    /// Sections of `partial` that differ from the defaults win.
    pub fn merge_partial(mut self, partial: KeystoneConfig) -> Self {
        let default_config = KeystoneConfig::default();

        if partial.compositor != default_config.compositor {
            self.compositor = partial.compositor;
        }
        if partial.outputs != default_config.outputs {
            self.outputs = partial.outputs;
        }
        if partial.input != default_config.input {
            self.input = partial.input;
        }
        if partial.observers != default_config.observers {
            self.observers = partial.observers;
        }
        if partial.general != default_config.general {
            self.general = partial.general;
        }

        self
    }
}
