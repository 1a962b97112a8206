//! Patch file format and operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::params::ParamValue;

/// A module graph stored as TOML.
///
/// # TOML Format
///
/// ```toml
/// name = "pluck"
/// sample_rate = 48000
/// block_size = 256
///
/// [[modules]]
/// id = "osc"
/// kind = "oscillator"
/// [modules.params]
/// frequency = 220.0
/// waveform = "saw"
///
/// [[modules]]
/// id = "vca"
/// kind = "gain"
///
/// [[links]]
/// from = "osc.out"
/// to = "vca.in"
/// scale = 0.8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchConfig {
    /// Name of the patch.
    pub name: String,

    /// Optional description of the patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Sample rate the units are built for (defaults to 48000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum frames per block (defaults to 256).
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Module instances.
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    /// Links between module ports.
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    256
}

fn default_scale() -> f32 {
    1.0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_unity(scale: &f32) -> bool {
    *scale == 1.0
}

/// One module instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleConfig {
    /// Patch-local name, used by links as `id.port`.
    pub id: String,

    /// Unit kind (e.g., "oscillator", "mixer").
    pub kind: String,

    /// Parameter overrides; unset parameters keep their defaults.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,
}

impl ModuleConfig {
    /// Create a module entry with default parameters.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter to the entry.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One link, written as `module.port` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkConfig {
    /// Source output, `module.port`.
    pub from: String,

    /// Destination input, `module.port`.
    pub to: String,

    /// Optional `f32` output multiplied into the transfer, `module.port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,

    /// Constant gain (defaults to 1.0).
    #[serde(default = "default_scale", skip_serializing_if = "is_unity")]
    pub scale: f32,

    /// Overrides whether the destination input sums its links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<bool>,
}

impl LinkConfig {
    /// Create a unity-gain link.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            control: None,
            scale: 1.0,
            sum: None,
        }
    }

    /// Set the constant gain.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the control output.
    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }

    /// Set the destination's summation policy.
    pub fn with_sum(mut self, sum: bool) -> Self {
        self.sum = Some(sum);
        self
    }
}

impl PatchConfig {
    /// Create a new empty patch.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            modules: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Add a module.
    pub fn with_module(mut self, module: ModuleConfig) -> Self {
        self.modules.push(module);
        self
    }

    /// Add a link.
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.links.push(link);
        self
    }

    /// Load a patch from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let patch: PatchConfig = toml::from_str(&content)?;
        tracing::debug!(
            "patch_load: '{}' ({} modules, {} links) from {}",
            patch.name,
            patch.modules.len(),
            patch.links.len(),
            path.display()
        );
        Ok(patch)
    }

    /// Load a patch from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the patch to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the patch to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the patch-level settings.
    ///
    /// Module kinds, parameters and links are checked when the patch is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "sample_rate",
                reason: "must be greater than zero",
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "block_size",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Finds a module entry by id.
    pub fn module(&self, id: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.id == id)
    }
}
