//! Patch files for the rackwire render core.
//!
//! A patch is a TOML description of a module graph: the modules to
//! instantiate, their parameters, and the links between their ports. This
//! crate loads and saves patches and builds them into a
//! [`ModuleGraph`](rackwire_core::ModuleGraph) of
//! [`Unit`](rackwire_modules::Unit)s.
//!
//! # Features
//!
//! - **Patch format**: [`PatchConfig`] with serde + toml
//! - **Parameter parsing**: numbers with unit suffixes (`"10ms"`, `"-6dB"`,
//!   `"1.2kHz"`) and named choices (`waveform = "saw"`)
//! - **Building**: [`PatchBuilder`] resolves `module.port` endpoints and
//!   reports every failure as a [`ConfigError`]
//!
//! # Example
//!
//! ```rust,no_run
//! use rackwire_config::{PatchBuilder, PatchConfig};
//!
//! let patch = PatchConfig::load("patches/pluck.toml").unwrap();
//! let mut renderer = PatchBuilder::build(&patch).unwrap().into_renderer();
//! renderer.compile().unwrap();
//! renderer.process(patch.block_size);
//! ```

mod builder;
mod error;
mod params;
mod patch;

pub use builder::{BuiltPatch, PatchBuilder};
pub use error::ConfigError;
pub use params::{ParamValue, parse_param_value};
pub use patch::{LinkConfig, ModuleConfig, PatchConfig};
