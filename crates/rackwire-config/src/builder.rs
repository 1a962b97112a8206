//! Turns a [`PatchConfig`] into a live [`ModuleGraph`].

use std::collections::BTreeMap;

use rackwire_core::{Direction, Link, ModuleGraph, ModuleId, PortHandle, PortRef, Renderer};
use rackwire_modules::{Unit, UnitKind};

use crate::error::ConfigError;
use crate::patch::{LinkConfig, ModuleConfig, PatchConfig};

/// A graph built from a patch, with the patch's module ids resolved.
pub struct BuiltPatch {
    /// The module graph, not yet compiled.
    pub graph: ModuleGraph<Unit>,
    /// Patch id → graph id.
    pub ids: BTreeMap<String, ModuleId>,
    /// Maximum frames per block from the patch.
    pub block_size: usize,
}

impl BuiltPatch {
    /// Graph id for a patch module id.
    pub fn module(&self, id: &str) -> Option<ModuleId> {
        self.ids.get(id).copied()
    }

    /// Patch module id for a graph id.
    pub fn name_of(&self, id: ModuleId) -> Option<&str> {
        self.ids
            .iter()
            .find(|&(_, &graph_id)| graph_id == id)
            .map(|(name, _)| name.as_str())
    }

    /// Resolves a `module.port` path against the graph.
    pub fn port(&self, path: &str, direction: Direction) -> Result<PortHandle, ConfigError> {
        resolve(&self.graph, &self.ids, path, direction)
    }

    /// Wraps the graph in a renderer sized for the patch's block size.
    pub fn into_renderer(self) -> Renderer<Unit> {
        Renderer::new(self.graph, self.block_size)
    }
}

/// Builds module graphs from patch configurations.
///
/// Modules are added in file order, so [`ModuleId`]s and the compiled
/// schedule are stable for a given file.
///
/// # Example
///
/// ```rust
/// use rackwire_config::{LinkConfig, ModuleConfig, PatchBuilder, PatchConfig};
///
/// let patch = PatchConfig::new("tone")
///     .with_module(ModuleConfig::new("osc", "oscillator").with_param("frequency", 220.0))
///     .with_module(ModuleConfig::new("vca", "gain").with_param("level", "-6dB"))
///     .with_link(LinkConfig::new("osc.out", "vca.in"));
///
/// let built = PatchBuilder::build(&patch).unwrap();
/// assert_eq!(built.graph.module_count(), 2);
/// assert!(built.graph.compile().is_ok());
/// ```
pub struct PatchBuilder;

impl PatchBuilder {
    /// Validates the patch settings, instantiates every module, applies its
    /// parameters, and connects every link. Nothing is compiled; cycles and
    /// ambiguous wiring surface from [`ModuleGraph::compile`].
    ///
    /// A link's `sum` flag sets the policy of its destination input. Links
    /// into one input may leave it unset, but those that set it must agree.
    pub fn build(config: &PatchConfig) -> Result<BuiltPatch, ConfigError> {
        config.validate()?;
        let sample_rate = config.sample_rate as f32;
        let mut graph = ModuleGraph::new();
        let mut ids = BTreeMap::new();

        for module in &config.modules {
            if ids.contains_key(&module.id) {
                return Err(ConfigError::DuplicateModule(module.id.clone()));
            }
            let unit = make_unit(module, sample_rate)?;
            let id = graph.add_module(unit)?;
            tracing::debug!("patch_module: '{}' ({}) → {id}", module.id, module.kind);
            ids.insert(module.id.clone(), id);
        }

        let mut sums = BTreeMap::new();
        for link in &config.links {
            connect(&mut graph, &ids, &mut sums, link)?;
        }

        Ok(BuiltPatch {
            graph,
            ids,
            block_size: config.block_size,
        })
    }
}

fn make_unit(module: &ModuleConfig, sample_rate: f32) -> Result<Unit, ConfigError> {
    let kind = UnitKind::from_name(&module.kind).ok_or_else(|| ConfigError::UnknownModuleKind {
        id: module.id.clone(),
        kind: module.kind.clone(),
    })?;
    let mut unit = Unit::new(kind, sample_rate);

    for (name, value) in &module.params {
        let spec = kind
            .param(name)
            .ok_or_else(|| ConfigError::invalid_param(&module.id, name, "unknown parameter"))?;
        let applied = if spec.is_choice() {
            let text = value.as_text().ok_or_else(|| {
                ConfigError::invalid_param(&module.id, name, "expected one of its named choices")
            })?;
            unit.set_choice(name, text)
        } else {
            let number = value.as_f32().ok_or_else(|| {
                ConfigError::invalid_param(
                    &module.id,
                    name,
                    format!("cannot parse {value} as a number"),
                )
            })?;
            unit.set_param(name, number)
        };
        applied.map_err(|e| ConfigError::invalid_param(&module.id, name, e.to_string()))?;
    }
    Ok(unit)
}

fn connect(
    graph: &mut ModuleGraph<Unit>,
    ids: &BTreeMap<String, ModuleId>,
    sums: &mut BTreeMap<PortRef, bool>,
    link: &LinkConfig,
) -> Result<(), ConfigError> {
    let dest = resolve(graph, ids, &link.to, Direction::Input)?;
    let src = resolve(graph, ids, &link.from, Direction::Output)?;
    let ctl = link
        .control
        .as_deref()
        .map(|path| resolve(graph, ids, path, Direction::Output))
        .transpose()?;

    let made = Link::dynamic(dest, src, ctl, link.scale)?;
    graph.connect(made)?;
    if let Some(sum) = link.sum {
        if *sums.entry(dest.port).or_insert(sum) != sum {
            return Err(ConfigError::ConflictingSum(link.to.clone()));
        }
        graph.set_summing(dest.port, sum)?;
    }
    Ok(())
}

/// Splits `module.port` at the last dot and looks the port up.
fn resolve(
    graph: &ModuleGraph<Unit>,
    ids: &BTreeMap<String, ModuleId>,
    path: &str,
    direction: Direction,
) -> Result<PortHandle, ConfigError> {
    let bad = |reason| ConfigError::BadPortRef {
        port: path.to_string(),
        reason,
    };
    let (module, port) = path.rsplit_once('.').ok_or_else(|| bad("expected module.port"))?;
    if module.is_empty() || port.is_empty() {
        return Err(bad("empty module or port name"));
    }
    let id = *ids
        .get(module)
        .ok_or_else(|| ConfigError::UnknownModule(module.to_string()))?;
    Ok(graph.find_port(id, direction, port)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackwire_core::{Action, GraphError};

    fn tone() -> PatchConfig {
        PatchConfig::new("tone")
            .with_module(ModuleConfig::new("pitch", "pitch").with_param("note", 57.0))
            .with_module(ModuleConfig::new("osc", "oscillator").with_param("frequency", 0.0))
            .with_module(ModuleConfig::new("gate", "gate").with_param("value", 1.0))
            .with_module(ModuleConfig::new("env", "envelope").with_param("attack", "1ms"))
            .with_module(ModuleConfig::new("out", "mixer"))
            .with_link(LinkConfig::new("pitch.hz", "osc.hz"))
            .with_link(LinkConfig::new("gate.gate", "env.gate"))
            .with_link(
                LinkConfig::new("osc.out", "out.in")
                    .with_control("env.out")
                    .with_scale(0.5),
            )
    }

    #[test]
    fn test_build_resolves_ids_in_file_order() {
        let built = PatchBuilder::build(&tone()).unwrap();
        assert_eq!(built.graph.module_count(), 5);
        assert_eq!(built.graph.link_count(), 3);
        let pitch = built.module("pitch").unwrap();
        let out = built.module("out").unwrap();
        assert!(pitch.index() < out.index());
        assert_eq!(built.name_of(out), Some("out"));
    }

    #[test]
    fn test_params_applied() {
        let built = PatchBuilder::build(&tone()).unwrap();
        let pitch = built.graph.module(built.module("pitch").unwrap()).unwrap();
        assert!((pitch.param("frequency").unwrap() - 220.0).abs() < 1e-3);
        let env = built.graph.module(built.module("env").unwrap()).unwrap();
        assert_eq!(env.param("attack"), Some(0.001));
    }

    #[test]
    fn test_built_patch_compiles_with_aliases() {
        let built = PatchBuilder::build(&tone()).unwrap();
        let seq = built.graph.compile().unwrap();
        let aliases = seq
            .prep()
            .iter()
            .filter(|a| matches!(a, Action::Alias { .. }))
            .count();
        assert_eq!(aliases, 2);
    }

    #[test]
    fn test_unknown_kind() {
        let patch = PatchConfig::new("x").with_module(ModuleConfig::new("a", "reverb"));
        assert!(matches!(
            PatchBuilder::build(&patch),
            Err(ConfigError::UnknownModuleKind { .. })
        ));
    }

    #[test]
    fn test_duplicate_module() {
        let patch = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "constant"))
            .with_module(ModuleConfig::new("a", "gain"));
        assert!(matches!(
            PatchBuilder::build(&patch),
            Err(ConfigError::DuplicateModule(id)) if id == "a"
        ));
    }

    #[test]
    fn test_bad_params() {
        let unknown = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "gain").with_param("drive", 1.0));
        let range = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "gain").with_param("level", 99.0));
        let choice = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "oscillator").with_param("waveform", 1.0));
        let garbage = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "gain").with_param("level", "loud"));
        for patch in [unknown, range, choice, garbage] {
            assert!(
                matches!(
                    PatchBuilder::build(&patch),
                    Err(ConfigError::InvalidParam { .. })
                ),
                "{patch:?}"
            );
        }
    }

    #[test]
    fn test_bad_links() {
        let base = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "constant"))
            .with_module(ModuleConfig::new("b", "gain"));

        let no_dot = base.clone().with_link(LinkConfig::new("a", "b.in"));
        assert!(matches!(
            PatchBuilder::build(&no_dot),
            Err(ConfigError::BadPortRef { .. })
        ));

        let missing = base.clone().with_link(LinkConfig::new("z.out", "b.in"));
        assert!(matches!(
            PatchBuilder::build(&missing),
            Err(ConfigError::UnknownModule(m)) if m == "z"
        ));

        let no_port = base.clone().with_link(LinkConfig::new("a.wet", "b.in"));
        assert!(matches!(
            PatchBuilder::build(&no_port),
            Err(ConfigError::Graph(GraphError::PortNotFound { .. }))
        ));

        let backwards = base.with_link(LinkConfig::new("b.in", "a.out"));
        assert!(matches!(
            PatchBuilder::build(&backwards),
            Err(ConfigError::Graph(GraphError::PortNotFound { .. }))
        ));
    }

    #[test]
    fn test_type_mismatch_from_patch() {
        let patch = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "constant"))
            .with_module(ModuleConfig::new("e", "envelope"))
            .with_link(LinkConfig::new("a.out", "e.gate"));
        assert!(matches!(
            PatchBuilder::build(&patch),
            Err(ConfigError::Graph(GraphError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn test_sum_override_resolves_ambiguity() {
        let two_into_gain = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "constant"))
            .with_module(ModuleConfig::new("b", "constant"))
            .with_module(ModuleConfig::new("g", "gain"))
            .with_link(LinkConfig::new("a.out", "g.in"))
            .with_link(LinkConfig::new("b.out", "g.in"));
        let built = PatchBuilder::build(&two_into_gain).unwrap();
        assert!(matches!(
            built.graph.compile(),
            Err(GraphError::AmbiguousWiring { .. })
        ));

        let mut summed = two_into_gain;
        summed.links[1].sum = Some(true);
        let built = PatchBuilder::build(&summed).unwrap();
        assert!(built.graph.compile().is_ok());
    }

    #[test]
    fn test_zero_settings_rejected() {
        for patch in [
            tone().with_sample_rate(0),
            tone().with_block_size(0),
        ] {
            assert!(matches!(
                PatchBuilder::build(&patch),
                Err(ConfigError::InvalidSetting { .. })
            ));
        }
    }

    #[test]
    fn test_conflicting_sum_flags() {
        let base = PatchConfig::new("x")
            .with_module(ModuleConfig::new("a", "constant"))
            .with_module(ModuleConfig::new("b", "constant"))
            .with_module(ModuleConfig::new("m", "mixer"));

        let conflicting = base
            .clone()
            .with_link(LinkConfig::new("a.out", "m.in").with_sum(true))
            .with_link(LinkConfig::new("b.out", "m.in").with_sum(false));
        assert!(matches!(
            PatchBuilder::build(&conflicting),
            Err(ConfigError::ConflictingSum(port)) if port == "m.in"
        ));

        let agreeing = base
            .with_link(LinkConfig::new("a.out", "m.in").with_sum(true))
            .with_link(LinkConfig::new("b.out", "m.in"));
        assert!(PatchBuilder::build(&agreeing).is_ok());
    }

    #[test]
    fn test_port_lookup_on_built_patch() {
        let built = PatchBuilder::build(&tone()).unwrap();
        let handle = built.port("out.out", Direction::Output).unwrap();
        assert_eq!(handle.port.module, built.module("out").unwrap());
        assert!(built.port("out.out", Direction::Input).is_err());
    }
}
