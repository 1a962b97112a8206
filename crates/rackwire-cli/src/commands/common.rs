//! Shared CLI helpers used across multiple commands.

use rackwire_config::{BuiltPatch, ParamValue, PatchBuilder, PatchConfig};
use std::path::Path;

/// Parse a `key=value` string for clap's `value_parser`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid parameter format: '{}' (expected module.param=value)",
            s
        ));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Load a patch file, apply `module.param=value` overrides, and build it.
pub fn load_patch(
    path: &Path,
    overrides: &[(String, String)],
) -> anyhow::Result<(PatchConfig, BuiltPatch)> {
    let mut patch = PatchConfig::load(path)?;

    for (key, value) in overrides {
        let (module, param) = key
            .rsplit_once('.')
            .ok_or_else(|| anyhow::anyhow!("Override '{}' is not module.param", key))?;
        let entry = patch
            .modules
            .iter_mut()
            .find(|m| m.id == module)
            .ok_or_else(|| anyhow::anyhow!("Patch has no module '{}'", module))?;
        let value = match value.parse::<f64>() {
            Ok(number) => ParamValue::Number(number),
            Err(_) => ParamValue::Text(value.clone()),
        };
        tracing::debug!("patch_override: {module}.{param} = {value}");
        entry.params.insert(param.to_string(), value);
    }

    let built = PatchBuilder::build(&patch)?;
    Ok((patch, built))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("osc.frequency=330"),
            Ok(("osc.frequency".to_string(), "330".to_string()))
        );
        assert_eq!(
            parse_key_val("osc.waveform=a=b"),
            Ok(("osc.waveform".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_val("osc.frequency").is_err());
    }
}
