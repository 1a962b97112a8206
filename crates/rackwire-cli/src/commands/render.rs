//! Offline rendering of a patch to a WAV file.

use crate::commands::common::{load_patch, parse_key_val};
use clap::Args;
use hound::{SampleFormat, WavSpec, WavWriter};
use rackwire_config::PatchConfig;
use rackwire_core::{Direction, ElementType};
use rackwire_modules::UnitKind;
use std::path::PathBuf;

#[derive(Args)]
pub struct RenderArgs {
    /// Patch file (TOML)
    #[arg(value_name = "PATCH")]
    patch: PathBuf,

    /// Output WAV file
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Number of blocks to run (defaults to one second)
    #[arg(long)]
    blocks: Option<usize>,

    /// Output to record, as module.port (defaults to the last module's audio output)
    #[arg(long)]
    tap: Option<String>,

    /// Override a parameter (module.param=value), can be repeated
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Output bit depth (16 or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    if !matches!(args.bit_depth, 16 | 32) {
        anyhow::bail!("Unsupported bit depth {} (use 16 or 32)", args.bit_depth);
    }

    let (patch, built) = load_patch(&args.patch, &args.params)?;
    let tap = match args.tap {
        Some(tap) => tap,
        None => default_tap(&patch)
            .ok_or_else(|| anyhow::anyhow!("Patch has no f32 output to record; pass --tap"))?,
    };
    let handle = built.port(&tap, Direction::Output)?;
    if handle.element != ElementType::F32 {
        anyhow::bail!("Tap '{}' carries {}, expected f32", tap, handle.element);
    }

    let block_size = patch.block_size;
    let blocks = args
        .blocks
        .unwrap_or_else(|| (patch.sample_rate as usize).div_ceil(block_size.max(1)));

    let mut renderer = built.into_renderer();
    renderer.compile()?;

    println!(
        "Rendering '{}': {} blocks of {} frames at {} Hz, tap {}",
        patch.name, blocks, block_size, patch.sample_rate, tap
    );

    let mut samples = Vec::with_capacity(blocks * block_size);
    for _ in 0..blocks {
        renderer.process(block_size);
        let block = renderer
            .read_output_handle(handle.port)
            .ok_or_else(|| anyhow::anyhow!("Tap '{}' has no buffer", tap))?;
        samples.extend_from_slice(block);
    }

    write_mono(&args.output, &samples, patch.sample_rate, args.bit_depth)?;

    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let peak_db = if peak > 0.0 {
        20.0 * peak.log10()
    } else {
        f32::NEG_INFINITY
    };
    println!(
        "Wrote {} samples to {} (peak {:.1} dBFS)",
        samples.len(),
        args.output.display(),
        peak_db
    );

    Ok(())
}

/// First `f32` output of the last module in the file that has one.
fn default_tap(patch: &PatchConfig) -> Option<String> {
    patch.modules.iter().rev().find_map(|module| {
        let kind = UnitKind::from_name(&module.kind)?;
        let port = kind
            .outputs()
            .iter()
            .find(|spec| spec.element == ElementType::F32)?;
        Some(format!("{}.{}", module.id, port.name))
    })
}

fn write_mono(
    path: &std::path::Path,
    samples: &[f32],
    sample_rate: u32,
    bits_per_sample: u16,
) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample,
        sample_format: if bits_per_sample == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };
    let mut writer = WavWriter::create(path, spec)?;

    if bits_per_sample == 32 {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i32 << (bits_per_sample - 1)) as f32;
        for &sample in samples {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            writer.write_sample(int_sample as i16)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackwire_config::ModuleConfig;

    #[test]
    fn test_default_tap_skips_non_audio_modules() {
        let patch = PatchConfig::new("x")
            .with_module(ModuleConfig::new("osc", "oscillator"))
            .with_module(ModuleConfig::new("vca", "gain"))
            .with_module(ModuleConfig::new("pitch", "pitch"))
            .with_module(ModuleConfig::new("gate", "gate"));
        assert_eq!(default_tap(&patch).as_deref(), Some("vca.out"));
    }

    #[test]
    fn test_default_tap_none() {
        let patch = PatchConfig::new("x").with_module(ModuleConfig::new("gate", "gate"));
        assert_eq!(default_tap(&patch), None);
    }
}
