//! Parameter values as written in patch files.

use serde::{Deserialize, Serialize};

/// A parameter value: a bare TOML number, or a string that is either a
/// number with a unit suffix or the name of an enumerated choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    /// `frequency = 220.0`
    Number(f64),
    /// `frequency = "1.2kHz"`, `waveform = "saw"`
    Text(String),
}

impl ParamValue {
    /// Numeric value, parsing unit suffixes for text values.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(*v as f32),
            Self::Text(s) => parse_param_value(s),
        }
    }

    /// The text as written, for choice parameters.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Parse a parameter value string into an f32.
///
/// Supports various formats:
/// - Plain numbers: "0.5", "1.2", "-0.3"
/// - Percentages: "50%", "120%" (divided by 100)
/// - Decibels: "-6dB", "+3dB" (converted to linear gain)
/// - Time in ms: "100ms" (converted to seconds)
/// - Time in s: "1.5s" (kept as seconds)
/// - Frequency in Hz: "440Hz"
/// - Frequency in kHz: "1.2kHz" (converted to Hz)
pub fn parse_param_value(value: &str) -> Option<f32> {
    let value = value.trim();
    // Longest suffixes first so "ms" is not read as "s" and "kHz" not as "Hz".
    let suffixes: [(&str, fn(f32) -> f32); 8] = [
        ("kHz", |v| v * 1000.0),
        ("khz", |v| v * 1000.0),
        ("ms", |v| v / 1000.0),
        ("dB", |v| libm::powf(10.0, v / 20.0)),
        ("db", |v| libm::powf(10.0, v / 20.0)),
        ("Hz", |v| v),
        ("hz", |v| v),
        ("%", |v| v / 100.0),
    ];
    for (suffix, convert) in suffixes {
        if let Some(number) = value.strip_suffix(suffix) {
            return number.trim().parse::<f32>().ok().map(convert);
        }
    }
    if let Some(seconds) = value.strip_suffix('s') {
        return seconds.trim().parse::<f32>().ok();
    }
    value.parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse_param_value("0.5"), Some(0.5));
        assert_eq!(parse_param_value(" -3 "), Some(-3.0));
        assert_eq!(parse_param_value("saw"), None);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_param_value("50%"), Some(0.5));
        assert_eq!(parse_param_value("100ms"), Some(0.1));
        assert_eq!(parse_param_value("1.5s"), Some(1.5));
        assert_eq!(parse_param_value("440Hz"), Some(440.0));
        assert_eq!(parse_param_value("1.2kHz"), Some(1200.0));
        let gain = parse_param_value("-6dB").unwrap();
        assert!((gain - 0.501).abs() < 1e-3);
        assert_eq!(parse_param_value("0dB"), Some(1.0));
    }

    #[test]
    fn test_param_value_accessors() {
        assert_eq!(ParamValue::from(2.0).as_f32(), Some(2.0));
        assert_eq!(ParamValue::from("10ms").as_f32(), Some(0.01));
        assert_eq!(ParamValue::from("saw").as_text(), Some("saw"));
        assert_eq!(ParamValue::from(1.0).as_text(), None);
    }

    #[test]
    fn test_param_value_display() {
        assert_eq!(ParamValue::from(0.25).to_string(), "0.25");
        assert_eq!(ParamValue::from("saw").to_string(), "\"saw\"");
    }
}
