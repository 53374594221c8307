//! TOML configuration surface for analysis/synthesis sessions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::analyzer::AnalyzerConfig;
use crate::synth::synthesizer::SynthesizerConfig;

/// Aggregated component configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fade time used by distillation and collation, in seconds.
    #[serde(default = "SessionConfig::default_fade_time")]
    pub fade_time: f64,
    pub analysis: AnalyzerConfig,
    #[serde(default)]
    pub synthesis: SynthesizerConfig,
}

impl SessionConfig {
    fn default_fade_time() -> f64 {
        1e-3
    }

    /// Defaults around a given analysis resolution.
    pub fn with_resolution(freq_resolution: f64) -> Self {
        Self {
            analysis: AnalyzerConfig::new(freq_resolution),
            synthesis: SynthesizerConfig::default(),
            fade_time: Self::default_fade_time(),
        }
    }

    /// Read a config file, falling back to resolution-derived defaults
    /// when the file is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>, freq_resolution: f64) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!(path = %path.display(), %err, "failed to parse config, using defaults");
                    Self::with_resolution(freq_resolution)
                }
            },
            Err(_) => Self::with_resolution(freq_resolution),
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
