use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

const ENV_PREFIX: &str = "CTC_DECODER_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub beam_width: usize,
    pub blank_index: usize,
    /// Scale applied to the log language-model probability.
    pub lm_weight: f32,
    /// Probabilities below this are raised to it before taking the log.
    pub lm_min_probability: f32,
    /// Emissions at or below this log probability never start a new label.
    /// `None` prunes only impossible (`-inf`) emissions.
    pub extension_floor: Option<f32>,
    /// Worker threads for batch fan-out; 0 picks the physical core count.
    pub threads: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_width: 50,
            blank_index: 0,
            lm_weight: 0.25,
            lm_min_probability: 1e-6,
            extension_floor: None,
            threads: 0,
        }
    }
}

impl DecoderConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides(ENV_PREFIX);
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self, DecodeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, prefix: &str) {
        fn parse<T: std::str::FromStr>(prefix: &str, suffix: &str) -> Option<T>
        where
            T::Err: std::fmt::Display,
        {
            let key = format!("{prefix}{suffix}");
            let value = std::env::var(&key).ok()?;
            match value.trim().parse::<T>() {
                Ok(parsed) => {
                    log::debug!("Using {key} override: {value}");
                    Some(parsed)
                }
                Err(err) => {
                    log::warn!("Ignoring invalid {key} value '{value}': {err}");
                    None
                }
            }
        }

        if let Some(v) = parse::<usize>(prefix, "BEAM_WIDTH") {
            self.beam_width = v.max(1);
        }
        if let Some(v) = parse(prefix, "BLANK_INDEX") {
            self.blank_index = v;
        }
        if let Some(v) = parse(prefix, "LM_WEIGHT") {
            self.lm_weight = v;
        }
        if let Some(v) = parse(prefix, "LM_MIN_PROBABILITY") {
            self.lm_min_probability = v;
        }
        if let Some(v) = parse(prefix, "EXTENSION_FLOOR") {
            self.extension_floor = Some(v);
        }
        if let Some(v) = parse(prefix, "THREADS") {
            self.threads = v;
        }
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.beam_width == 0 {
            return Err(DecodeError::InvalidBeamWidth(self.beam_width));
        }
        if !self.lm_weight.is_finite() || self.lm_weight < 0.0 {
            return Err(DecodeError::InvalidSetting(format!(
                "lm_weight must be finite and non-negative, got {}",
                self.lm_weight
            )));
        }
        if !(self.lm_min_probability > 0.0 && self.lm_min_probability <= 1.0) {
            return Err(DecodeError::InvalidSetting(format!(
                "lm_min_probability must lie in (0, 1], got {}",
                self.lm_min_probability
            )));
        }
        if matches!(self.extension_floor, Some(f) if f.is_nan()) {
            return Err(DecodeError::InvalidSetting(
                "extension_floor must not be NaN".to_string(),
            ));
        }
        Ok(())
    }

    /// Threads to use for a batch of `batch` items.
    pub(crate) fn resolve_threads(&self, batch: usize) -> usize {
        let requested = if self.threads == 0 {
            num_cpus::get_physical()
        } else {
            self.threads
        };
        requested.clamp(1, batch.max(1))
    }
}
