//! Per-instance settings for the key handler, serialized with `serde`/`toml` the way
//! the teacher's own `Config` round-trips through `load_toml`/`save_toml`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MIN_COMPOSING_BUFFER_SIZE: usize = 4;
pub const MAX_COMPOSING_BUFFER_SIZE: usize = 100;
pub const MIN_CANDIDATE_KEYS: usize = 4;
pub const MAX_CANDIDATE_KEYS: usize = 15;
pub const DEFAULT_CANDIDATE_KEYS: &str = "123456789";

/// Which side of the cursor a bare Space/Down opens candidates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectPhrase {
    BeforeCursor,
    AfterCursor,
}

impl Default for SelectPhrase {
    fn default() -> Self {
        SelectPhrase::BeforeCursor
    }
}

/// Whether A-Z keystrokes land in the composing buffer as letters or are committed
/// through as single characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterMode {
    Upper,
    Lower,
}

impl Default for LetterMode {
    fn default() -> Self {
        LetterMode::Upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub select_phrase: SelectPhrase,
    pub letter_mode: LetterMode,
    pub move_cursor: bool,
    pub esc_clears_buffer: bool,
    candidate_keys: String,
    composing_buffer_size: usize,
    pub chinese_conversion: bool,
    pub traditional_mode: bool,
    pub language_code: String,

    /// Anchors further than this many grid units from the right end get their
    /// selected candidate pinned after a compose, per the fix-pinned-candidates pass.
    pub pin_beyond_distance: usize,
    /// Overrides this weak or weaker are never recorded in the override cache.
    pub min_override_score: f32,
    /// Half-life, in seconds, of an override observation's weight.
    pub override_half_life_secs: f64,
    /// Effective-weight floor below which `suggest` returns nothing.
    pub override_suggest_threshold: f64,
    /// Capacity of the override cache.
    pub override_cache_capacity: usize,
    /// Longest span, in readings, a grid node may cover.
    pub max_node_span: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            select_phrase: SelectPhrase::default(),
            letter_mode: LetterMode::default(),
            move_cursor: true,
            esc_clears_buffer: false,
            candidate_keys: DEFAULT_CANDIDATE_KEYS.to_string(),
            composing_buffer_size: 20,
            chinese_conversion: false,
            traditional_mode: false,
            language_code: "zh-Hant".to_string(),
            pin_beyond_distance: 10,
            min_override_score: -8.0,
            override_half_life_secs: 5400.0,
            override_suggest_threshold: 0.1,
            override_cache_capacity: 500,
            max_node_span: 8,
        }
    }
}

impl Config {
    pub fn composing_buffer_size(&self) -> usize {
        self.composing_buffer_size
    }

    /// Clamps to `[4, 100]`, per the invariant in the data model.
    pub fn set_composing_buffer_size(&mut self, size: usize) {
        self.composing_buffer_size =
            size.clamp(MIN_COMPOSING_BUFFER_SIZE, MAX_COMPOSING_BUFFER_SIZE);
    }

    pub fn candidate_keys(&self) -> &str {
        &self.candidate_keys
    }

    /// Rejects (rather than clamps) an out-of-range hotkey set: there is no sensible
    /// way to truncate or pad a user-chosen key set without surprising them.
    pub fn set_candidate_keys(&mut self, keys: &str) -> Result<(), ConfigError> {
        let lowered = keys.to_lowercase();
        let mut unique: Vec<char> = Vec::new();
        for ch in lowered.chars() {
            if !unique.contains(&ch) {
                unique.push(ch);
            }
        }
        if unique.len() != lowered.chars().count()
            || !(MIN_CANDIDATE_KEYS..=MAX_CANDIDATE_KEYS).contains(&unique.len())
        {
            return Err(ConfigError::InvalidCandidateKeys);
        }
        self.candidate_keys = lowered;
        Ok(())
    }

    pub fn load_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composing_buffer_size_clamps_to_range() {
        let mut cfg = Config::default();
        cfg.set_composing_buffer_size(1);
        assert_eq!(cfg.composing_buffer_size(), MIN_COMPOSING_BUFFER_SIZE);
        cfg.set_composing_buffer_size(1000);
        assert_eq!(cfg.composing_buffer_size(), MAX_COMPOSING_BUFFER_SIZE);
        cfg.set_composing_buffer_size(40);
        assert_eq!(cfg.composing_buffer_size(), 40);
    }

    #[test]
    fn candidate_keys_rejects_out_of_range_or_duplicate() {
        let mut cfg = Config::default();
        assert!(cfg.set_candidate_keys("abc").is_err());
        assert!(cfg.set_candidate_keys("aabbccdd").is_err());
        assert!(cfg.set_candidate_keys("asdfzxcv").is_ok());
        assert_eq!(cfg.candidate_keys(), "asdfzxcv");
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.traditional_mode = true;
        let text = cfg.to_toml_string().unwrap();
        let back = Config::load_toml(&text).unwrap();
        assert_eq!(cfg, back);
    }
}
