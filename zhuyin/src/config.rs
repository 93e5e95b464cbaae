//! Zhuyin-specific configuration: the choice of keyboard layout, flattened together
//! with the engine's own [`Config`] the way the teacher's `ZhuyinConfig` flattened its
//! keyboard-correction options alongside the base config.

use serde::{Deserialize, Serialize};

use zhuyin_engine_core::error::ConfigError;
use zhuyin_engine_core::syllable::Layout;
use zhuyin_engine_core::Config;

use crate::layout;
use crate::pinyin_layout::HanyuPinyinLayout;

/// The six keyboards the engine can be driven through; see [`LayoutKind::build`] for
/// the concrete [`Layout`] each one resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Standard,
    ETen,
    Hsu,
    ETen26,
    HanyuPinyin,
    IBM,
}

impl Default for LayoutKind {
    fn default() -> Self {
        LayoutKind::Standard
    }
}

impl LayoutKind {
    /// Builds the concrete layout. Boxed so a runtime-selected `LayoutKind` can still
    /// feed `KeyHandler<L, ..>`'s single type parameter `L` (see the blanket
    /// `Layout for Box<dyn Layout>` impl in `zhuyin-engine-core`).
    pub fn build(self) -> Box<dyn Layout> {
        match self {
            LayoutKind::Standard => Box::new(layout::standard()),
            LayoutKind::ETen => Box::new(layout::eten()),
            LayoutKind::Hsu => Box::new(layout::hsu()),
            LayoutKind::ETen26 => Box::new(layout::eten26()),
            LayoutKind::HanyuPinyin => Box::new(HanyuPinyinLayout),
            LayoutKind::IBM => Box::new(layout::ibm()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZhuyinConfig {
    pub layout: LayoutKind,
    #[serde(flatten)]
    pub base: Config,
}

impl Default for ZhuyinConfig {
    fn default() -> Self {
        ZhuyinConfig { layout: LayoutKind::default(), base: Config::default() }
    }
}

impl ZhuyinConfig {
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
    fn defaults_to_standard_layout() {
        assert_eq!(ZhuyinConfig::default().layout, LayoutKind::Standard);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = ZhuyinConfig::default();
        cfg.layout = LayoutKind::HanyuPinyin;
        cfg.base.traditional_mode = true;
        let text = cfg.to_toml_string().unwrap();
        let back = ZhuyinConfig::load_toml(&text).unwrap();
        assert_eq!(back.layout, LayoutKind::HanyuPinyin);
        assert_eq!(back.base, cfg.base);
    }
}
