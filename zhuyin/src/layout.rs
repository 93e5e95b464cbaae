//! Concrete keyboard layouts: maps of ASCII keystrokes to Bopomofo symbols, built as
//! `phf` maps the way the teacher's own table-driven lookups (`fuzzy_presets`) are laid
//! out as static data rather than runtime-constructed structures.

use phf::phf_map;
use zhuyin_engine_core::syllable::Layout;

use crate::bopomofo::{self, Category};

/// A keyboard layout where every key emits one or two Bopomofo symbols verbatim, and a
/// syllable's absolute-order key is just its keystrokes translated symbol-for-symbol:
/// the keyboard itself enforces initial/medial/final/tone ordering.
pub struct TableLayout {
    name: &'static str,
    keys: &'static phf::Map<char, &'static str>,
}

impl TableLayout {
    fn symbol_for(&self, ch: char) -> Option<&'static str> {
        self.keys.get(&ch).copied()
    }

    fn last_category(&self, partial: &str) -> Option<Category> {
        let last = partial.chars().last()?;
        let symbols = self.symbol_for(last)?;
        bopomofo::category_of_str(symbols)
    }
}

impl Layout for TableLayout {
    fn is_valid_key(&self, partial: &str, ch: char) -> bool {
        let Some(symbols) = self.symbol_for(ch) else { return false };
        let Some(cat) = bopomofo::category_of_str(symbols) else { return false };
        match self.last_category(partial) {
            None => cat != Category::Tone,
            Some(Category::Tone) => false,
            Some(prev) => cat > prev,
        }
    }

    fn combine_key(&self, partial: &str, ch: char) -> String {
        format!("{partial}{ch}")
    }

    fn is_tone_marker(&self, ch: char) -> bool {
        self.symbol_for(ch)
            .and_then(bopomofo::category_of_str)
            .map(|c| c == Category::Tone)
            .unwrap_or(false)
    }

    fn compose(&self, partial: &str) -> String {
        partial.chars().filter_map(|c| self.symbol_for(c)).collect()
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// The Standard (大千) layout, the most widely taught Bopomofo keyboard and the one
/// McBopomofo's "ETen" layout historically coincides with.
static STANDARD_KEYS: phf::Map<char, &'static str> = phf_map! {
    '1' => "ㄅ", 'q' => "ㄆ", 'a' => "ㄇ", 'z' => "ㄈ",
    '2' => "ㄉ", 'w' => "ㄊ", 's' => "ㄋ", 'x' => "ㄌ",
    'e' => "ㄍ", 'd' => "ㄎ", 'c' => "ㄏ",
    'r' => "ㄐ", 'f' => "ㄑ", 'v' => "ㄒ",
    '5' => "ㄓ", 't' => "ㄔ", 'g' => "ㄕ", 'b' => "ㄖ",
    'y' => "ㄗ", 'h' => "ㄘ", 'n' => "ㄙ",
    'u' => "ㄧ", 'j' => "ㄨ", 'm' => "ㄩ",
    '8' => "ㄚ", 'i' => "ㄛ", 'k' => "ㄜ", ',' => "ㄝ",
    '9' => "ㄞ", 'o' => "ㄟ", 'l' => "ㄠ", '.' => "ㄡ",
    '0' => "ㄢ", 'p' => "ㄣ", ';' => "ㄤ", '/' => "ㄥ",
    '-' => "ㄦ",
    '6' => "ˊ", '3' => "ˇ", '4' => "ˋ", '7' => "˙",
};

pub fn standard() -> TableLayout {
    TableLayout { name: "Standard", keys: &STANDARD_KEYS }
}

pub fn eten() -> TableLayout {
    TableLayout { name: "ETen", keys: &STANDARD_KEYS }
}

/// The Hsu (許氏) layout: a compact 26-key design where several keys emit a
/// medial+final pair so a whole final can be typed with one keystroke.
static HSU_KEYS: phf::Map<char, &'static str> = phf_map! {
    'b' => "ㄅ", 'p' => "ㄆ", 'm' => "ㄇ", 'f' => "ㄈ",
    'd' => "ㄉ", 't' => "ㄊ", 'n' => "ㄋ", 'l' => "ㄌ",
    'g' => "ㄍ", 'k' => "ㄎ", 'h' => "ㄏ",
    'j' => "ㄐ", 'q' => "ㄑ", 'x' => "ㄒ",
    'z' => "ㄗ", 'c' => "ㄘ", 's' => "ㄙ", 'r' => "ㄖ",
    'a' => "ㄚ", 'i' => "ㄧ", 'u' => "ㄨ", 'v' => "ㄩ",
    'o' => "ㄛ", 'e' => "ㄜ",
    'y' => "ㄧㄢ", 'w' => "ㄨㄣ",
    '2' => "ˊ", '3' => "ˇ", '4' => "ˋ", '5' => "˙",
};

pub fn hsu() -> TableLayout {
    TableLayout { name: "Hsu", keys: &HSU_KEYS }
}

/// ETen26: a 26-key derivative of ETen, giving every letter key a single-keystroke
/// final the way Hsu does, but with ETen's retroflex/palatal placement.
static ETEN26_KEYS: phf::Map<char, &'static str> = phf_map! {
    'b' => "ㄅ", 'p' => "ㄆ", 'm' => "ㄇ", 'f' => "ㄈ",
    'd' => "ㄉ", 't' => "ㄊ", 'n' => "ㄋ", 'l' => "ㄌ",
    'g' => "ㄍ", 'k' => "ㄎ", 'h' => "ㄏ",
    'j' => "ㄓ", 'q' => "ㄑ", 'x' => "ㄒ",
    'z' => "ㄗ", 'c' => "ㄘ", 'w' => "ㄙ", 'r' => "ㄖ",
    'a' => "ㄚ", 'i' => "ㄧ", 'u' => "ㄨ", 'v' => "ㄩ",
    'o' => "ㄛ", 'e' => "ㄝ",
    'y' => "ㄞ", 's' => "ㄛㄥ",
    '2' => "ˊ", '3' => "ˇ", '4' => "ˋ", '7' => "˙",
};

pub fn eten26() -> TableLayout {
    TableLayout { name: "ETen26", keys: &ETEN26_KEYS }
}

/// The IBM layout: an older table that assigns initials and finals roughly in
/// Bopomofo's own alphabetical order across the top three rows.
static IBM_KEYS: phf::Map<char, &'static str> = phf_map! {
    'q' => "ㄅ", 'w' => "ㄆ", 'e' => "ㄇ", 'r' => "ㄈ",
    't' => "ㄉ", 'y' => "ㄊ", 'u' => "ㄋ", 'i' => "ㄌ",
    'o' => "ㄍ", 'p' => "ㄎ",
    'a' => "ㄏ", 's' => "ㄐ", 'd' => "ㄑ", 'f' => "ㄒ",
    'g' => "ㄓ", 'h' => "ㄔ", 'j' => "ㄕ", 'k' => "ㄖ",
    'l' => "ㄗ", ';' => "ㄘ",
    'z' => "ㄙ", 'x' => "ㄧ", 'c' => "ㄨ", 'v' => "ㄩ",
    'b' => "ㄚ", 'n' => "ㄛ", 'm' => "ㄜ", ',' => "ㄝ",
    '1' => "ㄞ", '2' => "ㄟ", '3' => "ㄠ", '4' => "ㄡ",
    '5' => "ㄢ", '6' => "ㄣ", '7' => "ㄤ", '8' => "ㄥ", '9' => "ㄦ",
    '-' => "ˊ", '=' => "ˇ", '`' => "ˋ", '0' => "˙",
};

pub fn ibm() -> TableLayout {
    TableLayout { name: "IBM", keys: &IBM_KEYS }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_composes_ni3_and_hao3() {
        let l = standard();
        assert_eq!(l.compose("su3"), "ㄋㄧˇ");
        assert_eq!(l.compose("cl3"), "ㄏㄠˇ");
    }

    #[test]
    fn standard_rejects_tone_marker_on_empty_buffer() {
        let l = standard();
        assert!(!l.is_valid_key("", '3'));
        assert!(l.is_valid_key("", 's'));
    }

    #[test]
    fn standard_rejects_out_of_order_keys() {
        let l = standard();
        // 'u' (medial) then 's' (initial) is backwards.
        assert!(l.is_valid_key("", 'u'));
        assert!(!l.is_valid_key("u", 's'));
    }

    #[test]
    fn standard_rejects_keys_after_tone() {
        let l = standard();
        assert!(!l.is_valid_key("su3", 'u'));
    }

    #[test]
    fn hsu_single_key_emits_a_full_final() {
        let l = hsu();
        assert_eq!(l.compose("by"), "ㄅㄧㄢ");
    }

    #[test]
    fn layout_names_are_distinct() {
        let names: Vec<&str> =
            vec![standard().name, eten().name, hsu().name, eten26().name, ibm().name];
        assert_eq!(names, vec!["Standard", "ETen", "Hsu", "ETen26", "IBM"]);
    }
}
