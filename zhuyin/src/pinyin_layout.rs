//! Romanized-Bopomofo (Hanyu Pinyin) entry: keystrokes are plain pinyin letters plus a
//! trailing tone digit, decomposed into an initial/final pair and translated to the
//! same absolute-order key the Bopomofo layouts produce, so the dictionary never needs
//! to know which layout typed a given reading.

use zhuyin_engine_core::syllable::Layout;

const INITIALS: &[(&str, &str)] = &[
    ("zh", "ㄓ"), ("ch", "ㄔ"), ("sh", "ㄕ"),
    ("b", "ㄅ"), ("p", "ㄆ"), ("m", "ㄇ"), ("f", "ㄈ"),
    ("d", "ㄉ"), ("t", "ㄊ"), ("n", "ㄋ"), ("l", "ㄌ"),
    ("g", "ㄍ"), ("k", "ㄎ"), ("h", "ㄏ"),
    ("j", "ㄐ"), ("q", "ㄑ"), ("x", "ㄒ"),
    ("r", "ㄖ"), ("z", "ㄗ"), ("c", "ㄘ"), ("s", "ㄙ"),
];

const FINALS: &[(&str, &str)] = &[
    ("iang", "ㄧㄤ"), ("iong", "ㄩㄥ"), ("uang", "ㄨㄤ"),
    ("ian", "ㄧㄢ"), ("iao", "ㄧㄠ"), ("ing", "ㄧㄥ"), ("uai", "ㄨㄞ"),
    ("uan", "ㄨㄢ"), ("van", "ㄩㄢ"), ("ang", "ㄤ"), ("eng", "ㄥ"),
    ("ong", "ㄨㄥ"),
    ("ia", "ㄧㄚ"), ("ie", "ㄧㄝ"), ("in", "ㄧㄣ"), ("iu", "ㄧㄡ"),
    ("ua", "ㄨㄚ"), ("uo", "ㄨㄛ"), ("ui", "ㄨㄟ"), ("un", "ㄨㄣ"),
    ("ve", "ㄩㄝ"), ("vn", "ㄩㄣ"), ("an", "ㄢ"), ("en", "ㄣ"),
    ("ai", "ㄞ"), ("ei", "ㄟ"), ("ao", "ㄠ"), ("ou", "ㄡ"), ("er", "ㄦ"),
    ("a", "ㄚ"), ("o", "ㄛ"), ("e", "ㄜ"), ("i", "ㄧ"), ("u", "ㄨ"), ("v", "ㄩ"),
];

const TONE_MARKS: [char; 6] = ['\0', '\0', 'ˊ', 'ˇ', 'ˋ', '˙'];

fn longest_prefix<'a>(table: &'a [(&'a str, &'a str)], s: &str) -> Option<(&'a str, &'a str)> {
    table
        .iter()
        .filter(|(key, _)| s.starts_with(key))
        .max_by_key(|(key, _)| key.len())
        .copied()
}

pub struct HanyuPinyinLayout;

impl Layout for HanyuPinyinLayout {
    fn is_valid_key(&self, partial: &str, ch: char) -> bool {
        if ch.is_ascii_digit() {
            return !partial.is_empty() && matches!(ch, '1'..='5') && !ends_with_digit(partial);
        }
        ch.is_ascii_lowercase() && !ends_with_digit(partial)
    }

    fn combine_key(&self, partial: &str, ch: char) -> String {
        format!("{partial}{ch}")
    }

    fn is_tone_marker(&self, ch: char) -> bool {
        ch.is_ascii_digit()
    }

    fn compose(&self, partial: &str) -> String {
        let (letters, tone) = split_tone(partial);
        let Some((initial_key, initial_sym)) = longest_prefix(INITIALS, letters) else {
            return letters.to_string();
        };
        let rest = &letters[initial_key.len()..];
        let final_sym = longest_prefix(FINALS, rest).map(|(_, sym)| sym).unwrap_or(rest);
        let mut out = format!("{initial_sym}{final_sym}");
        if let Some(mark) = tone.and_then(|d| TONE_MARKS.get(d as usize - '0' as usize)) {
            if *mark != '\0' {
                out.push(*mark);
            }
        }
        out
    }

    fn name(&self) -> &str {
        "HanyuPinyin"
    }
}

fn ends_with_digit(s: &str) -> bool {
    s.chars().last().is_some_and(|c| c.is_ascii_digit())
}

fn split_tone(partial: &str) -> (&str, Option<char>) {
    match partial.chars().last() {
        Some(d) if d.is_ascii_digit() => (&partial[..partial.len() - 1], Some(d)),
        _ => (partial, None),
    }
}
