//! The static unigram dictionary: a plain-text `key value score value score…` table,
//! loaded once at process start the way the teacher loads its word-bigram tables in
//! `core/src/word_bigram.rs`, but keyed on the engine's absolute-order reading key
//! instead of a bigram pair.

use std::collections::HashMap;
use tracing::{debug, warn};

use zhuyin_engine_core::lm::{Unigram, UnigramSource};

#[derive(Debug, Default)]
pub struct StaticDictionary {
    entries: HashMap<String, Vec<Unigram>>,
}

impl StaticDictionary {
    pub fn new() -> Self {
        StaticDictionary { entries: HashMap::new() }
    }

    /// Parses `key value score value score …` lines, skipping blank lines and `#`
    /// comments. Malformed lines are logged and skipped rather than aborting the load.
    pub fn load_str(text: &str) -> Self {
        let mut dict = StaticDictionary::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(key) = fields.next() else { continue };
            let rest: Vec<&str> = fields.collect();
            if rest.len() % 2 != 0 {
                warn!(lineno, key, "dictionary line has an unpaired value/score, skipping");
                continue;
            }
            let mut unigrams = Vec::with_capacity(rest.len() / 2);
            let mut ok = true;
            for pair in rest.chunks_exact(2) {
                let Ok(score) = pair[1].parse::<f32>() else {
                    warn!(lineno, key, score = pair[1], "unparsable score, skipping line");
                    ok = false;
                    break;
                };
                unigrams.push(Unigram { key: key.to_string(), value: pair[0].to_string(), score });
            }
            if ok && !unigrams.is_empty() {
                dict.entries.entry(key.to_string()).or_default().extend(unigrams);
            }
        }
        debug!(entries = dict.entries.len(), "loaded static dictionary");
        dict
    }

    pub fn load_file<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UnigramSource for StaticDictionary {
    fn lookup(&self, key: &str) -> Vec<Unigram> {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_line() {
        let dict = StaticDictionary::load_str("ㄋㄧˇ 你 -2.0 妳 -3.5\n");
        let got = dict.lookup("ㄋㄧˇ");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].value, "你");
        assert_eq!(got[1].score, -3.5);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let dict = StaticDictionary::load_str("# a comment\n\nㄏㄠˇ 好 -1.0\n");
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn skips_malformed_lines_without_aborting_the_load() {
        let dict = StaticDictionary::load_str("ㄅㄚ 八 notanumber\nㄏㄠˇ 好 -1.0\n");
        assert_eq!(dict.len(), 1);
        assert!(dict.lookup("ㄅㄚ").is_empty());
    }
}
