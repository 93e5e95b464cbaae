//! Grid builder (C3): an ordered sequence of syllable readings with a cursor, and the
//! DAG of candidate nodes spanning substrings of consecutive readings.

use ahash::AHashMap;

use crate::key::join_readings;
use crate::lm::Unigram;

/// Score assigned to the unit-length literal fallback when a reading has no unigrams
/// of its own, low enough that any real entry always outranks it in the walk.
const LITERAL_FALLBACK_SCORE: f32 = -99.0;

#[derive(Debug, Clone)]
pub struct Node {
    pub start: usize,
    pub length: usize,
    candidates: Vec<Unigram>,
    selected: usize,
    override_score: Option<f32>,
    pinned: bool,
}

impl Node {
    pub fn candidates(&self) -> &[Unigram] {
        &self.candidates
    }

    pub fn selected_candidate(&self) -> &Unigram {
        &self.candidates[self.selected]
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Rotates the selected candidate by `delta` (negative for Shift+Tab), wrapping.
    pub fn rotate_selected(&mut self, delta: isize) {
        let len = self.candidates.len() as isize;
        if len == 0 {
            return;
        }
        let next = (self.selected as isize + delta).rem_euclid(len);
        self.selected = next as usize;
    }

    pub fn select_index(&mut self, index: usize) {
        if index < self.candidates.len() {
            self.selected = index;
        }
    }

    /// Selects the candidate matching `value`, returning whether one was found.
    pub fn select_value(&mut self, value: &str) -> bool {
        if let Some(i) = self.candidates.iter().position(|u| u.value == value) {
            self.selected = i;
            true
        } else {
            false
        }
    }

    pub fn set_override_score(&mut self, score: f32) {
        self.override_score = Some(score);
    }

    pub fn clear_override(&mut self) {
        self.override_score = None;
    }

    pub fn pin(&mut self) {
        self.pinned = true;
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Override score if set this cycle; else the selected candidate's score.
    pub fn effective_score(&self) -> f32 {
        self.override_score.unwrap_or(self.candidates[self.selected].score)
    }
}

pub struct Grid {
    readings: Vec<String>,
    cursor: usize,
    nodes: AHashMap<(usize, usize), Node>,
    max_span: usize,
}

impl Grid {
    pub fn new(max_span: usize) -> Self {
        Grid { readings: Vec::new(), cursor: 0, nodes: AHashMap::new(), max_span: max_span.max(1) }
    }

    pub fn width(&self) -> usize {
        self.readings.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = pos.min(self.width());
    }

    pub fn readings(&self) -> &[String] {
        &self.readings
    }

    pub fn node(&self, start: usize, length: usize) -> Option<&Node> {
        self.nodes.get(&(start, length))
    }

    pub fn node_mut(&mut self, start: usize, length: usize) -> Option<&mut Node> {
        self.nodes.get_mut(&(start, length))
    }

    /// All nodes whose span touches grid index `i`, used for candidate enumeration.
    pub fn nodes_crossing_or_ending_at(&self, i: usize) -> Vec<&Node> {
        let mut out: Vec<&Node> =
            self.nodes.values().filter(|n| n.start <= i && i <= n.start + n.length).collect();
        out.sort_by(|a, b| a.start.cmp(&b.start).then(a.length.cmp(&b.length)));
        out
    }

    pub fn insert_reading_at_cursor(&mut self, key: String, lookup: impl Fn(&str) -> Vec<Unigram>) {
        self.readings.insert(self.cursor, key);
        self.cursor += 1;
        self.rebuild_nodes(&lookup);
    }

    pub fn delete_reading_before_cursor(&mut self, lookup: impl Fn(&str) -> Vec<Unigram>) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.readings.remove(self.cursor - 1);
        self.cursor -= 1;
        self.rebuild_nodes(&lookup);
        true
    }

    pub fn delete_reading_after_cursor(&mut self, lookup: impl Fn(&str) -> Vec<Unigram>) -> bool {
        if self.cursor >= self.readings.len() {
            return false;
        }
        self.readings.remove(self.cursor);
        self.rebuild_nodes(&lookup);
        true
    }

    /// Evicts the oldest `n` readings, keeping the cursor meaningful relative to the
    /// remaining ones.
    pub fn remove_head_readings(&mut self, n: usize, lookup: impl Fn(&str) -> Vec<Unigram>) -> Vec<String> {
        let n = n.min(self.readings.len());
        let evicted: Vec<String> = self.readings.drain(0..n).collect();
        self.cursor = self.cursor.saturating_sub(n);
        self.rebuild_nodes(&lookup);
        evicted
    }

    pub fn clear(&mut self) {
        self.readings.clear();
        self.cursor = 0;
        self.nodes.clear();
    }

    fn rebuild_nodes(&mut self, lookup: &impl Fn(&str) -> Vec<Unigram>) {
        self.nodes.clear();
        let width = self.readings.len();
        for start in 0..width {
            let max_len = self.max_span.min(width - start);
            for length in 1..=max_len {
                let span = &self.readings[start..start + length];
                let key = join_readings(span.iter().map(String::as_str));
                let mut candidates = lookup(&key);
                if candidates.is_empty() {
                    if length != 1 {
                        continue;
                    }
                    candidates.push(Unigram {
                        key: key.clone(),
                        value: key.clone(),
                        score: LITERAL_FALLBACK_SCORE,
                    });
                }
                candidates.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.value.cmp(&b.value))
                });
                self.nodes.insert(
                    (start, length),
                    Node { start, length, candidates, selected: 0, override_score: None, pinned: false },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_fixture(key: &str) -> Vec<Unigram> {
        match key {
            "ni3" => vec![Unigram { key: key.into(), value: "你".into(), score: -2.0 }],
            "hao3" => vec![Unigram { key: key.into(), value: "好".into(), score: -2.5 }],
            "ni3-hao3" => vec![Unigram { key: key.into(), value: "你好".into(), score: -1.0 }],
            _ => Vec::new(),
        }
    }

    #[test]
    fn materializes_nodes_spanning_consecutive_readings() {
        let mut grid = Grid::new(4);
        grid.insert_reading_at_cursor("ni3".into(), lookup_fixture);
        grid.insert_reading_at_cursor("hao3".into(), lookup_fixture);
        assert!(grid.node(0, 1).is_some());
        assert!(grid.node(1, 1).is_some());
        assert!(grid.node(0, 2).is_some());
        assert_eq!(grid.node(0, 2).unwrap().selected_candidate().value, "你好");
    }

    #[test]
    fn unknown_reading_falls_back_to_literal() {
        let mut grid = Grid::new(4);
        grid.insert_reading_at_cursor("zzz".into(), lookup_fixture);
        let node = grid.node(0, 1).unwrap();
        assert_eq!(node.selected_candidate().value, "zzz");
    }

    #[test]
    fn head_eviction_returns_evicted_readings() {
        let mut grid = Grid::new(4);
        grid.insert_reading_at_cursor("ni3".into(), lookup_fixture);
        grid.insert_reading_at_cursor("hao3".into(), lookup_fixture);
        let evicted = grid.remove_head_readings(1, lookup_fixture);
        assert_eq!(evicted, vec!["ni3".to_string()]);
        assert_eq!(grid.width(), 1);
    }
}
