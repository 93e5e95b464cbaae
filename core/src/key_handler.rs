//! Key handler (C6): the central state machine. Consumes `(Key, CurrentState)` and
//! produces a `NewState`, orchestrating the syllable assembler (C1), grid (C3),
//! walker (C4), and override cache (C5) on every reading or cursor mutation.

use tracing::{debug, warn};

use crate::candidate::{CandidateController, Orientation};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::EngineError;
use crate::grid::Grid;
use crate::key::join_readings;
use crate::lm::{LanguageModelFacade, UnigramSource, UserPhraseStore};
use crate::syllable::{Layout, SyllableAssembler};
use crate::user_override::{context_key, OverrideCache};
use crate::walker::{self, NodeAnchor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    Ascii,
    Unknown,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Backspace,
    Delete,
    Return,
    Esc,
    Space,
    Tab,
    PageUp,
    PageDown,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub ascii: Option<char>,
    pub name: KeyName,
    pub shift: bool,
    pub ctrl: bool,
}

impl KeyEvent {
    pub fn ascii(ch: char) -> Self {
        KeyEvent { ascii: Some(ch), name: KeyName::Ascii, shift: false, ctrl: false }
    }

    pub fn named(name: KeyName) -> Self {
        KeyEvent { ascii: None, name, shift: false, ctrl: false }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Fields common to the three non-empty states.
#[derive(Debug, Clone, PartialEq)]
pub struct NotEmpty {
    pub buffer: String,
    pub cursor: usize,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Empty,
    EmptyIgnoringPrevious,
    Committing { text: String },
    Inputting { base: NotEmpty, evicted_text: String },
    ChoosingCandidate { base: NotEmpty, candidates: Vec<String> },
    Marking {
        base: NotEmpty,
        mark_start: usize,
        head: String,
        marked: String,
        tail: String,
        reading: String,
        acceptable: bool,
    },
}

pub enum HandleOutcome {
    /// Empty state plus a key nothing recognizes: the host should treat it as
    /// un-consumed and pass it through to the application.
    NotConsumed,
    Consumed { state: State, error: Option<EngineError> },
}

enum Mode {
    Normal,
    ChoosingCandidate,
    Marking { mark_start: usize },
}

pub struct KeyHandler<L, U, S, C> {
    config: Config,
    syllable: SyllableAssembler<L>,
    grid: Grid,
    lm: LanguageModelFacade<U, S>,
    overrides: OverrideCache,
    candidates: CandidateController,
    clock: C,
    mode: Mode,
    walked: Vec<NodeAnchor>,
}

impl<L, U, S, C> KeyHandler<L, U, S, C>
where
    L: Layout,
    U: UserPhraseStore,
    S: UnigramSource,
    C: Clock,
{
    pub fn new(layout: L, lm: LanguageModelFacade<U, S>, clock: C, config: Config) -> Self {
        let candidates = CandidateController::new(config.candidate_keys(), Orientation::Horizontal);
        let overrides = OverrideCache::new(
            config.override_cache_capacity,
            config.override_half_life_secs,
            config.override_suggest_threshold,
            config.min_override_score,
        );
        KeyHandler {
            grid: Grid::new(config.max_node_span),
            syllable: SyllableAssembler::new(layout),
            lm,
            overrides,
            candidates,
            clock,
            mode: Mode::Normal,
            walked: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn is_fully_empty(&self) -> bool {
        self.syllable.is_empty() && self.grid.width() == 0
    }

    fn lookup(&self, key: &str) -> Vec<crate::lm::Unigram> {
        self.lm.unigrams_for(key)
    }

    fn rewalk(&mut self) {
        self.walked = walker::walk(&self.grid);
    }

    pub fn reset(&mut self) {
        self.syllable.clear();
        self.grid.clear();
        self.candidates.clear();
        self.walked.clear();
        self.mode = Mode::Normal;
    }

    /// Entry point: consumes one key event, returning the new state (or `NotConsumed`).
    pub fn handle(&mut self, key: KeyEvent) -> HandleOutcome {
        let outcome = match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Marking { mark_start } => self.handle_marking(key, mark_start),
            Mode::ChoosingCandidate => self.handle_choosing_candidate(key),
            Mode::Normal => self.handle_normal(key),
        };
        if let HandleOutcome::Consumed { state, error } = &outcome {
            debug!(state = state_name(state), "handled key");
            if let Some(e) = error {
                warn!(%e, "non-fatal engine error");
            }
        }
        outcome
    }

    fn handle_normal(&mut self, key: KeyEvent) -> HandleOutcome {
        if let (Some(ch), KeyName::Ascii) = (key.ascii, key.name) {
            if ch != '`' && self.syllable.is_valid_key(ch) {
                return self.handle_reading_key(ch);
            }
        }

        match key.name {
            KeyName::Space if key.shift => self.handle_shift_space(),
            KeyName::Space | KeyName::Down
                if self.syllable.is_empty() && !self.is_fully_empty() =>
            {
                self.enter_choosing_candidate()
            }
            KeyName::Esc => self.handle_esc(),
            KeyName::Tab if self.syllable.is_empty() => self.handle_tab(key.shift),
            KeyName::Left | KeyName::Right | KeyName::Up | KeyName::Down
            | KeyName::Home | KeyName::End => self.handle_motion(key),
            KeyName::Backspace | KeyName::Delete => {
                self.handle_delete(key.name == KeyName::Delete)
            }
            KeyName::Return => self.handle_enter(),
            KeyName::Ascii if key.ascii == Some('`') => self.handle_backtick(),
            KeyName::Ascii => self.handle_other_ascii(key.ascii.unwrap()),
            _ => self.handle_unhandled(),
        }
    }

    fn handle_unhandled(&mut self) -> HandleOutcome {
        if self.is_fully_empty() {
            HandleOutcome::NotConsumed
        } else {
            HandleOutcome::Consumed {
                state: self.current_state(String::new()),
                error: Some(EngineError::InvalidKeyForState),
            }
        }
    }

    // ---- Rule 1: reading-legal key ----

    fn handle_reading_key(&mut self, ch: char) -> HandleOutcome {
        self.syllable.combine_key(ch);
        if !self.syllable.has_tone_marker() {
            return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
        }
        self.compose_current_syllable()
    }

    fn compose_current_syllable(&mut self) -> HandleOutcome {
        let Some(key) = self.syllable.composed_string() else {
            return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
        };
        self.syllable.clear();

        if !self.lm.has_unigrams_for(&key) {
            let error = Some(EngineError::NoUnigramsForReading);
            return if self.grid.width() == 0 {
                self.mode = Mode::Normal;
                HandleOutcome::Consumed { state: State::EmptyIgnoringPrevious, error }
            } else {
                HandleOutcome::Consumed { state: self.current_state(String::new()), error }
            };
        }

        let mut evicted_text = String::new();
        if self.grid.width() >= self.config.composing_buffer_size() {
            let evicted = self.grid.remove_head_readings(1, |k| self.lm.unigrams_for(k));
            evicted_text = self.evicted_display_text(&evicted);
        }
        self.grid.insert_reading_at_cursor(key, |k| self.lm.unigrams_for(k));
        self.rewalk();
        self.apply_override_suggestion();
        self.fix_pinned_candidates();

        if self.config.traditional_mode {
            self.open_candidates_at_cursor();
            if self.candidates.current_page_candidates().len() == 1 {
                let text = self.candidates.selected().unwrap_or_default().to_string();
                self.reset();
                return HandleOutcome::Consumed { state: State::Committing { text }, error: None };
            }
            self.mode = Mode::ChoosingCandidate;
            return HandleOutcome::Consumed { state: self.emit_choosing_candidate(), error: None };
        }

        HandleOutcome::Consumed { state: self.current_state(evicted_text), error: None }
    }

    fn evicted_display_text(&self, evicted: &[String]) -> String {
        join_readings(evicted.iter().map(String::as_str))
    }

    fn apply_override_suggestion(&mut self) {
        let cursor = self.grid.cursor();
        let Some(node) = self.grid.nodes_crossing_or_ending_at(cursor).into_iter().max_by_key(|n| n.length) else { return };
        let (start, length) = (node.start, node.length);
        let values: Vec<&str> =
            self.walked.iter().map(|a| self.grid.node(a.start, a.length).unwrap().selected_candidate().value.as_str()).collect();
        let Some(ctx) = context_key(&values, &self.walked, cursor.min(self.grid.width().saturating_sub(1))) else { return };
        let now = self.clock.now_secs();
        let Some(suggestion) = self.overrides.suggest(&ctx, now) else { return };
        let max_score = self
            .grid
            .node(start, length)
            .map(|n| n.candidates().iter().map(|u| u.score).fold(f32::NEG_INFINITY, f32::max))
            .unwrap_or(0.0);
        if let Some(node) = self.grid.node_mut(start, length) {
            if node.select_value(&suggestion) {
                node.set_override_score(max_score + f32::EPSILON);
                self.rewalk();
            }
        }
    }

    /// §4.6.1: pins the selected candidate of every walked anchor whose left edge is
    /// further than `pin_beyond_distance` from the right end, so a future re-walk
    /// cannot silently change long-settled history.
    fn fix_pinned_candidates(&mut self) {
        let width = self.grid.width();
        let threshold = self.config.pin_beyond_distance;
        for anchor in self.walked.clone() {
            if width.saturating_sub(anchor.start) > threshold {
                if let Some(node) = self.grid.node_mut(anchor.start, anchor.length) {
                    if !node.is_pinned() {
                        node.pin();
                    }
                }
            }
        }
    }

    // ---- Rule 2: Shift+Space ----

    fn handle_shift_space(&mut self) -> HandleOutcome {
        if self.config.letter_mode == crate::config::LetterMode::Lower {
            self.grid.insert_reading_at_cursor(" ".to_string(), |k| self.lm.unigrams_for(k));
            self.rewalk();
            HandleOutcome::Consumed { state: self.current_state(String::new()), error: None }
        } else {
            let text = format!("{} ", self.current_buffer_text());
            self.reset();
            HandleOutcome::Consumed { state: State::Committing { text }, error: None }
        }
    }

    // ---- Rule 3: open candidates ----

    fn enter_choosing_candidate(&mut self) -> HandleOutcome {
        self.mode = Mode::ChoosingCandidate;
        self.open_candidates_at_cursor();
        HandleOutcome::Consumed { state: self.emit_choosing_candidate(), error: None }
    }

    /// §4.6.2: the cursor used for candidate lookup.
    fn actual_candidate_cursor_index(&self) -> usize {
        let cursor = self.grid.cursor();
        let width = self.grid.width();
        match self.config.select_phrase {
            crate::config::SelectPhrase::AfterCursor if cursor < width => cursor + 1,
            crate::config::SelectPhrase::BeforeCursor if cursor == 0 && width > 0 => cursor + 1,
            _ => cursor,
        }
    }

    fn open_candidates_at_cursor(&mut self) {
        let i = self.actual_candidate_cursor_index();
        let node = self
            .grid
            .nodes_crossing_or_ending_at(i)
            .into_iter()
            .max_by_key(|n| n.length)
            .map(|n| (n.start, n.length));
        let values = match node {
            Some((start, length)) => self
                .grid
                .node(start, length)
                .map(|n| n.candidates().iter().map(|u| u.value.clone()).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        self.candidates.set_candidates(values);
    }

    fn emit_choosing_candidate(&self) -> State {
        let base = self.build_not_empty(String::new());
        State::ChoosingCandidate {
            base,
            candidates: self.candidates.current_page_candidates().to_vec(),
        }
    }

    fn handle_choosing_candidate(&mut self, key: KeyEvent) -> HandleOutcome {
        let selected = match key.name {
            // Horizontal layout: Left/Right step through the page, Up/Down page.
            // Vertical layout: the mapping flips, Up/Down step, Left/Right page.
            KeyName::Left if !self.candidates.is_vertical() => {
                self.candidates.prev_item();
                None
            }
            KeyName::Right if !self.candidates.is_vertical() => {
                self.candidates.next_item();
                None
            }
            KeyName::Up if !self.candidates.is_vertical() => {
                self.candidates.page_up();
                None
            }
            KeyName::Down if !self.candidates.is_vertical() => {
                self.candidates.page_down();
                None
            }
            KeyName::Up if self.candidates.is_vertical() => {
                self.candidates.prev_item();
                None
            }
            KeyName::Down if self.candidates.is_vertical() => {
                self.candidates.next_item();
                None
            }
            KeyName::Left if self.candidates.is_vertical() => {
                self.candidates.page_up();
                None
            }
            KeyName::Right if self.candidates.is_vertical() => {
                self.candidates.page_down();
                None
            }
            KeyName::PageUp => {
                self.candidates.page_up();
                None
            }
            KeyName::PageDown => {
                self.candidates.page_down();
                None
            }
            KeyName::Home => {
                self.candidates.home();
                None
            }
            KeyName::End => {
                self.candidates.last();
                None
            }
            KeyName::Esc => {
                self.mode = Mode::Normal;
                return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
            }
            KeyName::Return | KeyName::Space => self.candidates.selected().map(str::to_string),
            KeyName::Ascii => key.ascii.and_then(|c| self.candidates.selected_candidate_with_key(c)).map(str::to_string),
            _ => {
                return HandleOutcome::Consumed {
                    state: self.emit_choosing_candidate(),
                    error: Some(EngineError::InvalidKeyForState),
                }
            }
        };

        if let Some(value) = selected {
            self.pin_node(&value, true);
            self.mode = Mode::Normal;
            return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
        }

        self.mode = Mode::ChoosingCandidate;
        HandleOutcome::Consumed { state: self.emit_choosing_candidate(), error: None }
    }

    // ---- §4.6.5: pin selection ----

    fn pin_node(&mut self, candidate: &str, use_move_cursor: bool) {
        let i = self.actual_candidate_cursor_index();
        let Some((start, length)) = self
            .grid
            .nodes_crossing_or_ending_at(i)
            .into_iter()
            .max_by_key(|n| n.length)
            .map(|n| (n.start, n.length))
        else {
            return;
        };
        let mut pinned_score = 0.0;
        if let Some(node) = self.grid.node_mut(start, length) {
            if node.select_value(candidate) {
                node.pin();
                pinned_score = node.selected_candidate().score;
            }
        }
        if pinned_score > self.config.min_override_score {
            let values: Vec<&str> = self
                .walked
                .iter()
                .map(|a| self.grid.node(a.start, a.length).unwrap().selected_candidate().value.as_str())
                .collect();
            if let Some(ctx) = context_key(&values, &self.walked, start) {
                let now = self.clock.now_secs();
                self.overrides.observe(&ctx, candidate, pinned_score, now);
            }
        }
        self.rewalk();
        if use_move_cursor && self.config.move_cursor {
            self.grid.set_cursor(start + length);
        }
    }

    // ---- Rule 4: ESC ----

    fn handle_esc(&mut self) -> HandleOutcome {
        if self.is_fully_empty() {
            return HandleOutcome::Consumed { state: State::Empty, error: None };
        }
        if self.config.esc_clears_buffer {
            self.reset();
            return HandleOutcome::Consumed { state: State::EmptyIgnoringPrevious, error: None };
        }
        if !self.syllable.is_empty() {
            self.syllable.clear();
            let state = if self.is_fully_empty() { State::EmptyIgnoringPrevious } else { self.current_state(String::new()) };
            return HandleOutcome::Consumed { state, error: None };
        }
        HandleOutcome::Consumed { state: self.current_state(String::new()), error: None }
    }

    // ---- Rule 5: Tab ----

    fn handle_tab(&mut self, shift: bool) -> HandleOutcome {
        let i = self.actual_candidate_cursor_index();
        let Some((start, length)) = self
            .grid
            .nodes_crossing_or_ending_at(i)
            .into_iter()
            .max_by_key(|n| n.length)
            .map(|n| (n.start, n.length))
        else {
            return HandleOutcome::Consumed {
                state: self.current_state(String::new()),
                error: Some(EngineError::InvalidKeyForState),
            };
        };
        let delta: isize = if shift { -1 } else { 1 };
        let value = {
            let node = self.grid.node_mut(start, length).unwrap();
            if !node.is_pinned() {
                // First manual choice: land on candidate[0], or candidate[1] if that
                // equals the already-selected (highest-score) one.
                let current = node.selected_index();
                let target = if current == 0 { 1.min(node.candidates().len() - 1) } else { 0 };
                node.select_index(if shift { node.candidates().len() - 1 } else { target });
            } else {
                node.rotate_selected(delta);
            }
            node.pin();
            node.selected_candidate().value.clone()
        };
        self.rewalk();
        let _ = value;
        HandleOutcome::Consumed { state: self.current_state(String::new()), error: None }
    }

    // ---- Rule 6: motion ----

    fn handle_motion(&mut self, key: KeyEvent) -> HandleOutcome {
        let width = self.grid.width();
        let cursor = self.grid.cursor();
        let prior_anchor = self.anchor_at(cursor);
        let new_cursor = match key.name {
            KeyName::Left => cursor.checked_sub(1),
            KeyName::Right => if cursor < width { Some(cursor + 1) } else { None },
            KeyName::Home => Some(0),
            KeyName::End => Some(width),
            KeyName::Up | KeyName::Down => None,
            _ => None,
        };
        let Some(new_cursor) = new_cursor else {
            return HandleOutcome::Consumed {
                state: self.current_state(String::new()),
                error: Some(EngineError::CursorAtBoundary),
            };
        };
        self.grid.set_cursor(new_cursor);
        if key.shift && prior_anchor.map(|a| a.start) != self.anchor_at(new_cursor).map(|a| a.start) {
            let mark_start = cursor;
            self.mode = Mode::Marking { mark_start };
            return HandleOutcome::Consumed { state: self.build_marking_state(mark_start), error: None };
        }
        self.mode = Mode::Normal;
        HandleOutcome::Consumed { state: self.current_state(String::new()), error: None }
    }

    /// The anchor a grid-cursor *gap* belongs to: half-open on the right, so a gap
    /// shared by two adjacent anchors resolves to the one starting there rather than
    /// the one ending there — except at the right edge of the whole buffer, where
    /// there is no anchor starting, so it resolves to the last one instead.
    fn anchor_at(&self, pos: usize) -> Option<NodeAnchor> {
        self.walked
            .iter()
            .find(|a| pos >= a.start && (pos < a.end() || (pos == a.end() && pos == self.grid.width())))
            .copied()
    }

    // ---- Rule 7: Backspace / Delete ----

    fn handle_delete(&mut self, is_delete: bool) -> HandleOutcome {
        if self.syllable.has_tone_marker_only() {
            self.syllable.clear();
            return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
        }
        if self.syllable.is_empty() {
            let ok = if is_delete {
                self.grid.delete_reading_after_cursor(|k| self.lm.unigrams_for(k))
            } else {
                self.grid.delete_reading_before_cursor(|k| self.lm.unigrams_for(k))
            };
            if !ok {
                return HandleOutcome::Consumed {
                    state: self.current_state(String::new()),
                    error: Some(EngineError::DeleteAtBoundary),
                };
            }
            self.rewalk();
        } else if is_delete {
            return HandleOutcome::Consumed {
                state: self.current_state(String::new()),
                error: Some(EngineError::DeleteWhileReadingActive),
            };
        } else {
            self.syllable.backspace();
        }

        if self.is_fully_empty() {
            self.mode = Mode::Normal;
            HandleOutcome::Consumed { state: State::EmptyIgnoringPrevious, error: None }
        } else {
            HandleOutcome::Consumed { state: self.current_state(String::new()), error: None }
        }
    }

    // ---- Rule 8: Enter ----

    fn handle_enter(&mut self) -> HandleOutcome {
        if self.is_fully_empty() {
            return HandleOutcome::Consumed { state: State::Empty, error: None };
        }
        let text = self.current_buffer_text();
        self.reset();
        HandleOutcome::Consumed { state: State::Committing { text }, error: None }
    }

    fn handle_marking(&mut self, key: KeyEvent, mark_start: usize) -> HandleOutcome {
        if let KeyName::Return = key.name {
            let (reading_key, phrase, acceptable) = self.marking_commit_fields(mark_start);
            if acceptable {
                self.lm.add_user_phrase(&reading_key, &phrase);
                self.mode = Mode::Normal;
                return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
            } else {
                self.mode = Mode::Marking { mark_start };
                return HandleOutcome::Consumed {
                    state: self.build_marking_state(mark_start),
                    error: Some(EngineError::MarkingNotAcceptable),
                };
            }
        }
        if let KeyName::Esc = key.name {
            self.mode = Mode::Normal;
            return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
        }
        if key.shift {
            if let Some(outcome) = self.continue_marking(key, mark_start) {
                return outcome;
            }
        }
        // Shift-less motion, or a key `continue_marking` doesn't handle, falls back to
        // ordinary motion handling: it exits Marking (no shift) or starts a fresh one.
        self.mode = Mode::Normal;
        self.handle_motion(key)
    }

    /// Extends or shrinks the existing mark while Shift stays held, preserving the
    /// original `mark_start` rather than re-deriving it from the anchor the cursor
    /// happens to leave on this particular key, the way `handle_motion` does for a
    /// first Shift+arrow.
    fn continue_marking(&mut self, key: KeyEvent, mark_start: usize) -> Option<HandleOutcome> {
        let width = self.grid.width();
        let cursor = self.grid.cursor();
        let new_cursor = match key.name {
            KeyName::Left => cursor.checked_sub(1),
            KeyName::Right if cursor < width => Some(cursor + 1),
            KeyName::Home => Some(0),
            KeyName::End => Some(width),
            _ => return None,
        };
        let Some(new_cursor) = new_cursor else {
            self.mode = Mode::Marking { mark_start };
            return Some(HandleOutcome::Consumed {
                state: self.build_marking_state(mark_start),
                error: Some(EngineError::CursorAtBoundary),
            });
        };
        self.grid.set_cursor(new_cursor);
        if new_cursor == mark_start {
            self.mode = Mode::Normal;
            return Some(HandleOutcome::Consumed { state: self.current_state(String::new()), error: None });
        }
        self.mode = Mode::Marking { mark_start };
        Some(HandleOutcome::Consumed { state: self.build_marking_state(mark_start), error: None })
    }

    // ---- §4.6.4: marking construction ----

    /// The reading key and surface phrase for a would-be user phrase, and whether
    /// §4.6.4's length/novelty rule accepts it.
    fn marking_commit_fields(&self, mark_start: usize) -> (String, String, bool) {
        let cursor = self.grid.cursor();
        let (lo, hi) = (mark_start.min(cursor), mark_start.max(cursor));
        let readings = &self.grid.readings()[lo.min(self.grid.width())..hi.min(self.grid.width())];
        let reading_storage_key = join_readings(readings.iter().map(String::as_str));
        let full = self.current_buffer_text();
        let phrase: String = full.chars().skip(lo).take(hi - lo).collect();
        let acceptable =
            (2..=6).contains(&readings.len()) && !self.lm.has_unigrams_for(&reading_storage_key);
        (reading_storage_key, phrase, acceptable)
    }

    fn build_marking_state(&self, mark_start: usize) -> State {
        let cursor = self.grid.cursor();
        let (lo, hi) = (mark_start.min(cursor), mark_start.max(cursor));
        let full = self.current_buffer_text();
        let head: String = full.chars().take(lo).collect();
        let tail: String = full.chars().skip(hi).collect();
        let marked: String = full.chars().skip(lo).take(hi - lo).collect();
        let readings = &self.grid.readings()[lo.min(self.grid.width())..hi.min(self.grid.width())];
        let reading_ui = readings.join(" ");
        let reading_storage_key = join_readings(readings.iter().map(String::as_str));
        let acceptable = (2..=6).contains(&readings.len()) && !self.lm.has_unigrams_for(&reading_storage_key);
        State::Marking {
            base: NotEmpty { buffer: full, cursor, tooltip: String::new() },
            mark_start,
            head,
            marked,
            tail,
            reading: reading_ui,
            acceptable,
        }
    }

    // ---- Rule 9: backtick ----

    fn handle_backtick(&mut self) -> HandleOutcome {
        if !self.syllable.is_empty() {
            return HandleOutcome::Consumed {
                state: self.current_state(String::new()),
                error: Some(EngineError::InvalidKeyForState),
            };
        }
        let key = "_punctuation_list".to_string();
        if !self.lm.has_unigrams_for(&key) {
            return HandleOutcome::Consumed {
                state: self.current_state(String::new()),
                error: Some(EngineError::NoUnigramsForReading),
            };
        }
        self.grid.insert_reading_at_cursor(key, |k| self.lm.unigrams_for(k));
        self.rewalk();
        self.enter_choosing_candidate()
    }

    // ---- Rule 10: other ASCII ----

    fn handle_other_ascii(&mut self, ch: char) -> HandleOutcome {
        let layout_key = format!("_punctuation_{}_{ch}", self.syllable.layout_name());
        let generic_key = format!("_punctuation_{ch}");
        let key = if self.lm.has_unigrams_for(&layout_key) {
            Some(layout_key)
        } else if self.lm.has_unigrams_for(&generic_key) {
            Some(generic_key)
        } else {
            None
        };

        if let Some(key) = key {
            self.grid.insert_reading_at_cursor(key, |k| self.lm.unigrams_for(k));
            self.rewalk();
            self.fix_pinned_candidates();
            return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
        }

        if ch.is_ascii_alphabetic() {
            if self.config.letter_mode == crate::config::LetterMode::Lower {
                let letter_key = format!("_letter_{ch}");
                self.grid.insert_reading_at_cursor(letter_key, |k| self.lm.unigrams_for(k));
                self.rewalk();
                return HandleOutcome::Consumed { state: self.current_state(String::new()), error: None };
            }
            let text = format!("{}{ch}", self.current_buffer_text());
            self.reset();
            return HandleOutcome::Consumed { state: State::Committing { text }, error: None };
        }

        HandleOutcome::Consumed {
            state: self.current_state(String::new()),
            error: Some(EngineError::InvalidKeyForState),
        }
    }

    // ---- §4.6.3: composing-buffer construction ----

    fn current_buffer_text(&self) -> String {
        self.walked
            .iter()
            .map(|a| self.grid.node(a.start, a.length).unwrap().selected_candidate().value.clone())
            .collect()
    }

    fn build_not_empty(&self, evicted_prefix: String) -> NotEmpty {
        let _ = evicted_prefix;
        let grid_cursor = self.grid.cursor();
        let mut running_index = 0usize;
        let mut buffer = String::new();
        let mut utf8_cursor = 0usize;
        let mut tooltip = String::new();
        let mut cursor_set = false;

        for anchor in &self.walked {
            let node = self.grid.node(anchor.start, anchor.length).unwrap();
            let value = &node.selected_candidate().value;
            buffer.push_str(value);

            if !cursor_set {
                if running_index + anchor.length <= grid_cursor {
                    utf8_cursor = buffer.chars().count();
                } else if running_index < grid_cursor {
                    let distance = grid_cursor - running_index;
                    let codepoints = value.chars().count();
                    let take = distance.min(codepoints);
                    let before_this_node = utf8_cursor_before(&buffer, value);
                    utf8_cursor = before_this_node + take;
                    cursor_set = true;
                    if grid_cursor > 0 && grid_cursor < self.grid.width() {
                        let before = self.grid.readings().get(grid_cursor - 1).cloned().unwrap_or_default();
                        let after = self.grid.readings().get(grid_cursor).cloned().unwrap_or_default();
                        tooltip = format!("cursor between syllables {before} and {after}");
                    }
                }
            }
            running_index += anchor.length;
            if running_index == grid_cursor && !cursor_set {
                utf8_cursor = buffer.chars().count();
                cursor_set = true;
            }
        }
        if !cursor_set {
            utf8_cursor = buffer.chars().count();
        }

        NotEmpty { buffer, cursor: utf8_cursor, tooltip }
    }

    fn current_state(&self, evicted_text: String) -> State {
        if self.is_fully_empty() {
            return State::Empty;
        }
        if !self.syllable.is_empty() && self.grid.width() == 0 {
            // Still composing the first syllable: show it raw, cursor at its end.
            let raw = self.syllable.raw_buffer().to_string();
            let len = raw.chars().count();
            return State::Inputting {
                base: NotEmpty { buffer: raw, cursor: len, tooltip: String::new() },
                evicted_text,
            };
        }
        State::Inputting { base: self.build_not_empty(String::new()), evicted_text }
    }
}

fn utf8_cursor_before(buffer_so_far: &str, last_value: &str) -> usize {
    buffer_so_far.chars().count() - last_value.chars().count()
}

fn state_name(state: &State) -> &'static str {
    match state {
        State::Empty => "Empty",
        State::EmptyIgnoringPrevious => "EmptyIgnoringPrevious",
        State::Committing { .. } => "Committing",
        State::Inputting { .. } => "Inputting",
        State::ChoosingCandidate { .. } => "ChoosingCandidate",
        State::Marking { .. } => "Marking",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::lm::Unigram;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Cat {
        Initial,
        Medial,
        Final,
        Tone,
    }

    fn category(ch: char) -> Option<Cat> {
        match ch {
            's' | 'c' => Some(Cat::Initial),
            'u' => Some(Cat::Medial),
            'l' => Some(Cat::Final),
            '3' | '4' => Some(Cat::Tone),
            _ => None,
        }
    }

    fn symbol(ch: char) -> &'static str {
        match ch {
            's' => "ㄋ",
            'c' => "ㄏ",
            'u' => "ㄧ",
            'l' => "ㄠ",
            '3' => "ˇ",
            '4' => "ˋ",
            _ => "",
        }
    }

    /// A tiny fixture keyboard covering just the keys these tests need, standing in
    /// for a concrete layout so this module doesn't depend on one.
    struct FixtureLayout;

    impl Layout for FixtureLayout {
        fn is_valid_key(&self, partial: &str, ch: char) -> bool {
            let Some(cat) = category(ch) else { return false };
            match partial.chars().last().and_then(category) {
                None => cat != Cat::Tone,
                Some(Cat::Tone) => false,
                Some(prev) => cat > prev,
            }
        }

        fn combine_key(&self, partial: &str, ch: char) -> String {
            format!("{partial}{ch}")
        }

        fn is_tone_marker(&self, ch: char) -> bool {
            category(ch) == Some(Cat::Tone)
        }

        fn compose(&self, partial: &str) -> String {
            partial.chars().map(symbol).collect()
        }
    }

    #[derive(Default)]
    struct MapDict(HashMap<String, Vec<Unigram>>);

    impl UnigramSource for MapDict {
        fn lookup(&self, key: &str) -> Vec<Unigram> {
            self.0.get(key).cloned().unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct MapUserStore(RefCell<HashMap<String, Vec<Unigram>>>);

    impl UnigramSource for MapUserStore {
        fn lookup(&self, key: &str) -> Vec<Unigram> {
            self.0.borrow().get(key).cloned().unwrap_or_default()
        }
    }

    impl UserPhraseStore for MapUserStore {
        fn add_phrase(&self, key: &str, phrase: &str) {
            self.0
                .borrow_mut()
                .entry(key.to_string())
                .or_default()
                .insert(0, Unigram { key: key.to_string(), value: phrase.to_string(), score: 0.0 });
        }
    }

    fn unigram(key: &str, value: &str, score: f32) -> Unigram {
        Unigram { key: key.to_string(), value: value.to_string(), score }
    }

    fn dict() -> MapDict {
        let mut m = HashMap::new();
        m.insert("ㄋㄧˇ".to_string(), vec![unigram("ㄋㄧˇ", "你", -1.0), unigram("ㄋㄧˇ", "妳", -3.0)]);
        m.insert("ㄏㄠˇ".to_string(), vec![unigram("ㄏㄠˇ", "好", -1.0)]);
        m.insert("ㄋˋ".to_string(), vec![unigram("ㄋˋ", "之", -1.0)]);
        m.insert(
            "_punctuation_list".to_string(),
            vec![unigram("_punctuation_list", "，", -1.0), unigram("_punctuation_list", "。", -1.0)],
        );
        MapDict(m)
    }

    type TestHandler = KeyHandler<FixtureLayout, MapUserStore, MapDict, FakeClock>;

    fn handler() -> TestHandler {
        let lm = LanguageModelFacade::new(MapUserStore::default(), dict());
        KeyHandler::new(FixtureLayout, lm, FakeClock::new(0.0), Config::default())
    }

    fn press(h: &mut TestHandler, ch: char) -> State {
        match h.handle(KeyEvent::ascii(ch)) {
            HandleOutcome::Consumed { state, .. } => state,
            HandleOutcome::NotConsumed => panic!("key '{ch}' not consumed"),
        }
    }

    fn press_named(h: &mut TestHandler, name: KeyName) -> State {
        match h.handle(KeyEvent::named(name)) {
            HandleOutcome::Consumed { state, .. } => state,
            HandleOutcome::NotConsumed => panic!("key {name:?} not consumed"),
        }
    }

    fn press_shift(h: &mut TestHandler, name: KeyName) -> State {
        match h.handle(KeyEvent::named(name).with_shift()) {
            HandleOutcome::Consumed { state, .. } => state,
            HandleOutcome::NotConsumed => panic!("key {name:?} not consumed"),
        }
    }

    /// Mirrors `apply_override_suggestion`'s own context construction so a test can
    /// check what the cache would suggest at the current cursor.
    fn suggest_at_cursor(h: &mut TestHandler) -> Option<String> {
        let cursor = h.grid.cursor();
        let values: Vec<&str> =
            h.walked.iter().map(|a| h.grid.node(a.start, a.length).unwrap().selected_candidate().value.as_str()).collect();
        let ctx = context_key(&values, &h.walked, cursor.min(h.grid.width().saturating_sub(1)))?;
        let now = h.clock.now_secs();
        h.overrides.suggest(&ctx, now)
    }

    #[test]
    fn scenario_su3_composes_ni_then_opens_candidates_on_space() {
        let mut h = handler();
        press(&mut h, 's');
        press(&mut h, 'u');
        let state = press(&mut h, '3');
        match state {
            State::Inputting { base, .. } => {
                assert_eq!(base.buffer, "你");
                assert_eq!(base.cursor, 1);
            }
            other => panic!("unexpected state: {other:?}"),
        }

        let state = press_named(&mut h, KeyName::Space);
        match state {
            State::ChoosingCandidate { candidates, .. } => {
                assert!(candidates.contains(&"你".to_string()));
                assert!(candidates.contains(&"妳".to_string()));
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn scenario_backspace_walks_back_to_empty_ignoring_previous() {
        let mut h = handler();
        for ch in "su3cl3".chars() {
            press(&mut h, ch);
        }
        match h.handle(KeyEvent::named(KeyName::Backspace)) {
            HandleOutcome::Consumed { state: State::Inputting { base, .. }, .. } => {
                assert_eq!(base.buffer, "你");
                assert_eq!(base.cursor, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match h.handle(KeyEvent::named(KeyName::Backspace)) {
            HandleOutcome::Consumed { state: State::EmptyIgnoringPrevious, .. } => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn scenario_backtick_on_empty_state_opens_punctuation_palette() {
        let mut h = handler();
        match h.handle(KeyEvent::ascii('`')) {
            HandleOutcome::Consumed { state: State::ChoosingCandidate { candidates, .. }, .. } => {
                assert!(candidates.contains(&"，".to_string()));
                assert!(candidates.contains(&"。".to_string()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn scenario_hotkey_selection_is_then_suggested_by_the_override_cache() {
        let mut h = handler();
        for ch in "su3".chars() {
            press(&mut h, ch);
        }
        press_named(&mut h, KeyName::Space);

        let state = press(&mut h, '2');
        match state {
            State::Inputting { base, .. } => assert_eq!(base.buffer, "妳"),
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(suggest_at_cursor(&mut h).as_deref(), Some("妳"));
    }

    #[test]
    fn scenario_eleventh_reading_pins_the_leftmost_anchor() {
        let mut h = handler();
        for i in 0..11 {
            press(&mut h, 's');
            press(&mut h, '4');
            if i < 10 {
                assert_ne!(h.grid.node(0, 1).map(|n| n.is_pinned()), Some(true));
            }
        }
        assert_eq!(h.grid.node(0, 1).map(|n| n.is_pinned()), Some(true));
    }

    #[test]
    fn scenario_shift_right_twice_marks_a_phrase_and_enter_learns_it() {
        let mut h = handler();
        for ch in "su3cl3".chars() {
            press(&mut h, ch);
        }
        press_named(&mut h, KeyName::Home);

        press_shift(&mut h, KeyName::Right);
        let state = press_shift(&mut h, KeyName::Right);
        match state {
            State::Marking { mark_start, reading, acceptable, marked, .. } => {
                assert_eq!(mark_start, 0);
                assert_eq!(marked, "你好");
                assert_eq!(reading, "ㄋㄧˇ ㄏㄠˇ");
                assert!(acceptable);
            }
            other => panic!("unexpected state: {other:?}"),
        }

        match h.handle(KeyEvent::named(KeyName::Return)) {
            HandleOutcome::Consumed { .. } => {}
            HandleOutcome::NotConsumed => panic!("enter not consumed"),
        }
        assert!(h.lm.has_unigrams_for("ㄋㄧˇ-ㄏㄠˇ"));
        let learned = h.lm.unigrams_for("ㄋㄧˇ-ㄏㄠˇ");
        assert!(learned.iter().any(|u| u.value == "你好"));
    }
}
