//! zhuyin-engine-core
//!
//! The composition engine for a Bopomofo/Zhuyin input method: a key-driven state
//! machine (C6) built on a syllable assembler (C1), a language-model facade (C2),
//! a grid of candidate nodes (C3), a Viterbi walker (C4), and a user-override
//! cache (C5). Every collaborator that is specific to a concrete keyboard layout,
//! dictionary format, or output script is a trait here, implemented by a
//! downstream crate such as `zhuyin-engine`.

pub mod candidate;
pub mod clock;
pub mod config;
pub mod error;
pub mod grid;
pub mod key;
pub mod key_handler;
pub mod lm;
pub mod syllable;
pub mod user_override;
pub mod walker;

pub use candidate::{CandidateController, Orientation};
pub use clock::{Clock, SystemClock};
pub use config::{Config, LetterMode, SelectPhrase};
pub use error::{ConfigError, EngineError};
pub use grid::{Grid, Node};
pub use key::{join_readings, split_joined_key};
pub use key_handler::{HandleOutcome, KeyEvent, KeyHandler, KeyName, NotEmpty, State};
pub use lm::{LanguageModelFacade, OutputConverter, Unigram, UnigramSource, UserPhraseStore};
pub use syllable::{Layout, SyllableAssembler};
pub use user_override::{context_key, OverrideCache};
pub use walker::{dump_paths, walk, NodeAnchor};
