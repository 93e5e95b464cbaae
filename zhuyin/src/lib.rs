//! # zhuyin-engine
//!
//! The Bopomofo/Zhuyin collaborator crate for `zhuyin-engine-core`: concrete keyboard
//! layouts (Standard, ETen, Hsu, ETen26, IBM, and romanized Hanyu Pinyin entry), a
//! static-dictionary loader, an in-memory user-phrase store, an optional
//! Traditional/Simplified converter, and the glue that assembles them into a ready
//! engine.

pub mod bopomofo;
pub mod config;
pub mod converter;
pub mod dictionary;
pub mod engine;
pub mod layout;
pub mod pinyin_layout;
pub mod user_phrase;

pub use config::{LayoutKind, ZhuyinConfig};
pub use converter::TableConverter;
pub use dictionary::StaticDictionary;
pub use engine::{build_engine, Engine};
pub use user_phrase::MemoryUserPhraseStore;
