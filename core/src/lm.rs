//! Language-model facade (C2): merges a static dictionary with a user-phrase map and
//! an optional output converter, following the teacher's duck-typed `SyllableParser`
//! pattern of generalizing over collaborator traits rather than a concrete struct.

use std::collections::HashSet;

/// A single (key, value, score) entry; score is a log-probability, typically negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Unigram {
    pub key: String,
    pub value: String,
    pub score: f32,
}

/// A read-only source of unigrams: the static dictionary, or the user-phrase store.
pub trait UnigramSource {
    fn lookup(&self, key: &str) -> Vec<Unigram>;

    fn contains(&self, key: &str) -> bool {
        !self.lookup(key).is_empty()
    }
}

/// A [`UnigramSource`] that can also learn a new phrase, as C6 does when a marking is
/// accepted (§4.6.8 / rule 8).
pub trait UserPhraseStore: UnigramSource {
    fn add_phrase(&self, key: &str, phrase: &str);
}

/// Converts a dictionary value before it reaches the candidate list, e.g.
/// Traditional -> Simplified.
pub trait OutputConverter {
    fn convert(&self, value: &str) -> String;
}

/// The identity unigram returned for the space key, regardless of source contents.
fn space_unigram() -> Unigram {
    Unigram { key: " ".to_string(), value: " ".to_string(), score: 0.0 }
}

/// Merges a user-phrase store and a static dictionary behind the single `unigrams_for`
/// / `has_unigrams_for` surface the key handler consumes.
pub struct LanguageModelFacade<U, S> {
    user: U,
    static_dict: S,
    converter: Option<Box<dyn OutputConverter>>,
}

impl<U: UserPhraseStore, S: UnigramSource> LanguageModelFacade<U, S> {
    pub fn new(user: U, static_dict: S) -> Self {
        LanguageModelFacade { user, static_dict, converter: None }
    }

    pub fn with_converter(mut self, converter: Box<dyn OutputConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    fn convert(&self, value: &str) -> String {
        match &self.converter {
            Some(c) => c.convert(value),
            None => value.to_string(),
        }
    }

    /// User entries first (forced to score 0), then static entries, deduplicated by
    /// value with the first occurrence (the user's) winning.
    pub fn unigrams_for(&self, key: &str) -> Vec<Unigram> {
        if key == " " {
            return vec![space_unigram()];
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for u in self.user.lookup(key) {
            if seen.insert(u.value.clone()) {
                out.push(Unigram { key: u.key, value: self.convert(&u.value), score: 0.0 });
            }
        }
        for u in self.static_dict.lookup(key) {
            if seen.insert(u.value.clone()) {
                out.push(Unigram { value: self.convert(&u.value), ..u });
            }
        }
        out
    }

    pub fn has_unigrams_for(&self, key: &str) -> bool {
        key == " " || self.user.contains(key) || self.static_dict.contains(key)
    }

    pub fn add_user_phrase(&self, key: &str, phrase: &str) {
        self.user.add_phrase(key, phrase);
    }
}
