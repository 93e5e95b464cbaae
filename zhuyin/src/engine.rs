//! Assembles a ready-to-drive key handler from a [`ZhuyinConfig`] and a pair of
//! dictionary collaborators, the way the teacher's `create_ime_engine_standard` /
//! `create_ime_engine_eten` / `create_ime_engine_hsu` factories assembled a `Model`
//! from a lexicon, n-gram model and user dictionary.

use zhuyin_engine_core::clock::SystemClock;
use zhuyin_engine_core::lm::{LanguageModelFacade, OutputConverter, UnigramSource, UserPhraseStore};
use zhuyin_engine_core::syllable::Layout;
use zhuyin_engine_core::KeyHandler;

use crate::config::ZhuyinConfig;

/// A key handler wired to a runtime-selected layout; the `Box<dyn Layout>` is what
/// lets `ZhuyinConfig::layout` pick a keyboard at startup rather than at compile time.
pub type Engine<U, S> = KeyHandler<Box<dyn Layout>, U, S, SystemClock>;

pub fn build_engine<U, S>(
    config: ZhuyinConfig,
    user: U,
    static_dict: S,
    converter: Option<Box<dyn OutputConverter>>,
) -> Engine<U, S>
where
    U: UserPhraseStore,
    S: UnigramSource,
{
    let mut lm = LanguageModelFacade::new(user, static_dict);
    if let Some(converter) = converter {
        lm = lm.with_converter(converter);
    }
    let layout = config.layout.build();
    KeyHandler::new(layout, lm, SystemClock, config.base)
}
