//! A tagged-text pipeline: a [`TextTagger`] emits [`TaggedFragment`]s over a
//! document, and [`TaggedText`]'s three layers (lazy evaluation, single-entry
//! caching, windowed clipping) turn that stream into random-access lookups
//! suitable for, say, rendering syntax highlighting one screen at a time.

mod fragment;
mod tagger;
mod view;

pub use fragment::{FragmentMap, TaggedFragment};
pub use tagger::{ProxyTagger, TextTagger, UpdateId};
pub use view::{CacheTaggedText, LazyTaggedText, TaggedText, TaggedTextView};
