//! Three layered read-only views over a tagged text: [`LazyTaggedText`]
//! drives a [`crate::TextTagger`] on demand, [`CacheTaggedText`] memoizes
//! the last lookup, and [`TaggedTextView`] clips and translates into a
//! rectangular sub-region's own coordinates.

use sloked_text::TextPosition;

use crate::fragment::{FragmentMap, TaggedFragment};
use crate::tagger::TextTagger;

/// Common read interface shared by every layer, so they can be stacked:
/// `CacheTaggedText::new(&mut TaggedTextView::new(&mut LazyTaggedText::new(...)))`.
///
/// Fragments are returned by value (`T: Clone`) rather than by reference:
/// the underlying storage differs per layer (a `FragmentMap` owned by this
/// layer, one owned by an inner layer, or none at all), so there is no
/// single lifetime a borrow could be tied to across the trait boundary.
pub trait TaggedText<T> {
    fn get(&mut self, pos: TextPosition) -> Option<TaggedFragment<T>>;
    fn rewind(&mut self, pos: TextPosition);
}

/// Drives a [`TextTagger`] just far enough ahead of each `get` to answer
/// it, caching every fragment seen so far.
pub struct LazyTaggedText<T> {
    tagger: Box<dyn TextTagger<T>>,
    fragments: FragmentMap<T>,
    current: TextPosition,
}

impl<T: Clone> LazyTaggedText<T> {
    pub fn new(tagger: Box<dyn TextTagger<T>>) -> Self {
        let mut this = Self { tagger, fragments: FragmentMap::new(), current: TextPosition::origin() };
        this.advance();
        this
    }

    fn advance(&mut self) {
        match self.tagger.next() {
            Some(fragment) => {
                self.current = fragment.end;
                self.fragments.insert(fragment);
            }
            None => self.current = self.tagger.current_position(),
        }
    }
}

impl<T: Clone> TaggedText<T> for LazyTaggedText<T> {
    fn get(&mut self, pos: TextPosition) -> Option<TaggedFragment<T>> {
        while !(pos < self.current) {
            self.advance();
        }
        self.fragments.get(pos).cloned()
    }

    fn rewind(&mut self, pos: TextPosition) {
        self.fragments.remove(pos);
        self.tagger.rewind(pos);
        self.current = self.current.min(pos);
    }
}

/// Memoizes the last fragment returned, short-circuiting repeated lookups
/// at nearby positions (the common case: scanning a line left to right).
pub struct CacheTaggedText<'a, T> {
    inner: &'a mut dyn TaggedText<T>,
    cached: Option<TaggedFragment<T>>,
}

impl<'a, T: Clone> CacheTaggedText<'a, T> {
    pub fn new(inner: &'a mut dyn TaggedText<T>) -> Self {
        Self { inner, cached: None }
    }
}

impl<'a, T: Clone> TaggedText<T> for CacheTaggedText<'a, T> {
    fn get(&mut self, pos: TextPosition) -> Option<TaggedFragment<T>> {
        if !self.cached.as_ref().is_some_and(|fragment| fragment.contains(pos)) {
            self.cached = self.inner.get(pos);
        }
        self.cached.clone()
    }

    fn rewind(&mut self, pos: TextPosition) {
        self.inner.rewind(pos);
        self.cached = None;
    }
}

/// Clips an inner tagged text to `[offset, offset + size)`, translating
/// fragments into coordinates relative to `offset`.
pub struct TaggedTextView<'a, T> {
    inner: &'a mut dyn TaggedText<T>,
    mapped: FragmentMap<T>,
    offset: TextPosition,
    end: TextPosition,
}

fn translate(origin: TextPosition, delta: TextPosition) -> TextPosition {
    TextPosition::new(origin.line + delta.line, origin.column + delta.column)
}

impl<'a, T: Clone> TaggedTextView<'a, T> {
    pub fn new(inner: &'a mut dyn TaggedText<T>, offset: TextPosition, size: TextPosition) -> Self {
        Self { inner, mapped: FragmentMap::new(), offset, end: translate(offset, size) }
    }

    /// Resize the clipped window, discarding every translated fragment
    /// cached under the old window.
    pub fn update(&mut self, offset: TextPosition, size: TextPosition) {
        self.offset = offset;
        self.end = translate(offset, size);
        self.mapped.clear();
    }

    /// Flush the translated-fragment cache without moving the window.
    pub fn reset(&mut self) {
        self.mapped.clear();
    }
}

impl<'a, T: Clone> TaggedText<T> for TaggedTextView<'a, T> {
    fn get(&mut self, pos: TextPosition) -> Option<TaggedFragment<T>> {
        if let Some(fragment) = self.mapped.get(pos) {
            return Some(fragment.clone());
        }
        let real_pos = translate(pos, self.offset);
        if !(real_pos < self.end) {
            return None;
        }
        let real = self.inner.get(real_pos)?;
        let start = TextPosition::new(
            real.start.line.max(self.offset.line) - self.offset.line,
            real.start.column.max(self.offset.column) - self.offset.column,
        );
        let end = TextPosition::new(
            real.end.line.min(self.end.line) - self.offset.line,
            real.end.column.min(self.end.column) - self.offset.column,
        );
        let fragment = TaggedFragment::new(start, end, real.tag);
        self.mapped.insert(fragment.clone());
        Some(fragment)
    }

    fn rewind(&mut self, pos: TextPosition) {
        let real_pos = translate(pos, self.offset);
        if real_pos < self.end {
            self.inner.rewind(real_pos);
            if let Some(nearest) = self.mapped.nearest_le(pos) {
                let nearest_start = nearest.start;
                self.mapped.remove(nearest_start);
            } else {
                self.mapped.remove(TextPosition::origin());
            }
        }
    }
}
