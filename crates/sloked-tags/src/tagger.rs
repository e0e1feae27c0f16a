//! [`TextTagger`]: the source of [`TaggedFragment`]s, and [`ProxyTagger`],
//! which lets the active tagger be hot-swapped (changing syntax grammar,
//! say) without tearing down whatever is watching it via `on_update`.

use sloked_text::TextPosition;

use crate::fragment::TaggedFragment;

/// A handle identifying an `on_update` registration, for `off_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateId(usize);

struct UpdateEmitter {
    next_id: usize,
    listeners: Vec<(usize, Box<dyn FnMut()>)>,
}

impl UpdateEmitter {
    fn new() -> Self {
        Self { next_id: 0, listeners: Vec::new() }
    }

    fn subscribe(&mut self, callback: Box<dyn FnMut()>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, callback));
        id
    }

    fn unsubscribe(&mut self, id: usize) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    fn emit(&mut self) {
        for (_, callback) in self.listeners.iter_mut() {
            callback();
        }
    }
}

/// Produces [`TaggedFragment`]s in strictly ascending, non-overlapping
/// `start` order. `rewind(pos)` must guarantee the next `next()` returns
/// either a fragment overlapping `pos` or one strictly after it.
pub trait TextTagger<T> {
    fn next(&mut self) -> Option<TaggedFragment<T>>;
    fn rewind(&mut self, pos: TextPosition);
    fn current_position(&self) -> TextPosition;

    /// Register a callback fired whenever previously emitted fragments may
    /// have become stale (e.g. the underlying text changed). Returns a
    /// handle for `off_update`.
    fn on_update(&mut self, callback: Box<dyn FnMut()>) -> UpdateId;
    fn off_update(&mut self, id: UpdateId);
}

/// Forwards to an optional inner [`TextTagger`], re-subscribing its own
/// `on_update` listeners whenever [`ProxyTagger::change_tagger`] swaps the
/// inner tagger out — callers watching the proxy never need to know a swap
/// happened.
pub struct ProxyTagger<T> {
    tagger: Option<Box<dyn TextTagger<T>>>,
    forward_id: Option<UpdateId>,
    subscribers: std::rc::Rc<std::cell::RefCell<UpdateEmitter>>,
}

impl<T: 'static> ProxyTagger<T> {
    pub fn new(tagger: Option<Box<dyn TextTagger<T>>>) -> Self {
        let mut this = Self {
            tagger: None,
            forward_id: None,
            subscribers: std::rc::Rc::new(std::cell::RefCell::new(UpdateEmitter::new())),
        };
        this.change_tagger(tagger);
        this
    }

    pub fn has_tagger(&self) -> bool {
        self.tagger.is_some()
    }

    pub fn change_tagger(&mut self, tagger: Option<Box<dyn TextTagger<T>>>) {
        if let (Some(old), Some(id)) = (self.tagger.as_mut(), self.forward_id.take()) {
            old.off_update(id);
        }
        self.tagger = tagger;
        if let Some(inner) = self.tagger.as_mut() {
            let subscribers = std::rc::Rc::clone(&self.subscribers);
            let id = inner.on_update(Box::new(move || subscribers.borrow_mut().emit()));
            self.forward_id = Some(id);
        }
    }
}

impl<T: 'static> TextTagger<T> for ProxyTagger<T> {
    fn next(&mut self) -> Option<TaggedFragment<T>> {
        self.tagger.as_mut().and_then(|tagger| tagger.next())
    }

    fn rewind(&mut self, pos: TextPosition) {
        if let Some(tagger) = self.tagger.as_mut() {
            tagger.rewind(pos);
        }
    }

    fn current_position(&self) -> TextPosition {
        self.tagger.as_ref().map(|tagger| tagger.current_position()).unwrap_or(TextPosition::MAX)
    }

    fn on_update(&mut self, callback: Box<dyn FnMut()>) -> UpdateId {
        UpdateId(self.subscribers.borrow_mut().subscribe(callback))
    }

    fn off_update(&mut self, id: UpdateId) {
        self.subscribers.borrow_mut().unsubscribe(id.0);
    }
}
