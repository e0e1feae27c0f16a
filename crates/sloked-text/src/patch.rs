//! [`PatchMap`]: how a committed edit shifts positions that were anchored
//! elsewhere in the document (cursors, tagged fragments, pending streams).

use crate::position::TextPosition;

/// A signed `(line, column)` shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionDelta {
    pub delta_line: i64,
    pub delta_column: i64,
}

impl PositionDelta {
    pub const fn new(delta_line: i64, delta_column: i64) -> Self {
        Self { delta_line, delta_column }
    }

    pub const fn zero() -> Self {
        Self { delta_line: 0, delta_column: 0 }
    }

    fn is_zero(&self) -> bool {
        self.delta_line == 0 && self.delta_column == 0
    }

    fn apply(&self, pos: TextPosition) -> TextPosition {
        let line = (pos.line as i64 + self.delta_line).max(0) as usize;
        let column = (pos.column as i64 + self.delta_column).max(0) as usize;
        TextPosition { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Shift(PositionDelta),
    CollapseTo(TextPosition),
}

impl Rule {
    fn apply(&self, pos: TextPosition) -> TextPosition {
        match self {
            Rule::Shift(delta) => delta.apply(pos),
            Rule::CollapseTo(target) => *target,
        }
    }

    fn is_identity(&self) -> bool {
        matches!(self, Rule::Shift(d) if d.is_zero())
    }
}

/// One half-open domain `[start, end)` (`end == None` means "to infinity")
/// and the rule applied to positions it contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    start: TextPosition,
    end: Option<TextPosition>,
    rule: Rule,
}

impl Segment {
    fn contains(&self, pos: TextPosition) -> bool {
        self.start <= pos && self.end.map_or(true, |end| pos < end)
    }
}

/// A mapping from [`TextPosition`] to [`TextPosition`] describing how a
/// single committed edit (or a composition of several) displaces positions
/// that were recorded before it landed.
///
/// A patch never touches a position strictly before its originating edit
/// (§3 of the core's position-tracking contract): anything before the first
/// segment's start is returned unchanged.
///
/// Internally the map is a short ordered list of non-overlapping domains.
/// Composing two patches does not attempt to re-flatten the domains; it
/// simply chains the two applications, which stays correct no matter how
/// the domains of the two inputs relate to each other.
#[derive(Debug, Clone)]
pub struct PatchMap(Node);

#[derive(Debug, Clone)]
enum Node {
    Identity,
    Segments(Vec<Segment>),
    Compose(Box<PatchMap>, Box<PatchMap>),
}

impl PatchMap {
    /// The empty patch: every position maps to itself.
    pub fn identity() -> Self {
        PatchMap(Node::Identity)
    }

    /// A single uniform shift applying to every position at or after
    /// `origin`, unbounded.
    pub fn shift_from(origin: TextPosition, delta: PositionDelta) -> Self {
        if delta.is_zero() {
            return Self::identity();
        }
        PatchMap(Node::Segments(vec![Segment {
            start: origin,
            end: None,
            rule: Rule::Shift(delta),
        }]))
    }

    /// Builder for the common "edit confined to one line, tail of document
    /// shifts uniformly" shape shared by insert/newline/delete.
    ///
    /// `same_line` applies to positions still on `origin.line` (bounded
    /// above by the start of the next line); `tail` applies to every
    /// position from the next line onward.
    pub fn line_local(origin: TextPosition, same_line: PositionDelta, tail: PositionDelta) -> Self {
        let next_line = TextPosition::new(origin.line + 1, 0);
        let mut segments = Vec::with_capacity(2);
        if !same_line.is_zero() {
            segments.push(Segment {
                start: origin,
                end: Some(next_line),
                rule: Rule::Shift(same_line),
            });
        }
        if !tail.is_zero() {
            segments.push(Segment {
                start: next_line,
                end: None,
                rule: Rule::Shift(tail),
            });
        }
        if segments.is_empty() {
            Self::identity()
        } else {
            PatchMap(Node::Segments(segments))
        }
    }

    /// Builder for region deletion: everything in `[from, to)` collapses
    /// onto `from`; the remainder of `to`'s line reattaches at `from`; and
    /// everything past `to`'s line shifts by `tail`.
    pub fn collapse_region(from: TextPosition, to: TextPosition, tail: PositionDelta) -> Self {
        let to_next_line = TextPosition::new(to.line + 1, 0);
        let same_line_delta = PositionDelta::new(
            from.line as i64 - to.line as i64,
            from.column as i64 - to.column as i64,
        );
        let mut segments = vec![
            Segment { start: from, end: Some(to), rule: Rule::CollapseTo(from) },
            Segment { start: to, end: Some(to_next_line), rule: Rule::Shift(same_line_delta) },
        ];
        if !tail.is_zero() {
            segments.push(Segment {
                start: to_next_line,
                end: None,
                rule: Rule::Shift(tail),
            });
        }
        PatchMap(Node::Segments(segments))
    }

    /// Apply this patch to a single position.
    pub fn apply(&self, pos: TextPosition) -> TextPosition {
        match &self.0 {
            Node::Identity => pos,
            Node::Segments(segments) => segments
                .iter()
                .find(|seg| seg.contains(pos))
                .map(|seg| seg.rule.apply(pos))
                .unwrap_or(pos),
            Node::Compose(first, second) => second.apply(first.apply(pos)),
        }
    }

    /// Compose `self` followed by `other`: `compose(other).apply(p) ==
    /// other.apply(self.apply(p))`.
    pub fn compose(self, other: PatchMap) -> PatchMap {
        if self.is_identity() {
            return other;
        }
        if other.is_identity() {
            return self;
        }
        PatchMap(Node::Compose(Box::new(self), Box::new(other)))
    }

    /// Best-effort identity check. A composed patch is reported identity
    /// only if both halves are; this under-approximates (a non-trivial
    /// compose that happens to cancel out will read as non-identity), which
    /// is the safe direction for a sanity check.
    pub fn is_identity(&self) -> bool {
        match &self.0 {
            Node::Identity => true,
            Node::Segments(segments) => segments.iter().all(|seg| seg.rule.is_identity()),
            Node::Compose(a, b) => a.is_identity() && b.is_identity(),
        }
    }
}

impl Default for PatchMap {
    fn default() -> Self {
        Self::identity()
    }
}
