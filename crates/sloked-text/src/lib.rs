//! Line-indexed text storage and the position/patch arithmetic used to keep
//! cursors, tagged fragments, and pending transactions correctly anchored
//! across edits.

mod block;
mod patch;
mod position;

pub use block::{PlainTextBlock, TextBlock, TextBlockError};
#[cfg(feature = "rope")]
pub use block::RopeTextBlock;
pub use patch::{PatchMap, PositionDelta};
pub use position::TextPosition;
