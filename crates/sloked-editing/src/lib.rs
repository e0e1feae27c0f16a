//! Pure editing operations and the [`Transaction`] type that records,
//! commits, rolls back, and rebases them.

mod primitives;
mod transaction;

pub use primitives::{clamp_range, clear_region, delete_backward, delete_forward, insert, newline, read, EditingError};
pub use transaction::{DeleteCapture, Transaction, TransactionPayload};
