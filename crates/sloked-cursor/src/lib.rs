//! A stateful editing cursor layered over a [`sloked_stream::TransactionStream`].

mod cursor;

pub use cursor::{Cursor, CursorError};
