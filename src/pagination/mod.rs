//! Keyset pagination for key-value listings.
//!
//! Listing handlers decode the inbound `last_key` parameter into a scan
//! starting point and re-encode the store's last-evaluated key into the
//! outbound `last_evaluated_key` field.

mod cursor;

pub use cursor::{decode_last_key, encode_last_key, Cursor, CursorError, KeyField, LastKey, Result};
