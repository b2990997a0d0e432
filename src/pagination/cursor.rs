//! Opaque continuation cursors for keyset pagination.
//!
//! A cursor carries the part of a store's last-evaluated key that the
//! listing chose to expose:
//! ```text
//! {"sort_key":"brand-product#42"} --json--> --base64url--> eyJzb3J0X2tleSI6...
//! ```
//! Key attributes outside the preserve list never reach the encoded form.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while encoding or decoding a cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Malformed cursor: {0}")]
    Decode(String),

    #[error("Failed to encode cursor: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for cursor operations.
pub type Result<T> = std::result::Result<T, CursorError>;

/// Key attributes a cursor is allowed to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    PartitionKey,
    SortKey,
    Filter,
    Search,
    Datatype,
}

impl KeyField {
    /// Every field, in serialization order.
    pub const ALL: [KeyField; 5] = [
        KeyField::PartitionKey,
        KeyField::SortKey,
        KeyField::Filter,
        KeyField::Search,
        KeyField::Datatype,
    ];

    /// Attribute name as stored in the table.
    pub fn attribute_name(self) -> &'static str {
        match self {
            KeyField::PartitionKey => "partition_key",
            KeyField::SortKey => "sort_key",
            KeyField::Filter => "filter",
            KeyField::Search => "search",
            KeyField::Datatype => "datatype",
        }
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}

/// Decoded cursor contents.
///
/// Only produced by [`decode_last_key`]; unknown attributes in a cursor are
/// rejected rather than ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LastKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datatype: Option<String>,
}

impl LastKey {
    /// Keep only the `preserve` fields of a raw store key.
    fn project(raw_key: &BTreeMap<String, String>, preserve: &[KeyField]) -> Self {
        let mut key = Self::default();
        for field in preserve {
            if let Some(value) = raw_key.get(field.attribute_name()) {
                *key.slot_mut(*field) = Some(value.clone());
            }
        }
        key
    }

    fn slot_mut(&mut self, field: KeyField) -> &mut Option<String> {
        match field {
            KeyField::PartitionKey => &mut self.partition_key,
            KeyField::SortKey => &mut self.sort_key,
            KeyField::Filter => &mut self.filter,
            KeyField::Search => &mut self.search,
            KeyField::Datatype => &mut self.datatype,
        }
    }

    /// Value of a single field, if the cursor carried it.
    pub fn get(&self, field: KeyField) -> Option<&str> {
        match field {
            KeyField::PartitionKey => self.partition_key.as_deref(),
            KeyField::SortKey => self.sort_key.as_deref(),
            KeyField::Filter => self.filter.as_deref(),
            KeyField::Search => self.search.as_deref(),
            KeyField::Datatype => self.datatype.as_deref(),
        }
    }

    pub fn partition_key(&self) -> Option<&str> {
        self.get(KeyField::PartitionKey)
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.get(KeyField::SortKey)
    }

    /// Fields present in this key.
    pub fn fields(&self) -> Vec<KeyField> {
        KeyField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Opaque pagination token handed to clients as `last_evaluated_key`.
///
/// There is no public constructor; cursors come from [`encode_last_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cursor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode the store's last-evaluated key into a cursor.
///
/// Returns `Ok(None)` when `raw_key` is absent, meaning the scan is
/// exhausted. Fields named in `preserve` but missing from `raw_key` are
/// omitted; fields present but not named are dropped.
pub fn encode_last_key(
    raw_key: Option<&BTreeMap<String, String>>,
    preserve: &[KeyField],
) -> Result<Option<Cursor>> {
    let Some(raw_key) = raw_key else {
        return Ok(None);
    };

    let projected = LastKey::project(raw_key, preserve);
    let json = serde_json::to_vec(&projected)?;

    Ok(Some(Cursor(URL_SAFE_NO_PAD.encode(json))))
}

/// Decode an inbound cursor.
///
/// Absent or empty input means "first page" and yields `Ok(None)`. Anything
/// that is not a cursor produced by [`encode_last_key`] fails with
/// [`CursorError::Decode`].
pub fn decode_last_key(cursor: Option<&str>) -> Result<Option<LastKey>> {
    let Some(cursor) = cursor.filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| CursorError::Decode(format!("not base64url: {e}")))?;

    let key: LastKey = serde_json::from_slice(&bytes)
        .map_err(|e| CursorError::Decode(format!("not a key object: {e}")))?;

    Ok(Some(key))
}
