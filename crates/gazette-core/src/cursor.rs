//! Opaque continuation tokens for keyset pagination.
//!
//! A cursor names the last row of the previous page: the sort signature, the
//! row's value for the sort column, and the row id as tie-breaker. Tokens are
//! version-tagged JSON behind URL-safe base64. Decoding is fail-open: a
//! malformed, stale, or unknown-version token decodes to `None` and the
//! caller restarts from the first page, so a corrupted token can never lock a
//! user out of their list.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::bookmark::BookmarkId;
use crate::query::{Scalar, SortColumn, SortOrder};

/// Current token format version. Decoders reject anything else.
pub const CURSOR_VERSION: u8 = 1;

/// Keyset pagination cursor. Created by page derivation, consumed once by
/// the next list request, discarded after decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    /// The last row's value for `sort_by`, in canonical storage form.
    pub value: Scalar,
    pub id: BookmarkId,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    v: u8,
    sort_by: SortColumn,
    sort_order: SortOrder,
    value: Scalar,
    id: BookmarkId,
}

impl Cursor {
    /// Serialize to an opaque token. Returns `None` if serialization fails;
    /// never panics.
    pub fn encode(&self) -> Option<String> {
        let envelope = Envelope {
            v: CURSOR_VERSION,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            value: self.value.clone(),
            id: self.id,
        };
        let json = serde_json::to_vec(&envelope).ok()?;
        Some(URL_SAFE_NO_PAD.encode(json))
    }

    /// Best-effort parse. Bad base64, bad JSON, and unknown versions all
    /// yield `None`.
    pub fn decode(token: &str) -> Option<Cursor> {
        let bytes = URL_SAFE_NO_PAD.decode(token.as_bytes()).ok()?;
        let envelope: Envelope = serde_json::from_slice(&bytes).ok()?;
        if envelope.v != CURSOR_VERSION {
            return None;
        }
        Some(Cursor {
            sort_by: envelope.sort_by,
            sort_order: envelope.sort_order,
            value: envelope.value,
            id: envelope.id,
        })
    }
}
