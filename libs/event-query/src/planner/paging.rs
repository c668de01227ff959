use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Opaque pagination token handed back to callers.
///
/// Encodes `"offset,page_size"` as unpadded base64url so a follow-up request
/// needs nothing but the token to address the next window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn encode(offset: usize, page_size: usize) -> Self {
        let raw = format!("{offset},{page_size}");
        PageToken(URL_SAFE_NO_PAD.encode(raw.as_bytes()))
    }

    /// Wrap a token string received from a caller; validated on decode.
    pub fn from_string(token: impl Into<String>) -> Self {
        PageToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `(offset, page_size)`.
    pub fn decode(&self) -> Result<(usize, usize)> {
        let malformed = || Error::invalid_predicate("page", format!("malformed page token '{}'", self.0));

        let bytes = URL_SAFE_NO_PAD.decode(self.0.as_bytes()).map_err(|_| malformed())?;
        let raw = String::from_utf8(bytes).map_err(|_| malformed())?;
        let (offset, page_size) = raw.split_once(',').ok_or_else(malformed)?;
        let offset = offset.parse::<usize>().map_err(|_| malformed())?;
        let page_size = page_size.parse::<usize>().map_err(|_| malformed())?;
        if page_size == 0 {
            return Err(malformed());
        }
        Ok((offset, page_size))
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest offset any backend can address (Postgres `OFFSET` is a bigint).
pub const MAX_OFFSET: usize = i64::MAX as usize;

/// The row window a query addresses after filtering and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

impl Window {
    /// Tokens for the neighbouring windows, given the total match count.
    ///
    /// A window past the end points `previous` at the last non-empty page.
    pub fn neighbours(&self, total: usize) -> (Option<PageToken>, Option<PageToken>) {
        let next = self
            .offset
            .checked_add(self.limit)
            .filter(|&start| start < total)
            .map(|start| PageToken::encode(start, self.limit));

        let last_page = total.saturating_sub(1) / self.limit.max(1) * self.limit;
        let previous = (self.offset > 0).then(|| {
            PageToken::encode(self.offset.saturating_sub(self.limit).min(last_page), self.limit)
        });
        (next, previous)
    }

    /// Apply the window to an already filtered and sorted sequence.
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter().skip(self.offset).take(self.limit).collect()
    }
}
