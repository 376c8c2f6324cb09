//! Decoded tabular dataset and chunk arithmetic.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::types::RowMap;

/// The output of a row source: ordered headers plus ordered rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<RowMap>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<RowMap>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Number of chunks needed to cover `total` rows: `ceil(total / chunk_size)`.
///
/// A zero chunk size yields zero chunks rather than dividing by zero.
pub fn total_chunks(total: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    total.div_ceil(chunk_size)
}

/// Row index range (0-based, half-open) covered by chunk `index`.
///
/// The final chunk is truncated to `total`. Out-of-range indices produce
/// an empty range.
pub fn chunk_range(index: usize, chunk_size: usize, total: usize) -> Range<usize> {
    let start = index.saturating_mul(chunk_size).min(total);
    let end = start.saturating_add(chunk_size).min(total);
    start..end
}
