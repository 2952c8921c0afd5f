//! Maps raw response bodies onto the typed response shapes.

use crate::error::CpasError;
use crate::types::CpasResponse;

/// Decode `raw` into `T`, or report which shape failed and why.
pub fn decode<T: CpasResponse>(raw: &str) -> Result<T, CpasError> {
    serde_json::from_str(raw).map_err(|e| CpasError::Decode {
        shape: T::SHAPE,
        message: e.to_string(),
    })
}
