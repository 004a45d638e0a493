//! Parses a sanitized candidate into a typed `Feedback`.
//!
//! The shape rules live on the types themselves: every category is a required
//! field, `Score` only accepts integers in `0..=100` and `TipKind` only
//! `good` / `improve`. Nothing is defaulted.

use crate::analysis::error::AnalysisError;
use crate::analysis::models::Feedback;

pub fn parse_and_validate(candidate: &str) -> Result<Feedback, AnalysisError> {
    serde_json::from_str::<Feedback>(candidate).map_err(|e| AnalysisError::malformed(e, candidate))
}
