//! Recovers the JSON object from a model reply that may be wrapped in code
//! fences or surrounded by commentary.
//!
//! The object is taken from the first `{` to the last `}`. That assumes one
//! top-level object and no stray braces in the surrounding prose; a reply
//! such as `Note {x} ... {"overallScore": ...}` yields an unparsable span and
//! fails validation rather than being repaired here.

const FENCES: [&str; 2] = ["```json", "```"];

/// Never fails: it only narrows the text. When no `{ ... }` span exists the
/// fence-stripped, trimmed text comes back and validation rejects it.
pub fn sanitize(raw: &str) -> String {
    let unfenced = FENCES
        .iter()
        .fold(raw.to_string(), |text, fence| text.replace(fence, ""));

    let candidate = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced.as_str(),
    };

    candidate.trim().to_string()
}
