//! Unified diff between two content documents, for previewing backfill.

use similar::TextDiff;

use crate::error::SyncError;
use crate::tree::Node;

/// `None` when both documents serialize identically.
pub fn document_diff(before: &Node, after: &Node) -> Result<Option<String>, SyncError> {
    let old = serde_json::to_string_pretty(&before.to_value())?;
    let new = serde_json::to_string_pretty(&after.to_value())?;
    if old == new {
        return Ok(None);
    }

    let unified = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header("a/content.json", "b/content.json")
        .context_radius(3)
        .to_string();
    Ok(Some(unified))
}
