use anyhow::Result;
use nf_core::Snapshot;

/// Pretty-printed JSON of a whole snapshot.
pub fn render_json(snapshot: &Snapshot) -> Result<String> {
    let mut out = serde_json::to_string_pretty(snapshot)?;
    out.push('\n');
    Ok(out)
}
