//! Definition part rewriting
//!
//! Applies a redirect snapshot to one named part of a definition
//! bundle: decode the part as UTF-8 text, apply every `(source, target)`
//! pair as a literal global replace, re-encode, and return a bundle
//! identical to the input except for that part.
//!
//! Entries must arrive sorted by descending source-key length
//! (`RedirectMaps::snapshot` guarantees this). A shorter key that is a
//! substring of a longer key, such as a container name inside a full
//! container path, would otherwise corrupt an already-correct longer
//! replacement.

use crate::error::CaravanResult;
use crate::models::{DefinitionBundle, DefinitionPart};

/// Rewrite the named part of `bundle` with the given redirect entries.
///
/// A missing part is a no-op, not an error: artifact types share only a
/// subset of part names.
pub fn rewrite_part(
    bundle: &DefinitionBundle,
    part_path: &str,
    entries: &[(String, String)],
) -> CaravanResult<DefinitionBundle> {
    let mut parts = Vec::with_capacity(bundle.parts.len());
    for part in &bundle.parts {
        if part.path == part_path {
            let text = part.text()?;
            let rewritten = apply_redirects(text, entries);
            parts.push(DefinitionPart::new(part.path.clone(), rewritten.into_bytes()));
        } else {
            parts.push(part.clone());
        }
    }
    Ok(DefinitionBundle::new(parts))
}

/// Apply every redirect pair as a literal (non-regex) global replace,
/// in the given order.
pub fn apply_redirects(text: &str, entries: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (source, target) in entries {
        if source.is_empty() {
            continue;
        }
        out = out.replace(source.as_str(), target.as_str());
    }
    out
}
