// Small path/text helpers shared across components.

use std::path::Path;

/// Truncate `text` to at most `max` characters, never splitting a UTF-8
/// sequence. Audit records and histories store bounded copies of caller
/// input, not the full payload.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Bounded preview of `text`: at most `max` characters, with a trailing
/// ellipsis when anything was cut.
pub(crate) fn preview_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut preview: String = text.chars().take(max).collect();
        preview.push_str("...");
        preview
    }
}

/// Render `path` relative to `root` with forward slashes, the form every
/// stored file path uses regardless of platform.
pub(crate) fn to_relative_unix_style(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(out)
}
