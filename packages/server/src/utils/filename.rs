/// Longest filename kept on a submission, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Reduce a client-supplied filename to a safe display name.
///
/// Directory components are dropped (both `/` and `\` separators, since
/// samples come from every platform), control characters are removed and
/// the result is truncated. Falls back to `fallback` when nothing is left.
pub fn sanitize_submission_filename(raw: &str, fallback: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    // Strip control characters to prevent header injection in
    // Content-Disposition on download.
    let cleaned: String = basename
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}
