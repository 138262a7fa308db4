//! Utility functions for filenames and download headers

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// Maximum length of a sanitized filename, in bytes
///
/// Leaves room for the 33-byte `{uuid}_` storage prefix under the usual
/// 255-byte filesystem limit.
pub const MAX_FILENAME_BYTES: usize = 200;

/// Maximum number of rename attempts when resolving entry-name collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

// The pattern is a literal; it cannot fail to compile
#[allow(clippy::unwrap_used)]
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());

/// Make a caller-supplied filename safe to use as a single path component
///
/// - Path separators, reserved and control characters become `_`
/// - `..` sequences become `_`
/// - Leading/trailing dots and spaces are stripped
/// - The result is capped at [`MAX_FILENAME_BYTES`] bytes, cut at a char
///   boundary; the stem is shortened first so the extension survives
/// - An empty result becomes `unnamed`
///
/// # Examples
///
/// ```
/// use docshift::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
/// assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
/// assert_eq!(sanitize_filename(" . "), "unnamed");
/// ```
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(filename, "_");
    let replaced = replaced.replace("..", "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');

    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    if trimmed.len() <= MAX_FILENAME_BYTES {
        return trimmed.to_string();
    }

    match trimmed.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && extension.len() < MAX_FILENAME_BYTES / 2 => {
            let stem = truncate_at_char_boundary(stem, MAX_FILENAME_BYTES - extension.len() - 1);
            format!("{}.{}", stem, extension)
        }
        _ => truncate_at_char_boundary(trimmed, MAX_FILENAME_BYTES).to_string(),
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Filename stem (everything before the last `.`), falling back to the whole name
#[must_use]
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Lowercased extension of `path` including the leading dot (e.g. `.pdf`)
#[must_use]
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Return `name`, or `name (1).ext`, `name (2).ext`, ... if already taken
///
/// The chosen name is inserted into `taken`, so repeated calls with the same
/// set de-duplicate deterministically in call order.
pub fn unique_entry_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }

    // Unreachable in practice: batches are capped far below MAX_RENAME_ATTEMPTS
    let fallback = format!("{} ({})", name, uuid::Uuid::new_v4().simple());
    taken.insert(fallback.clone());
    fallback
}

/// `Content-Disposition` value for an attachment, RFC 5987 encoded so
/// non-ASCII filenames survive.
///
/// # Examples
///
/// ```
/// use docshift::utils::attachment_disposition;
///
/// assert_eq!(
///     attachment_disposition("보고서.md"),
///     "attachment; filename*=UTF-8''%EB%B3%B4%EA%B3%A0%EC%84%9C.md"
/// );
/// ```
#[must_use]
pub fn attachment_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// MIME type for an output extension (with leading dot)
#[must_use]
pub fn media_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        ".md" => "text/markdown; charset=utf-8",
        ".pdf" => "application/pdf",
        ".zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_separators_and_traversal() {
        assert_eq!(sanitize_filename("a/b\\c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_filename("..\\..\\win.ini"), "____win.ini");
        assert_eq!(sanitize_filename("name\u{0}.md"), "name_.md");
        assert_eq!(sanitize_filename("what?.md"), "what_.md");
    }

    #[test]
    fn test_sanitize_empty_and_dots() {
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename(". ."), "unnamed");
        assert_eq!(sanitize_filename("..."), "_");
        assert_eq!(sanitize_filename(" .hidden.md "), "hidden.md");
    }

    #[test]
    fn test_sanitize_caps_length_keeping_extension() {
        let long = format!("{}.pdf", "x".repeat(500));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), MAX_FILENAME_BYTES);
        assert!(sanitized.ends_with("xx.pdf"));
    }

    #[test]
    fn test_sanitize_caps_multibyte_names_by_bytes() {
        // 3 bytes per Hangul syllable
        let long = format!("{}.md", "가".repeat(120));
        let sanitized = sanitize_filename(&long);
        assert!(sanitized.ends_with("가.md"));
        assert_eq!(sanitized.len(), 65 * 3 + ".md".len());
    }

    #[test]
    fn test_sanitize_caps_names_without_extension() {
        let long = "가".repeat(100);
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), 198);
        assert_eq!(sanitized.chars().count(), 66);
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("보고서.pdf"), "보고서.pdf");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("report.final.pdf"), "report.final");
        assert_eq!(file_stem("README"), "README");
        assert_eq!(file_stem(".env"), ".env");
    }

    #[test]
    fn test_dotted_extension_lowercases() {
        assert_eq!(
            dotted_extension(Path::new("/tmp/Report.PDF")).as_deref(),
            Some(".pdf")
        );
        assert_eq!(dotted_extension(Path::new("/tmp/noext")), None);
    }

    #[test]
    fn test_unique_entry_name_suffixes_in_order() {
        let mut taken = HashSet::new();
        assert_eq!(unique_entry_name("report.md", &mut taken), "report.md");
        assert_eq!(unique_entry_name("report.md", &mut taken), "report (1).md");
        assert_eq!(unique_entry_name("report.md", &mut taken), "report (2).md");
        assert_eq!(unique_entry_name("notes", &mut taken), "notes");
        assert_eq!(unique_entry_name("notes", &mut taken), "notes (1)");
    }

    #[test]
    fn test_unique_entry_name_skips_preexisting_suffix() {
        let mut taken = HashSet::new();
        taken.insert("a (1).md".to_string());
        assert_eq!(unique_entry_name("a.md", &mut taken), "a.md");
        assert_eq!(unique_entry_name("a.md", &mut taken), "a (2).md");
    }

    #[test]
    fn test_attachment_disposition_ascii() {
        assert_eq!(
            attachment_disposition("my report.pdf"),
            "attachment; filename*=UTF-8''my%20report.pdf"
        );
    }

    #[test]
    fn test_media_types() {
        assert_eq!(media_type_for(".md"), "text/markdown; charset=utf-8");
        assert_eq!(media_type_for(".PDF"), "application/pdf");
        assert_eq!(media_type_for(".bin"), "application/octet-stream");
    }
}
