//! Storage paths and file identifiers for uploads.

use std::path::PathBuf;
use uuid::Uuid;

/// Longest file name most filesystems accept (`NAME_MAX`), in bytes.
pub const MAX_FILE_ID_LEN: usize = 255;
// 32 hex digits and the joining underscore.
const TOKEN_LEN: usize = 33;

/// Where an upload will be written, and the identifier it will be known by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// `<token>_<sanitized base name>`. Never contains a path separator and
    /// never exceeds [`MAX_FILE_ID_LEN`] bytes.
    pub file_id: String,
    /// `<project>/<file_id>`, relative to the storage root.
    pub path: PathBuf,
}

/// The last component of a client-supplied filename. Both separators count,
/// whatever platform the client was on.
pub fn base_name(filename: &str) -> &str {
    filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default()
}

/// Reduce a filename to something safe on any filesystem: directories are
/// dropped, whitespace becomes `_`, and anything but ASCII letters, digits,
/// `.`, `_` and `-` is removed.
pub fn sanitize(filename: &str) -> String {
    base_name(filename.trim())
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            _ => None,
        })
        .collect()
}

/// Cut `name` down to at most `max_bytes`, keeping its extension.
///
/// The stem is shortened at a character boundary. An extension too long to
/// leave any of the stem is cut along with everything else.
pub fn shorten(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 1 < max_bytes => {
            let stem = &stem[..stem.floor_char_boundary(max_bytes - ext.len() - 1)];
            format!("{stem}.{ext}")
        },
        _ => name[..name.floor_char_boundary(max_bytes)].to_string(),
    }
}

/// Generate a fresh destination for `filename` inside `project`'s directory.
///
/// Uniqueness comes from a random v4 UUID; nothing checks whether the path is
/// already taken (the storage writer refuses to overwrite if it ever is).
pub fn destination(project: &str, filename: &str) -> Destination {
    let token = Uuid::new_v4().simple();
    let file_id = match sanitize(filename) {
        name if name.is_empty() => token.to_string(),
        name => format!("{token}_{}", shorten(&name, MAX_FILE_ID_LEN - TOKEN_LEN)),
    };
    Destination { path: PathBuf::from(project).join(&file_id), file_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("notes.txt", "notes.txt")]
    #[case("docs/notes.txt", "notes.txt")]
    #[case("../../etc/passwd", "passwd")]
    #[case(r"C:\Users\me\report.pdf", "report.pdf")]
    #[case("dir/", "")]
    fn test_base_name(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(base_name(filename), expected);
    }

    #[rstest]
    #[case("notes.txt", "notes.txt")]
    #[case("my notes (final).txt", "my_notes_final.txt")]
    #[case("../secret.txt", "secret.txt")]
    #[case("  spaced.pdf  ", "spaced.pdf")]
    #[case("résumé.pdf", "rsum.pdf")]
    #[case("a;rm -rf.txt", "arm_-rf.txt")]
    fn test_sanitize(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(sanitize(filename), expected);
    }

    #[test]
    fn test_destination() {
        let dest = destination("proj123", "../reports/q1 summary.pdf");
        let (token, name) = dest.file_id.split_once('_').unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, "q1_summary.pdf");
        assert_eq!(dest.path, Path::new("proj123").join(&dest.file_id));
        assert!(!dest.file_id.contains(['/', '\\']));
    }

    #[test]
    fn test_destinations_are_unique() {
        let a = destination("proj123", "a.txt");
        let b = destination("proj123", "a.txt");
        assert_ne!(a.file_id, b.file_id);
        assert_ne!(a.path, b.path);
    }

    #[rstest]
    #[case("notes.txt", 20, "notes.txt")]
    #[case("abcdefghij.txt", 10, "abcdef.txt")]
    #[case("archive.tar.gz", 10, "archive.gz")]
    #[case("no_extension_here", 5, "no_ex")]
    #[case("a.verylongextension", 8, "a.verylo")]
    #[case(".hidden", 3, ".hi")]
    fn test_shorten(#[case] name: &str, #[case] max: usize, #[case] expected: &str) {
        assert_eq!(shorten(name, max), expected);
    }

    #[test]
    fn test_long_names_fit_in_one_path_component() {
        let filename = format!("{}.txt", "a".repeat(226));
        let dest = destination("proj123", &filename);
        assert_eq!(dest.file_id.len(), MAX_FILE_ID_LEN);
        assert!(dest.file_id.ends_with("a.txt"));
        assert_eq!(dest.path.file_name().unwrap().len(), MAX_FILE_ID_LEN);
    }

    #[test]
    fn test_nothing_left_after_sanitizing() {
        let dest = destination("proj123", "///");
        assert_eq!(dest.file_id.len(), 32);
    }
}
