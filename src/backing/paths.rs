//! Path helpers shared by the backing stores and folder views.

/// Drops empty and `.` segments, and leading or trailing slashes.
///
/// `..` segments are kept as-is; stores that map onto a real filesystem
/// reject them.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Turns a normalized path into a folder prefix (`"a/b"` -> `"a/b/"`).
///
/// The root stays empty.
pub fn folderize_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    }
}
