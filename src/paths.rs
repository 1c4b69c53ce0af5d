//! Path normalization for the folder/file namespace.
//! All functions are pure; callers normalize before every lookup or creation.

pub const SEPARATOR: char = '/';
pub const ROOT_MARKER: &str = "/";

/// Collapse runs of separators and strip a single trailing separator unless
/// the result is the root marker.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_sep = false;
    for c in path.chars() {
        if c == SEPARATOR {
            if prev_sep { continue; }
            prev_sep = true;
        } else {
            prev_sep = false;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with(SEPARATOR) {
        out.pop();
    }
    out
}

/// Join a parent path and a child name into a normalized path.
pub fn join(parent: &str, name: &str) -> String {
    normalize(&format!("{}{}{}", parent, SEPARATOR, name))
}

/// Everything before the last separator of `path`; the root marker when the
/// path has no non-empty parent.
pub fn parent_path(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(idx) if idx > 0 => path[..idx].to_string(),
        _ => ROOT_MARKER.to_string(),
    }
}

/// Last segment of a normalized path; empty for the root marker.
pub fn base_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Split a file path into `(folder_path, filename)` at the last separator.
/// Returns None when there is no separator or the filename part is empty.
pub fn split_file_path(path: &str) -> Option<(String, String)> {
    let norm = normalize(path);
    let idx = norm.rfind(SEPARATOR)?;
    let filename = &norm[idx + 1..];
    if filename.is_empty() {
        return None;
    }
    let folder = if idx == 0 { ROOT_MARKER.to_string() } else { norm[..idx].to_string() };
    Some((folder, filename.to_string()))
}

/// Validate a single path segment used as a folder name or filename.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if name.contains(SEPARATOR) {
        return Err(format!("name '{}' cannot contain '{}'", name, SEPARATOR));
    }
    if name.chars().any(|c| c == '\u{0000}') {
        return Err("name cannot contain NUL characters".to_string());
    }
    if name == "." || name == ".." {
        return Err("'.' and '..' are not allowed as names".to_string());
    }
    Ok(())
}

/// Extension of a filename (text after the last '.'), if any.
pub fn extension(filename: &str) -> Option<&str> {
    match filename.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < filename.len() => Some(&filename[idx + 1..]),
        _ => None,
    }
}
