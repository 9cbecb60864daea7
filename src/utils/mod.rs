use std::path::{Path, PathBuf};

const MAX_FILENAME_CHARS: usize = 200;

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    let replaced = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>();

    // collapse whitespace runs, then drop leading/trailing dots and spaces
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c| c == '.' || c == ' ');

    trimmed.chars().take(MAX_FILENAME_CHARS).collect()
}

/// First of `name`, `name (1)`, `name (2)`, ... that does not exist in `dir`.
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    };

    (1..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
