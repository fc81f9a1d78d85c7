//! General utility functions for starhopper
//!
//! This module contains common helper functions used across the library.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size in binary units, e.g. `2.00 KB`
pub fn format_size(size: u64) -> String {
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    match unit {
        0 => format!("{} B", size),
        _ => format!("{:.2} {}", value, SIZE_UNITS[unit]),
    }
}

/// Expand a user filter into a glob over `/` separated archive paths.
///
/// `*.ext` matches in any directory and plain text is a substring search.
fn expand_pattern(pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    if let Some(ext) = pattern.strip_prefix("*.") {
        return format!("**/*.{}", ext);
    }
    if pattern.contains(|c| c == '*' || c == '?') {
        pattern
    } else {
        format!("**/*{}*", pattern)
    }
}

/// Compile a filter; archive paths are matched case-insensitively
pub fn create_glob_matcher(pattern: &str) -> Result<GlobMatcher> {
    let expanded = expand_pattern(pattern);
    let glob = GlobBuilder::new(&expanded)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Invalid pattern: {}", pattern))?;
    Ok(glob.compile_matcher())
}

/// Check if an archive path matches the optional filter.
///
/// Archive paths use `\` separators, they are matched as if they used `/`.
pub fn matches_filter(name: &str, matcher: Option<&GlobMatcher>) -> bool {
    match matcher {
        Some(m) => m.is_match(name.replace('\\', "/")),
        None => true,
    }
}

/// The last component of an archive path, for flattened extraction
pub fn flatten_path(name: &str) -> &str {
    name.rsplit(|c| c == '\\' || c == '/').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 << 40), "5.00 TB");
    }

    #[test]
    fn test_glob_filter_with_backslash_paths() {
        let m = create_glob_matcher("*.nif").unwrap();
        assert!(matches_filter("meshes\\rocks\\rock01.nif", Some(&m)));
        assert!(!matches_filter("meshes\\rocks\\rock01.dds", Some(&m)));

        let m = create_glob_matcher("rocks").unwrap();
        assert!(matches_filter("meshes\\rocks\\rock01.nif", Some(&m)));
        assert!(matches_filter("anything", None));
    }

    #[test]
    fn test_glob_filter_ignores_case() {
        let m = create_glob_matcher("*.NIF").unwrap();
        assert!(matches_filter("Meshes\\Rock01.nif", Some(&m)));

        let m = create_glob_matcher("interface\\*.swf").unwrap();
        assert!(matches_filter("Interface\\HUD.swf", Some(&m)));
        assert!(!matches_filter("textures\\HUD.swf", Some(&m)));
    }

    #[test]
    fn test_flatten_path() {
        assert_eq!(flatten_path("meshes\\rocks\\rock01.nif"), "rock01.nif");
        assert_eq!(flatten_path("a/b.txt"), "b.txt");
        assert_eq!(flatten_path("plain"), "plain");
    }
}
