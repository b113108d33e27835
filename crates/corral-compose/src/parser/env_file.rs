//! `env_file` loading.

use std::path::Path;

use corral_common::error::{CorralError, Result};
use indexmap::IndexMap;

/// Parses `KEY=VALUE` lines.
///
/// Blank lines and `#` comments are skipped. A line without `=` sets the
/// key to the empty string. Later lines win.
pub fn parse_env_lines(text: &str) -> IndexMap<String, String> {
    let mut vars = IndexMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let _ = vars.insert(key.trim().to_string(), value.to_string());
    }
    vars
}

/// Reads and parses one env file.
///
/// # Errors
///
/// Returns [`CorralError::Io`] naming the path if the file cannot be read.
pub fn read_env_file(path: &Path) -> Result<IndexMap<String, String>> {
    tracing::debug!(path = %path.display(), "reading env file");
    let text = std::fs::read_to_string(path).map_err(|source| CorralError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_env_lines(&text))
}

/// Builds the final environment: files in order, then `environment`.
///
/// # Errors
///
/// Returns [`CorralError::Io`] if any file cannot be read.
pub fn merge_environment<P: AsRef<Path>>(
    files: &[P],
    environment: &IndexMap<String, String>,
) -> Result<IndexMap<String, String>> {
    let mut merged = IndexMap::new();
    for file in files {
        merged.extend(read_env_file(file.as_ref())?);
    }
    merged.extend(environment.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn skips_blank_lines_and_comments() {
        let vars = parse_env_lines("# comment\n\nA=1\n  B = two words\nFLAG\n");
        assert_eq!(vars.get("A").map(String::as_str), Some("1"));
        assert_eq!(vars.get("B").map(String::as_str), Some(" two words"));
        assert_eq!(vars.get("FLAG").map(String::as_str), Some(""));
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn value_may_contain_equals() {
        let vars = parse_env_lines("URL=postgres://u:p@h/db?sslmode=off\n");
        assert_eq!(
            vars.get("URL").map(String::as_str),
            Some("postgres://u:p@h/db?sslmode=off")
        );
    }

    #[test]
    fn environment_overrides_files_in_order() {
        let mut first = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(first, "A=file1\nB=file1").expect("write");
        let mut second = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(second, "B=file2\nC=file2").expect("write");

        let mut environment = IndexMap::new();
        let _ = environment.insert("C".to_string(), "env".to_string());

        let merged =
            merge_environment(&[first.path(), second.path()], &environment).expect("merge");
        assert_eq!(merged.get("A").map(String::as_str), Some("file1"));
        assert_eq!(merged.get("B").map(String::as_str), Some("file2"));
        assert_eq!(merged.get("C").map(String::as_str), Some("env"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_env_file(Path::new("/nonexistent/corral.env")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/corral.env"), "got: {msg}");
    }
}
