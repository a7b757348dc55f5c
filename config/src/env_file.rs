//! Parse and rewrite `.env` files.
//!
//! The gateway keeps its rotating credentials (`WARP_JWT`,
//! `WARP_REFRESH_TOKEN`) in a plain `.env` file; the credential manager
//! re-reads it per request and upserts keys after a refresh.

use std::collections::HashMap;
use std::path::Path;

/// Minimal .env parser: lines as KEY=VALUE, skip empty and # comments, trim key and value.
///
/// * Empty value: `KEY=` or `KEY=""` yields key with value `""`.
/// * Comments: only lines starting with `#` (after trim) are skipped; `#` inside value is kept.
/// * Quotes: double-quoted values support `\"` escape; single-quoted values are stripped, no escape.
/// * No multiline or line continuation.
pub(crate) fn parse_env(content: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim().to_string();
        let value = v.trim().to_string();
        let value = if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            value[1..value.len() - 1].replace("\\\"", "\"")
        } else {
            value
        };
        let value = value
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.to_string())
            .unwrap_or(value);
        if !key.is_empty() {
            out.insert(key, value);
        }
    }
    out
}

/// Reads `path` into a key-value map. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> std::io::Result<HashMap<String, String>> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_env(&content))
}

/// Reads one key from `path`, falling back to the process environment.
///
/// The file wins over the process environment so that a credential rotated
/// by another task in this process is picked up on the next read.
pub fn env_file_var(path: &Path, key: &str) -> Option<String> {
    if let Ok(map) = read_env_file(path) {
        if let Some(v) = map.get(key) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
    }
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Sets `key=value` in the env file at `path`, replacing an existing line for
/// `key` or appending one. Other lines (including comments) are preserved.
/// The file is created when missing. The write goes through a temp file in
/// the same directory followed by a rename.
pub fn upsert_env_var(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    let existing = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    for line in existing.lines() {
        let trimmed = line.trim();
        let is_target = !trimmed.starts_with('#')
            && trimmed
                .split_once('=')
                .map(|(k, _)| k.trim() == key)
                .unwrap_or(false);
        if is_target && !replaced {
            lines.push(format!("{key}={value}"));
            replaced = true;
        } else if !is_target {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(format!("{key}={value}"));
    }

    let mut content = lines.join("\n");
    content.push('\n');

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(".env")
    ));
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let m = parse_env("FOO=bar\nBAZ=quux\n");
        assert_eq!(m.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(m.get("BAZ"), Some(&"quux".to_string()));
    }

    #[test]
    fn skip_comments_and_empty() {
        let m = parse_env("\n# comment\nKEY=val\n  \n");
        assert_eq!(m.get("KEY"), Some(&"val".to_string()));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn quoted_value() {
        let m = parse_env(r#"KEY="hello world""#);
        assert_eq!(m.get("KEY"), Some(&"hello world".to_string()));
    }

    #[test]
    fn upsert_replaces_existing_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# creds\nWARP_JWT=old\nOTHER=1\n").unwrap();
        upsert_env_var(&path, "WARP_JWT", "new").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("WARP_JWT=new"));
        assert!(!content.contains("WARP_JWT=old"));
        assert!(content.contains("# creds"));
        assert!(content.contains("OTHER=1"));
    }

    #[test]
    fn upsert_appends_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        upsert_env_var(&path, "WARP_REFRESH_TOKEN", "tok").unwrap();
        let m = read_env_file(&path).unwrap();
        assert_eq!(m.get("WARP_REFRESH_TOKEN"), Some(&"tok".to_string()));
    }

    #[test]
    fn upsert_twice_keeps_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        upsert_env_var(&path, "K", "a").unwrap();
        upsert_env_var(&path, "K", "b").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("K=").count(), 1);
        assert!(content.contains("K=b"));
    }

    #[test]
    fn env_file_var_prefers_file_over_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "ENV_FILE_VAR_TEST=from_file\n").unwrap();
        std::env::set_var("ENV_FILE_VAR_TEST", "from_env");
        let v = env_file_var(&path, "ENV_FILE_VAR_TEST");
        std::env::remove_var("ENV_FILE_VAR_TEST");
        assert_eq!(v.as_deref(), Some("from_file"));
    }

    #[test]
    fn env_file_var_missing_everywhere_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        assert_eq!(env_file_var(&path, "ENV_FILE_VAR_ABSENT_XYZ"), None);
    }
}
