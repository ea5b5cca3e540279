// Glob listing over an object store
//
// Only the literal prefix of a glob is listed; the remaining segments are
// matched client-side. `*` never crosses a `/`.

use crate::error::{Result, StorageError};
use futures::TryStreamExt;
use globset::GlobBuilder;
use opendal::{ErrorKind, Operator};
use tracing::debug;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Directory prefix of `pattern` that contains no glob syntax, including the
/// trailing `/`. Single-character classes such as `[[]` (the escaped form of a
/// metacharacter) are read as the literal they match. Empty when the first
/// segment already has a wildcard.
pub(crate) fn literal_prefix(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut literal = String::new();
    let mut dir_end = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '[' && chars.get(i + 2) == Some(&']') && !matches!(chars.get(i + 1), Some('!' | '^')) {
            literal.push(chars[i + 1]);
            i += 3;
            continue;
        }
        if GLOB_META.contains(&c) {
            break;
        }
        literal.push(c);
        if c == '/' {
            dir_end = literal.len();
        }
        i += 1;
    }
    literal.truncate(dir_end);
    literal
}

/// Sorted keys of every file under `operator` matching `pattern`.
pub(crate) async fn list_matching(operator: &Operator, path: &str, pattern: &str) -> Result<Vec<String>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| StorageError::read_failure(path, e))?
        .compile_matcher();

    let prefix = literal_prefix(pattern);
    let mut lister = match operator.lister_with(&prefix).recursive(true).await {
        Ok(lister) => lister,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::read_failure(path, e)),
    };

    let mut keys = Vec::new();
    while let Some(entry) = lister
        .try_next()
        .await
        .map_err(|e| StorageError::read_failure(path, e))?
    {
        if entry.metadata().is_file() && matcher.is_match(entry.path()) {
            keys.push(entry.path().to_string());
        }
    }
    keys.sort();

    debug!(path, prefix = %prefix, matched = keys.len(), "Listed objects");
    Ok(keys)
}
