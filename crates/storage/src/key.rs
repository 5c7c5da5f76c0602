//! Blob key validation.
//!
//! Keys are `/`-separated and relative to the backend root. Validation
//! prevents keys from escaping the root (no `..` traversal past the top).

use crate::error::{ErrorKind, Result};

/// Validates a blob key and returns its normalized form.
///
/// > **Note:** Backslashes are rejected rather than treated as separators, so
/// >           a key means the same thing on every platform.
///
/// # Examples
///
/// ```
/// use folio_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("8f14e45f-ceea-467f-a0e6-7c6f5d3b7c27").is_ok());
/// assert!(validate_key("html/2024/article.html").is_ok());
/// assert!(validate_key("a/../file").is_ok()); // (never leaves the root)
/// // Invalid keys
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a/../../b").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(validate_key("wrong/.././correct//key/").unwrap(), "correct/key");
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let raw = key.as_ref();
    let invalid = || ErrorKind::InvalidKey(raw.to_string());
    let mut components: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {},
            ".." => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            // Null bytes cause truncation in C-based syscalls.
            s if s.contains('\0') || s.contains('\\') => exn::bail!(invalid()),
            s => components.push(s),
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.join("/")),
    }
}
