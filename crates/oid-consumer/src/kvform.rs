//! Key-value form: the `key:value\n` body used by direct requests.

use crate::error::{ConsumerError, ConsumerResult};

/// Serializes pairs into key-value form.
///
/// # Errors
///
/// Returns an error if a key contains `:` or a newline, or a value
/// contains a newline.
pub fn to_kv<'a, I>(pairs: I) -> ConsumerResult<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        if key.contains(':') || key.contains('\n') {
            return Err(ConsumerError::KvForm(format!("invalid key {key:?}")));
        }
        if value.contains('\n') {
            return Err(ConsumerError::KvForm(format!(
                "newline in value for {key:?}"
            )));
        }
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    Ok(out)
}

/// Parses key-value form.
///
/// Lines without a `:` are skipped. Keys and values are trimmed.
#[must_use]
pub fn from_kv(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => pairs.push((key.trim().to_string(), value.trim().to_string())),
            None => tracing::debug!(line = index + 1, "skipping kv line without separator"),
        }
    }
    pairs
}
