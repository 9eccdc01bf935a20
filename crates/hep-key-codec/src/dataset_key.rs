//! DataSet keys: a one-byte nesting `level`, then `parent_path + "/" +
//! name`, all ASCII (§3.2). `level` is the 1-based depth of the dataset
//! being named, which lets `list_range` scope a scan to exactly one level
//! of the path tree without also matching grandchildren.

use crate::error::Error;

/// Rejects dataset names containing `/` or `%`, the two characters reserved
/// for path separation and (in the original deployment) URL-style escaping.
pub fn validate_dataset_name(name: &str) -> Result<(), Error> {
    if name.contains('/') || name.contains('%') {
        return Err(Error::InvalidDatasetName(name.to_string()));
    }
    Ok(())
}

/// Depth of `path`: the number of non-empty `/`-separated segments. The
/// root path `""` has depth 0.
pub fn depth(path: &str) -> u8 {
    path.split('/').filter(|s| !s.is_empty()).count() as u8
}

/// Encodes the key for a dataset named `name` under `parent_path` (`""` for
/// a top-level dataset).
pub fn encode_dataset_key(parent_path: &str, name: &str) -> Result<Vec<u8>, Error> {
    validate_dataset_name(name)?;
    if !parent_path.is_ascii() || !name.is_ascii() {
        return Err(Error::NotAscii);
    }
    let level = depth(parent_path) + 1;

    let mut buf = Vec::with_capacity(1 + parent_path.len() + 1 + name.len());
    buf.push(level);
    buf.extend_from_slice(parent_path.as_bytes());
    buf.push(b'/');
    buf.extend_from_slice(name.as_bytes());
    Ok(buf)
}

/// The key prefix shared by every direct child of the dataset at `path`:
/// the child level byte, then `path`, then a trailing `/`. Used with
/// `list_range` to enumerate a dataset's children without also matching
/// its own key or deeper descendants.
pub fn child_prefix(path: &str) -> Vec<u8> {
    let level = depth(path) + 1;
    let mut buf = Vec::with_capacity(1 + path.len() + 1);
    buf.push(level);
    buf.extend_from_slice(path.as_bytes());
    buf.push(b'/');
    buf
}

/// Decodes a dataset key into `(level, parent_path, name)`.
pub fn decode_dataset_key(bytes: &[u8]) -> Result<(u8, String, String), Error> {
    if bytes.is_empty() {
        return Err(Error::WrongLength {
            expected: 1,
            actual: 0,
        });
    }
    let level = bytes[0];
    let rest = std::str::from_utf8(&bytes[1..]).map_err(|_| Error::NotAscii)?;
    if !rest.is_ascii() {
        return Err(Error::NotAscii);
    }
    let idx = rest.rfind('/').ok_or(Error::MissingSeparator)?;
    let parent_path = rest[..idx].to_string();
    let name = rest[idx + 1..].to_string();
    Ok((level, parent_path, name))
}

/// The full `parent_path/name` path string for a dataset, as used to key
/// its own children's `parent_path`.
pub fn join_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{parent_path}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_top_level() {
        let key = encode_dataset_key("", "matthieu").unwrap();
        let (level, parent, name) = decode_dataset_key(&key).unwrap();
        assert_eq!(level, 1);
        assert_eq!(parent, "");
        assert_eq!(name, "matthieu");
    }

    #[test]
    fn round_trip_nested() {
        let key = encode_dataset_key("matthieu", "exp1").unwrap();
        let (level, parent, name) = decode_dataset_key(&key).unwrap();
        assert_eq!(level, 2);
        assert_eq!(parent, "matthieu");
        assert_eq!(name, "exp1");
    }

    #[test]
    fn rejects_forbidden_characters() {
        assert!(encode_dataset_key("", "a/b").is_err());
        assert!(encode_dataset_key("", "a%b").is_err());
    }

    #[test]
    fn child_prefix_matches_encoded_child_key() {
        let prefix = child_prefix("matthieu");
        let key = encode_dataset_key("matthieu", "exp1").unwrap();
        assert!(key.starts_with(&prefix));
    }
}
