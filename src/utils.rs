use std::{
    path::{Component, Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
pub(crate) fn millis_since_unix_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time is valid")
        .as_millis() as u64
}

/// Increments a big-endian `u64` counter stored as bytes
#[cfg(feature = "sqlite")]
pub(crate) fn increment(old: Option<&[u8]>) -> Vec<u8> {
    let number = match old.map(TryInto::try_into) {
        Some(Ok(bytes)) => u64::from_be_bytes(bytes) + 1,
        // Start at one, zero is never handed out as an identifier
        _ => 1,
    };

    number.to_be_bytes().to_vec()
}

/// Parses the bytes into an u64.
pub(crate) fn u64_from_bytes(
    bytes: &[u8],
) -> Result<u64, std::array::TryFromSliceError> {
    let array: [u8; 8] = bytes.try_into()?;
    Ok(u64::from_be_bytes(array))
}

/// Lexically normalizes a path without touching the file system
///
/// `.` components are dropped and `..` removes the preceding normal
/// component. A `..` directly below the root stays at the root, a leading
/// `..` in a relative path is kept.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => {
                    cleaned.push(component);
                }
            },
            Component::Prefix(_)
            | Component::RootDir
            | Component::Normal(_) => {
                cleaned.push(component);
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }

    cleaned
}

/// Turns a dashboard title into a URL-friendly slug
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}
