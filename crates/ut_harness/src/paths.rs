//! Path helpers shared by the invoker and comparator

use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory and resolve `.` / `..` lexically.
///
/// Symlinks are not resolved and the path does not need to exist.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Lexically normalize a path, dropping `.` and folding `..` into its parent
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a path relative to a tree root with `/` separators on every platform.
///
/// Bytes that are not valid UTF-8 are written as `\xNN`, so distinct names always render
/// to distinct keys.
pub fn relative_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(escape_component(part)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn escape_component(part: &OsStr) -> String {
    if let Some(s) = part.to_str() {
        return s.to_string();
    }

    let mut out = String::new();
    let mut rest = part.as_encoded_bytes();
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let bad = e.error_len().unwrap_or(after.len());
                for byte in &after[..bad] {
                    out.push_str(&format!("\\x{:02x}", byte));
                }
                rest = &after[bad..];
            }
        }
    }
    out
}
