use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

const APP_DIR: &str = "artsync";

/// Cache directory (covers, provenance databases):
/// - Linux: ~/.cache/artsync
/// - macOS: ~/Library/Caches/artsync
/// - Windows: %LOCALAPPDATA%\artsync
pub fn cache_root() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Config directory holding settings.toml.
pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Staging path for a downloaded cover. Deterministic so repeated runs
/// reuse the same location and the folder stays inspectable by hand.
pub fn cover_path(cover_root: &Path, kind_dir: &str, folder: &str, stem: &str) -> PathBuf {
    cover_root
        .join(kind_dir)
        .join(slugify(folder))
        .join(format!("{stem}.jpg"))
}

/// ASCII-fold and hyphenate a display name for use as a directory name.
/// "Spider-Man: Into the Spider-Verse" -> "spider-man-into-the-spider-verse".
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let mut out = String::with_capacity(ascii.len());
    let mut pending_sep = false;
    for ch in ascii.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_sep = true;
        }
    }
    out.trim_matches(['-', '_']).to_string()
}

/// Remove a folder tree (or single file). Missing targets are not an error.
pub fn delete_folder(folder: &Path) -> io::Result<()> {
    if folder.is_dir() {
        fs::remove_dir_all(folder)
    } else if folder.exists() {
        fs::remove_file(folder)
    } else {
        Ok(())
    }
}
