//! Platform font directories and the font cache location.

use std::fs;
use std::path::{Path, PathBuf};

use decal_core::logging::targets;
use directories::BaseDirs;

/// Directory created under the per-user data directory.
pub const APP_DIR_NAME: &str = "decal";

/// File name of the persisted catalog.
pub const CACHE_FILE_NAME: &str = "font_cache.json";

/// Conventional system and per-user font directories for this platform.
///
/// Directories that do not exist are included; scanning skips them.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    let in_home = |rel: &str| home.as_ref().map(|home| home.join(rel));

    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        let windir = std::env::var_os("WINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));
        dirs.push(windir.join("Fonts"));
        dirs.extend(in_home(r"AppData\Local\Microsoft\Windows\Fonts"));
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/Library/Fonts"));
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.extend(in_home("Library/Fonts"));
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.extend(in_home(".fonts"));
        dirs.extend(in_home(".local/share/fonts"));
    }
    dirs
}

/// The per-user application data directory, e.g. `~/.local/share/decal`.
pub fn app_data_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.data_local_dir().join(APP_DIR_NAME))
}

/// Default font cache path, creating its directory.
pub fn default_cache_path() -> PathBuf {
    resolve_cache_path(app_data_dir().as_deref())
}

/// Cache file path inside `dir`, creating `dir` if needed.
///
/// Falls back to [`CACHE_FILE_NAME`] in the working directory when `dir` is
/// `None` or cannot be created.
pub fn resolve_cache_path(dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = dir {
        match fs::create_dir_all(dir) {
            Ok(()) => return dir.join(CACHE_FILE_NAME),
            Err(e) => {
                tracing::warn!(
                    target: targets::FONT,
                    path = %dir.display(),
                    error = %e,
                    "cannot create cache directory, using working directory"
                );
            }
        }
    }
    PathBuf::from(CACHE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn platform_dirs_are_absolute() {
        let dirs = system_font_dirs();
        assert!(!dirs.is_empty());
        assert!(dirs.iter().all(|d| d.is_absolute()));
    }

    #[test]
    fn cache_path_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("decal");
        let path = resolve_cache_path(Some(&dir));
        assert!(dir.is_dir());
        assert_eq!(path, dir.join(CACHE_FILE_NAME));
    }

    #[test]
    fn cache_path_falls_back_when_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        // A regular file cannot be a parent directory.
        let path = resolve_cache_path(Some(&blocker.join("decal")));
        assert_eq!(path, PathBuf::from(CACHE_FILE_NAME));
        assert_eq!(resolve_cache_path(None), PathBuf::from(CACHE_FILE_NAME));
    }
}
