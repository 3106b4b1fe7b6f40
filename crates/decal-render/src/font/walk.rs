//! Recursive font file discovery.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use decal_core::logging::targets;

/// File extensions recognized as outline fonts (compared case-insensitively).
pub const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// Whether `path` has a recognized font extension.
pub fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FONT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// A depth-first iterator over the font files below a directory.
///
/// Entries of each directory are visited in file-name order, files before
/// subdirectories, so two walks over an unchanged tree yield the same
/// sequence. Symbolic links to directories are not descended into.
/// Unreadable directories are skipped.
pub struct FontFileWalker {
    /// Directories still to visit; the next one is at the end.
    stack: Vec<PathBuf>,
    /// Font files of the most recently read directory.
    ready: VecDeque<PathBuf>,
}

impl FontFileWalker {
    /// Walk `root`. A missing or non-directory root yields nothing.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let stack = if root.is_dir() {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
        Self {
            stack,
            ready: VecDeque::new(),
        }
    }

    fn read_directory(&mut self, dir: &Path) {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                tracing::debug!(target: targets::FONT, path = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        let mut entries: Vec<fs::DirEntry> = read_dir.filter_map(Result::ok).collect();
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let path = entry.path();
            let is_link = entry.file_type().is_ok_and(|ft| ft.is_symlink());
            if path.is_dir() {
                if !is_link {
                    subdirs.push(path);
                }
            } else if is_font_file(&path) {
                self.ready.push_back(path);
            }
        }

        // Reversed so the first subdirectory is popped first.
        self.stack.extend(subdirs.into_iter().rev());
    }
}

impl Iterator for FontFileWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(path) = self.ready.pop_front() {
                return Some(path);
            }
            let dir = self.stack.pop()?;
            self.read_directory(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"font").unwrap();
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_font_file(Path::new("a/Arial.ttf")));
        assert!(is_font_file(Path::new("a/Arial.OTF")));
        assert!(!is_font_file(Path::new("a/Arial.woff")));
        assert!(!is_font_file(Path::new("a/ttf")));
    }

    #[test]
    fn walks_files_before_subdirectories_in_name_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("b.ttf"));
        touch(&root.join("a.otf"));
        touch(&root.join("notes.txt"));
        touch(&root.join("sub1/c.ttf"));
        touch(&root.join("sub1/deep/d.ttf"));
        touch(&root.join("sub2/e.TTF"));

        let found: Vec<PathBuf> = FontFileWalker::new(root)
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        let expected: Vec<PathBuf> = [
            "a.otf",
            "b.ttf",
            "sub1/c.ttf",
            "sub1/deep/d.ttf",
            "sub2/e.TTF",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(FontFileWalker::new(dir.path().join("nope")).count(), 0);
    }
}
