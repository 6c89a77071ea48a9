//! Filesystem checks built on `cap-std` and `camino`.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Whether `path` exists and is a regular file.
pub(crate) fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let parent = parent_or_current(path);
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other("path should include a file name"))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Create every missing directory above `path`.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
        return Ok(());
    };
    let (base, relative) = split_root(parent);
    if relative.as_str().is_empty() {
        return Ok(());
    }
    fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?.create_dir_all(&relative)
}

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

/// Split a directory into an ambient base and the part to create below it.
fn split_root(dir: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    if dir.is_absolute() {
        let mut components = dir.components();
        let root: Utf8PathBuf = components.next().into_iter().collect();
        (root, components.collect())
    } else {
        (Utf8PathBuf::from("."), dir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    #[rstest]
    fn reports_files_and_directories() {
        let dir = TempDir::new().expect("tempdir");
        let root = utf8_root(&dir);
        let file = root.join("rating.db");
        std::fs::write(&file, b"db").expect("write file");

        let sub = root.join("sub");
        std::fs::create_dir(&sub).expect("create directory");

        assert!(file_is_file(&file).expect("inspect file"));
        assert!(!file_is_file(&sub).expect("inspect directory"));
        let missing = file_is_file(&root.join("missing.db")).expect_err("missing file");
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[rstest]
    fn creates_nested_parents() {
        let dir = TempDir::new().expect("tempdir");
        let target = utf8_root(&dir).join("a/b/rating.db");
        ensure_parent_dir(&target).expect("create parents");
        assert!(target.parent().expect("parent").is_dir());
    }
}
