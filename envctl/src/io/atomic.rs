//! Replace-by-rename file writes.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Atomically replace `path` with `contents` (temp file in the same directory + rename).
///
/// Readers see either the old file or the new one, never a partial write. On
/// error the temp file is removed and `path` is untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn replaces_existing_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("requirements.txt");
        fs::write(&path, "old==1.0\n").expect("seed");

        write_atomic(&path, b"new==2.0\n").expect("write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "new==2.0\n");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path() != path)
            .collect();
        assert!(leftovers.is_empty(), "temp file left behind");
    }

    #[test]
    fn failed_rename_leaves_existing_target_and_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("requirements.txt");
        fs::create_dir(&target).expect("dir at target");
        fs::write(target.join("keep.txt"), "keep\n").expect("seed");

        assert!(write_atomic(&target, b"new==2.0\n").is_err());

        assert!(target.is_dir());
        assert_eq!(
            fs::read_to_string(target.join("keep.txt")).expect("read"),
            "keep\n"
        );
        let entries: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        assert_eq!(entries, vec![target], "temp file left behind");
    }

    #[test]
    fn missing_directory_fails_without_creating_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent").join("requirements.txt");
        assert!(write_atomic(&path, b"x\n").is_err());
        assert!(!path.exists());
    }
}
