use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Delete all but the `keep` most recently created files in `dir`.
///
/// Ordering falls back to mtime where the filesystem does not expose a
/// creation time. Subdirectories are left alone. Returns the paths that
/// were removed.
pub fn rotate_by_created(dir: &Path, keep: usize) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let stamp = meta.created().or_else(|_| meta.modified())?;
        files.push((entry.path(), stamp));
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = Vec::new();
    for (path, _) in files.into_iter().skip(keep) {
        fs::remove_file(&path)?;
        tracing::info!(file = %path.display(), "removed rotated log file");
        removed.push(path);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        writeln!(f, "log line").unwrap();
        path
    }

    #[test]
    fn keeps_newest_files_and_removes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("run_{}.log", i));
            // distinct timestamps so the ordering is unambiguous
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        let removed = rotate_by_created(dir.path(), 2).unwrap();
        assert_eq!(removed.len(), 3);

        let left: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn keep_larger_than_population_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "only.log");

        let removed = rotate_by_created(dir.path(), 30).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        touch(dir.path(), "a.log");
        std::thread::sleep(std::time::Duration::from_millis(20));
        touch(dir.path(), "b.log");

        let removed = rotate_by_created(dir.path(), 1).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(dir.path().join("archive").exists());
    }
}
