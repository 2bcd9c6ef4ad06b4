//! Output root cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur while cleaning.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("Failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("Failed to create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
}

/// Remove everything inside `out_dir`, leaving the directory itself.
///
/// A missing directory is created. Returns the number of top-level entries
/// removed.
pub fn run(out_dir: &Path) -> Result<usize, CleanError> {
    let mut removed = 0;

    match fs::read_dir(out_dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry.map_err(|e| CleanError::Remove {
                    path: out_dir.to_path_buf(),
                    source: e,
                })?;
                let path = entry.path();
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

                let result = if is_dir {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                result.map_err(|e| CleanError::Remove {
                    path: path.clone(),
                    source: e,
                })?;
                removed += 1;
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(CleanError::Remove {
                path: out_dir.to_path_buf(),
                source: e,
            })
        }
    }

    fs::create_dir_all(out_dir).map_err(|e| CleanError::Create {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    tracing::debug!("Cleaned {} ({} entries)", out_dir.display(), removed);

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empties_populated_root() {
        let temp = tempdir().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir_all(dist.join("css")).unwrap();
        fs::write(dist.join("index.html"), "<p></p>").unwrap();
        fs::write(dist.join("css/all.css"), "a{}").unwrap();

        let removed = run(&dist).unwrap();

        assert_eq!(removed, 2);
        assert!(dist.is_dir());
        assert_eq!(fs::read_dir(&dist).unwrap().count(), 0);
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let temp = tempdir().unwrap();
        let dist = temp.path().join("dist");

        assert_eq!(run(&dist).unwrap(), 0);
        assert!(dist.is_dir());
    }

    #[test]
    fn is_idempotent() {
        let temp = tempdir().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("a.txt"), "a").unwrap();

        run(&dist).unwrap();
        let second = run(&dist).unwrap();

        assert_eq!(second, 0);
        assert_eq!(fs::read_dir(&dist).unwrap().count(), 0);
    }
}
