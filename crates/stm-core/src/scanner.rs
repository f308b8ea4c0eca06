//! Input path expansion
//!
//! A directory given as input stands for the files directly inside it.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Replace every directory in `paths` by the regular files it contains.
///
/// Only the top level of a directory is listed, sorted by file name, and
/// hidden files (leading `.`) are skipped. Other paths are kept as given,
/// even if they do not exist; loading reports those. The order of `paths`
/// is preserved.
pub fn expand_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();

        if !path.is_dir() {
            files.push(path.to_path_buf());
            continue;
        }

        let before = files.len();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_file() && !is_hidden(entry.path()) {
                files.push(entry.into_path());
            }
        }
        log::debug!(
            "expanded {} to {} file(s)",
            path.display(),
            files.len() - before
        );
    }

    if files.is_empty() {
        return Err(Error::NoInputs);
    }

    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_files_pass_through_in_order() {
        let paths = vec![PathBuf::from("b.tsv"), PathBuf::from("a.tsv")];

        let expanded = expand_inputs(&paths).unwrap();

        assert_eq!(expanded, paths);
    }

    #[test]
    fn test_directory_lists_top_level_files_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.tsv"), "id\n").unwrap();
        fs::write(dir.path().join("a.tsv"), "id\n").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.tsv"), "id\n").unwrap();

        let extra = PathBuf::from("z.tsv");
        let expanded = expand_inputs(&[dir.path().to_path_buf(), extra.clone()]).unwrap();

        assert_eq!(
            expanded,
            vec![dir.path().join("a.tsv"), dir.path().join("b.tsv"), extra]
        );
    }

    #[test]
    fn test_empty_expansion_is_an_error() {
        let dir = tempdir().unwrap();

        let err = expand_inputs(&[dir.path()]).unwrap_err();

        assert!(matches!(err, Error::NoInputs));
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("/data/.DS_Store")));
        assert!(!is_hidden(Path::new("/data/specimens.tsv")));
    }
}
