use std::{
    env, fs, io,
    path::{Component, Path},
};

use log::{info, warn};

use crate::error::{Result, SweepError};

/// Rejects output directories whose recreation would delete more than the
/// sweep's own reports.
///
/// The path must name a directory of its own: not empty, no `..` components,
/// at least one normal component, and not the working directory or one of
/// its ancestors.
///
/// # Errors
/// Returns `InvalidConfig` naming the offending path, or `OutputDir` if the
/// working directory cannot be determined for an absolute path.
pub fn check_output_dir(path: &Path) -> Result<()> {
    let reject = |why: &str| {
        Err(SweepError::InvalidConfig(format!(
            "output_dir '{}' {why}",
            path.display()
        )))
    };

    if path.as_os_str().is_empty() {
        return reject("must not be empty");
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return reject("must not contain '..'");
    }
    if !path.components().any(|c| matches!(c, Component::Normal(_))) {
        return reject("must name a directory below the current one");
    }

    // Relative paths with a normal component and no `..` always land strictly
    // below the working directory.
    if path.is_absolute() {
        let cwd = env::current_dir().map_err(|source| SweepError::OutputDir {
            path: path.to_path_buf(),
            source,
        })?;
        if cwd.starts_with(path) {
            return reject("contains the current directory");
        }
    }

    Ok(())
}

/// Recreates `path` as an empty directory, deleting whatever was there.
///
/// # Errors
/// Returns `InvalidConfig` if `path` fails [`check_output_dir`], and
/// `OutputDir` if the old contents cannot be removed or the directory cannot
/// be created.
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    check_output_dir(path)?;

    let wrap = |source: io::Error| SweepError::OutputDir {
        path: path.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            warn!("deleting existing output directory {}", path.display());
            fs::remove_dir_all(path).map_err(wrap)?;
        }
        Ok(_) => {
            warn!("deleting existing file at {}", path.display());
            fs::remove_file(path).map_err(wrap)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(wrap(e)),
    }

    fs::create_dir_all(path).map_err(wrap)?;
    info!("created output directory {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directory_with_parents() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("reports").join("sweep");

        prepare_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn empties_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("sweep");
        fs::create_dir_all(out.join("nested")).unwrap();
        fs::write(out.join("old.csv"), "stale").unwrap();
        fs::write(out.join("nested").join("older.csv"), "stale").unwrap();

        prepare_output_dir(&out).unwrap();

        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn replaces_plain_file() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("sweep");
        fs::write(&out, "not a directory").unwrap();

        prepare_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn rejects_paths_that_reach_the_working_directory() {
        for path in [".", "./", "", "sub/..", "reports/../..", "../sibling", "/"] {
            assert!(
                matches!(
                    check_output_dir(Path::new(path)),
                    Err(SweepError::InvalidConfig(_))
                ),
                "{path:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_working_directory_and_its_ancestors() {
        let cwd = env::current_dir().unwrap();
        assert!(check_output_dir(&cwd).is_err());
        assert!(check_output_dir(cwd.parent().unwrap()).is_err());
    }

    #[test]
    fn accepts_dedicated_directories() {
        let root = tempfile::tempdir().unwrap();
        for path in ["reports/sweep", "./out", "out/./nested"] {
            assert!(check_output_dir(Path::new(path)).is_ok(), "{path:?}");
        }
        assert!(check_output_dir(&root.path().join("out")).is_ok());
        assert!(check_output_dir(&env::current_dir().unwrap().join("out")).is_ok());
    }

    #[test]
    fn parent_component_deletes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let precious = root.path().join("precious.txt");
        fs::write(&precious, "keep me").unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();

        let err = prepare_output_dir(&root.path().join("sub").join("..")).unwrap_err();
        assert!(matches!(err, SweepError::InvalidConfig(_)));
        assert_eq!(fs::read_to_string(&precious).unwrap(), "keep me");
        assert!(root.path().join("sub").is_dir());
    }
}
