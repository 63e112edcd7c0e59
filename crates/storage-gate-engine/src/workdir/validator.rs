use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of validating a candidate working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Exists as a writable directory
    Ready(PathBuf),
    /// Missing, but its parent is a writable directory
    CreatableAtPath(PathBuf),
    /// Cannot be used or created
    Unusable(PathBuf),
}

impl ValidationResult {
    pub fn path(&self) -> &Path {
        match self {
            ValidationResult::Ready(path)
            | ValidationResult::CreatableAtPath(path)
            | ValidationResult::Unusable(path) => path,
        }
    }
}

/// The filesystem facts validation depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Missing,
    Directory { writable: bool },
    /// Exists as something other than a directory
    Other,
    /// Could not be inspected for a reason other than absence
    Inaccessible,
}

/// Gather the facts for `path`. Blocking.
pub fn inspect(path: &Path) -> PathKind {
    match fs::metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => PathKind::Missing,
        Err(e) => {
            log::debug!("Cannot inspect {}: {e}", path.display());
            PathKind::Inaccessible
        }
        Ok(metadata) if metadata.is_dir() => PathKind::Directory {
            writable: !metadata.permissions().readonly() && can_create_in(path),
        },
        Ok(_) => PathKind::Other,
    }
}

// Permission bits do not reflect ACLs, mount flags or storage sandboxing, so
// writability is settled by actually creating (and removing) a file.
fn can_create_in(dir: &Path) -> bool {
    let probe = dir.join(format!(".storage-gate-{}", uuid::Uuid::new_v4()));
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
    {
        Ok(file) => {
            drop(file);
            if let Err(e) = fs::remove_file(&probe) {
                log::warn!("Failed to remove write probe {}: {e}", probe.display());
            }
            true
        }
        Err(e) => {
            log::debug!("{} is not writable: {e}", dir.display());
            false
        }
    }
}

/// Apply the validation precedence to already-gathered facts.
///
/// `parent` is only consulted when `target` is missing.
pub fn classify(path: &Path, target: PathKind, parent: PathKind) -> ValidationResult {
    let path = path.to_path_buf();
    match target {
        PathKind::Directory { writable: true } => ValidationResult::Ready(path),
        PathKind::Directory { writable: false } => {
            log::warn!("{} exists but is not writable", path.display());
            ValidationResult::Unusable(path)
        }
        PathKind::Other => {
            log::warn!("{} exists but is not a directory", path.display());
            ValidationResult::Unusable(path)
        }
        PathKind::Inaccessible => {
            log::warn!("{} cannot be inspected", path.display());
            ValidationResult::Unusable(path)
        }
        PathKind::Missing => match parent {
            PathKind::Directory { writable: true } => ValidationResult::CreatableAtPath(path),
            PathKind::Directory { writable: false } => {
                log::warn!(
                    "{} is missing and its parent is not writable",
                    path.display()
                );
                ValidationResult::Unusable(path)
            }
            PathKind::Inaccessible => {
                log::warn!(
                    "{} is missing and its parent cannot be inspected",
                    path.display()
                );
                ValidationResult::Unusable(path)
            }
            PathKind::Other | PathKind::Missing => {
                log::warn!(
                    "{} is missing and has no usable parent directory",
                    path.display()
                );
                ValidationResult::Unusable(path)
            }
        },
    }
}

/// Validate `path` against the live filesystem. Blocking; run it off the UI thread.
pub fn validate(path: &Path) -> ValidationResult {
    let target = inspect(path);
    let parent = match target {
        PathKind::Missing => path.parent().map_or(PathKind::Missing, inspect),
        _ => PathKind::Missing,
    };
    let result = classify(path, target, parent);
    log::debug!("Validated {}: {result:?}", path.display());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::create_test_root;
    use rstest::rstest;

    const WRITABLE_DIR: PathKind = PathKind::Directory { writable: true };
    const READONLY_DIR: PathKind = PathKind::Directory { writable: false };

    #[rstest]
    #[case::writable_dir(WRITABLE_DIR, PathKind::Missing, "ready")]
    #[case::writable_dir_ignores_parent(WRITABLE_DIR, READONLY_DIR, "ready")]
    #[case::readonly_dir(READONLY_DIR, WRITABLE_DIR, "unusable")]
    #[case::regular_file(PathKind::Other, WRITABLE_DIR, "unusable")]
    #[case::missing_writable_parent(PathKind::Missing, WRITABLE_DIR, "creatable")]
    #[case::missing_readonly_parent(PathKind::Missing, READONLY_DIR, "unusable")]
    #[case::missing_parent_is_file(PathKind::Missing, PathKind::Other, "unusable")]
    #[case::missing_parent_missing(PathKind::Missing, PathKind::Missing, "unusable")]
    #[case::inaccessible(PathKind::Inaccessible, WRITABLE_DIR, "unusable")]
    #[case::missing_parent_inaccessible(PathKind::Missing, PathKind::Inaccessible, "unusable")]
    fn test_classify_precedence(
        #[case] target: PathKind,
        #[case] parent: PathKind,
        #[case] expected: &str,
    ) {
        let path = Path::new("/storage/app/dir");
        let result = classify(path, target, parent);

        let variant = match &result {
            ValidationResult::Ready(_) => "ready",
            ValidationResult::CreatableAtPath(_) => "creatable",
            ValidationResult::Unusable(_) => "unusable",
        };
        assert_eq!(variant, expected);
        assert_eq!(result.path(), path);
    }

    #[test]
    fn test_validate_existing_directory_is_ready() {
        let root = create_test_root();

        let result = validate(root.path());

        assert_eq!(result, ValidationResult::Ready(root.path().to_path_buf()));
    }

    #[test]
    fn test_validate_leaves_no_probe_behind() {
        let root = create_test_root();

        validate(root.path());

        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_validate_missing_with_writable_parent_is_creatable() {
        let root = create_test_root();
        let path = root.path().join("dir");

        assert_eq!(validate(&path), ValidationResult::CreatableAtPath(path));
    }

    #[test]
    fn test_validate_regular_file_is_unusable() {
        let root = create_test_root();
        let path = root.path().join("dir");
        std::fs::write(&path, "not a directory").unwrap();

        assert_eq!(validate(&path), ValidationResult::Unusable(path));
    }

    #[test]
    fn test_validate_missing_parent_is_unusable() {
        let root = create_test_root();
        let path = root.path().join("missing").join("dir");

        assert_eq!(validate(&path), ValidationResult::Unusable(path));
    }

    #[test]
    fn test_validate_parent_is_file_is_unusable() {
        let root = create_test_root();
        let parent = root.path().join("file");
        std::fs::write(&parent, "").unwrap();
        let path = parent.join("dir");

        assert_eq!(validate(&path), ValidationResult::Unusable(path));
    }

    #[test]
    fn test_inspect_separates_absent_from_uninspectable() {
        let root = create_test_root();
        let file = root.path().join("file");
        std::fs::write(&file, "").unwrap();

        assert_eq!(inspect(&root.path().join("absent")), PathKind::Missing);
        // Looking through a regular file fails with something other than NotFound
        assert_eq!(inspect(&file.join("dir")), PathKind::Inaccessible);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let root = create_test_root();
        let path = root.path().join("dir");

        assert_eq!(validate(&path), validate(&path));
        assert_eq!(validate(root.path()), validate(root.path()));
    }
}
