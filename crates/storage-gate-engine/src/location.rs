use std::path::PathBuf;

const FILE_SCHEME: &str = "file://";
const EXTERNAL_STORAGE_TREE: &str = "content://com.android.externalstorage.documents/tree/";

/// Turns a folder picker's location identifier into an absolute path
pub trait LocationResolver {
    fn resolve(&self, location: &str) -> Option<PathBuf>;
}

/// Resolves plain absolute paths, `file://` URIs, and external-storage document
/// tree URIs on the primary volume.
#[derive(Debug, Clone)]
pub struct StorageLocationResolver {
    external_root: PathBuf,
}

impl StorageLocationResolver {
    pub fn new(external_root: impl Into<PathBuf>) -> Self {
        Self {
            external_root: external_root.into(),
        }
    }
}

impl LocationResolver for StorageLocationResolver {
    fn resolve(&self, location: &str) -> Option<PathBuf> {
        if let Some(encoded) = location.strip_prefix(FILE_SCHEME) {
            let decoded = urlencoding::decode(encoded).ok()?;
            return absolute(PathBuf::from(decoded.as_ref()));
        }

        if let Some(encoded) = location.strip_prefix(EXTERNAL_STORAGE_TREE) {
            // Tree ids look like "primary:Documents/apps"
            let decoded = urlencoding::decode(encoded).ok()?;
            let relative = decoded.strip_prefix("primary:")?;
            return Some(self.external_root.join(relative.trim_start_matches('/')));
        }

        if location.contains("://") {
            log::warn!("Cannot resolve picked location {location}");
            return None;
        }

        absolute(PathBuf::from(location))
    }
}

fn absolute(path: PathBuf) -> Option<PathBuf> {
    path.is_absolute().then_some(path)
}
