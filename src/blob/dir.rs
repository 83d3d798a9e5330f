use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{validate_key, BlobError, BlobStore};

const URL_SCHEME: &str = "file://";

/// Blob storage rooted at a local directory. Download URLs are `file://`
/// URLs of the stored files.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn url_for(&self, path: &Path) -> String {
        format!("{URL_SCHEME}{}", absolute(path).display())
    }

    /// Maps a download URL back to its key. URLs outside the root are
    /// rejected.
    pub fn key_for_url(&self, url: &str) -> Result<String, BlobError> {
        let raw = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| BlobError::Rejected(format!("unsupported URL '{url}'")))?;
        let outside = || BlobError::Rejected(format!("URL '{url}' is outside blob storage"));
        let rest = Path::new(raw)
            .strip_prefix(absolute(&self.root))
            .map_err(|_| outside())?;
        let key = rest
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(outside)?
            .join("/");
        validate_key(&key)?;
        Ok(key)
    }
}

impl BlobStore for DirectoryBlobStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(key, content_type, size = bytes.len(), "stored blob");
        Ok(self.url_for(&path))
    }

    fn download_url(&self, key: &str) -> Result<String, BlobError> {
        let path = self.object_path(key)?;
        if !path.is_file() {
            return Err(BlobError::NotFound(key.to_string()));
        }
        Ok(self.url_for(&path))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "deleted blob");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_url(&self, url: &str) -> Result<(), BlobError> {
        let key = self.key_for_url(url)?;
        self.delete(&key)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            collect_keys(&self.root, "", &mut keys)?;
        }
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn collect_keys(dir: &Path, prefix: &str, keys: &mut Vec<String>) -> Result<(), BlobError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            collect_keys(&entry.path(), &key, keys)?;
        } else {
            keys.push(key);
        }
    }
    Ok(())
}
