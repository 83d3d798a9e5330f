use thiserror::Error;

pub mod dir;

pub use dir::DirectoryBlobStore;

pub const SIGNATURE_CONTENT_TYPE: &str = "image/png";
pub const MEDIA_CONTENT_TYPE: &str = "image/jpeg";

/// Binary object storage addressed by slash-separated keys.
pub trait BlobStore {
    /// Stores `bytes` under `key`, replacing any previous object, and returns
    /// a download URL for it.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError>;

    /// Download URL for an existing object.
    fn download_url(&self, key: &str) -> Result<String, BlobError>;

    /// Removes the object at `key`. A missing object is not an error.
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Removes the object a download URL points at.
    fn delete_url(&self, url: &str) -> Result<(), BlobError>;

    /// Keys of every object whose key starts with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
}

pub fn signature_key(task_id: &str) -> String {
    format!("signatures/{task_id}/signature.png")
}

pub fn media_key(task_id: &str, object_id: &str) -> String {
    format!("media/{task_id}/{object_id}.jpg")
}

pub fn media_prefix(task_id: &str) -> String {
    format!("media/{task_id}/")
}

/// Rejects keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<(), BlobError> {
    let is_valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if is_valid {
        Ok(())
    } else {
        Err(BlobError::InvalidKey(key.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob '{0}' not found")]
    NotFound(String),
    #[error("invalid blob key '{0}'")]
    InvalidKey(String),
    #[error("blob storage rejected the request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::{media_key, media_prefix, signature_key, validate_key, BlobError};

    #[test]
    fn keys_follow_storage_layout() {
        assert_eq!(signature_key("T-1"), "signatures/T-1/signature.png");
        assert_eq!(media_key("T-1", "abc"), "media/T-1/abc.jpg");
        assert!(media_key("T-1", "abc").starts_with(&media_prefix("T-1")));
    }

    #[test]
    fn rejects_keys_escaping_the_root() {
        assert!(validate_key("media/T-1/a.jpg").is_ok());
        for key in ["", "/abs", "media/../secret", "media//a", "a\\b", "./a"] {
            assert!(
                matches!(validate_key(key), Err(BlobError::InvalidKey(_))),
                "expected '{key}' to be rejected"
            );
        }
    }
}
