//! Chosen files and the `blob:` URLs that stand for them
//!
//! Components never pass file bytes around directly: the session turns
//! the chosen file into an [`ObjectUrl`], the surface resolves it when
//! mounting, and the trim action fetches it again. Revoking a URL frees
//! the bytes once nothing else holds them.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{AudioError, Result};

/// Extensions treated as audio (the `audio/*` accept filter)
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "wave", "flac", "ogg", "oga", "opus", "m4a", "mp4", "aac", "aif", "aiff",
    "caf", "mka", "webm",
];

pub fn is_audio_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// A `blob:<uuid>` reference to bytes held by an [`ObjectUrlStore`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory registry of live object URLs
///
/// Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlStore {
    entries: Arc<Mutex<HashMap<ObjectUrl, Arc<[u8]>>>>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ObjectUrl, Arc<[u8]>>> {
        // The map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self, bytes: Arc<[u8]>) -> ObjectUrl {
        let url = ObjectUrl(format!("blob:{}", Uuid::new_v4()));
        tracing::debug!(url = %url, bytes = bytes.len(), "Created object URL");
        self.entries().insert(url.clone(), bytes);
        url
    }

    /// Read the bytes behind a live URL
    pub fn fetch(&self, url: &ObjectUrl) -> Result<Arc<[u8]>> {
        self.entries()
            .get(url)
            .cloned()
            .ok_or_else(|| AudioError::UrlRevoked(url.to_string()))
    }

    /// Returns whether the URL was live
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            tracing::debug!(url = %url, "Revoked object URL");
        }
        removed
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.entries().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The file the user chose, with its playable URL
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub url: ObjectUrl,
    pub size: usize,
}

impl SourceFile {
    /// Extension of the original name, used as a decoder hint
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_accept_filter() {
        assert!(is_audio_file("song.mp3"));
        assert!(is_audio_file("Take 3.FLAC"));
        assert!(!is_audio_file("notes.txt"));
        assert!(!is_audio_file("no_extension"));
    }

    #[test]
    fn test_create_fetch_revoke() {
        let store = ObjectUrlStore::new();
        let url = store.create(Arc::from(&b"abc"[..]));
        assert!(url.as_str().starts_with("blob:"));
        assert_eq!(&*store.fetch(&url).unwrap(), b"abc");

        assert!(store.revoke(&url));
        assert!(!store.revoke(&url));
        assert!(matches!(store.fetch(&url), Err(AudioError::UrlRevoked(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_urls_are_unique_and_shared_across_clones() {
        let store = ObjectUrlStore::new();
        let other = store.clone();
        let a = store.create(Arc::from(&b"x"[..]));
        let b = other.create(Arc::from(&b"x"[..]));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(other.is_live(&a));
    }
}
