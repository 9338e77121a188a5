use crate::book::Image;
use crate::state::ReaderState;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const STATE_FILE: &str = "state.json";
const IMAGES_FILE: &str = "images.json";
const IMAGES_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt state in {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Serialize, Deserialize)]
struct ImagesDocument {
    version: u32,
    images: Vec<StoredImage>,
}

#[derive(Serialize, Deserialize)]
struct StoredImage {
    name: String,
    data: String,
}

/// Per-book cache under `root`: `<title>/state.json` and `<title>/images.json`.
pub struct ProgressStore {
    root: PathBuf,
}

impl ProgressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `dirs::cache_dir()/termread`, falling back to `~/.termread`.
    pub fn default_root() -> PathBuf {
        match dirs::cache_dir() {
            Some(dir) => dir.join("termread"),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".termread"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn book_dir(&self, title: &str) -> PathBuf {
        self.root.join(title)
    }

    /// Reads the saved state for `title` exactly as it was written.
    ///
    /// Returns `Ok(None)` when the book has never been opened.
    pub fn load(&self, title: &str) -> Result<Option<ReaderState>> {
        let path = self.book_dir(title).join(STATE_FILE);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };

        let state: ReaderState =
            serde_json::from_str(&content).map_err(|e| StoreError::CorruptState {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        state
            .validate()
            .map_err(|reason| StoreError::CorruptState { path, reason })?;

        Ok(Some(state))
    }

    /// Replaces the saved state for `title`.
    pub fn save(&self, title: &str, state: &ReaderState) -> Result<()> {
        let path = self.book_dir(title).join(STATE_FILE);
        let json = serde_json::to_string_pretty(state).map_err(|source| StoreError::Serialize {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())?;
        log::debug!("saved progress to {}", path.display());
        Ok(())
    }

    /// Stores the book's images unless an earlier run already did.
    pub fn save_images(&self, title: &str, images: &[Image]) -> Result<()> {
        let path = self.book_dir(title).join(IMAGES_FILE);
        if path.exists() {
            return Ok(());
        }

        let doc = ImagesDocument {
            version: IMAGES_VERSION,
            images: images
                .iter()
                .map(|img| StoredImage {
                    name: img.name.clone(),
                    data: STANDARD.encode(&img.data),
                })
                .collect(),
        };
        let json = serde_json::to_string(&doc).map_err(|source| StoreError::Serialize {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())
    }

    /// Images stored for `title`; empty if none were ever stored.
    pub fn load_images(&self, title: &str) -> Result<Vec<Image>> {
        let path = self.book_dir(title).join(IMAGES_FILE);
        let Some(content) = read_optional(&path)? else {
            return Ok(Vec::new());
        };

        let corrupt = |reason: String| StoreError::CorruptState {
            path: path.clone(),
            reason,
        };
        let doc: ImagesDocument =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if doc.version != IMAGES_VERSION {
            return Err(corrupt(format!("unsupported images version {}", doc.version)));
        }

        doc.images
            .into_iter()
            .map(|img| {
                let data = STANDARD
                    .decode(img.data.as_bytes())
                    .map_err(|e| corrupt(format!("image {}: {}", img.name, e)))?;
                Ok(Image {
                    name: img.name,
                    data,
                })
            })
            .collect()
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes through a sibling temp file and renames it into place, so a crash
/// never leaves a half-written document behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| StoreError::Io { path, source }
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}
