//! Per-action reply assets.
//!
//! For an action `greet` a persona directory provides:
//!
//! - `greet.txt`: one reply per line (required, at least one non-blank line)
//! - `greet*.gif|png|jpg|jpeg|webp`: optional images, sent inline as data URIs

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::error::{Error, Result};

/// Image extensions recognised as action pictures, with their MIME types.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
];

// ─────────────────────────────────────────────────────────────────
// Asset Types
// ─────────────────────────────────────────────────────────────────

/// An image encoded as a `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage(String);

impl InlineImage {
    /// Encode raw image bytes.
    pub fn encode(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reply pools for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionAssets {
    /// Reply lines; never empty once loaded.
    pub texts: Vec<String>,

    /// Inline images; may be empty.
    pub images: Vec<InlineImage>,
}

// ─────────────────────────────────────────────────────────────────
// Asset Sources
// ─────────────────────────────────────────────────────────────────

/// Something that can produce the reply pools of a persona's actions.
pub trait AssetSource {
    fn load_action(&self, persona: &str, action: &str) -> Result<ActionAssets>;
}

/// Reads assets from a persona directory on disk.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    dir: PathBuf,
}

impl AssetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_texts(&self, persona: &str, action: &str) -> Result<Vec<String>> {
        let path = self.dir.join(format!("{}.txt", action));

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::AssetNotFound {
                    persona: persona.to_string(),
                    action: action.to_string(),
                    path,
                });
            }
            Err(e) => return Err(Error::IoRead { path, source: e }),
        };

        let texts = parse_text_pool(&content);
        if texts.is_empty() {
            return Err(Error::AssetEmpty {
                persona: persona.to_string(),
                action: action.to_string(),
                path,
            });
        }

        Ok(texts)
    }

    fn load_images(&self, action: &str) -> Result<Vec<InlineImage>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::IoRead {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut matches: Vec<(String, PathBuf, &'static str)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::IoRead {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.starts_with(action) {
                continue;
            }
            if let Some(mime) = image_mime(&path) {
                matches.push((file_name.to_string(), path.clone(), mime));
            }
        }

        matches.sort_by(|a, b| a.0.cmp(&b.0));

        matches
            .into_iter()
            .map(|(_, path, mime)| {
                let bytes = fs::read(&path).map_err(|e| Error::IoRead {
                    path: path.clone(),
                    source: e,
                })?;
                Ok(InlineImage::encode(mime, &bytes))
            })
            .collect()
    }
}

impl AssetSource for AssetLoader {
    fn load_action(&self, persona: &str, action: &str) -> Result<ActionAssets> {
        let texts = self.load_texts(persona, action)?;
        let images = self.load_images(action)?;

        debug!(
            persona = %persona,
            action = %action,
            texts = texts.len(),
            images = images.len(),
            "Loaded action assets"
        );

        Ok(ActionAssets { texts, images })
    }
}

/// In-memory assets keyed by action name; used by tests and tooling.
impl AssetSource for HashMap<String, ActionAssets> {
    fn load_action(&self, persona: &str, action: &str) -> Result<ActionAssets> {
        match self.get(action) {
            Some(assets) if assets.texts.is_empty() => Err(Error::AssetEmpty {
                persona: persona.to_string(),
                action: action.to_string(),
                path: PathBuf::from(format!("{}.txt", action)),
            }),
            Some(assets) => Ok(assets.clone()),
            None => Err(Error::AssetNotFound {
                persona: persona.to_string(),
                action: action.to_string(),
                path: PathBuf::from(format!("{}.txt", action)),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────

/// Split a text resource into replies: trailing whitespace stripped,
/// blank lines dropped.
pub fn parse_text_pool(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// MIME type for a recognised image file, by extension (case-insensitive).
fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
