//! Tag id → overlay image resolution.
//!
//! The mapping file lists which image to show for which tag:
//! `{"entries": [{"id": 3, "image": "robot.png"}]}`. Images live in an asset
//! directory and are decoded once at startup.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const DEFAULT_TAG_MAP: &str = "aprilTag_image_map.json";
pub(crate) const DEFAULT_ASSET_DIR: &str = "TagImages";

const FALLBACK_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Decoded overlay image for one tag.
#[derive(Clone)]
pub(crate) struct AssetRef {
    pub(crate) name: String,
    pub(crate) image: Arc<RgbaImage>,
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("name", &self.name)
            .field("size", &self.image.dimensions())
            .finish()
    }
}

/// Why a tag has no image to show.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub(crate) enum AssetMiss {
    #[error("no image mapped")]
    Unmapped,
    #[error("image {name:?} failed to load from {}", .path.display())]
    LoadFailed { name: String, path: PathBuf },
}

impl AssetMiss {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            AssetMiss::Unmapped => "unmapped",
            AssetMiss::LoadFailed { .. } => "load_failed",
        }
    }

    /// Placeholder text shown in place of the image.
    pub(crate) fn placeholder_text(&self, tag_id: i64) -> String {
        match self {
            AssetMiss::Unmapped => format!("No image mapped for Tag ID: {tag_id}"),
            AssetMiss::LoadFailed { path, .. } => format!(
                "Image mapping exists but failed to load asset for Tag ID {tag_id} at: {}",
                path.display()
            ),
        }
    }
}

/// Asset lookup injected into the overlay cache.
pub(crate) trait AssetResolver {
    fn resolve(&self, tag_id: i64) -> Result<AssetRef, AssetMiss>;
}

#[derive(Debug, Deserialize)]
struct TagImageMap {
    #[serde(default)]
    entries: Vec<TagImageEntry>,
}

#[derive(Debug, Deserialize)]
struct TagImageEntry {
    id: i64,
    image: String,
}

/// Resolver backed by the JSON mapping file and an image directory.
#[derive(Default)]
pub(crate) struct MappedAssetResolver {
    entries: HashMap<i64, Result<AssetRef, AssetMiss>>,
}

impl MappedAssetResolver {
    /// Load the mapping file and decode every mapped image.
    ///
    /// A missing mapping file leaves every tag unmapped; a malformed one is a
    /// setup error.
    pub(crate) fn load(map_path: &Path, asset_dir: &Path) -> Result<Self> {
        if !map_path.is_file() {
            warn!(
                "Tag image map not found at {}; overlays will show placeholders",
                map_path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(map_path)
            .with_context(|| format!("Failed to read tag image map {}", map_path.display()))?;
        let map: TagImageMap = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse tag image map {}", map_path.display()))?;

        let resolver = Self::from_entries(
            map.entries.into_iter().map(|entry| (entry.id, entry.image)),
            asset_dir,
        );
        info!(
            "Loaded {} tag image mapping(s) from {}",
            resolver.entries.len(),
            map_path.display()
        );
        Ok(resolver)
    }

    /// Build from `(tag id, image name)` pairs; later duplicates win.
    pub(crate) fn from_entries(
        entries: impl IntoIterator<Item = (i64, String)>,
        asset_dir: &Path,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|(id, name)| (id, load_asset(&name, asset_dir)))
            .collect();
        Self { entries }
    }
}

impl AssetResolver for MappedAssetResolver {
    fn resolve(&self, tag_id: i64) -> Result<AssetRef, AssetMiss> {
        match self.entries.get(&tag_id) {
            Some(entry) => entry.clone(),
            None => Err(AssetMiss::Unmapped),
        }
    }
}

fn load_asset(name: &str, asset_dir: &Path) -> Result<AssetRef, AssetMiss> {
    let requested = asset_dir.join(name);
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    let candidates = std::iter::once(requested.clone()).chain(
        FALLBACK_EXTENSIONS
            .iter()
            .map(|ext| asset_dir.join(format!("{stem}.{ext}"))),
    );

    for candidate in candidates {
        if !candidate.is_file() {
            continue;
        }
        match image::open(&candidate) {
            Ok(image) => {
                debug!("Loaded tag asset {name} from {}", candidate.display());
                return Ok(AssetRef {
                    name: name.to_string(),
                    image: Arc::new(image.into_rgba8()),
                });
            }
            Err(err) => {
                warn!("Failed to decode tag asset {}: {err}", candidate.display());
            }
        }
    }

    Err(AssetMiss::LoadFailed {
        name: name.to_string(),
        path: requested,
    })
}
