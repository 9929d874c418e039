//! Loads every decodable picture under a directory, one pool task per file.

use std::{
    fmt,
    path::Path,
    sync::Arc,
};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Result, TpoolError};
use crate::thread_pool::ThreadPool;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tga"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

#[derive(Clone, PartialEq)]
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgb>,
}

impl Image {
    /// Pixel at column `x`, row `y`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Turns a file into an RGB image. Runs on pool workers.
pub trait ImageDecoder: Send + Sync + 'static {
    fn decode(&self, path: &Path) -> Result<Image>;
}

/// Decodes with the `image` crate, converting to 8-bit RGB.
#[derive(Debug, Clone, Copy, Default)]
pub struct RgbDecoder;

impl ImageDecoder for RgbDecoder {
    fn decode(&self, path: &Path) -> Result<Image> {
        let decoded = image::open(path).map_err(|e| TpoolError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rgb = decoded.to_rgb8();
        Ok(Image {
            name: file_name(path),
            width: rgb.width(),
            height: rgb.height(),
            pixels: rgb
                .pixels()
                .map(|p| Rgb::new(p.0[0], p.0[1], p.0[2]))
                .collect(),
        })
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct ImageSet {
    images: Vec<Image>,
}

impl ImageSet {
    /// Walks `root` recursively and decodes every supported file on `pool`.
    ///
    /// Files that fail to decode are skipped. Results keep walk order.
    pub fn load<P, D>(root: &Path, pool: &P, decoder: Arc<D>) -> Result<Self>
    where
        P: ThreadPool,
        D: ImageDecoder,
    {
        let mut pending = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if !is_supported(&path) {
                debug!("skipping {}: unsupported extension", path.display());
                continue;
            }
            let decoder = decoder.clone();
            let task_path = path.clone();
            let handle = pool.submit(move || decoder.decode(&task_path))?;
            pending.push((path, handle));
        }

        let mut images = Vec::with_capacity(pending.len());
        for (path, handle) in pending {
            match handle.join() {
                Ok(Ok(image)) => images.push(image),
                Ok(Err(e)) => warn!("{}", e),
                Err(e) => warn!("decoding {} failed: {}", path.display(), e),
            }
        }
        info!("loaded {} images from {}", images.len(), root.display());
        Ok(ImageSet { images })
    }

    pub fn get(&self, i: usize) -> Option<&Image> {
        self.images.get(i)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Image> {
        self.images.iter()
    }

    pub fn summaries(&self) -> Vec<ImageSummary> {
        self.images.iter().map(Image::summary).collect()
    }
}
