//! Aggregate statistics over a discovered file set.

use std::fs;

use log::warn;

use crate::core::discovery::FileSet;
use super::transformer::ImageTransformer;

/// Inclusive min/max range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

impl Range {
    fn single(value: u32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    fn include(&mut self, value: u32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

/// Statistics over a non-empty collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStats {
    /// Number of items in the set, decodable or not.
    pub count: usize,
    /// Sum of file sizes in bytes.
    pub total_bytes: u64,
    /// Items whose content could be decoded.
    pub decoded: usize,
    /// Items whose size could not be read; counted as zero bytes.
    pub unreadable_sizes: usize,
    /// Width range over decoded items.
    pub width: Option<Range>,
    /// Height range over decoded items.
    pub height: Option<Range>,
}

impl CollectionStats {
    pub fn average_bytes(&self) -> f64 {
        self.total_bytes as f64 / self.count as f64
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn average_kilobytes(&self) -> f64 {
        self.average_bytes() / 1024.0
    }
}

/// Outcome of analysing a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionReport {
    /// The set was empty; no averages are defined.
    NoItems,
    Stats(CollectionStats),
}

/// Compute size totals and dimension ranges over `files`.
///
/// Every item counts toward the size totals. Only items the provider can
/// decode contribute to the width and height ranges.
pub fn analyze_collection(files: &FileSet, transformer: &dyn ImageTransformer) -> CollectionReport {
    if files.is_empty() {
        return CollectionReport::NoItems;
    }

    let mut stats = CollectionStats {
        count: files.len(),
        total_bytes: 0,
        decoded: 0,
        unreadable_sizes: 0,
        width: None,
        height: None,
    };

    for path in files {
        match fs::metadata(path) {
            Ok(meta) => stats.total_bytes += meta.len(),
            Err(e) => {
                warn!("Could not read size of {}: {}", path.display(), e);
                stats.unreadable_sizes += 1;
            }
        }

        let image = match transformer.decode(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let (w, h) = (image.width(), image.height());
        stats.decoded += 1;
        match stats.width.as_mut() {
            Some(range) => range.include(w),
            None => stats.width = Some(Range::single(w)),
        }
        match stats.height.as_mut() {
            Some(range) => range.include(h),
            None => stats.height = Some(Range::single(h)),
        }
    }

    CollectionReport::Stats(stats)
}
