//! Edge-map variant of the item pipeline.
//!
//! Each image is reduced to a binary edge mask and written next to the others
//! as `<stem>_edges<.ext>`. Processing parameters are not consulted.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::config::ProcessingParameters;
use super::pipeline::{ItemDetail, ItemError, ItemOutcome, ItemPipeline};
use super::transformer::ImageTransformer;

/// Lower hysteresis threshold for standalone edge maps.
pub const EDGE_MAP_LOW_THRESHOLD: f32 = 100.0;

/// Upper hysteresis threshold for standalone edge maps.
pub const EDGE_MAP_HIGH_THRESHOLD: f32 = 200.0;

/// Suffix appended to the file stem of an edge map.
pub const EDGE_MAP_SUFFIX: &str = "_edges";

/// Output path for an edge map: `<output_dir>/<stem>_edges<.ext>`.
pub fn edge_map_output_path(input: &Path, output_dir: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?;
    let mut name = OsString::from(stem);
    name.push(EDGE_MAP_SUFFIX);
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    Some(output_dir.join(name))
}

/// Writes the edge mask of each image.
#[derive(Debug, Clone, Default)]
pub struct EdgeMapPipeline<T> {
    transformer: T,
}

impl<T: ImageTransformer> EdgeMapPipeline<T> {
    pub fn new(transformer: T) -> Self {
        Self { transformer }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    fn run(&self, input: &Path, output_dir: &Path) -> Result<(PathBuf, ItemDetail), ItemError> {
        let image = self
            .transformer
            .decode(input)
            .map_err(|e| ItemError::read(input, e))?;

        let output = edge_map_output_path(input, output_dir)
            .ok_or_else(|| ItemError::read(input, "input path has no file name"))?;

        let edges = self
            .transformer
            .detect_edges(&image, EDGE_MAP_LOW_THRESHOLD, EDGE_MAP_HIGH_THRESHOLD)
            .map_err(|e| ItemError::transform(input, e))?;

        self.transformer
            .encode(&edges, &output)
            .map_err(|e| ItemError::write(&output, e))?;

        let detail = ItemDetail::EdgeMap {
            width: edges.width(),
            height: edges.height(),
        };

        Ok((output, detail))
    }
}

impl<T: ImageTransformer> ItemPipeline for EdgeMapPipeline<T> {
    fn name(&self) -> &'static str {
        "edges"
    }

    fn output_path(&self, input: &Path, output_dir: &Path) -> Option<PathBuf> {
        edge_map_output_path(input, output_dir)
    }

    fn process(
        &self,
        input: &Path,
        output_dir: &Path,
        _params: &ProcessingParameters,
    ) -> ItemOutcome {
        let start = Instant::now();

        match self.run(input, output_dir) {
            Ok((output, detail)) => {
                info!(
                    "Processed: {}",
                    output.file_name().unwrap_or_default().to_string_lossy()
                );
                ItemOutcome::Processed {
                    input: input.to_path_buf(),
                    output,
                    detail,
                    elapsed: start.elapsed(),
                }
            }
            Err(error) => {
                warn!("Skipping image: {}", error);
                ItemOutcome::Skipped {
                    input: input.to_path_buf(),
                    error,
                }
            }
        }
    }
}
