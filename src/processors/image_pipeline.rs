//! Image variant of the item pipeline.
//!
//! Stages run in a fixed order through the transform provider: blur, then
//! contrast/brightness, then (optionally) an edge mask blended into the
//! contrast-adjusted image. The result keeps the input's file name.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::config::{ImageParams, ProcessingParameters};
use super::pipeline::{same_name_output, ItemDetail, ItemError, ItemOutcome, ItemPipeline};
use super::transformer::{ImageTransformer, EDGE_HIGH_THRESHOLD, EDGE_LOW_THRESHOLD};

/// Weight of the contrast-adjusted image when blending in edges.
pub const BASE_BLEND_WEIGHT: f64 = 0.7;

/// Weight of the edge mask when blending.
pub const EDGE_BLEND_WEIGHT: f64 = 0.3;

/// Runs images through a transform provider.
#[derive(Debug, Clone, Default)]
pub struct ImagePipeline<T> {
    transformer: T,
}

impl<T: ImageTransformer> ImagePipeline<T> {
    pub fn new(transformer: T) -> Self {
        Self { transformer }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ImageParams,
    ) -> Result<(PathBuf, ItemDetail), ItemError> {
        let image = self
            .transformer
            .decode(input)
            .map_err(|e| ItemError::read(input, e))?;

        let output = same_name_output(input, output_dir)
            .ok_or_else(|| ItemError::read(input, "input path has no file name"))?;

        let blurred = self
            .transformer
            .blur(&image, params.blur_size)
            .map_err(|e| ItemError::transform(input, e))?;

        let adjusted = self
            .transformer
            .adjust_contrast(&blurred, params.contrast_alpha, params.contrast_beta)
            .map_err(|e| ItemError::transform(input, e))?;

        let processed = if params.edge_detection {
            let edges = self
                .transformer
                .detect_edges(&adjusted, EDGE_LOW_THRESHOLD, EDGE_HIGH_THRESHOLD)
                .map_err(|e| ItemError::transform(input, e))?;
            self.transformer
                .blend(&adjusted, &edges, BASE_BLEND_WEIGHT, EDGE_BLEND_WEIGHT)
                .map_err(|e| ItemError::transform(input, e))?
        } else {
            adjusted
        };

        self.transformer
            .encode(&processed, &output)
            .map_err(|e| ItemError::write(&output, e))?;

        let detail = ItemDetail::Image {
            width: processed.width(),
            height: processed.height(),
            edges_blended: params.edge_detection,
        };

        Ok((output, detail))
    }
}

impl<T: ImageTransformer> ItemPipeline for ImagePipeline<T> {
    fn name(&self) -> &'static str {
        "image"
    }

    fn output_path(&self, input: &Path, output_dir: &Path) -> Option<PathBuf> {
        same_name_output(input, output_dir)
    }

    fn process(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ProcessingParameters,
    ) -> ItemOutcome {
        let start = Instant::now();

        match self.run(input, output_dir, &params.image) {
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
