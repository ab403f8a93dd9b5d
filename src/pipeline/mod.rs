pub mod render;
pub mod storage;

use crate::{
    Error, Result,
    config::RenderConfig,
    model::SegmentationModel,
};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::{path::Path, sync::Arc};
use tracing::{debug, info};

/// Decode, infer, render and persist for a single request.
pub struct Pipeline {
    model: Arc<dyn SegmentationModel>,
    render: RenderConfig,
}

impl Pipeline {
    pub fn new(model: Arc<dyn SegmentationModel>, render: RenderConfig) -> Self {
        Self { model, render }
    }

    /// Runs the model over `input_path` and writes the annotated image to
    /// `output_path`, replacing any existing file.
    ///
    /// Fails with [`Error::InvalidInputFile`] when the input is missing or
    /// not an image, and with [`Error::InvalidParameters`] when the output
    /// extension has no encoder. Nothing is written at `output_path` unless
    /// every step succeeds.
    pub async fn predict(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        let image = decode(input_path).await?;
        debug!(
            "Decoded {} ({}x{})",
            input_path.display(),
            image.width(),
            image.height()
        );

        let format = storage::output_format(output_path)?;

        let model = Arc::clone(&self.model);
        let render = self.render.clone();
        let annotated = tokio::task::spawn_blocking(move || -> Result<RgbImage> {
            let instances = model.infer(&image)?;
            for instance in &instances {
                debug!(
                    "Detected {} ({:.2}) at [{:.0}, {:.0}, {:.0}, {:.0}]",
                    model.class_name(instance.class_id),
                    instance.score,
                    instance.bbox.x1,
                    instance.bbox.y1,
                    instance.bbox.x2,
                    instance.bbox.y2
                );
            }
            info!("Inference found {} instances", instances.len());

            Ok(render::draw_instances(
                &image,
                &instances,
                |class_id| model.class_name(class_id),
                &render,
            ))
        })
        .await??;

        storage::write_atomic(output_path, annotated, format).await
    }
}

/// Reads and decodes `path`, sniffing the format from its content and
/// applying any EXIF orientation so the pixels come out upright.
pub async fn decode(path: &Path) -> Result<RgbImage> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<RgbImage> {
        let invalid = |reason: String| {
            debug!("Cannot decode {}: {}", path.display(), reason);
            Error::invalid_input_file(format!(
                "Given input file does not exist, or is not an image file: {}",
                path.display()
            ))
        };

        let mut decoder = ImageReader::open(&path)
            .map_err(|e| invalid(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| invalid(e.to_string()))?
            .into_decoder()
            .map_err(|e| invalid(e.to_string()))?;
        let orientation = decoder
            .orientation()
            .map_err(|e| invalid(e.to_string()))?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(|e| invalid(e.to_string()))?;

        // Camera photos are stored sideways with an EXIF rotation tag
        image.apply_orientation(orientation);

        if image.width() == 0 || image.height() == 0 {
            return Err(invalid("image has no pixels".to_string()));
        }

        Ok(image.to_rgb8())
    })
    .await?
}
