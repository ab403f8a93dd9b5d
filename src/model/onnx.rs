use super::types::{BoundingBox, Instance, SegmentationModel};
use crate::{
    Error, Result,
    config::{ChannelOrder, ModelConfig},
};
use image::{
    GrayImage, Luma, RgbImage,
    imageops::{self, FilterType},
};
use std::sync::Mutex;
use tract_onnx::prelude::*;
use tracing::{debug, info};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Mask R-CNN exported to ONNX, executed on CPU with tract.
///
/// The graph is expected to take a single `[3, H, W]` f32 image and to
/// produce `boxes [N, 4]`, `labels [N]`, `scores [N]` and optionally
/// `masks [N, 1, H, W]`, with label 0 reserved for background.
pub struct OnnxSegmenter {
    // The plan is not shared across threads; handlers take turns.
    plan: Mutex<Plan>,
    config: ModelConfig,
}

impl OnnxSegmenter {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let path = &config.weights_path;
        info!(
            "Loading segmentation model from {} ({:?}, threshold {})",
            path.display(),
            config.device,
            config.score_threshold
        );

        if !path.is_file() {
            return Err(Error::model(format!(
                "model weights not found at {}",
                path.display()
            )));
        }

        let input_shape = [
            3,
            config.input_height as usize,
            config.input_width as usize,
        ];
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| Error::model(format!("failed to load {}: {e:#}", path.display())))?;

        info!("Segmentation model loaded");

        Ok(Self {
            plan: Mutex::new(plan),
            config: config.clone(),
        })
    }

    fn run(&self, input: Tensor) -> Result<RawDetections> {
        let plan = self
            .plan
            .lock()
            .map_err(|_| Error::model("inference plan lock poisoned"))?;
        let outputs = plan
            .run(tvec!(input.into()))
            .map_err(|e| Error::model(format!("inference failed: {e:#}")))?;

        if outputs.len() < 3 {
            return Err(Error::model(format!(
                "expected at least 3 model outputs (boxes, labels, scores), got {}",
                outputs.len()
            )));
        }

        let boxes = flatten::<f32>(&outputs[0], "boxes")?;
        let labels = outputs[1]
            .cast_to::<i64>()
            .map_err(|e| Error::model(format!("labels output is not integral: {e:#}")))?;
        let labels = flatten::<i64>(&labels, "labels")?;
        let scores = flatten::<f32>(&outputs[2], "scores")?;

        let masks = match outputs.get(3) {
            Some(masks) => {
                let shape = masks.shape().to_vec();
                if shape.len() != 4 || shape[1] != 1 {
                    return Err(Error::model(format!(
                        "expected masks shaped [N, 1, H, W], got {shape:?}"
                    )));
                }
                Some(RawMasks {
                    data: flatten::<f32>(masks, "masks")?,
                    height: shape[2],
                    width: shape[3],
                })
            }
            None => None,
        };

        if boxes.len() != scores.len() * 4 || labels.len() != scores.len() {
            return Err(Error::model(format!(
                "inconsistent output lengths: {} boxes values, {} labels, {} scores",
                boxes.len(),
                labels.len(),
                scores.len()
            )));
        }

        Ok(RawDetections {
            boxes: boxes
                .chunks_exact(4)
                .map(|b| [b[0], b[1], b[2], b[3]])
                .collect(),
            labels,
            scores,
            masks,
        })
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn infer(&self, image: &RgbImage) -> Result<Vec<Instance>> {
        let input = to_tensor(image, &self.config);
        let raw = self.run(input)?;
        debug!("Model returned {} raw detections", raw.scores.len());

        Ok(raw.into_instances(&self.config, image.width(), image.height()))
    }

    fn class_name(&self, class_id: usize) -> String {
        self.config
            .class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }
}

/// Resizes `image` to the network input and lays it out as `[3, H, W]` in
/// the configured channel order.
pub fn to_tensor(image: &RgbImage, config: &ModelConfig) -> Tensor {
    let (width, height) = (config.input_width, config.input_height);
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    let order = config.channel_order;

    // Detectron2 exports consume raw 0-255 BGR, torchvision ones 0-1 RGB
    let scale = match order {
        ChannelOrder::Bgr => 1.0,
        ChannelOrder::Rgb => 1.0 / 255.0,
    };

    tract_ndarray::Array3::from_shape_fn(
        (3, height as usize, width as usize),
        |(c, y, x)| {
            let pixel = resized.get_pixel(x as u32, y as u32);
            let channel = match order {
                ChannelOrder::Bgr => 2 - c,
                ChannelOrder::Rgb => c,
            };
            f32::from(pixel[channel]) * scale
        },
    )
    .into()
}

fn flatten<T: Datum + Copy>(tensor: &Tensor, name: &str) -> Result<Vec<T>> {
    let view = tensor
        .to_array_view::<T>()
        .map_err(|e| Error::model(format!("unexpected {name} output: {e:#}")))?;
    Ok(view.iter().copied().collect())
}

/// Mask probabilities for all detections, row-major `[N, H, W]`.
#[derive(Debug, Clone)]
pub struct RawMasks {
    pub data: Vec<f32>,
    pub height: usize,
    pub width: usize,
}

/// Network outputs in network-input coordinates, before thresholding.
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
    pub boxes: Vec<[f32; 4]>,
    pub labels: Vec<i64>,
    pub scores: Vec<f32>,
    pub masks: Option<RawMasks>,
}

impl RawDetections {
    /// Applies the score threshold and class filter, then maps the survivors
    /// back onto a `width` x `height` source image.
    pub fn into_instances(self, config: &ModelConfig, width: u32, height: u32) -> Vec<Instance> {
        let sx = width as f32 / config.input_width as f32;
        let sy = height as f32 / config.input_height as f32;

        let mut instances = Vec::new();
        for (i, (&score, &label)) in self.scores.iter().zip(&self.labels).enumerate() {
            if score.is_nan() || score <= config.score_threshold {
                continue;
            }
            // Label 0 is background
            if label < 1 || label as usize > config.num_classes {
                continue;
            }

            let [x1, y1, x2, y2] = self.boxes[i];
            let bbox = BoundingBox::new(x1, y1, x2, y2).scaled_and_clamped(sx, sy, width, height);
            let mut instance = Instance::new(label as usize - 1, score, bbox);

            if let Some(masks) = &self.masks {
                if let Some(mask) = masks.binarized(i, config.mask_threshold, width, height) {
                    instance = instance.with_mask(mask);
                }
            }

            instances.push(instance);
        }

        instances
    }
}

impl RawMasks {
    fn binarized(
        &self,
        index: usize,
        threshold: f32,
        width: u32,
        height: u32,
    ) -> Option<GrayImage> {
        let plane = self.height * self.width;
        let start = index * plane;
        let probs = self.data.get(start..start + plane)?;

        let soft = GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let p = probs[y as usize * self.width + x as usize].clamp(0.0, 1.0);
            Luma([(p * 255.0).round() as u8])
        });
        let mut mask = imageops::resize(&soft, width, height, FilterType::Triangle);
        for pixel in mask.pixels_mut() {
            pixel[0] = if f32::from(pixel[0]) / 255.0 > threshold {
                255
            } else {
                0
            };
        }

        Some(mask)
    }
}
