mod onnx;
mod types;

pub use onnx::{OnnxSegmenter, RawDetections, RawMasks, to_tensor};
pub use types::{BoundingBox, Instance, SegmentationModel};
