use cae_predict::{
    Error, Result,
    model::{Instance, SegmentationModel},
};
use image::{Rgb, RgbImage};
use std::sync::Mutex;

/// Mock segmentation runtime for testing
#[derive(Debug, Default)]
pub struct MockSegmentationModel {
    pub instances: Vec<Instance>,
    pub error: Option<String>,
    /// Dimensions and top-left pixel of every image passed to `infer`
    pub calls: Mutex<Vec<((u32, u32), Rgb<u8>)>>,
}

impl MockSegmentationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(mut self, instances: Vec<Instance>) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<((u32, u32), Rgb<u8>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn infer(&self, image: &RgbImage) -> Result<Vec<Instance>> {
        self.calls
            .lock()
            .unwrap()
            .push((image.dimensions(), *image.get_pixel(0, 0)));

        if let Some(error) = &self.error {
            return Err(Error::model(error.clone()));
        }
        Ok(self.instances.clone())
    }

    fn class_name(&self, _class_id: usize) -> String {
        "part".to_string()
    }
}
