use super::mocks::MockSegmentationModel;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use cae_predict::{
    config::{RenderConfig, StorageConfig},
    model::{BoundingBox, Instance, SegmentationModel},
    pipeline::Pipeline,
    server::{self, handlers::AppState},
};
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use serde_json::Value;
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

pub const TEST_WIDTH: u32 = 64;
pub const TEST_HEIGHT: u32 = 48;

/// Temporary input/output mount roots
pub struct TestMounts {
    pub dir: TempDir,
    pub storage: StorageConfig,
}

impl TestMounts {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage = StorageConfig {
            input_root: dir.path().join("input"),
            output_root: dir.path().join("output"),
        };
        std::fs::create_dir_all(&storage.input_root).unwrap();
        std::fs::create_dir_all(&storage.output_root).unwrap();
        Self { dir, storage }
    }

    pub fn input(&self, name: &str) -> std::path::PathBuf {
        self.storage.input_root.join(name)
    }

    pub fn output(&self, name: &str) -> std::path::PathBuf {
        self.storage.output_root.join(name)
    }

    /// Every entry under the output root, recursively, relative to it
    pub fn output_entries(&self) -> Vec<String> {
        fn walk(root: &Path, dir: &Path, found: &mut Vec<String>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                found.push(path.strip_prefix(root).unwrap().to_string_lossy().to_string());
                if path.is_dir() {
                    walk(root, &path, found);
                }
            }
        }

        let mut found = Vec::new();
        walk(&self.storage.output_root, &self.storage.output_root, &mut found);
        found.sort();
        found
    }
}

/// Horizontal red-to-blue gradient, so channel swaps are detectable
pub fn test_image() -> RgbImage {
    RgbImage::from_fn(TEST_WIDTH, TEST_HEIGHT, |x, _| {
        let t = (x * 255 / (TEST_WIDTH - 1)) as u8;
        Rgb([255 - t, 40, t])
    })
}

pub fn write_test_image(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    test_image().save(path).unwrap();
}

/// Writes `image` as a JPEG whose EXIF block carries the given Orientation
/// tag, the way phone cameras store portrait shots.
pub fn write_jpeg_with_orientation(path: &Path, image: &RgbImage, orientation: u8) {
    let mut jpeg = std::io::Cursor::new(Vec::new());
    image.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
    let jpeg = jpeg.into_inner();

    // Big-endian TIFF header with a single IFD0 entry: 0x0112 SHORT x1
    let mut exif = b"Exif\0\0MM\0\x2a\0\0\0\x08".to_vec();
    exif.extend_from_slice(&[0x00, 0x01]);
    exif.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    exif.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    exif.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let segment_len = (exif.len() + 2) as u16;
    let mut bytes = jpeg[..2].to_vec(); // SOI
    bytes.extend_from_slice(&[0xFF, 0xE1]);
    bytes.extend_from_slice(&segment_len.to_be_bytes());
    bytes.extend_from_slice(&exif);
    bytes.extend_from_slice(&jpeg[2..]);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

/// One instance covering the centre of the test image
pub fn centre_instance() -> Instance {
    let mask = GrayImage::from_fn(TEST_WIDTH, TEST_HEIGHT, |x, y| {
        if (16..48).contains(&x) && (12..36).contains(&y) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    Instance::new(0, 0.92, BoundingBox::new(16.0, 12.0, 48.0, 36.0)).with_mask(mask)
}

pub fn create_test_app(model: Arc<MockSegmentationModel>, mounts: &TestMounts) -> Router {
    let model: Arc<dyn SegmentationModel> = model;
    let pipeline = Pipeline::new(model, RenderConfig::default());

    server::router(AppState {
        pipeline: Arc::new(pipeline),
        storage: mounts.storage.clone(),
    })
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn post_json(app: Router, body: Value) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_form(app: Router, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Posts text fields as `multipart/form-data`, like `curl -F name=value`
pub async fn post_multipart(app: Router, fields: &[(&str, &str)]) -> (StatusCode, String) {
    const BOUNDARY: &str = "------------------------cae7f00d";

    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
