use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Mount roots request dataset names are resolved against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_weights_path")]
    pub weights_path: PathBuf,
    #[serde(default)]
    pub device: Device,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default)]
    pub class_names: Vec<String>,
    #[serde(default = "default_input_side")]
    pub input_width: u32,
    #[serde(default = "default_input_side")]
    pub input_height: u32,
    #[serde(default = "default_mask_threshold")]
    pub mask_threshold: f32,
    #[serde(default)]
    pub channel_order: ChannelOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
}

/// Channel order the network was trained on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_mask_alpha")]
    pub mask_alpha: f32,
    #[serde(default = "default_true")]
    pub draw_boxes: bool,
    #[serde(default = "default_true")]
    pub draw_mask_outlines: bool,
    /// `"<class> <score>%"` tag at each box's top-left corner.
    #[serde(default = "default_true")]
    pub draw_labels: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: default_weights_path(),
            device: Device::default(),
            score_threshold: default_score_threshold(),
            num_classes: default_num_classes(),
            class_names: Vec::new(),
            input_width: default_input_side(),
            input_height: default_input_side(),
            mask_threshold: default_mask_threshold(),
            channel_order: ChannelOrder::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mask_alpha: default_mask_alpha(),
            draw_boxes: true,
            draw_mask_outlines: true,
            draw_labels: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7008
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_input_root() -> PathBuf {
    PathBuf::from("/mnt/input")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("/mnt/output")
}

fn default_weights_path() -> PathBuf {
    PathBuf::from("/home/appuser/detectron2_repo/model.onnx")
}

fn default_score_threshold() -> f32 {
    0.7
}

fn default_num_classes() -> usize {
    1
}

fn default_input_side() -> u32 {
    800
}

fn default_mask_threshold() -> f32 {
    0.5
}

fn default_mask_alpha() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}
