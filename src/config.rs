use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Secondary weights probed when none is configured explicitly
pub const SECONDARY_CANDIDATES: &[&str] = &[
    "best2.onnx",
    "alternative.onnx",
    "backup.onnx",
    "model2.onnx",
];

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Directory holding model weights and label files
    pub models_dir: PathBuf,

    /// Worker thread count
    pub workers: usize,

    /// Development mode
    pub dev_mode: bool,

    /// Which weights go into which slot
    pub model_config: ModelConfig,

    /// ONNX Runtime settings
    pub onnx_config: OnnxConfig,

    /// Detector pre/post-processing parameters
    pub yolo_params: YoloParams,

    /// HTTP server limits
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Primary weights file name inside `models_dir`
    pub primary_model: String,

    /// Secondary weights file name; auto-detected when `None`
    pub secondary_model: Option<String>,

    /// Request ensemble mode at startup
    pub use_ensemble: bool,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU threads per session
    pub intra_threads: usize,

    /// Graph optimization level (0-3)
    pub optimization_level: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct YoloParams {
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request timeout (seconds)
    pub request_timeout: u64,

    /// Max request body size (bytes)
    pub max_request_size: usize,

    /// Max concurrent connections
    pub max_connections: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        if workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }

        // two sessions may be live, so split the cores between them
        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores / 2).max(1),
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024,
            max_connections: if dev_mode { 10 } else { 1000 },
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            workers,
            dev_mode,
            model_config: ModelConfig {
                primary_model: "best.onnx".to_string(),
                secondary_model: None,
                use_ensemble: false,
            },
            onnx_config,
            yolo_params: YoloParams::default(),
            server_config,
        })
    }

    pub fn with_models(
        mut self,
        primary_model: String,
        secondary_model: Option<String>,
        use_ensemble: bool,
    ) -> Self {
        self.model_config = ModelConfig {
            primary_model,
            secondary_model,
            use_ensemble,
        };
        self
    }

    pub fn with_yolo_params(mut self, yolo_params: YoloParams) -> Self {
        self.yolo_params = yolo_params;
        self
    }

    /// Primary weights path
    pub fn primary_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_config.primary_model)
    }

    /// Secondary weights path: the configured file, otherwise the first
    /// existing auto-detect candidate.
    pub fn secondary_model_path(&self) -> Option<PathBuf> {
        if let Some(name) = &self.model_config.secondary_model {
            return Some(self.models_dir.join(name));
        }

        SECONDARY_CANDIDATES
            .iter()
            .map(|name| self.models_dir.join(name))
            .find(|path| path.exists())
    }

    /// Label file for the primary model
    pub fn primary_labels_path(&self) -> PathBuf {
        self.models_dir.join("data.yaml")
    }

    /// Label file for the secondary model, `data2.yaml` when present
    pub fn secondary_labels_path(&self) -> PathBuf {
        let dedicated = self.models_dir.join("data2.yaml");
        if dedicated.exists() {
            dedicated
        } else {
            self.primary_labels_path()
        }
    }
}
