use crate::config::{OnnxConfig, YoloParams};
use crate::detection::RawDetection;
use crate::models::adapter::{DetectorAdapter, DetectorFactory, InferenceFailure, InferenceOutcome};
use crate::utils::error::DetectError;
use crate::Result;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array4, ArrayView3, Ix3};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::fmt::Display;
use std::path::Path;

/// Gray used by YOLO letterboxing
const PAD_VALUE: f32 = 114.0 / 255.0;

/// YOLOv8-style ONNX detector
pub struct YoloDetector {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    params: YoloParams,
}

impl YoloDetector {
    pub fn new(weights_path: &Path, onnx_config: &OnnxConfig, params: YoloParams) -> Result<Self> {
        if !weights_path.exists() {
            return Err(DetectError::ModelLoad(format!(
                "Detection model not found: {}",
                weights_path.display()
            )));
        }

        tracing::info!("Loading detection model from: {}", weights_path.display());

        let level = match onnx_config.optimization_level {
            i32::MIN..=0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        };

        let session = Session::builder()
            .map_err(|e| load_error(weights_path, e))?
            .with_optimization_level(level)
            .map_err(|e| load_error(weights_path, e))?
            .with_intra_threads(onnx_config.intra_threads)
            .map_err(|e| load_error(weights_path, e))?
            .commit_from_file(weights_path)
            .map_err(|e| load_error(weights_path, e))?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(DetectError::ModelLoad(
                    "Detection model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(DetectError::ModelLoad(
                    "Detection model has no outputs".to_string(),
                ))
            }
        };

        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Detection output[{}]: '{}'", i, output.name);
        }

        let name = weights_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        tracing::info!(
            "Detection model '{}' ready: input='{}', output='{}', input_size={}",
            name,
            input_name,
            output_name,
            params.input_size
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            params,
        })
    }

    /// Letterboxes the image into a 1x3xSxS tensor normalised to [0, 1].
    fn preprocess(&self, image: &DynamicImage) -> (Array4<f32>, Letterbox) {
        let (width, height) = image.dimensions();
        let letterbox = Letterbox::fit(width, height, self.params.input_size);

        let resized = image::imageops::resize(
            &image.to_rgb8(),
            letterbox.resized_width,
            letterbox.resized_height,
            FilterType::Triangle,
        );

        let side = self.params.input_size as usize;
        let mut input = Array4::<f32>::from_elem((1, 3, side, side), PAD_VALUE);

        for (x, y, pixel) in resized.enumerate_pixels() {
            let tx = (x + letterbox.pad_x) as usize;
            let ty = (y + letterbox.pad_y) as usize;
            if tx >= side || ty >= side {
                continue;
            }
            for c in 0..3 {
                input[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
            }
        }

        (input, letterbox)
    }
}

impl DetectorAdapter for YoloDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, image: &DynamicImage) -> InferenceOutcome {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = self.preprocess(image);
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| InferenceFailure::new(format!("Failed to build input tensor: {}", e)))?;

        let prediction = {
            let mut session = self.session.lock();
            let outputs = session
                .run(inputs![self.input_name.as_str() => input_tensor])
                .map_err(|e| InferenceFailure::new(format!("{} inference failed: {}", self.name, e)))?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output
                    .try_extract_array::<f32>()
                    .map_err(|e| InferenceFailure::new(format!("Invalid output tensor: {}", e)))?
                    .into_owned(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(InferenceFailure::new(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        let shape = prediction.shape().to_vec();
        let prediction = prediction.into_dimensionality::<Ix3>().map_err(|_| {
            InferenceFailure::new(format!("Unsupported detection output rank: {:?}", shape))
        })?;

        let detections = decode_predictions(prediction.view(), &letterbox, &self.params)?;
        tracing::debug!("{} detected {} objects", self.name, detections.len());
        Ok(detections)
    }
}

fn load_error(path: &Path, e: impl Display) -> DetectError {
    DetectError::ModelLoad(format!("{}: {}", path.display(), e))
}

/// Builds [`YoloDetector`]s with shared runtime settings
#[derive(Debug, Clone)]
pub struct YoloFactory {
    pub onnx_config: OnnxConfig,
    pub params: YoloParams,
}

impl DetectorFactory for YoloFactory {
    fn build(&self, weights_path: &Path) -> Result<Box<dyn DetectorAdapter>> {
        let detector = YoloDetector::new(weights_path, &self.onnx_config, self.params.clone())?;
        Ok(Box::new(detector))
    }
}

/// Placement of the source image inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width.max(1) as f32)
            .min(input_size as f32 / height.max(1) as f32);
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);

        Self {
            scale,
            pad_x: (input_size - resized_width) / 2,
            pad_y: (input_size - resized_height) / 2,
            resized_width,
            resized_height,
            source_width: width,
            source_height: height,
        }
    }

    /// Maps a model-space box back to clamped source pixels.
    pub fn to_source(&self, bbox: [f32; 4]) -> [f32; 4] {
        let max_x = self.source_width as f32;
        let max_y = self.source_height as f32;
        let x = |v: f32| ((v - self.pad_x as f32) / self.scale).clamp(0.0, max_x);
        let y = |v: f32| ((v - self.pad_y as f32) / self.scale).clamp(0.0, max_y);
        [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
    }
}

/// Decodes a `[1, 4 + classes, anchors]` (or transposed) YOLO head into
/// detections above the confidence threshold, after per-class NMS.
pub fn decode_predictions(
    output: ArrayView3<f32>,
    letterbox: &Letterbox,
    params: &YoloParams,
) -> InferenceOutcome {
    let (batch, rows, cols) = output.dim();
    if batch != 1 {
        return Err(InferenceFailure::new(format!(
            "Expected batch size 1 for detection, got {}",
            batch
        )));
    }

    // anchors always outnumber channels in exported YOLO heads
    let transposed = rows > cols;
    let (channels, anchors) = if transposed { (cols, rows) } else { (rows, cols) };
    if channels <= 4 {
        return Err(InferenceFailure::new(format!(
            "Unsupported detection output shape: {:?}",
            output.shape()
        )));
    }

    let value = |channel: usize, anchor: usize| {
        if transposed {
            output[[0, anchor, channel]]
        } else {
            output[[0, channel, anchor]]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_index, score) = (4..channels)
            .map(|c| (c - 4, value(c, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score < params.conf_threshold {
            continue;
        }

        let (cx, cy) = (value(0, anchor), value(1, anchor));
        let (w, h) = (value(2, anchor), value(3, anchor));
        let bbox = letterbox.to_source([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]);

        candidates.push(RawDetection::new(class_index as u32, score.min(1.0), bbox));
    }

    Ok(non_max_suppression(candidates, params.iou_threshold, params.max_detections))
}

fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);

    let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}
