// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX pose landmark model.
//!
//! This module provides [`PoseModel`], the ONNX Runtime backed
//! [`LandmarkProvider`]. Any single-person model emitting 33 (or 39)
//! landmarks per image works, such as an exported `BlazePose` landmark model.

use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array4;
#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{TensorRef, ValueType};

use crate::config::AnalyzerConfig;
use crate::device::Device;
use crate::error::{PostureError, Result};
use crate::landmarks::LandmarkSet;
use crate::postprocessing::{LandmarkDecoder, RawOutput, select_outputs};
use crate::preprocessing::{TensorLayout, preprocess_image};
use crate::provider::LandmarkProvider;
use crate::results::Speed;

/// Input size used when the model's input dimensions are dynamic.
const DEFAULT_IMGSZ: usize = 256;

/// Pose landmark model for inference.
///
/// Each call to [`LandmarkProvider::detect`] estimates landmarks for one
/// image on its own, with no tracking across frames.
///
/// # Example
///
/// ```no_run
/// use posture_inference::{LandmarkProvider, PoseModel};
///
/// let mut model = PoseModel::load("pose_landmark.onnx")?;
/// let image = image::open("person.jpg")?;
/// if let Some(landmarks) = model.detect(&image)? {
///     println!("Found {} landmarks", landmarks.len());
/// }
/// # Ok::<(), posture_inference::PostureError>(())
/// ```
pub struct PoseModel {
    /// ONNX Runtime session.
    session: Session,
    /// Input tensor name.
    input_name: String,
    /// Output tensor names.
    output_names: Vec<String>,
    /// Input size (height, width).
    imgsz: (usize, usize),
    layout: TensorLayout,
    /// Output decoding, with conventions resolved once per model.
    decoder: LandmarkDecoder,
    /// Timing of the most recent detection.
    last_speed: Speed,
    /// Whether model has been warmed up.
    warmed_up: bool,
}

impl PoseModel {
    /// Load a landmark model from an ONNX file with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`PostureError::ModelLoad`] if the model file doesn't exist or
    /// can't be loaded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_config(path, &AnalyzerConfig::default())
    }

    /// Load a landmark model with custom configuration.
    ///
    /// Uses the configuration's device, thread count, input size, minimum
    /// presence score and any fixed output conventions.
    ///
    /// # Errors
    ///
    /// Returns [`PostureError::ModelLoad`] if the model file doesn't exist or
    /// can't be loaded, and [`PostureError::FeatureNotEnabled`] if the
    /// requested device was not compiled in.
    pub fn load_with_config<P: AsRef<Path>>(path: P, config: &AnalyzerConfig) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PostureError::ModelLoad(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let builder = Session::builder().map_err(|e| {
            PostureError::ModelLoad(format!("Failed to create session builder: {e}"))
        })?;
        let builder = Self::with_device(builder, config.device)?;

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PostureError::ModelLoad(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(config.num_threads)
            .map_err(|e| {
                PostureError::ModelLoad(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(path)
            .map_err(|e| PostureError::ModelLoad(format!("Failed to load model: {e}")))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| PostureError::ModelLoad("Model has no inputs".to_string()))?;
        let input_name = input.name.clone();
        let input_shape: Vec<i64> = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
            other => {
                return Err(PostureError::ModelLoad(format!(
                    "Expected a tensor input, found {other:?}"
                )));
            }
        };

        let layout = TensorLayout::from_shape(&input_shape);
        let imgsz = config
            .imgsz
            .unwrap_or_else(|| input_size(&input_shape, layout));
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        crate::verbose!(
            "Loaded {} ({}x{} {:?}, device {})",
            path.display(),
            imgsz.0,
            imgsz.1,
            layout,
            config.device
        );

        Ok(Self {
            session,
            input_name,
            output_names,
            imgsz,
            layout,
            decoder: LandmarkDecoder::new(
                config.presence_scale,
                config.coordinate_space,
                config.min_confidence,
            ),
            last_speed: Speed::default(),
            warmed_up: false,
        })
    }

    /// Register the execution provider for `device`.
    #[allow(clippy::unnecessary_wraps)]
    fn with_device(
        builder: ort::session::builder::SessionBuilder,
        device: Device,
    ) -> Result<ort::session::builder::SessionBuilder> {
        match device {
            Device::Cpu => Ok(builder),
            #[cfg(feature = "cuda")]
            Device::Cuda(id) => {
                let id = i32::try_from(id)
                    .map_err(|_| PostureError::Config(format!("Invalid CUDA device: {id}")))?;
                builder
                    .with_execution_providers([CUDAExecutionProvider::default()
                        .with_device_id(id)
                        .build()])
                    .map_err(|e| PostureError::ModelLoad(format!("Failed to register CUDA EP: {e}")))
            }
            #[cfg(feature = "coreml")]
            Device::CoreMl => builder
                .with_execution_providers([CoreMLExecutionProvider::default()
                    .with_subgraphs(true)
                    .build()])
                .map_err(|e| PostureError::ModelLoad(format!("Failed to register CoreML EP: {e}"))),
            #[allow(unreachable_patterns)]
            other => Err(PostureError::FeatureNotEnabled(format!(
                "Device '{other}' is not supported by this build"
            ))),
        }
    }

    /// Warm up the model by running inference with a dummy input.
    ///
    /// # Errors
    ///
    /// Returns [`PostureError::Inference`] if the dummy run fails.
    pub fn warmup(&mut self) -> Result<()> {
        if self.warmed_up {
            return Ok(());
        }

        let (h, w) = self.imgsz;
        let shape = match self.layout {
            TensorLayout::Nchw => (1, 3, h, w),
            TensorLayout::Nhwc => (1, h, w, 3),
        };
        self.run_inference(&Array4::<f32>::zeros(shape))?;

        self.warmed_up = true;
        Ok(())
    }

    /// Run the ONNX model and collect every f32 output.
    fn run_inference(&mut self, input: &Array4<f32>) -> Result<Vec<RawOutput>> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            PostureError::Inference(format!("Failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| PostureError::Inference(format!("Inference failed: {e}")))?;

        let mut raw = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let Some(output) = outputs.get(name.as_str()) else {
                continue;
            };
            // non-f32 auxiliary outputs are not needed
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
                raw.push(RawOutput::new(name.as_str(), data.to_vec(), shape));
            }
        }

        Ok(raw)
    }

    /// Get the model's input size (height, width).
    #[must_use]
    pub const fn imgsz(&self) -> (usize, usize) {
        self.imgsz
    }

    /// Get the model's input tensor layout.
    #[must_use]
    pub const fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Timing of the most recent [`LandmarkProvider::detect`] call.
    #[must_use]
    pub const fn last_speed(&self) -> &Speed {
        &self.last_speed
    }
}

impl LandmarkProvider for PoseModel {
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        if !self.warmed_up {
            self.warmup()?;
        }

        let start_preprocess = Instant::now();
        let preprocess_result = preprocess_image(image, self.imgsz, self.layout);
        let preprocess_time = start_preprocess.elapsed().as_secs_f64() * 1000.0;

        let start_inference = Instant::now();
        let outputs = self.run_inference(&preprocess_result.tensor)?;
        let inference_time = start_inference.elapsed().as_secs_f64() * 1000.0;

        let start_postprocess = Instant::now();
        let selected = select_outputs(&outputs)?;
        let landmarks = self.decoder.decode(&selected, &preprocess_result);
        let postprocess_time = start_postprocess.elapsed().as_secs_f64() * 1000.0;

        self.last_speed = Speed::new(preprocess_time, inference_time, postprocess_time);
        Ok(landmarks)
    }
}

impl std::fmt::Debug for PoseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseModel")
            .field("input_name", &self.input_name)
            .field("imgsz", &self.imgsz)
            .field("layout", &self.layout)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// Read (height, width) from a 4D input shape, falling back to
/// [`DEFAULT_IMGSZ`] for dynamic dimensions.
fn input_size(shape: &[i64], layout: TensorLayout) -> (usize, usize) {
    let dim = |i: usize| {
        shape
            .get(i)
            .and_then(|&d| usize::try_from(d).ok())
            .filter(|&d| d > 0)
            .unwrap_or(DEFAULT_IMGSZ)
    };
    match layout {
        TensorLayout::Nchw => (dim(2), dim(3)),
        TensorLayout::Nhwc => (dim(1), dim(2)),
    }
}
