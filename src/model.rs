//! ONNX Runtime plumbing shared by the pose and face collaborators.
//!
//! Input shape, element type and output names are read from the session once,
//! at load time, into [`ModelCapabilities`].

use anyhow::{bail, Context, Result};
use ndarray::Array4;
use opencv::{core::Mat, prelude::*};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{DynValue, Tensor};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    I32,
    U8,
}

impl ElementType {
    fn from_ort(ty: TensorElementType) -> Option<Self> {
        match ty {
            TensorElementType::Float32 => Some(Self::F32),
            TensorElementType::Int32 => Some(Self::I32),
            TensorElementType::Uint8 => Some(Self::U8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// [1, H, W, 3] (TFLite conversions)
    Nhwc,
    /// [1, 3, H, W]
    Nchw,
}

/// How 8-bit pixels map into a float input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatRange {
    /// 0.0 - 255.0
    Raw,
    /// -1.0 - 1.0
    Signed,
}

impl FloatRange {
    fn apply(self, v: u8) -> f32 {
        match self {
            FloatRange::Raw => v as f32,
            FloatRange::Signed => v as f32 / 127.5 - 1.0,
        }
    }
}

/// What a loaded model expects and produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCapabilities {
    pub input_name: String,
    pub input_width: usize,
    pub input_height: usize,
    pub layout: Layout,
    pub element_type: ElementType,
    pub output_names: Vec<String>,
}

impl ModelCapabilities {
    /// First output whose name contains `fragment` (case-insensitive).
    pub fn find_output(&self, fragment: &str) -> Option<&str> {
        let fragment = fragment.to_lowercase();
        self.output_names
            .iter()
            .find(|name| name.to_lowercase().contains(&fragment))
            .map(String::as_str)
    }

    /// Read capabilities from the session's first input.
    ///
    /// Dynamic spatial dimensions fall back to `default_size`.
    pub fn from_session(session: &Session, default_size: usize) -> Result<Self> {
        let input = session.inputs.first().context("Model has no inputs")?;

        let ty = input
            .input_type
            .tensor_type()
            .context("Model input is not a tensor")?;
        let element_type = ElementType::from_ort(ty)
            .with_context(|| format!("Unsupported input element type {:?}", ty))?;

        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .context("Model input has no shape")?
            .iter()
            .copied()
            .collect();
        if dims.len() != 4 {
            bail!("Expected a 4D image input, got shape {:?}", dims);
        }

        let (layout, h, w) = if dims[3] == 3 {
            (Layout::Nhwc, dims[1], dims[2])
        } else if dims[1] == 3 {
            (Layout::Nchw, dims[2], dims[3])
        } else {
            bail!("Cannot find the channel axis in input shape {:?}", dims);
        };
        let size = |d: i64| if d > 0 { d as usize } else { default_size };

        Ok(Self {
            input_name: input.name.clone(),
            input_width: size(w),
            input_height: size(h),
            layout,
            element_type,
            output_names: session.outputs.iter().map(|o| o.name.clone()).collect(),
        })
    }

    /// Pack an RGB image of exactly the input size into a tensor of the declared type.
    pub fn image_tensor(&self, rgb: &Mat, float_range: FloatRange) -> Result<DynValue> {
        let (w, h) = (self.input_width, self.input_height);
        if rgb.cols() as usize != w || rgb.rows() as usize != h || rgb.channels() != 3 {
            bail!(
                "Input image is {}x{}x{}, model expects {}x{}x3",
                rgb.cols(),
                rgb.rows(),
                rgb.channels(),
                w,
                h
            );
        }
        let data = rgb.data_bytes()?;

        let value = match self.element_type {
            ElementType::U8 => Tensor::from_array(self.pack(data, |v| v))?.into_dyn(),
            ElementType::I32 => Tensor::from_array(self.pack(data, |v| v as i32))?.into_dyn(),
            ElementType::F32 => {
                Tensor::from_array(self.pack(data, |v| float_range.apply(v)))?.into_dyn()
            }
        };
        Ok(value)
    }

    fn pack<T, F>(&self, data: &[u8], f: F) -> Array4<T>
    where
        F: Fn(u8) -> T,
    {
        let (w, h) = (self.input_width, self.input_height);
        match self.layout {
            Layout::Nhwc => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
                f(data[(y * w + x) * 3 + c])
            }),
            Layout::Nchw => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
                f(data[(y * w + x) * 3 + c])
            }),
        }
    }
}

pub fn build_session<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Session> {
    let model_path = model_path.as_ref();
    let builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads.max(1))?;

    #[cfg(feature = "cuda")]
    let builder = {
        log::info!("Attempting CUDA execution provider");
        builder.with_execution_providers([
            ort::execution_providers::CUDAExecutionProvider::default().build(),
        ])?
    };

    builder
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model {}", model_path.display()))
}
