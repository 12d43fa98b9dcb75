//! Checkpoint persistence for the parameter set.
//!
//! A checkpoint is a safetensors file. The format keys tensors by name, so
//! the file metadata carries the epoch tag and the ordered `(name, dtype)`
//! layout that restores the parameter sequence exactly as it was saved.
//! Payloads are stored as raw `f32` bytes regardless of the dtype tag, which
//! matches what the wire carries.

use std::{collections::HashMap, error::Error, fmt, fs, io, path::Path};

use comms::tensor::Tensor;
use safetensors::{
    SafeTensorError, SafeTensors, serialize,
    tensor::{Dtype, TensorView},
};

const EPOCH_KEY: &str = "epoch";
const LAYOUT_KEY: &str = "layout";

/// Default checkpoint path for an epoch.
pub fn default_path(epoch: u64) -> String {
    format!("checkpoint_epoch_{epoch}.ckpt")
}

/// Checkpoint save/restore failures.
#[derive(Debug)]
pub enum CheckpointError {
    Io(io::Error),
    Format(SafeTensorError),
    Metadata(String),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "checkpoint io error: {e}"),
            CheckpointError::Format(e) => write!(f, "checkpoint format error: {e}"),
            CheckpointError::Metadata(msg) => write!(f, "checkpoint metadata error: {msg}"),
        }
    }
}

impl Error for CheckpointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for CheckpointError {
    fn from(value: SafeTensorError) -> Self {
        Self::Format(value)
    }
}

/// Writes `params` and the epoch tag to `path`.
pub fn save(params: &[Tensor], epoch: u64, path: &Path) -> Result<(), CheckpointError> {
    let layout: Vec<(String, i32)> = params.iter().map(|t| (t.name.clone(), t.dtype)).collect();
    let layout_json = serde_json::to_string(&layout)
        .map_err(|e| CheckpointError::Metadata(e.to_string()))?;

    let mut metadata = HashMap::new();
    metadata.insert(EPOCH_KEY.to_string(), epoch.to_string());
    metadata.insert(LAYOUT_KEY.to_string(), layout_json);

    let views = params
        .iter()
        .map(|t| {
            let shape: Vec<usize> = t.shape.iter().map(|&d| d as usize).collect();
            let view = TensorView::new(Dtype::F32, shape, bytemuck::cast_slice(&t.data))?;
            Ok((t.name.clone(), view))
        })
        .collect::<Result<Vec<_>, SafeTensorError>>()?;

    let bytes = serialize(views, &Some(metadata))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Reads `(epoch, params)` back from `path`, restoring the saved order.
pub fn load(path: &Path) -> Result<(u64, Vec<Tensor>), CheckpointError> {
    let raw = fs::read(path)?;

    let (_, header) = SafeTensors::read_metadata(&raw)?;
    let metadata = header
        .metadata()
        .as_ref()
        .ok_or_else(|| CheckpointError::Metadata("missing file metadata".to_string()))?;

    let epoch = metadata
        .get(EPOCH_KEY)
        .ok_or_else(|| CheckpointError::Metadata("missing epoch tag".to_string()))?
        .parse::<u64>()
        .map_err(|e| CheckpointError::Metadata(format!("bad epoch tag: {e}")))?;

    let layout: Vec<(String, i32)> = metadata
        .get(LAYOUT_KEY)
        .ok_or_else(|| CheckpointError::Metadata("missing tensor layout".to_string()))
        .and_then(|json| {
            serde_json::from_str(json).map_err(|e| CheckpointError::Metadata(e.to_string()))
        })?;

    let tensors = SafeTensors::deserialize(&raw)?;

    let mut params = Vec::with_capacity(layout.len());
    for (name, dtype) in layout {
        let view = tensors.tensor(&name)?;
        let shape = view.shape().iter().map(|&d| d as u32).collect();
        let data = bytemuck::pod_collect_to_vec::<u8, f32>(view.data());
        params.push(Tensor::new(name, shape, data, dtype));
    }

    Ok((epoch, params))
}
