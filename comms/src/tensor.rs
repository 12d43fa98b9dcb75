//! The shared tensor value type carried by both services.

use serde::{Deserialize, Serialize};

/// Dtype tag for single precision payloads.
pub const DTYPE_F32: i32 = 0;
/// Dtype tag for double precision payloads.
pub const DTYPE_F64: i32 = 1;

/// A named, shaped, flat array of floating point values.
///
/// The payload is always carried as `f32` on the wire; the dtype tag records
/// the precision the producer intended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub name: String,
    pub shape: Vec<u32>,
    pub data: Vec<f32>,
    pub dtype: i32,
}

impl Tensor {
    /// Creates a tensor with the given payload.
    pub fn new(name: impl Into<String>, shape: Vec<u32>, data: Vec<f32>, dtype: i32) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
            dtype,
        }
    }

    /// Creates a zero-filled tensor sized to its shape.
    pub fn zeros(name: impl Into<String>, shape: Vec<u32>, dtype: i32) -> Self {
        let len = shape.iter().map(|&d| d as usize).product();
        Self {
            name: name.into(),
            shape,
            data: vec![0.0; len],
            dtype,
        }
    }

    /// The number of elements implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().map(|&d| d as usize).product()
    }

    /// Two tensors are compatible iff their names and shapes are equal.
    pub fn compatible_with(&self, other: &Tensor) -> bool {
        self.name == other.name && self.shape == other.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_sizes_payload_to_shape() {
        let t = Tensor::zeros("weight", vec![10, 10], DTYPE_F32);
        assert_eq!(t.data.len(), 100);
        assert!(t.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn element_count_is_shape_product() {
        let t = Tensor::new("w", vec![2, 3, 4], Vec::new(), DTYPE_F32);
        assert_eq!(t.element_count(), 24);
    }

    #[test]
    fn compatibility_requires_name_and_shape() {
        let a = Tensor::zeros("w", vec![2, 2], DTYPE_F32);
        let b = Tensor::zeros("w", vec![2, 2], DTYPE_F64);
        let c = Tensor::zeros("w", vec![4], DTYPE_F32);
        let d = Tensor::zeros("b", vec![2, 2], DTYPE_F32);

        // Dtype does not participate in compatibility.
        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&c));
        assert!(!a.compatible_with(&d));
    }
}
