use super::Shape;
use crate::error::{QnnError, QnnResult};

/// Dense `f32` tensor, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatTensor {
    shape: Shape,
    data: Vec<f32>,
}

impl FloatTensor {
    pub fn new(dims: &[usize], data: Vec<f32>) -> QnnResult<Self> {
        let shape = Shape::new(dims)?;
        if data.len() != shape.numel() {
            return Err(QnnError::shape("FloatTensor", &[shape.numel()], &[data.len()]));
        }
        Ok(FloatTensor { shape, data })
    }

    pub fn zeros(dims: &[usize]) -> QnnResult<Self> {
        let shape = Shape::new(dims)?;
        Ok(FloatTensor {
            data: vec![0.0; shape.numel()],
            shape,
        })
    }

    pub fn from_fn(dims: &[usize], f: impl FnMut(usize) -> f32) -> QnnResult<Self> {
        let shape = Shape::new(dims)?;
        Ok(FloatTensor {
            data: (0..shape.numel()).map(f).collect(),
            shape,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
