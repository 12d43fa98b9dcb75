use comms::tensor::Tensor;

/// Computes a gradient contribution from a parameter snapshot.
///
/// Implementations see only the pulled snapshot; the runtime treats the
/// output as a pre-scaled update and never inspects it.
pub trait GradientStrategy: Send {
    fn compute_gradients(&mut self, params: &[Tensor]) -> Vec<Tensor>;
}

/// Harness strategy: gradients shaped like the parameters with every element
/// set to a constant.
#[derive(Debug, Clone, Copy)]
pub struct ConstGradient(pub f32);

impl GradientStrategy for ConstGradient {
    fn compute_gradients(&mut self, params: &[Tensor]) -> Vec<Tensor> {
        params
            .iter()
            .map(|p| {
                Tensor::new(
                    p.name.clone(),
                    p.shape.clone(),
                    vec![self.0; p.data.len()],
                    p.dtype,
                )
            })
            .collect()
    }
}
