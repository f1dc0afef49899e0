use anyhow::{anyhow, Result};
use burn::tensor::{activation, Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};

type Backend = NdArray<f32>;

/// Burn-backed sigmoid head used when the `burn-ml` feature is enabled.
pub(crate) fn sigmoid(logits: &[f32]) -> Result<Vec<f32>> {
    if logits.is_empty() {
        return Ok(Vec::new());
    }

    let device = NdArrayDevice::default();
    let data = TensorData::new(logits.to_vec(), [logits.len()]);
    let tensor = Tensor::<Backend, 1>::from_data(data, &device);

    activation::sigmoid(tensor)
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| anyhow!("burn sigmoid head returned unexpected data: {err:?}"))
}
