use anyhow::Result;

/// Independent per-label sigmoid over classifier logits.
pub(crate) fn sigmoid(logits: &[f32]) -> Result<Vec<f32>> {
    #[cfg(feature = "burn-ml")]
    {
        return crate::burn_impl::sigmoid(logits);
    }

    #[cfg(not(feature = "burn-ml"))]
    {
        Ok(logits
            .iter()
            .map(|logit| 1.0 / (1.0 + (-logit).exp()))
            .collect())
    }
}
