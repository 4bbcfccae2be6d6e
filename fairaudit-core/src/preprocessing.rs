//! Feature standardization.

use crate::error::FairnessError;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature centering and scaling to zero mean and unit variance.
///
/// Statistics are unweighted population moments. A constant feature keeps a
/// scale of 1.0 so it maps to all zeros instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Array1<f64>,
    pub scales: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(features: ArrayView2<'_, f64>) -> Result<Self, FairnessError> {
        check_matrix(features)?;
        let means = features
            .mean_axis(Axis(0))
            .ok_or_else(|| FairnessError::invalid_input("feature matrix has no rows"))?;
        let scales = features
            .std_axis(Axis(0), 0.0)
            .mapv_into(|std| if std > f64::EPSILON { std } else { 1.0 });
        Ok(Self { means, scales })
    }

    pub fn transform(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, FairnessError> {
        let width = check_matrix(features)?;
        if width != self.means.len() {
            return Err(FairnessError::invalid_input(format!(
                "scaler was fitted on {} features, got {width}",
                self.means.len()
            )));
        }
        Ok((&features - &self.means) / &self.scales)
    }

    pub fn fit_transform(
        features: ArrayView2<'_, f64>,
    ) -> Result<(Self, Array2<f64>), FairnessError> {
        let scaler = Self::fit(features)?;
        let transformed = scaler.transform(features)?;
        Ok((scaler, transformed))
    }
}

/// Returns the column count, rejecting a matrix without rows.
pub(crate) fn check_matrix(features: ArrayView2<'_, f64>) -> Result<usize, FairnessError> {
    if features.nrows() == 0 {
        return Err(FairnessError::invalid_input("feature matrix has no rows"));
    }
    Ok(features.ncols())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let (scaler, z) = StandardScaler::fit_transform(x.view()).unwrap();
        assert!((scaler.means[0] - 2.5).abs() < 1e-12);
        for column in z.columns() {
            let mean = column.sum() / 4.0;
            let var = column.dot(&column) / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_feature_maps_to_zero() {
        let x = array![[5.0], [5.0], [5.0]];
        let (scaler, z) = StandardScaler::fit_transform(x.view()).unwrap();
        assert_eq!(scaler.scales, array![1.0]);
        assert!(z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_rejects_empty_and_width_mismatch() {
        assert!(StandardScaler::fit(Array2::<f64>::zeros((0, 2)).view()).is_err());
        let scaler = StandardScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(scaler.transform(array![[1.0]].view()).is_err());
    }
}
