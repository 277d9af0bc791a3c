//! Pearson correlation with pairwise deletion of missing values.

use ndarray::{Array2, ArrayView1};

/// Pearson correlation of the positions where both series are finite.
///
/// `NaN` when fewer than two complete pairs exist or either side is
/// constant.
pub fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return f64::NAN;
    }
    cov / (var_a * var_b).sqrt()
}

/// Correlation matrix of the columns of `data` (rows are observations).
pub fn correlation_matrix(data: &Array2<f64>) -> Array2<f64> {
    let k = data.ncols();
    let mut corr = Array2::<f64>::from_elem((k, k), f64::NAN);
    for i in 0..k {
        for j in i..k {
            let value = if i == j {
                if pearson(data.column(i), data.column(i)).is_nan() {
                    f64::NAN
                } else {
                    1.0
                }
            } else {
                pearson(data.column(i), data.column(j))
            };
            corr[[i, j]] = value;
            corr[[j, i]] = value;
        }
    }
    corr
}
