//! Savitzky-Golay smoothing.
//!
//! A cubic (or any order) polynomial is least-squares fitted to each window and
//! evaluated at the window centre. The first and last half-windows are evaluated
//! from the fit to the first and last full window instead of padding the signal.

use crate::error::{QrsError, QrsResult};

/// Weights that evaluate, at offset `at` from the centre, the polynomial of
/// degree `order` fitted to a window of `2 * half_width + 1` samples.
pub fn savgol_weights(half_width: usize, order: usize, at: f64) -> QrsResult<Vec<f64>> {
    let window = 2 * half_width + 1;
    if order >= window {
        return Err(QrsError::InvalidConfig(format!(
            "polynomial order {} needs a window wider than {}",
            order, window
        )));
    }
    let terms = order + 1;

    // design[i][k] = x_i^k with x_i centred on the window
    let design: Vec<Vec<f64>> = (0..window)
        .map(|i| {
            let x = i as f64 - half_width as f64;
            (0..terms).map(|k| x.powi(k as i32)).collect()
        })
        .collect();

    let mut normal = vec![vec![0.0; terms]; terms];
    for (r, row) in normal.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = design.iter().map(|d| d[r] * d[c]).sum();
        }
    }
    let inverse = invert(normal).ok_or_else(|| {
        QrsError::InvalidConfig(format!(
            "singular Savitzky-Golay design (window {}, order {})",
            window, order
        ))
    })?;

    let powers: Vec<f64> = (0..terms).map(|k| at.powi(k as i32)).collect();
    let projected: Vec<f64> = (0..terms)
        .map(|c| (0..terms).map(|k| powers[k] * inverse[k][c]).sum())
        .collect();
    Ok(design
        .iter()
        .map(|d| d.iter().zip(&projected).map(|(x, p)| x * p).sum())
        .collect())
}

/// Smooth `data` with an odd `window` and polynomial `order`.
pub fn savgol_filter(data: &[f64], window: usize, order: usize) -> QrsResult<Vec<f64>> {
    if window % 2 == 0 || window < order + 2 {
        return Err(QrsError::InvalidConfig(format!(
            "Savitzky-Golay window must be odd and at least order + 2, got window {} order {}",
            window, order
        )));
    }
    let n = data.len();
    if n < window {
        return Err(QrsError::InsufficientSamples {
            stage: "savitzky-golay",
            required: window,
            actual: n,
        });
    }
    let half = window / 2;
    let centre = savgol_weights(half, order, 0.0)?;
    let mut out = vec![0.0; n];

    for i in half..n - half {
        out[i] = dot(&centre, &data[i - half..=i + half]);
    }

    let head = &data[..window];
    let tail = &data[n - window..];
    for i in 0..half {
        let w = savgol_weights(half, order, i as f64 - half as f64)?;
        out[i] = dot(&w, head);
        let j = n - half + i;
        let w = savgol_weights(half, order, (i + 1) as f64)?;
        out[j] = dot(&w, tail);
    }
    Ok(out)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gauss-Jordan inverse with partial pivoting.
fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = m.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);
        let pivot = m[col][col];
        for j in 0..n {
            m[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = m[row][col];
                if factor != 0.0 {
                    for j in 0..n {
                        m[row][j] -= factor * m[col][j];
                        inv[row][j] -= factor * inv[col][j];
                    }
                }
            }
        }
    }
    Some(inv)
}
