use crate::analyzers::types::{Coefficient, OlsFit};
use crate::analyzers::utility::mean;
use crate::assemble::FinalRow;

const DEPENDENT: &str = "mean_commute_time";
const TERMS: [&str; 3] = ["const", "median_income", "station_count"];
const SINGULAR_PIVOT: f64 = 1e-10;

/// Inverts a small square matrix by Gauss-Jordan elimination with partial
/// pivoting. `None` when a pivot vanishes.
fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..n {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Fits `mean_commute_time ~ 1 + median_income + station_count` over rows
/// where every variable is present.
///
/// Regressors are rescaled by their largest magnitude before solving so the
/// pivot test is independent of units. Returns `None` when there are no
/// more observations than terms or the design matrix is singular.
pub fn ols(rows: &[FinalRow]) -> Option<OlsFit> {
    let (xs, y): (Vec<[f64; 3]>, Vec<f64>) = rows
        .iter()
        .filter_map(|r| {
            Some((
                [1.0, r.median_income?, r.station_count as f64],
                r.mean_commute_time?,
            ))
        })
        .unzip();

    let n = y.len();
    let p = TERMS.len();
    if n <= p {
        return None;
    }

    let mut scale = [0.0f64; 3];
    for x in &xs {
        for j in 0..p {
            scale[j] = scale[j].max(x[j].abs());
        }
    }
    if scale.iter().any(|s| *s == 0.0) {
        return None;
    }

    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (x, yi) in xs.iter().zip(&y) {
        let z: Vec<f64> = (0..p).map(|j| x[j] / scale[j]).collect();
        for i in 0..p {
            xty[i] += z[i] * yi;
            for j in 0..p {
                xtx[i][j] += z[i] * z[j];
            }
        }
    }

    let inv = invert(xtx)?;
    let beta_scaled: Vec<f64> = (0..p)
        .map(|i| (0..p).map(|j| inv[i][j] * xty[j]).sum())
        .collect();
    let beta: Vec<f64> = (0..p).map(|j| beta_scaled[j] / scale[j]).collect();

    let sse: f64 = xs
        .iter()
        .zip(&y)
        .map(|(x, yi)| {
            let fitted: f64 = (0..p).map(|j| beta[j] * x[j]).sum();
            (yi - fitted).powi(2)
        })
        .sum();
    let y_mean = mean(&y);
    let sst: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let sigma2 = sse / (n - p) as f64;

    let coefficients = (0..p)
        .map(|j| {
            let variance = sigma2 * inv[j][j] / (scale[j] * scale[j]);
            let std_error = (variance.is_finite() && variance >= 0.0).then(|| variance.sqrt());
            let t_value = std_error.filter(|se| *se > 0.0).map(|se| beta[j] / se);
            Coefficient {
                term: TERMS[j].to_string(),
                estimate: beta[j],
                std_error,
                t_value,
            }
        })
        .collect();

    let r_squared = (sst > 0.0).then(|| 1.0 - sse / sst);
    let adj_r_squared =
        r_squared.map(|r2| 1.0 - (1.0 - r2) * (n - 1) as f64 / (n - p) as f64);

    Some(OlsFit {
        dependent: DEPENDENT.to_string(),
        observations: n,
        coefficients,
        r_squared,
        adj_r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(income: f64, stations: u32, commute: f64) -> FinalRow {
        FinalRow {
            zip_code: "90001".into(),
            station_count: stations,
            mean_commute_time: Some(commute),
            median_income: Some(income),
        }
    }

    #[test]
    fn recovers_exact_linear_relationship() {
        let data = [
            (40_000.0, 0),
            (55_000.0, 1),
            (62_000.0, 0),
            (75_000.0, 3),
            (90_000.0, 2),
            (120_000.0, 0),
        ];
        let rows: Vec<FinalRow> = data
            .iter()
            .map(|&(income, stations)| {
                row(income, stations, 35.0 - 0.0001 * income - 1.5 * stations as f64)
            })
            .collect();

        let fit = ols(&rows).unwrap();
        assert_eq!(fit.observations, 6);
        assert!((fit.coefficient("const").unwrap().estimate - 35.0).abs() < 1e-8);
        assert!((fit.coefficient("median_income").unwrap().estimate + 0.0001).abs() < 1e-12);
        assert!((fit.coefficient("station_count").unwrap().estimate + 1.5).abs() < 1e-8);
        assert!((fit.r_squared.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn noisy_fit_reports_standard_errors() {
        let rows = vec![
            row(40_000.0, 0, 33.1),
            row(55_000.0, 1, 30.2),
            row(62_000.0, 0, 29.8),
            row(75_000.0, 3, 25.9),
            row(90_000.0, 2, 27.4),
            row(120_000.0, 0, 24.7),
            row(48_000.0, 4, 28.0),
        ];
        let fit = ols(&rows).unwrap();
        let income = fit.coefficient("median_income").unwrap();
        assert!(income.estimate < 0.0);
        assert!(income.std_error.unwrap() > 0.0);
        let r2 = fit.r_squared.unwrap();
        assert!(r2 > 0.0 && r2 < 1.0);
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let mut rows = vec![
            row(40_000.0, 0, 33.0),
            row(55_000.0, 1, 30.0),
            row(62_000.0, 0, 29.0),
            row(75_000.0, 3, 26.0),
        ];
        rows.push(FinalRow {
            zip_code: "90005".into(),
            station_count: 1,
            mean_commute_time: None,
            median_income: Some(1.0),
        });
        assert_eq!(ols(&rows).unwrap().observations, 4);
    }

    #[test]
    fn singular_design_has_no_fit() {
        let rows: Vec<FinalRow> = (0..6)
            .map(|i| row(40_000.0 + i as f64 * 1000.0, 0, 30.0 + i as f64))
            .collect();
        assert!(ols(&rows).is_none());
    }

    #[test]
    fn too_few_observations_has_no_fit() {
        let rows = vec![row(40_000.0, 0, 30.0), row(50_000.0, 1, 28.0), row(60_000.0, 2, 25.0)];
        assert!(ols(&rows).is_none());
    }

    #[test]
    fn invert_identity_and_singular() {
        let id = invert(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(id, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(invert(vec![vec![1.0, 2.0], vec![2.0, 4.0]]).is_none());
    }
}
