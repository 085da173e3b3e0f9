//! Multinomial logistic regression fitting
//!
//! Full-batch gradient descent on the weighted softmax cross-entropy with an
//! L2 penalty on the coefficients (intercepts are not penalized). The step
//! size is the inverse of a Lipschitz bound of the gradient, so the loss
//! decreases monotonically without a line search.

use pet_risk_core::models::{softmax, LogisticModel};
use tracing::{debug, warn};

use crate::errors::TrainerError;
use crate::split::balanced_sample_weights;

#[derive(Clone, Debug)]
pub struct LogisticParams {
    pub max_iter: usize,
    /// Inverse regularization strength
    pub c: f64,
    /// Stop once the largest gradient component falls below this
    pub tol: f64,
    pub balanced: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            c: 1.0,
            tol: 1e-4,
            balanced: true,
        }
    }
}

pub fn fit_logistic(
    x: &[Vec<f64>],
    y: &[usize],
    n_classes: usize,
    params: &LogisticParams,
) -> Result<LogisticModel, TrainerError> {
    let n = x.len();
    if n == 0 || n != y.len() {
        return Err(TrainerError::Training(format!(
            "logistic regression needs matching non-empty inputs (rows {n}, labels {})",
            y.len()
        )));
    }
    if params.c <= 0.0 {
        return Err(TrainerError::Training(format!("C must be positive, got {}", params.c)));
    }
    let d = x[0].len();
    let weights = if params.balanced {
        balanced_sample_weights(y, n_classes)
    } else {
        vec![1.0; n]
    };

    let lambda = 1.0 / (params.c * n as f64);
    let lipschitz = 0.5
        * x.iter()
            .zip(&weights)
            .map(|(row, w)| w * (row.iter().map(|v| v * v).sum::<f64>() + 1.0))
            .sum::<f64>()
        / n as f64
        + lambda;
    let step = 1.0 / lipschitz;

    let mut model = LogisticModel::zeros(n_classes, d);
    let mut converged = false;

    for iter in 0..params.max_iter {
        let mut grad_w = vec![vec![0.0; d]; n_classes];
        let mut grad_b = vec![0.0; n_classes];

        for ((row, &label), &w) in x.iter().zip(y).zip(&weights) {
            let p = softmax(&model.decision_function(row));
            for k in 0..n_classes {
                let target = if k == label { 1.0 } else { 0.0 };
                let g = w * (p[k] - target) / n as f64;
                grad_b[k] += g;
                for (gw, v) in grad_w[k].iter_mut().zip(row) {
                    *gw += g * v;
                }
            }
        }

        let mut max_grad: f64 = 0.0;
        for k in 0..n_classes {
            for j in 0..d {
                grad_w[k][j] += lambda * model.coefficients[k][j];
                max_grad = max_grad.max(grad_w[k][j].abs());
            }
            max_grad = max_grad.max(grad_b[k].abs());
        }

        if !max_grad.is_finite() {
            return Err(TrainerError::Training(format!(
                "logistic regression diverged at iteration {iter}"
            )));
        }
        if max_grad < params.tol {
            debug!(iterations = iter, "Logistic regression converged");
            converged = true;
            break;
        }

        for k in 0..n_classes {
            for j in 0..d {
                model.coefficients[k][j] -= step * grad_w[k][j];
            }
            model.intercepts[k] -= step * grad_b[k];
        }
    }

    if !converged {
        warn!(
            max_iter = params.max_iter,
            "Logistic regression reached the iteration limit before converging"
        );
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_risk_core::models::{argmax, Classifier};

    fn blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64 * 0.1;
            x.push(vec![-2.0 + jitter, 0.0]);
            y.push(0);
            x.push(vec![2.0 - jitter, 0.0]);
            y.push(1);
            x.push(vec![0.0, 2.0 + jitter]);
            y.push(2);
        }
        (x, y)
    }

    #[test]
    fn test_fits_separable_classes() {
        let (x, y) = blobs();
        let model = fit_logistic(&x, &y, 3, &LogisticParams::default()).unwrap();

        for (row, &label) in x.iter().zip(&y) {
            let p = model.predict_proba(row).unwrap();
            assert_eq!(argmax(&p), Some(label));
        }
        assert!(model.validate(2).is_ok());
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = blobs();
        let params = LogisticParams {
            max_iter: 50,
            ..LogisticParams::default()
        };
        assert_eq!(
            fit_logistic(&x, &y, 3, &params).unwrap(),
            fit_logistic(&x, &y, 3, &params).unwrap()
        );
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(fit_logistic(&[], &[], 2, &LogisticParams::default()).is_err());
    }
}
