//! Evenly spaced evaluation of an analytic curve over an x-range.

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::{DistError, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// `n` evenly spaced points from `start` to `end`, both inclusive.
///
/// Both end points are exact. `n == 1` yields `[start]`, `n == 0` an
/// empty vector. Points are interpolated rather than stepped, so spans
/// wider than `f64::MAX` stay finite.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ if start == end => vec![start; n],
        _ => {
            let last = (n - 1) as f64;
            let mut xs: Vec<f64> = (0..n)
                .map(|i| {
                    let t = i as f64 / last;
                    start * (1.0 - t) + end * t
                })
                .collect();
            xs[n - 1] = end;
            xs
        }
    }
}

/// Evaluate `evaluator` at `resolution` evenly spaced points of
/// `[x_start, x_end]`.
pub fn sample_curve<P, F>(
    x_start: f64,
    x_end: f64,
    resolution: usize,
    evaluator: F,
    params: &P,
) -> Result<Curve>
where
    P: ?Sized,
    F: Fn(f64, &P) -> f64,
{
    if !x_start.is_finite() || !x_end.is_finite() {
        return Err(Report::new(DistError::Degenerate(format!(
            "curve range [{x_start}, {x_end}] is not finite"
        ))));
    }

    let xs = linspace(x_start, x_end, resolution);
    let ys = xs.iter().map(|&x| evaluator(x, params)).collect();
    Ok(Curve { xs, ys })
}
