//! Density-normalized histograms over a sample's natural range.

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::{DistError, Result};

/// Bin edges and density heights. `edges.len() == heights.len() + 1`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub heights: Vec<f64>,
}

impl Histogram {
    pub fn bins(&self) -> usize {
        self.heights.len()
    }

    /// Integral of the heights over the edges. 1.0 for any non-empty input.
    pub fn area(&self) -> f64 {
        self.heights
            .iter()
            .zip(self.edges.windows(2))
            .map(|(h, e)| h * (e[1] - e[0]))
            .sum()
    }
}

/// Bin `samples` into `bin_count` equal-width bins spanning `[min, max]`.
///
/// Every bin is half-open except the last, which also holds `max`. An
/// empty input yields zero heights over `[0, 1]`; a constant input is
/// widened to `[v - 0.5, v + 0.5]`.
pub fn build_histogram(samples: &[f64], bin_count: usize) -> Result<Histogram> {
    if bin_count == 0 {
        return Err(Report::new(DistError::Degenerate(
            "histogram needs at least one bin".into(),
        )));
    }
    if let Some(bad) = samples.iter().find(|v| !v.is_finite()) {
        return Err(Report::new(DistError::Degenerate(format!(
            "cannot bin non-finite sample {bad}"
        ))));
    }

    let (lo, hi) = match natural_range(samples) {
        Some((lo, hi)) if lo < hi => (lo, hi),
        Some((v, _)) => (v - 0.5, v + 0.5),
        None => (0.0, 1.0),
    };

    let edges = crate::curve::linspace(lo, hi, bin_count + 1);
    if edges.windows(2).any(|e| e[0] >= e[1]) {
        return Err(Report::new(DistError::Degenerate(format!(
            "range [{lo}, {hi}] is too narrow for {bin_count} bins"
        ))));
    }
    if edges.windows(2).any(|e| !(e[1] - e[0]).is_finite()) {
        return Err(Report::new(DistError::Degenerate(format!(
            "bin width over [{lo}, {hi}] overflows with {bin_count} bins"
        ))));
    }

    let mut counts = vec![0usize; bin_count];
    // halved so spans wider than f64::MAX do not overflow
    let half_span = 0.5 * hi - 0.5 * lo;
    for &v in samples {
        let t = (0.5 * v - 0.5 * lo) / half_span;
        let mut idx = ((t * bin_count as f64).floor() as usize).min(bin_count - 1);
        // floating point can land one bin off near an edge
        if idx > 0 && v < edges[idx] {
            idx -= 1;
        } else if idx + 1 < bin_count && v >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }

    let n = samples.len() as f64;
    let heights = if samples.is_empty() {
        vec![0.0; bin_count]
    } else {
        counts
            .iter()
            .zip(edges.windows(2))
            .map(|(&c, e)| c as f64 / n / (e[1] - e[0]))
            .collect()
    };

    Ok(Histogram { edges, heights })
}

fn natural_range(samples: &[f64]) -> Option<(f64, f64)> {
    let first = *samples.first()?;
    Some(
        samples
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}
