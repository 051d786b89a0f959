//! Distribution families backed by `statrs`.
//!
//! Parameters follow the location/scale convention: a family's standard
//! form is shifted by `loc` and stretched by `scale`, so for beta the
//! support is `[loc, loc + scale]`.

use error_stack::Report;
use rand::Rng;
use rand::distributions::Distribution as _;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Continuous, ContinuousCDF, Normal};

use crate::binding::ParamValues;
use crate::{DistError, Result};

/// One slot of a family's call signature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<f64>,
}

const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        default: None,
    }
}

const fn optional(name: &'static str, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        default: Some(default),
    }
}

const NORMAL_SIGNATURE: [ParamSpec; 2] = [optional("loc", 0.0), optional("scale", 1.0)];
const BETA_SIGNATURE: [ParamSpec; 4] = [
    required("a"),
    required("b"),
    optional("loc", 0.0),
    optional("scale", 1.0),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Normal,
    Beta,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Normal => "normal",
            Family::Beta => "beta",
        }
    }

    /// Parameter slots in positional order.
    pub fn signature(&self) -> &'static [ParamSpec] {
        match self {
            Family::Normal => &NORMAL_SIGNATURE,
            Family::Beta => &BETA_SIGNATURE,
        }
    }

    /// Bind positional then named values onto the signature, filling
    /// defaults. Returns values in signature order.
    pub fn resolve(&self, values: &ParamValues) -> Result<Vec<f64>> {
        let sig = self.signature();
        if values.positional.len() > sig.len() {
            return Err(Report::new(DistError::Binding(format!(
                "{} takes at most {} positional parameters, got {}",
                self.name(),
                sig.len(),
                values.positional.len()
            ))));
        }

        let mut slots: Vec<Option<f64>> = vec![None; sig.len()];
        for (slot, &v) in slots.iter_mut().zip(&values.positional) {
            *slot = Some(v);
        }
        for (name, &v) in &values.named {
            let idx = sig.iter().position(|p| p.name == name).ok_or_else(|| {
                Report::new(DistError::Binding(format!(
                    "{} has no parameter named '{name}'",
                    self.name()
                )))
            })?;
            if slots[idx].replace(v).is_some() {
                return Err(Report::new(DistError::Binding(format!(
                    "parameter '{name}' given both positionally and by name"
                ))));
            }
        }

        sig.iter()
            .zip(slots)
            .map(|(spec, slot)| {
                slot.or(spec.default).ok_or_else(|| {
                    Report::new(DistError::Binding(format!(
                        "{} is missing required parameter '{}'",
                        self.name(),
                        spec.name
                    )))
                })
            })
            .collect()
    }

    /// Validate `values` against the family's domain and build a frozen
    /// distribution ready for sampling and evaluation.
    pub fn freeze(&self, values: &ParamValues) -> Result<FrozenDist> {
        let p = self.resolve(values)?;
        match self {
            Family::Normal => {
                let (loc, scale) = (p[0], p[1]);
                check_loc_scale(loc, scale)?;
                let dist = Normal::new(loc, scale).map_err(|e| {
                    Report::new(DistError::Domain(format!("normal(loc={loc}, scale={scale}): {e}")))
                })?;
                Ok(FrozenDist::Normal(dist))
            }
            Family::Beta => {
                let (a, b, loc, scale) = (p[0], p[1], p[2], p[3]);
                for (name, shape) in [("a", a), ("b", b)] {
                    if !(shape.is_finite() && shape > 0.0) {
                        return Err(Report::new(DistError::Domain(format!(
                            "beta shape '{name}' must be positive and finite, got {shape}"
                        ))));
                    }
                }
                check_loc_scale(loc, scale)?;
                let dist = Beta::new(a, b).map_err(|e| {
                    Report::new(DistError::Domain(format!("beta(a={a}, b={b}): {e}")))
                })?;
                Ok(FrozenDist::Beta { dist, loc, scale })
            }
        }
    }
}

fn check_loc_scale(loc: f64, scale: f64) -> Result<()> {
    if !loc.is_finite() {
        return Err(Report::new(DistError::Domain(format!(
            "loc must be finite, got {loc}"
        ))));
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Report::new(DistError::Domain(format!(
            "scale must be positive and finite, got {scale}"
        ))));
    }
    Ok(())
}

/// A distribution with validated parameters.
#[derive(Clone, Debug)]
pub enum FrozenDist {
    Normal(Normal),
    Beta { dist: Beta, loc: f64, scale: f64 },
}

impl FrozenDist {
    pub fn pdf(&self, x: f64) -> f64 {
        match self {
            FrozenDist::Normal(d) => d.pdf(x),
            FrozenDist::Beta { dist, loc, scale } => {
                let z = (x - loc) / scale;
                if !(0.0..=1.0).contains(&z) {
                    0.0
                } else {
                    dist.pdf(z) / scale
                }
            }
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            FrozenDist::Normal(d) => d.cdf(x),
            FrozenDist::Beta { dist, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 {
                    0.0
                } else if z >= 1.0 {
                    1.0
                } else {
                    dist.cdf(z)
                }
            }
        }
    }

    pub fn pdf_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.pdf(x)).collect()
    }

    pub fn cdf_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.cdf(x)).collect()
    }

    /// Draw `count` independent samples.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<f64> {
        match self {
            FrozenDist::Normal(d) => (0..count).map(|_| d.sample(rng)).collect(),
            FrozenDist::Beta { dist, loc, scale } => (0..count)
                .map(|_| loc + scale * dist.sample(rng))
                .collect(),
        }
    }
}
