//! The reactive update cycle.
//!
//! On every routed change the controller reads the bound parameters,
//! optionally redraws samples and rebuilds the histogram, then
//! re-evaluates the PDF and CDF over the figure's visible range. All
//! results are staged first and published together, so a failed cycle
//! leaves the previously displayed data untouched.

use error_stack::Report;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::binding::ParameterBinding;
use crate::controls::{ChangeEvent, ControlId, ControlRegistry, PropValue};
use crate::core::{Figure, QuadSource, Range1d};
use crate::curve::{Curve, sample_curve};
use crate::histogram::build_histogram;
use crate::provider::{Family, FrozenDist};
use crate::{DistError, Result};

/// Checkbox index of the "Show" toggle.
pub const SHOW: usize = 0;
/// Checkbox index of the "Autoupdate" toggle.
pub const AUTOUPDATE: usize = 1;

pub const DEFAULT_RESOLUTION: usize = 1000;

/// Visible ranges narrower than this are widened around their centre.
const MIN_SPAN: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingLimits {
    pub max_sample_size: usize,
    pub max_bins: usize,
}

impl Default for SamplingLimits {
    fn default() -> Self {
        Self {
            max_sample_size: 100_000,
            max_bins: 100,
        }
    }
}

/// Controls that drive the sampling path.
#[derive(Clone, Copy, Debug)]
pub struct SamplingControls {
    pub sample_size: ControlId,
    pub bins: ControlId,
    /// `None` for dashboards without toggles: always shown, always resampled.
    pub toggles: Option<ControlId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingToggles {
    pub show: bool,
    pub autoupdate: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Updating,
}

/// A change routed to the controller.
#[derive(Clone, Debug)]
pub enum Change {
    /// A parameter, sampling input or range value changed.
    Value(ChangeEvent),
    /// The manual "Sample" button.
    ForceSample,
    /// The show/autoupdate checkbox group changed.
    Toggles(ChangeEvent),
}

/// What one update cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub resampled: bool,
    pub rebinned: bool,
    pub curves: bool,
    pub sample_size: usize,
    pub bins: usize,
}

#[derive(Debug)]
pub struct Controller {
    family: Family,
    binding: ParameterBinding,
    sampling: SamplingControls,
    limits: SamplingLimits,
    resolution: usize,
    figure: Figure,
    samples: Vec<f64>,
    hist_bins: Option<usize>,
    rng: StdRng,
    state: ControllerState,
}

impl Controller {
    pub fn new(
        family: Family,
        binding: ParameterBinding,
        sampling: SamplingControls,
        figure: Figure,
    ) -> Self {
        Self {
            family,
            binding,
            sampling,
            limits: SamplingLimits::default(),
            resolution: DEFAULT_RESOLUTION,
            figure,
            samples: vec![],
            hist_bins: None,
            rng: StdRng::from_entropy(),
            state: ControllerState::Idle,
        }
    }

    pub fn with_limits(mut self, limits: SamplingLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Curve resolution; at least 2 so both range ends are evaluated.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution.max(2);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    /// Direct access for the range link; bypasses the update cycle.
    pub fn figure_mut(&mut self) -> &mut Figure {
        &mut self.figure
    }

    /// The most recent sample set.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn toggles(&self, controls: &ControlRegistry) -> Result<SamplingToggles> {
        match self.sampling.toggles {
            Some(id) => {
                let group = controls.checkboxes(id)?;
                Ok(SamplingToggles {
                    show: group.is_active(SHOW),
                    autoupdate: group.is_active(AUTOUPDATE),
                })
            }
            None => Ok(SamplingToggles {
                show: true,
                autoupdate: true,
            }),
        }
    }

    /// Entry point for every routed notification.
    pub fn handle_change(&mut self, controls: &ControlRegistry, change: Change) -> Result<UpdateOutcome> {
        let force_resample = match &change {
            Change::Value(ev) => {
                if ev.control == self.sampling.bins {
                    let bins = self.bin_count(controls)?;
                    self.figure.hist.style.size = 1.0 / bins as f32;
                }
                false
            }
            Change::ForceSample => true,
            Change::Toggles(ev) => {
                let toggles = self.toggles(controls)?;
                self.figure.hist.visible = toggles.show;
                if !toggles.show {
                    debug!(family = self.family.name(), "histogram hidden");
                    return Ok(UpdateOutcome::default());
                }
                // a fresh draw whenever the histogram reappears
                !matches!(&ev.old, PropValue::Indices(old) if old.contains(&SHOW))
            }
        };
        self.update(controls, force_resample)
    }

    /// Run one update cycle. `force_resample` bypasses "autoupdate" but
    /// not "show".
    pub fn update(&mut self, controls: &ControlRegistry, force_resample: bool) -> Result<UpdateOutcome> {
        self.state = ControllerState::Updating;
        let result = self.run_cycle(controls, force_resample);
        self.state = ControllerState::Idle;

        match &result {
            Ok(outcome) => debug!(
                family = self.family.name(),
                resampled = outcome.resampled,
                rebinned = outcome.rebinned,
                sample_size = outcome.sample_size,
                bins = outcome.bins,
                "update cycle complete"
            ),
            Err(report) => warn!(
                family = self.family.name(),
                error = %report.current_context(),
                "update cycle aborted, keeping previous data"
            ),
        }
        result
    }

    fn run_cycle(&mut self, controls: &ControlRegistry, force_resample: bool) -> Result<UpdateOutcome> {
        let values = self.binding.current_values(controls)?;
        let dist = self.family.freeze(&values)?;
        let toggles = self.toggles(controls)?;
        let should_resample = toggles.show && (force_resample || toggles.autoupdate);
        let bins = self.bin_count(controls)?;

        let mut outcome = UpdateOutcome {
            bins,
            ..UpdateOutcome::default()
        };

        let mut fresh_samples = None;
        let staged_hist = if should_resample {
            let n = self.sample_size(controls)?;
            let samples = dist.sample(n, &mut self.rng);
            let hist = build_histogram(&samples, bins)?;
            fresh_samples = Some(samples);
            outcome.resampled = true;
            Some(hist)
        } else if toggles.show && self.hist_bins != Some(bins) && !self.samples.is_empty() {
            outcome.rebinned = true;
            Some(build_histogram(&self.samples, bins)?)
        } else {
            None
        };

        let range = self.visible_range()?;
        let pdf = sample_curve(range.start, range.end, self.resolution, |x, d: &FrozenDist| d.pdf(x), &dist)?;
        let cdf = Curve {
            ys: dist.cdf_many(&pdf.xs),
            xs: pdf.xs.clone(),
        };
        let pdf = settle_poles(pdf, "pdf")?;
        let cdf = settle_poles(cdf, "cdf")?;

        if let Some(samples) = fresh_samples {
            self.samples = samples;
        }
        if let Some(hist) = staged_hist {
            self.figure.hist.source = QuadSource::from(&hist);
            self.hist_bins = Some(hist.bins());
        }
        self.figure.pdf.source = pdf.into();
        self.figure.cdf.source = cdf.into();
        self.figure.hist.visible = toggles.show;

        outcome.curves = true;
        outcome.sample_size = self.samples.len();
        Ok(outcome)
    }

    fn sample_size(&self, controls: &ControlRegistry) -> Result<usize> {
        let raw = controls.number(self.sampling.sample_size)?;
        clamp_count(raw, self.limits.max_sample_size, "sample size")
    }

    fn bin_count(&self, controls: &ControlRegistry) -> Result<usize> {
        let raw = controls.number(self.sampling.bins)?;
        clamp_count(raw, self.limits.max_bins, "bin count")
    }

    fn visible_range(&self) -> Result<Range1d> {
        let Range1d { start, end } = self.figure.x_range;
        if !start.is_finite() || !end.is_finite() {
            return Err(Report::new(DistError::Degenerate(format!(
                "visible range [{start}, {end}] is not finite"
            ))));
        }
        let range = if start <= end {
            Range1d::new(start, end)
        } else {
            Range1d::new(end, start)
        };
        if range.span() < MIN_SPAN {
            let mid = 0.5 * range.start + 0.5 * range.end;
            return Ok(Range1d::new(mid - 0.5 * MIN_SPAN, mid + 0.5 * MIN_SPAN));
        }
        Ok(range)
    }
}

fn clamp_count(raw: f64, max: usize, what: &str) -> Result<usize> {
    if !raw.is_finite() {
        return Err(Report::new(DistError::Degenerate(format!(
            "{what} must be finite, got {raw}"
        ))));
    }
    Ok((raw.round().max(1.0) as usize).min(max.max(1)))
}

/// Reject NaN; cap infinite densities (beta poles at the support edges)
/// to the curve's largest finite value.
fn settle_poles(mut curve: Curve, what: &str) -> Result<Curve> {
    if curve.ys.iter().any(|y| y.is_nan()) {
        return Err(Report::new(DistError::Computation(format!(
            "{what} produced NaN"
        ))));
    }
    let cap = curve
        .ys
        .iter()
        .copied()
        .filter(|y| y.is_finite())
        .fold(0.0_f64, f64::max);
    for y in curve.ys.iter_mut().filter(|y| y.is_infinite()) {
        *y = if *y > 0.0 { cap } else { 0.0 };
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ParamSlot;
    use crate::controls::{CheckboxGroup, Slider, Spinner};

    struct Rig {
        controls: ControlRegistry,
        controller: Controller,
        scale: ControlId,
        n: ControlId,
        bins: ControlId,
        toggles: ControlId,
    }

    fn rig() -> Rig {
        let mut controls = ControlRegistry::new();
        let loc = controls.add(Slider::new("loc", -10.0, 10.0, 0.0, 0.5));
        let scale = controls.add(Slider::new("scale", 0.1, 10.0, 1.0, 0.1));
        let n = controls.add(Spinner {
            title: "Sample size".into(),
            value: 1000.0,
            low: Some(1.0),
            high: None,
            step: 50.0,
        });
        let bins = controls.add(Spinner {
            title: "Number of bins".into(),
            value: 50.0,
            low: Some(1.0),
            high: None,
            step: 5.0,
        });
        let toggles = controls.add(CheckboxGroup {
            labels: vec!["Show".into(), "Autoupdate".into()],
            active: vec![SHOW, AUTOUPDATE],
        });
        let binding = ParameterBinding::new(
            vec![],
            [
                ("loc".to_string(), ParamSlot::Bound(loc)),
                ("scale".to_string(), ParamSlot::Bound(scale)),
            ],
        );
        let controller = Controller::new(
            Family::Normal,
            binding,
            SamplingControls {
                sample_size: n,
                bins,
                toggles: Some(toggles),
            },
            Figure::new("Normal", Range1d::new(-5.0, 5.0)),
        )
        .with_seed(Some(11));
        Rig {
            controls,
            controller,
            scale,
            n,
            bins,
            toggles,
        }
    }

    #[test]
    fn first_update_publishes_everything() {
        let mut r = rig();
        let out = r.controller.update(&r.controls, false).unwrap();
        assert!(out.resampled && out.curves);
        let fig = r.controller.figure();
        assert_eq!(fig.hist.source.len(), 50);
        assert_eq!(fig.pdf.source.x.len(), DEFAULT_RESOLUTION);
        assert_eq!(fig.pdf.source.x, fig.cdf.source.x);
        assert_eq!(r.controller.samples().len(), 1000);
        assert_eq!(r.controller.state(), ControllerState::Idle);
    }

    #[test]
    fn autoupdate_off_keeps_samples() {
        let mut r = rig();
        r.controller.update(&r.controls, false).unwrap();
        r.controls.set_active(r.toggles, vec![SHOW]).unwrap();

        let before = r.controller.samples().to_vec();
        let curves = r.controller.figure().pdf.source.clone();
        let out = r.controller.update(&r.controls, false).unwrap();
        assert!(!out.resampled);
        assert_eq!(r.controller.samples(), &before[..]);
        assert_eq!(r.controller.figure().pdf.source, curves);

        let forced = r.controller.update(&r.controls, true).unwrap();
        assert!(forced.resampled);
        assert_ne!(r.controller.samples(), &before[..]);
    }

    #[test]
    fn hidden_histogram_is_never_resampled() {
        let mut r = rig();
        r.controller.update(&r.controls, false).unwrap();
        r.controls.set_active(r.toggles, vec![AUTOUPDATE]).unwrap();
        let out = r.controller.update(&r.controls, true).unwrap();
        assert!(!out.resampled);
        assert!(!r.controller.figure().hist.visible);
        assert_eq!(r.controller.figure().hist.source.len(), 50);
    }

    #[test]
    fn domain_error_publishes_nothing() {
        let mut r = rig();
        r.controller.update(&r.controls, false).unwrap();
        let before = r.controller.figure().clone();

        r.controls.set_value(r.scale, -1.0).unwrap();
        let err = r.controller.update(&r.controls, false).unwrap_err();
        assert!(matches!(err.current_context(), DistError::Domain(_)));
        assert_eq!(r.controller.figure().pdf.source, before.pdf.source);
        assert_eq!(r.controller.figure().hist.source, before.hist.source);
        assert_eq!(r.controller.state(), ControllerState::Idle);
    }

    #[test]
    fn counts_are_clamped() {
        let mut r = rig();
        r.controls.set_value(r.n, 5_000_000.0).unwrap();
        r.controls.set_value(r.bins, 1000.0).unwrap();
        let out = r.controller.update(&r.controls, false).unwrap();
        assert_eq!(out.sample_size, 100_000);
        assert_eq!(out.bins, 100);
    }

    #[test]
    fn bins_change_rebins_without_drawing() {
        let mut r = rig();
        r.controller.update(&r.controls, false).unwrap();
        r.controls.set_active(r.toggles, vec![SHOW]).unwrap();
        while r.controls.next_event().is_some() {}
        let before = r.controller.samples().to_vec();

        r.controls.set_value(r.bins, 20.0).unwrap();
        let ev = r.controls.next_event().unwrap();
        let out = r.controller.handle_change(&r.controls, Change::Value(ev)).unwrap();
        assert!(out.rebinned && !out.resampled);
        assert_eq!(r.controller.samples(), &before[..]);
        assert_eq!(r.controller.figure().hist.source.len(), 20);
        assert_eq!(r.controller.figure().hist.style.size, 1.0 / 20.0);
    }

    #[test]
    fn zero_width_range_is_widened() {
        let mut r = rig();
        r.controller.figure_mut().x_range = Range1d::new(1.0, 1.0);
        r.controller.update(&r.controls, false).unwrap();
        let xs = &r.controller.figure().pdf.source.x;
        assert!(xs[0] < 1.0 && *xs.last().unwrap() > 1.0);
    }

    #[test]
    fn range_wider_than_f64_max_is_drawn() {
        let mut r = rig();
        r.controller.figure_mut().x_range = Range1d::new(-1.5e308, 1.5e308);
        r.controller.update(&r.controls, false).unwrap();
        let fig = r.controller.figure();
        assert_eq!(fig.pdf.source.x[0], -1.5e308);
        assert_eq!(*fig.pdf.source.x.last().unwrap(), 1.5e308);
        assert!(fig.cdf.source.y.iter().all(|y| (0.0..=1.0).contains(y)));
    }

    #[test]
    fn infinite_density_is_capped() {
        let curve = Curve {
            xs: vec![0.0, 0.5, 1.0],
            ys: vec![f64::INFINITY, 2.0, 1.0],
        };
        let settled = settle_poles(curve, "pdf").unwrap();
        assert_eq!(settled.ys, vec![2.0, 2.0, 1.0]);
    }
}
