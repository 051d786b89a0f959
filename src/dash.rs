use std::collections::HashSet;
use std::sync::Arc;

use error_stack::Report;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adjuster::{AdjustProperty, Adjuster, XRANGE};
use crate::binding::{ParamSlot, ParameterBinding};
use crate::controller::{
    AUTOUPDATE, Change, Controller, DEFAULT_RESOLUTION, SHOW, SamplingControls, SamplingLimits,
    UpdateOutcome,
};
use crate::controls::{
    Button, CheckboxGroup, ChangeEvent, Control, ControlId, ControlRegistry, Listener, PropValue,
    Property, RangeSlider, Slider, Spinner,
};
use crate::core::{Figure, Range1d};
use crate::provider::Family;
use crate::{DistError, Result};

pub type SharedDashboard = Arc<Mutex<DistDashboard>>;

/* -------------------- CONFIGURATION -------------------- */

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SliderSpec {
    pub start: f64,
    pub end: f64,
    pub value: f64,
    pub step: f64,
    /// Defaults to the parameter name
    #[serde(default)]
    pub title: Option<String>,
}

/// How a parameter slot is fed: a constant or a slider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotConfig {
    Fixed(f64),
    Slider(SliderSpec),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedSlot {
    pub name: String,
    pub slot: SlotConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub sample_size: usize,
    pub bins: usize,
    pub sample_step: f64,
    pub bins_step: f64,
    /// Show/autoupdate checkboxes and the manual "Sample" button
    pub toggles: bool,
    pub limits: SamplingLimits,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            bins: 50,
            sample_step: 50.0,
            bins_step: 5.0,
            toggles: true,
            limits: SamplingLimits::default(),
        }
    }
}

/// Everything needed to build one dashboard instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Catalog key; also used in URLs
    pub name: String,
    pub title: String,
    pub family: Family,
    #[serde(default)]
    pub positional: Vec<SlotConfig>,
    #[serde(default)]
    pub named: Vec<NamedSlot>,
    #[serde(default = "default_x_range")]
    pub x_range: (f64, f64),
    #[serde(default = "default_range_step")]
    pub range_step: f64,
    /// Bounds of the range control; `x_range` widened by 1 on each side
    /// when absent
    #[serde(default)]
    pub range_bounds: Option<(f64, f64)>,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_true")]
    pub adjuster: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_x_range() -> (f64, f64) {
    (-5.0, 5.0)
}

fn default_range_step() -> f64 {
    0.1
}

fn default_resolution() -> usize {
    DEFAULT_RESOLUTION
}

fn default_true() -> bool {
    true
}

fn invalid(msg: String) -> Report<DistError> {
    Report::new(DistError::Degenerate(msg))
}

impl DashboardConfig {
    pub fn new(name: impl Into<String>, family: Family) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            family,
            positional: vec![],
            named: vec![],
            x_range: default_x_range(),
            range_step: default_range_step(),
            range_bounds: None,
            sampling: SamplingConfig::default(),
            resolution: DEFAULT_RESOLUTION,
            adjuster: true,
            seed: None,
        }
    }

    /// Shape checks that do not need a running instance.
    pub fn validate(&self) -> Result<()> {
        let (x0, x1) = self.x_range;
        if !(x0.is_finite() && x1.is_finite() && x0 < x1) {
            return Err(invalid(format!("x_range ({x0}, {x1}) must be finite and increasing")));
        }
        if !(self.range_step.is_finite() && self.range_step > 0.0) {
            return Err(invalid(format!("range_step must be positive, got {}", self.range_step)));
        }
        if let Some((lo, hi)) = self.range_bounds {
            if !(lo.is_finite() && hi.is_finite() && lo <= x0 && x1 <= hi) {
                return Err(invalid(format!("range bounds ({lo}, {hi}) must contain x_range")));
            }
        }
        if self.sampling.sample_size == 0 || self.sampling.bins == 0 {
            return Err(invalid("sample size and bin count must be at least 1".into()));
        }
        if self.resolution < 2 {
            return Err(invalid(format!("resolution must be at least 2, got {}", self.resolution)));
        }

        let mut seen = HashSet::new();
        for slot in &self.named {
            if !seen.insert(slot.name.as_str()) {
                return Err(Report::new(DistError::Binding(format!(
                    "parameter '{}' is bound twice",
                    slot.name
                ))));
            }
        }
        if self.adjuster && seen.contains(XRANGE) {
            return Err(Report::new(DistError::Binding(format!(
                "'{XRANGE}' is reserved for the range control"
            ))));
        }

        let slots = self.positional.iter().chain(self.named.iter().map(|n| &n.slot));
        for slot in slots {
            match slot {
                SlotConfig::Fixed(v) if !v.is_finite() => {
                    return Err(invalid(format!("fixed parameter {v} is not finite")));
                }
                SlotConfig::Slider(s)
                    if !(s.start.is_finite() && s.end.is_finite() && s.value.is_finite())
                        || s.start > s.end
                        || !(s.step > 0.0) =>
                {
                    return Err(invalid(format!("invalid slider {s:?}")));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/* -------------------- BUILDER -------------------- */

pub fn dash(family: Family) -> DistBuilder {
    DistBuilder {
        config: DashboardConfig::new(family.name(), family),
    }
}

pub struct DistBuilder {
    config: DashboardConfig,
}

impl DistBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn x_range(mut self, start: f64, end: f64) -> Self {
        self.config.x_range = (start, end);
        self
    }

    pub fn range_step(mut self, step: f64) -> Self {
        self.config.range_step = step;
        self
    }

    pub fn range_bounds(mut self, start: f64, end: f64) -> Self {
        self.config.range_bounds = Some((start, end));
        self
    }

    /// Positional slider; `title` labels the control.
    pub fn slider(mut self, title: impl Into<String>, start: f64, end: f64, value: f64, step: f64) -> Self {
        self.config.positional.push(SlotConfig::Slider(SliderSpec {
            start,
            end,
            value,
            step,
            title: Some(title.into()),
        }));
        self
    }

    pub fn fixed(mut self, value: f64) -> Self {
        self.config.positional.push(SlotConfig::Fixed(value));
        self
    }

    /// Keyword slider, titled after the parameter.
    pub fn named_slider(mut self, name: impl Into<String>, start: f64, end: f64, value: f64, step: f64) -> Self {
        self.config.named.push(NamedSlot {
            name: name.into(),
            slot: SlotConfig::Slider(SliderSpec {
                start,
                end,
                value,
                step,
                title: None,
            }),
        });
        self
    }

    pub fn named_fixed(mut self, name: impl Into<String>, value: f64) -> Self {
        self.config.named.push(NamedSlot {
            name: name.into(),
            slot: SlotConfig::Fixed(value),
        });
        self
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.config.sampling.sample_size = n;
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.config.sampling.bins = bins;
        self
    }

    /// Drop the show/autoupdate toggles: every change resamples.
    pub fn always_resample(mut self) -> Self {
        self.config.sampling.toggles = false;
        self
    }

    pub fn limits(mut self, limits: SamplingLimits) -> Self {
        self.config.sampling.limits = limits;
        self
    }

    pub fn without_adjuster(mut self) -> Self {
        self.config.adjuster = false;
        self
    }

    pub fn resolution(mut self, points: usize) -> Self {
        self.config.resolution = points;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> DashboardConfig {
        self.config
    }

    pub fn instantiate(self) -> Result<DistDashboard> {
        DistDashboard::new(&self.config)
    }
}

/* -------------------- ACTIONS & VIEW -------------------- */

/// A user interaction arriving from the browser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiAction {
    SetValue { control: ControlId, value: f64 },
    SetRange { control: ControlId, start: f64, end: f64 },
    SetActive { control: ControlId, active: Vec<usize> },
    SetChoice { control: ControlId, value: String },
    Click { control: ControlId },
    /// Pan or zoom on the plot itself
    SetXRange { start: f64, end: f64 },
    /// Adjust a slider bound without going through the panel
    Adjust {
        target: String,
        property: AdjustProperty,
        value: f64,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Layout {
    pub parameters: Vec<ControlId>,
    pub range: ControlId,
    pub sampling: Vec<ControlId>,
    pub adjuster: Vec<ControlId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ControlView {
    pub id: ControlId,
    #[serde(flatten)]
    pub control: Control,
}

/// Serializable snapshot rendered by the browser.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    pub name: String,
    pub title: String,
    pub family: Family,
    pub figure: Figure,
    pub controls: Vec<ControlView>,
    pub layout: Layout,
}

/* -------------------- DASHBOARD -------------------- */

/// One independent dashboard instance: its controls, its controller and
/// the figure the controller publishes into.
#[derive(Debug)]
pub struct DistDashboard {
    name: String,
    title: String,
    controls: ControlRegistry,
    controller: Controller,
    layout: Layout,
    range: ControlId,
    adjuster: Option<Adjuster>,
}

impl DistDashboard {
    /// Build the controls, wire the subscriptions and run the initial
    /// update.
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        config.validate()?;
        let mut controls = ControlRegistry::new();
        let mut parameters = vec![];
        let mut targets = vec![];

        let mut make_slot = |controls: &mut ControlRegistry, name: &str, slot: &SlotConfig| match slot {
            SlotConfig::Fixed(v) => ParamSlot::Fixed(*v),
            SlotConfig::Slider(s) => {
                let title = s.title.clone().unwrap_or_else(|| name.to_string());
                let id = controls.add(Slider::new(title.clone(), s.start, s.end, s.value, s.step));
                parameters.push(id);
                targets.push((title, id));
                ParamSlot::Bound(id)
            }
        };

        let sig = config.family.signature();
        let positional: Vec<ParamSlot> = config
            .positional
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let name = sig.get(i).map_or("arg", |p| p.name);
                make_slot(&mut controls, name, slot)
            })
            .collect();
        let named: Vec<(String, ParamSlot)> = config
            .named
            .iter()
            .map(|n| (n.name.clone(), make_slot(&mut controls, &n.name, &n.slot)))
            .collect();
        let binding = ParameterBinding::new(positional, named);

        let (x0, x1) = config.x_range;
        let (lo, hi) = config.range_bounds.unwrap_or((x0 - 1.0, x1 + 1.0));
        let range = controls.add(RangeSlider {
            title: " x-axis range".into(),
            start: lo,
            end: hi,
            step: config.range_step,
            value: (x0, x1),
        });
        targets.push((XRANGE.to_string(), range));

        let sampling = &config.sampling;
        let limits = sampling.limits;
        let toggles = sampling.toggles.then(|| {
            controls.add(CheckboxGroup {
                labels: vec!["Show".into(), "Autoupdate".into()],
                active: vec![SHOW, AUTOUPDATE],
            })
        });
        let sample_button = sampling.toggles.then(|| {
            controls.add(Button {
                label: "Sample".into(),
                clicks: 0,
            })
        });
        let sample_size = controls.add(Spinner {
            title: "Sample size".into(),
            value: sampling.sample_size.min(limits.max_sample_size) as f64,
            low: Some(1.0),
            high: Some(limits.max_sample_size as f64),
            step: sampling.sample_step,
        });
        let bins = controls.add(Spinner {
            title: "Number of bins".into(),
            value: sampling.bins.min(limits.max_bins) as f64,
            low: Some(1.0),
            high: Some(limits.max_bins as f64),
            step: sampling.bins_step,
        });

        // subscription order is dispatch order: the range link must run
        // before the update that reads the visible range
        binding.register(&mut controls, Listener::Update)?;
        controls.subscribe(range, Property::Value, Listener::RangeLink)?;
        controls.subscribe(range, Property::Value, Listener::Update)?;
        controls.subscribe(sample_size, Property::Value, Listener::Update)?;
        controls.subscribe(bins, Property::Value, Listener::Update)?;
        if let Some(id) = toggles {
            controls.subscribe(id, Property::Active, Listener::SamplingToggles)?;
        }
        if let Some(id) = sample_button {
            controls.subscribe(id, Property::Clicks, Listener::ForceSample)?;
        }

        let adjuster = if config.adjuster {
            Some(Adjuster::install(&mut controls, targets)?)
        } else {
            None
        };

        let mut sampling_ids: Vec<ControlId> = toggles.into_iter().chain(sample_button).collect();
        sampling_ids.extend([sample_size, bins]);
        let layout = Layout {
            parameters,
            range,
            sampling: sampling_ids,
            adjuster: adjuster
                .as_ref()
                .map(|a| vec![a.target_select, a.property_select, a.new_value, a.button])
                .unwrap_or_default(),
        };

        let figure = Figure::new(config.title.clone(), Range1d::new(x0, x1));
        let controller = Controller::new(
            config.family,
            binding,
            SamplingControls {
                sample_size,
                bins,
                toggles,
            },
            figure,
        )
        .with_limits(limits)
        .with_resolution(config.resolution)
        .with_seed(config.seed);

        let mut dashboard = Self {
            name: config.name.clone(),
            title: config.title.clone(),
            controls,
            controller,
            layout,
            range,
            adjuster,
        };
        dashboard.controller.update(&dashboard.controls, false)?;
        debug!(name = %dashboard.name, controls = dashboard.controls.len(), "dashboard built");
        Ok(dashboard)
    }

    pub fn shared(self) -> SharedDashboard {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn figure(&self) -> &Figure {
        self.controller.figure()
    }

    pub fn controls(&self) -> &ControlRegistry {
        &self.controls
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn range_control(&self) -> ControlId {
        self.range
    }

    /// First control whose title (or label) matches `title`.
    pub fn control_named(&self, title: &str) -> Option<ControlId> {
        self.controls
            .iter()
            .find(|(_, c)| c.title() == title)
            .map(|(id, _)| id)
    }

    /// Apply one user interaction and dispatch every notification it
    /// triggers. Returns the outcomes of the update cycles that ran; on
    /// failure, the first error after all notifications were dispatched.
    pub fn apply(&mut self, action: UiAction) -> Result<Vec<UpdateOutcome>> {
        match action {
            UiAction::SetValue { control, value } => self.controls.set_value(control, value)?,
            UiAction::SetRange { control, start, end } => self.controls.set_range(control, (start, end))?,
            UiAction::SetActive { control, active } => self.controls.set_active(control, active)?,
            UiAction::SetChoice { control, value } => self.controls.set_choice(control, value)?,
            UiAction::Click { control } => self.controls.click(control)?,
            UiAction::SetXRange { start, end } => self.controls.set_range(self.range, (start, end))?,
            UiAction::Adjust {
                target,
                property,
                value,
            } => {
                let adjuster = self.adjuster.as_ref().ok_or_else(|| {
                    Report::new(DistError::Binding(format!(
                        "dashboard '{}' has no adjuster",
                        self.name
                    )))
                })?;
                adjuster.apply_named(&mut self.controls, &target, property, value)?;
            }
        }
        self.dispatch_pending()
    }

    fn dispatch_pending(&mut self) -> Result<Vec<UpdateOutcome>> {
        let mut outcomes = vec![];
        let mut first_err = None;

        while let Some(event) = self.controls.next_event() {
            for listener in self.controls.listeners(&event) {
                match self.route(listener, &event) {
                    Ok(Some(outcome)) => outcomes.push(outcome),
                    Ok(None) => {}
                    Err(report) => {
                        warn!(
                            name = %self.name,
                            ?listener,
                            error = %report.current_context(),
                            "change notification failed"
                        );
                        first_err.get_or_insert(report);
                    }
                }
            }
        }

        match first_err {
            Some(report) => Err(report),
            None => Ok(outcomes),
        }
    }

    fn route(&mut self, listener: Listener, event: &ChangeEvent) -> Result<Option<UpdateOutcome>> {
        match listener {
            Listener::Update => self
                .controller
                .handle_change(&self.controls, Change::Value(event.clone()))
                .map(Some),
            Listener::SamplingToggles => self
                .controller
                .handle_change(&self.controls, Change::Toggles(event.clone()))
                .map(Some),
            Listener::ForceSample => self
                .controller
                .handle_change(&self.controls, Change::ForceSample)
                .map(Some),
            Listener::RangeLink => {
                if let PropValue::Pair(start, end) = event.new {
                    self.controller.figure_mut().x_range = Range1d::new(start, end);
                }
                Ok(None)
            }
            Listener::Adjust => {
                if let Some(adjuster) = &self.adjuster {
                    adjuster.apply(&mut self.controls)?;
                }
                Ok(None)
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            name: self.name.clone(),
            title: self.title.clone(),
            family: self.controller.family(),
            figure: self.controller.figure().clone(),
            controls: self
                .controls
                .iter()
                .map(|(id, c)| ControlView {
                    id,
                    control: c.clone(),
                })
                .collect(),
            layout: self.layout.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal() -> DistDashboard {
        dash(Family::Normal)
            .named_slider("loc", -10.0, 10.0, 0.0, 0.5)
            .named_slider("scale", 0.1, 10.0, 1.0, 0.1)
            .seed(3)
            .instantiate()
            .unwrap()
    }

    #[test]
    fn builds_controls_in_layout_order() {
        let d = normal();
        let titles: Vec<&str> = d
            .layout()
            .parameters
            .iter()
            .map(|id| d.controls().control(*id).unwrap().title())
            .collect();
        assert_eq!(titles, vec!["loc", "scale"]);
        assert_eq!(d.layout().sampling.len(), 4);
        assert_eq!(d.layout().adjuster.len(), 4);
        assert_eq!(d.controls().range(d.range_control()).unwrap(), (-5.0, 5.0));
        match d.controls().control(d.range_control()).unwrap() {
            Control::RangeSlider(r) => assert_eq!((r.start, r.end), (-6.0, 6.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn initial_update_fills_the_figure() {
        let d = normal();
        assert_eq!(d.figure().hist.source.len(), 50);
        assert_eq!(d.figure().pdf.source.x.len(), DEFAULT_RESOLUTION);
        assert_eq!(d.controller().samples().len(), 1000);
    }

    #[test]
    fn range_change_moves_the_figure_then_recomputes() {
        let mut d = normal();
        let range = d.range_control();
        let outcomes = d
            .apply(UiAction::SetRange {
                control: range,
                start: -2.0,
                end: 3.0,
            })
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(d.figure().x_range, Range1d::new(-2.0, 3.0));
        let xs = &d.figure().pdf.source.x;
        assert_eq!((xs[0], *xs.last().unwrap()), (-2.0, 3.0));
    }

    #[test]
    fn plot_pan_drives_the_range_control() {
        let mut d = normal();
        d.apply(UiAction::SetXRange { start: 0.0, end: 1.0 }).unwrap();
        assert_eq!(d.controls().range(d.range_control()).unwrap(), (0.0, 1.0));
        assert_eq!(d.figure().x_range, Range1d::new(0.0, 1.0));
    }

    #[test]
    fn adjuster_panel_routes_through_the_button() {
        let mut d = normal();
        let [target, prop, value, button]: [ControlId; 4] = d.layout().adjuster.clone().try_into().unwrap();
        d.apply(UiAction::SetChoice {
            control: target,
            value: "scale".into(),
        })
        .unwrap();
        d.apply(UiAction::SetChoice {
            control: prop,
            value: "start".into(),
        })
        .unwrap();
        d.apply(UiAction::SetValue { control: value, value: 2.0 }).unwrap();
        let outcomes = d.apply(UiAction::Click { control: button }).unwrap();

        let scale = d.control_named("scale").unwrap();
        assert_eq!(d.controls().number(scale).unwrap(), 2.0);
        // the dragged value triggers exactly one update
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn direct_adjust_without_panel_is_rejected() {
        let mut d = dash(Family::Normal).without_adjuster().seed(1).instantiate().unwrap();
        let err = d
            .apply(UiAction::Adjust {
                target: XRANGE.into(),
                property: AdjustProperty::End,
                value: 8.0,
            })
            .unwrap_err();
        assert!(matches!(err.current_context(), DistError::Binding(_)));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(dash(Family::Normal).x_range(1.0, 1.0).instantiate().is_err());
        assert!(dash(Family::Normal).bins(0).instantiate().is_err());
        let dup = dash(Family::Normal)
            .named_fixed("loc", 0.0)
            .named_fixed("loc", 1.0)
            .instantiate()
            .unwrap_err();
        assert!(matches!(dup.current_context(), DistError::Binding(_)));
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: UiAction = serde_json::from_str(r#"{"type":"set_value","control":3,"value":1.5}"#).unwrap();
        assert_eq!(
            action,
            UiAction::SetValue {
                control: ControlId(3),
                value: 1.5
            }
        );
    }

    #[test]
    fn view_serializes_controls_with_kind() {
        let d = normal();
        let json = serde_json::to_value(d.view()).unwrap();
        assert_eq!(json["controls"][0]["kind"], "slider");
        assert_eq!(json["controls"][0]["id"], 0);
        assert_eq!(json["family"], "normal");
    }
}
