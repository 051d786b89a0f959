//! Widget models and change notification routing.
//!
//! Controls live in a [`ControlRegistry`] and are addressed by
//! [`ControlId`]. Every property mutation that changes a value queues one
//! [`ChangeEvent`]; the owner drains the queue with
//! [`ControlRegistry::next_event`] and routes each event to the
//! [`Listener`]s subscribed to that control and property.

use std::collections::VecDeque;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::{DistError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(pub u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    pub title: String,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub value: f64,
}

impl Slider {
    pub fn new(title: impl Into<String>, start: f64, end: f64, value: f64, step: f64) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            step,
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeSlider {
    pub title: String,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub value: (f64, f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spinner {
    pub title: String,
    pub value: f64,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub step: f64,
}

impl Spinner {
    fn clamp(&self, v: f64) -> f64 {
        let v = self.low.map_or(v, |lo| v.max(lo));
        self.high.map_or(v, |hi| v.min(hi))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckboxGroup {
    pub labels: Vec<String>,
    pub active: Vec<usize>,
}

impl CheckboxGroup {
    pub fn is_active(&self, idx: usize) -> bool {
        self.active.contains(&idx)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub clicks: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub title: String,
    pub value: String,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Control {
    Slider(Slider),
    RangeSlider(RangeSlider),
    Spinner(Spinner),
    CheckboxGroup(CheckboxGroup),
    Button(Button),
    Select(Select),
}

impl Control {
    pub fn kind(&self) -> &'static str {
        match self {
            Control::Slider(_) => "slider",
            Control::RangeSlider(_) => "range_slider",
            Control::Spinner(_) => "spinner",
            Control::CheckboxGroup(_) => "checkbox_group",
            Control::Button(_) => "button",
            Control::Select(_) => "select",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Control::Slider(s) => &s.title,
            Control::RangeSlider(s) => &s.title,
            Control::Spinner(s) => &s.title,
            Control::CheckboxGroup(_) => "",
            Control::Button(b) => &b.label,
            Control::Select(s) => &s.title,
        }
    }
}

macro_rules! impl_from_control {
    ($($ty:ident),*) => {
        $(impl From<$ty> for Control {
            fn from(c: $ty) -> Self {
                Control::$ty(c)
            }
        })*
    };
}

impl_from_control!(Slider, RangeSlider, Spinner, CheckboxGroup, Button, Select);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Value,
    Start,
    End,
    Step,
    Active,
    Clicks,
}

/// Old or new value carried by a [`ChangeEvent`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Number(f64),
    Pair(f64, f64),
    Indices(Vec<usize>),
    Text(String),
    Count(u64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub control: ControlId,
    pub property: Property,
    pub old: PropValue,
    pub new: PropValue,
}

/// Who receives a routed change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Listener {
    /// Run the controller's update cycle.
    Update,
    /// Sampling "show"/"autoupdate" checkboxes changed.
    SamplingToggles,
    /// Manual resample button.
    ForceSample,
    /// Mirror the range control onto the figure's visible range.
    RangeLink,
    /// Apply the manual slider adjustment.
    Adjust,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Subscription {
    control: ControlId,
    property: Property,
    listener: Listener,
}

#[derive(Clone, Debug, Default)]
pub struct ControlRegistry {
    controls: Vec<Control>,
    subscriptions: Vec<Subscription>,
    pending: VecDeque<ChangeEvent>,
}

fn unknown(id: ControlId) -> Report<DistError> {
    Report::new(DistError::Binding(format!("no control with id {}", id.0)))
}

fn wrong_kind(id: ControlId, control: &Control, wanted: &str) -> Report<DistError> {
    Report::new(DistError::Binding(format!(
        "control {} is a {}, expected {wanted}",
        id.0,
        control.kind()
    )))
}

fn finite(v: f64, what: &str) -> Result<f64> {
    if !v.is_finite() {
        return Err(Report::new(DistError::Degenerate(format!(
            "{what} must be finite, got {v}"
        ))));
    }
    Ok(v)
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, control: impl Into<Control>) -> ControlId {
        let id = ControlId(self.controls.len() as u32);
        self.controls.push(control.into());
        id
    }

    pub fn get(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(id.0 as usize)
    }

    pub fn control(&self, id: ControlId) -> Result<&Control> {
        self.get(id).ok_or_else(|| unknown(id))
    }

    fn control_mut(&mut self, id: ControlId) -> Result<&mut Control> {
        self.controls.get_mut(id.0 as usize).ok_or_else(|| unknown(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ControlId, &Control)> {
        self.controls
            .iter()
            .enumerate()
            .map(|(i, c)| (ControlId(i as u32), c))
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Current scalar value of a slider or spinner.
    pub fn number(&self, id: ControlId) -> Result<f64> {
        match self.control(id)? {
            Control::Slider(s) => Ok(s.value),
            Control::Spinner(s) => Ok(s.value),
            other => Err(wrong_kind(id, other, "slider or spinner")),
        }
    }

    pub fn range(&self, id: ControlId) -> Result<(f64, f64)> {
        match self.control(id)? {
            Control::RangeSlider(s) => Ok(s.value),
            other => Err(wrong_kind(id, other, "range_slider")),
        }
    }

    pub fn checkboxes(&self, id: ControlId) -> Result<&CheckboxGroup> {
        match self.control(id)? {
            Control::CheckboxGroup(c) => Ok(c),
            other => Err(wrong_kind(id, other, "checkbox_group")),
        }
    }

    pub fn choice(&self, id: ControlId) -> Result<&str> {
        match self.control(id)? {
            Control::Select(s) => Ok(&s.value),
            other => Err(wrong_kind(id, other, "select")),
        }
    }

    pub fn subscribe(&mut self, id: ControlId, property: Property, listener: Listener) -> Result<()> {
        self.control(id)?;
        let sub = Subscription {
            control: id,
            property,
            listener,
        };
        if !self.subscriptions.contains(&sub) {
            self.subscriptions.push(sub);
        }
        Ok(())
    }

    /// Listeners for `event`, in subscription order.
    pub fn listeners(&self, event: &ChangeEvent) -> Vec<Listener> {
        self.subscriptions
            .iter()
            .filter(|s| s.control == event.control && s.property == event.property)
            .map(|s| s.listener)
            .collect()
    }

    pub fn next_event(&mut self) -> Option<ChangeEvent> {
        self.pending.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn emit(&mut self, control: ControlId, property: Property, old: PropValue, new: PropValue) {
        if old != new {
            self.pending.push_back(ChangeEvent {
                control,
                property,
                old,
                new,
            });
        }
    }

    /// Set the value of a slider or spinner. Spinners clamp to their
    /// `low`/`high` bounds; sliders accept any number, so out-of-domain
    /// values reach the controller and fail there.
    pub fn set_value(&mut self, id: ControlId, value: f64) -> Result<()> {
        let value = finite(value, "value")?;
        let old = match self.control_mut(id)? {
            Control::Slider(s) => std::mem::replace(&mut s.value, value),
            Control::Spinner(s) => {
                let clamped = s.clamp(value);
                std::mem::replace(&mut s.value, clamped)
            }
            other => {
                return Err(wrong_kind(id, other, "slider or spinner"));
            }
        };
        let new = self.number(id)?;
        self.emit(id, Property::Value, PropValue::Number(old), PropValue::Number(new));
        Ok(())
    }

    pub fn set_range(&mut self, id: ControlId, value: (f64, f64)) -> Result<()> {
        finite(value.0, "range start")?;
        finite(value.1, "range end")?;
        let old = match self.control_mut(id)? {
            Control::RangeSlider(s) => std::mem::replace(&mut s.value, value),
            other => {
                return Err(wrong_kind(id, other, "range_slider"));
            }
        };
        self.emit(
            id,
            Property::Value,
            PropValue::Pair(old.0, old.1),
            PropValue::Pair(value.0, value.1),
        );
        Ok(())
    }

    pub fn set_active(&mut self, id: ControlId, mut active: Vec<usize>) -> Result<()> {
        active.sort_unstable();
        active.dedup();
        let old = match self.control_mut(id)? {
            Control::CheckboxGroup(c) => {
                if let Some(bad) = active.iter().find(|&&i| i >= c.labels.len()) {
                    return Err(Report::new(DistError::Binding(format!(
                        "checkbox index {bad} out of range for {} labels",
                        c.labels.len()
                    ))));
                }
                std::mem::replace(&mut c.active, active.clone())
            }
            other => {
                return Err(wrong_kind(id, other, "checkbox_group"));
            }
        };
        self.emit(
            id,
            Property::Active,
            PropValue::Indices(old),
            PropValue::Indices(active),
        );
        Ok(())
    }

    pub fn set_choice(&mut self, id: ControlId, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let old = match self.control_mut(id)? {
            Control::Select(s) => {
                if !s.options.contains(&value) {
                    return Err(Report::new(DistError::Binding(format!(
                        "'{value}' is not an option of '{}'",
                        s.title
                    ))));
                }
                std::mem::replace(&mut s.value, value.clone())
            }
            other => {
                return Err(wrong_kind(id, other, "select"));
            }
        };
        self.emit(id, Property::Value, PropValue::Text(old), PropValue::Text(value));
        Ok(())
    }

    pub fn click(&mut self, id: ControlId) -> Result<()> {
        let (old, new) = match self.control_mut(id)? {
            Control::Button(b) => {
                b.clicks += 1;
                (b.clicks - 1, b.clicks)
            }
            other => {
                return Err(wrong_kind(id, other, "button"));
            }
        };
        self.emit(id, Property::Clicks, PropValue::Count(old), PropValue::Count(new));
        Ok(())
    }

    /// Set `start`, `end` or `step` on a slider or range slider.
    pub fn set_bound(&mut self, id: ControlId, property: Property, value: f64) -> Result<()> {
        let value = finite(value, "bound")?;
        let (start, end, step) = match self.control_mut(id)? {
            Control::Slider(s) => (&mut s.start, &mut s.end, &mut s.step),
            Control::RangeSlider(s) => (&mut s.start, &mut s.end, &mut s.step),
            other => {
                return Err(wrong_kind(id, other, "slider or range_slider"));
            }
        };
        let slot = match property {
            Property::Start => start,
            Property::End => end,
            Property::Step => step,
            other => {
                return Err(Report::new(DistError::Binding(format!(
                    "{other:?} is not a bound property"
                ))));
            }
        };
        let old = std::mem::replace(slot, value);
        self.emit(id, property, PropValue::Number(old), PropValue::Number(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (ControlRegistry, ControlId, ControlId) {
        let mut reg = ControlRegistry::new();
        let loc = reg.add(Slider::new("loc", -10.0, 10.0, 0.0, 0.5));
        let n = reg.add(Spinner {
            title: "Sample size".into(),
            value: 1000.0,
            low: Some(1.0),
            high: None,
            step: 50.0,
        });
        (reg, loc, n)
    }

    #[test]
    fn value_change_queues_one_event() {
        let (mut reg, loc, _) = registry();
        reg.subscribe(loc, Property::Value, Listener::Update).unwrap();
        reg.set_value(loc, 1.5).unwrap();

        let ev = reg.next_event().unwrap();
        assert_eq!(ev.control, loc);
        assert_eq!(ev.old, PropValue::Number(0.0));
        assert_eq!(ev.new, PropValue::Number(1.5));
        assert_eq!(reg.listeners(&ev), vec![Listener::Update]);
        assert!(reg.next_event().is_none());
    }

    #[test]
    fn unchanged_value_is_silent() {
        let (mut reg, loc, _) = registry();
        reg.set_value(loc, 0.0).unwrap();
        assert!(!reg.has_pending());
    }

    #[test]
    fn spinner_clamps_to_low() {
        let (mut reg, _, n) = registry();
        reg.set_value(n, -5.0).unwrap();
        assert_eq!(reg.number(n).unwrap(), 1.0);
    }

    #[test]
    fn slider_accepts_out_of_bounds_values() {
        let (mut reg, loc, _) = registry();
        reg.set_value(loc, 42.0).unwrap();
        assert_eq!(reg.number(loc).unwrap(), 42.0);
    }

    #[test]
    fn non_finite_inputs_are_rejected_untouched() {
        let (mut reg, loc, n) = registry();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = reg.set_value(loc, bad).unwrap_err();
            assert!(matches!(err.current_context(), DistError::Degenerate(_)));
            assert!(reg.set_value(n, bad).is_err());
            assert!(reg.set_bound(loc, Property::End, bad).is_err());
        }
        let range = reg.add(RangeSlider {
            title: " x-axis range".into(),
            start: -6.0,
            end: 6.0,
            step: 0.1,
            value: (-5.0, 5.0),
        });
        assert!(reg.set_range(range, (f64::NEG_INFINITY, 0.0)).is_err());
        assert_eq!(reg.range(range).unwrap(), (-5.0, 5.0));
        assert_eq!(reg.number(loc).unwrap(), 0.0);
        assert_eq!(reg.number(n).unwrap(), 1000.0);
        assert!(!reg.has_pending());
    }

    #[test]
    fn wrong_kind_is_a_binding_error() {
        let (mut reg, loc, _) = registry();
        let err = reg.set_range(loc, (0.0, 1.0)).unwrap_err();
        assert!(matches!(err.current_context(), DistError::Binding(_)));
        assert!(reg.number(ControlId(99)).is_err());
    }

    #[test]
    fn checkbox_indices_are_validated() {
        let mut reg = ControlRegistry::new();
        let cb = reg.add(CheckboxGroup {
            labels: vec!["Show".into(), "Autoupdate".into()],
            active: vec![0, 1],
        });
        assert!(reg.set_active(cb, vec![2]).is_err());
        reg.set_active(cb, vec![1, 1]).unwrap();
        assert_eq!(reg.checkboxes(cb).unwrap().active, vec![1]);
    }

    #[test]
    fn clicks_always_notify() {
        let mut reg = ControlRegistry::new();
        let b = reg.add(Button {
            label: "Sample".into(),
            clicks: 0,
        });
        reg.click(b).unwrap();
        reg.click(b).unwrap();
        assert!(reg.next_event().is_some());
        assert!(reg.next_event().is_some());
    }
}
