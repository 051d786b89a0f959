//! Manual editing of slider bounds and step.
//!
//! Sliders ship with fixed bounds; the adjuster lets a user widen or
//! narrow them at runtime. Moving `start` above (or `end` below) the
//! current value drags the value along so the slider never holds a value
//! outside its own bounds.

use std::fmt;
use std::str::FromStr;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::controls::{Button, Control, ControlId, ControlRegistry, Listener, Property, Select, Spinner};
use crate::{DistError, Result};

/// Adjuster target name of the x-axis range control.
pub const XRANGE: &str = "xrange";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustProperty {
    Start,
    End,
    Step,
}

impl AdjustProperty {
    pub const ALL: [AdjustProperty; 3] = [AdjustProperty::Start, AdjustProperty::End, AdjustProperty::Step];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustProperty::Start => "start",
            AdjustProperty::End => "end",
            AdjustProperty::Step => "step",
        }
    }

    fn property(self) -> Property {
        match self {
            AdjustProperty::Start => Property::Start,
            AdjustProperty::End => Property::End,
            AdjustProperty::Step => Property::Step,
        }
    }
}

impl fmt::Display for AdjustProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustProperty {
    type Err = Report<DistError>;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(AdjustProperty::Start),
            "end" => Ok(AdjustProperty::End),
            "step" => Ok(AdjustProperty::Step),
            other => Err(Report::new(DistError::Binding(format!(
                "'{other}' is not an adjustable property"
            )))),
        }
    }
}

fn rejected(msg: String) -> Report<DistError> {
    Report::new(DistError::Degenerate(msg))
}

/// Set `property` of slider `target` to `value`, keeping the slider's
/// value inside its bounds.
pub fn adjust(
    controls: &mut ControlRegistry,
    target: ControlId,
    property: AdjustProperty,
    value: f64,
) -> Result<()> {
    if !value.is_finite() {
        return Err(rejected(format!("{property} must be finite, got {value}")));
    }

    match controls.control(target)?.clone() {
        Control::Slider(s) => {
            check_bounds(property, value, s.start, s.end, &s.title)?;
            controls.set_bound(target, property.property(), value)?;
            match property {
                AdjustProperty::Start if value > s.value => controls.set_value(target, value),
                AdjustProperty::End if value < s.value => controls.set_value(target, value),
                _ => Ok(()),
            }
        }
        Control::RangeSlider(s) => {
            check_bounds(property, value, s.start, s.end, &s.title)?;
            controls.set_bound(target, property.property(), value)?;
            let (lo, hi) = s.value;
            match property {
                AdjustProperty::Start if value > lo => controls.set_range(target, (value, hi.max(value))),
                AdjustProperty::End if value < hi => controls.set_range(target, (lo.min(value), value)),
                _ => Ok(()),
            }
        }
        other => Err(Report::new(DistError::Binding(format!(
            "cannot adjust a {}",
            other.kind()
        )))),
    }
}

fn check_bounds(property: AdjustProperty, value: f64, start: f64, end: f64, title: &str) -> Result<()> {
    match property {
        AdjustProperty::Start if value > end => Err(rejected(format!(
            "start {value} of '{title}' exceeds its end {end}"
        ))),
        AdjustProperty::End if value < start => Err(rejected(format!(
            "end {value} of '{title}' is below its start {start}"
        ))),
        AdjustProperty::Step if value <= 0.0 => Err(rejected(format!(
            "step of '{title}' must be positive, got {value}"
        ))),
        _ => Ok(()),
    }
}

/// The adjuster panel: pick a slider and a property, type a value, press
/// "Update".
#[derive(Clone, Debug)]
pub struct Adjuster {
    targets: Vec<(String, ControlId)>,
    pub target_select: ControlId,
    pub property_select: ControlId,
    pub new_value: ControlId,
    pub button: ControlId,
}

impl Adjuster {
    /// Add the panel's controls to `controls` and route the button to
    /// [`Listener::Adjust`]. `targets` must not be empty.
    pub fn install(controls: &mut ControlRegistry, targets: Vec<(String, ControlId)>) -> Result<Self> {
        let first = targets
            .first()
            .map(|(name, _)| name.clone())
            .ok_or_else(|| Report::new(DistError::Binding("adjuster needs at least one slider".into())))?;

        let target_select = controls.add(Select {
            title: "Slider for".into(),
            value: first,
            options: targets.iter().map(|(name, _)| name.clone()).collect(),
        });
        let property_select = controls.add(Select {
            title: "Prop".into(),
            value: AdjustProperty::Start.as_str().into(),
            options: AdjustProperty::ALL.iter().map(|p| p.as_str().to_string()).collect(),
        });
        let new_value = controls.add(Spinner {
            title: "Value".into(),
            value: 0.0,
            low: None,
            high: None,
            step: 1e-6,
        });
        let button = controls.add(Button {
            label: "Update".into(),
            clicks: 0,
        });
        controls.subscribe(button, Property::Clicks, Listener::Adjust)?;

        Ok(Self {
            targets,
            target_select,
            property_select,
            new_value,
            button,
        })
    }

    pub fn target(&self, name: &str) -> Option<ControlId> {
        self.targets.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    /// Apply the adjustment currently selected in the panel.
    pub fn apply(&self, controls: &mut ControlRegistry) -> Result<()> {
        let name = controls.choice(self.target_select)?.to_string();
        let property: AdjustProperty = controls.choice(self.property_select)?.parse()?;
        let value = controls.number(self.new_value)?;
        self.apply_named(controls, &name, property, value)
    }

    pub fn apply_named(
        &self,
        controls: &mut ControlRegistry,
        name: &str,
        property: AdjustProperty,
        value: f64,
    ) -> Result<()> {
        let target = self
            .target(name)
            .ok_or_else(|| Report::new(DistError::Binding(format!("no adjustable slider named '{name}'"))))?;
        adjust(controls, target, property, value)
    }
}
