use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::controls::{ControlId, ControlRegistry, Listener, Property};

/// One parameter slot: either a constant or a live control.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSlot {
    Fixed(f64),
    Bound(ControlId),
}

impl ParamSlot {
    fn read(&self, controls: &ControlRegistry) -> Result<f64> {
        match *self {
            ParamSlot::Fixed(v) => Ok(v),
            ParamSlot::Bound(id) => controls.number(id),
        }
    }
}

/// Positional and named parameter values, read fresh for one update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamValues {
    pub positional: Vec<f64>,
    pub named: BTreeMap<String, f64>,
}

/// Maps a distribution's parameter slots onto controls. The slots are
/// fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct ParameterBinding {
    positional: Vec<ParamSlot>,
    named: BTreeMap<String, ParamSlot>,
}

impl ParameterBinding {
    /// Later duplicates of a named slot replace earlier ones.
    pub fn new(
        positional: Vec<ParamSlot>,
        named: impl IntoIterator<Item = (String, ParamSlot)>,
    ) -> Self {
        Self {
            positional,
            named: named.into_iter().collect(),
        }
    }

    /// Controls bound to any slot, positional first.
    pub fn bound_controls(&self) -> impl Iterator<Item = ControlId> + '_ {
        self.positional
            .iter()
            .chain(self.named.values())
            .filter_map(|slot| match slot {
                ParamSlot::Bound(id) => Some(*id),
                ParamSlot::Fixed(_) => None,
            })
    }

    pub fn current_values(&self, controls: &ControlRegistry) -> Result<ParamValues> {
        let positional = self
            .positional
            .iter()
            .map(|slot| slot.read(controls))
            .collect::<Result<Vec<_>>>()?;
        let named = self
            .named
            .iter()
            .map(|(k, slot)| -> Result<(String, f64)> { Ok((k.clone(), slot.read(controls)?)) })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(ParamValues { positional, named })
    }

    /// Subscribe `listener` to value changes of every bound control.
    pub fn register(&self, controls: &mut ControlRegistry, listener: Listener) -> Result<()> {
        for id in self.bound_controls() {
            controls.subscribe(id, Property::Value, listener)?;
        }
        Ok(())
    }
}
