//! Named dashboard presets served by the application.

use error_stack::Report;
use serde::Serialize;
use tracing::info;

use crate::dash::{DashboardConfig, DistBuilder, dash};
use crate::provider::Family;
use crate::{DistError, Result};

/// Catalog listing entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppEntry {
    pub name: String,
    pub title: String,
    pub family: Family,
    pub toggles: bool,
}

impl From<&DashboardConfig> for AppEntry {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            name: config.name.clone(),
            title: config.title.clone(),
            family: config.family,
            toggles: config.sampling.toggles,
        }
    }
}

fn with_loc_scale(builder: DistBuilder) -> DistBuilder {
    builder
        .named_slider("loc", -10.0, 10.0, 0.0, 0.5)
        .named_slider("scale", 0.1, 10.0, 1.0, 0.1)
}

/// Normal with live `loc`/`scale`, sampling toggles and the adjuster.
pub fn normal() -> DashboardConfig {
    with_loc_scale(dash(Family::Normal))
        .name("normal")
        .title("Normal distribution")
        .x_range(-5.0, 5.0)
        .build()
}

/// Beta with live shape, `loc` and `scale` sliders.
pub fn beta() -> DashboardConfig {
    let builder = dash(Family::Beta)
        .slider("a", 0.1, 10.0, 3.0, 0.1)
        .slider("b", 0.1, 10.0, 3.0, 0.1);
    with_loc_scale(builder)
        .name("beta")
        .title("Beta distribution")
        .x_range(0.0, 1.0)
        .build()
}

/// Normal that resamples on every change.
pub fn normal_basic() -> DashboardConfig {
    with_loc_scale(dash(Family::Normal))
        .name("normal-basic")
        .title("Normal distribution (basic)")
        .x_range(-5.0, 5.0)
        .range_bounds(-20.0, 20.0)
        .range_step(1.0)
        .resolution(100)
        .always_resample()
        .without_adjuster()
        .build()
}

/// Beta with fixed shapes, viewed over a wider window.
pub fn beta_basic() -> DashboardConfig {
    with_loc_scale(dash(Family::Beta).fixed(3.0).fixed(3.0))
        .name("beta-basic")
        .title("Beta distribution (basic)")
        .x_range(-1.0, 1.0)
        .range_step(1.0)
        .always_resample()
        .without_adjuster()
        .build()
}

/// Dashboard configurations keyed by name, in registration order.
#[derive(Clone, Debug, Default)]
pub struct AppCatalog {
    apps: Vec<DashboardConfig>,
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presets() -> Self {
        Self {
            apps: vec![normal(), beta(), normal_basic(), beta_basic()],
        }
    }

    /// Validate and register `config`. A config with an existing name
    /// replaces the old one in place.
    pub fn insert(&mut self, config: DashboardConfig) -> Result<()> {
        config.validate()?;
        if config.name.is_empty() || config.name.contains('/') {
            return Err(Report::new(DistError::Binding(format!(
                "invalid app name '{}'",
                config.name
            ))));
        }
        match self.apps.iter_mut().find(|c| c.name == config.name) {
            Some(slot) => {
                info!(name = %config.name, "replacing app");
                *slot = config;
            }
            None => self.apps.push(config),
        }
        Ok(())
    }

    pub fn extend(&mut self, configs: impl IntoIterator<Item = DashboardConfig>) -> Result<()> {
        for config in configs {
            self.insert(config)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DashboardConfig> {
        self.apps.iter().find(|c| c.name == name)
    }

    pub fn entries(&self) -> Vec<AppEntry> {
        self.apps.iter().map(AppEntry::from).collect()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dash::{DistDashboard, SlotConfig};

    #[test]
    fn presets_all_instantiate() {
        let catalog = AppCatalog::with_presets();
        assert_eq!(catalog.len(), 4);
        for entry in catalog.entries() {
            let mut config = catalog.get(&entry.name).unwrap().clone();
            config.seed = Some(5);
            DistDashboard::new(&config).unwrap();
        }
    }

    #[test]
    fn beta_basic_fixes_shapes() {
        let config = beta_basic();
        assert_eq!(config.positional, vec![SlotConfig::Fixed(3.0), SlotConfig::Fixed(3.0)]);
        assert!(!config.sampling.toggles);
        assert_eq!(config.x_range, (-1.0, 1.0));
    }

    #[test]
    fn insert_replaces_by_name() {
        let mut catalog = AppCatalog::with_presets();
        let mut custom = normal();
        custom.title = "Wide normal".into();
        custom.x_range = (-20.0, 20.0);
        catalog.insert(custom).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.get("normal").unwrap().title, "Wide normal");
    }

    #[test]
    fn invalid_entries_are_refused() {
        let mut catalog = AppCatalog::new();
        let mut bad = normal();
        bad.x_range = (2.0, -2.0);
        assert!(catalog.insert(bad).is_err());
        let mut slashed = normal();
        slashed.name = "a/b".into();
        assert!(catalog.insert(slashed).is_err());
        assert!(catalog.is_empty());
    }

    #[test]
    fn configs_load_from_json() {
        let json = r#"[{
            "name": "narrow-beta",
            "title": "Narrow beta",
            "family": "beta",
            "positional": [{"fixed": 2.0}, {"slider": {"start": 0.5, "end": 5.0, "value": 2.0, "step": 0.5, "title": "b"}}],
            "x_range": [0.0, 1.0],
            "sampling": {"sample_size": 500, "bins": 20}
        }]"#;
        let configs: Vec<DashboardConfig> = serde_json::from_str(json).unwrap();
        let mut catalog = AppCatalog::new();
        catalog.extend(configs).unwrap();
        let config = catalog.get("narrow-beta").unwrap();
        assert!(config.adjuster);
        assert!(config.sampling.toggles);
        assert_eq!(config.resolution, 1000);
    }
}
