pub mod adjuster;
pub mod binding;
pub mod catalog;
pub mod controller;
pub mod controls;
pub mod core;
pub mod curve;
pub mod dash;
pub mod histogram;
pub mod provider;

use std::fmt;

/// Error kinds raised by the dashboard core.
///
/// Each variant carries a human readable message; callers match on the
/// variant through [`error_stack::Report::current_context`].
#[derive(Debug, Clone, PartialEq)]
pub enum DistError {
    /// A parameter lies outside the distribution's valid support.
    Domain(String),
    /// Invalid shape input: empty ranges, zero counts, non-finite values.
    Degenerate(String),
    /// A parameter slot or control reference could not be resolved.
    Binding(String),
    /// A computation produced non-finite output.
    Computation(String),
}

impl DistError {
    pub fn kind(&self) -> &'static str {
        match self {
            DistError::Domain(_) => "domain",
            DistError::Degenerate(_) => "degenerate",
            DistError::Binding(_) => "binding",
            DistError::Computation(_) => "computation",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DistError::Domain(m)
            | DistError::Degenerate(m)
            | DistError::Binding(m)
            | DistError::Computation(m) => m,
        }
    }
}

impl fmt::Display for DistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind(), self.message())
    }
}

impl std::error::Error for DistError {}

pub type Result<T> = std::result::Result<T, error_stack::Report<DistError>>;

pub mod prelude {
    pub use crate::adjuster::*;
    pub use crate::binding::*;
    pub use crate::catalog::{AppCatalog, AppEntry};
    pub use crate::controller::*;
    pub use crate::controls::*;
    pub use crate::core::*;
    pub use crate::curve::*;
    pub use crate::dash::*;
    pub use crate::histogram::*;
    pub use crate::provider::*;
    pub use crate::{DistError, Result};
}
