pub static VERSION_AND_BUILD: &str = git_version::git_version!(prefix = concat!("v", env!("CARGO_PKG_VERSION"), " "));

pub mod axis;
pub mod config;
pub mod error;
pub mod field;
pub mod grid;
pub mod grid_source;
pub mod integrator;
pub mod map_engine;
pub mod runge_kutta;
pub mod stencil;
pub mod timeseries;
pub mod units;
pub mod yaml_patch;

pub use error::{Error, Result};
pub use field::{CoordinateKind, Field, FieldCell, TimeSeriesField, UnitKind, VonKarmanField};
pub use integrator::{FiniteLyapunovExponents, Integrator, Mode, TimeIterator};
pub use map_engine::{Index, MapEngine, MapProperties};
pub use stencil::{Stencil, StencilKind};
