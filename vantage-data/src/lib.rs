//! Vantage Data Crate
//!
//! GPU-agnostic building blocks for draw layers: the [`MinMax`] bounds
//! accumulator and the closed set of drawable content kinds.

pub mod min_max;
pub mod renderable;

pub use min_max::{MinMax, MinMaxValue, finite_min_max, finite_min_max_iter};
pub use renderable::{DrawnImage, DrawnMesh, DrawnPoints, Renderable, RenderableKind};
