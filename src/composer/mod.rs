//! dv/v series composition.
//!
//! For each moving-window variant and component pair this module fetches the
//! precomputed summary table, picks the requested curves and converts them to
//! signed percentages ready for a [`crate::render::Renderer`].

pub mod compose;
pub mod naming;
pub mod types;

pub use compose::{compose, parse_components, resolve_mov_stacks};
pub use naming::resolve_outfile;
pub use types::{Composition, CompositionRequest, Curve, FetchOptions, SummaryTable};
