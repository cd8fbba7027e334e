pub mod arcs;
pub mod bubbles;
pub mod context;
pub mod graticule;
pub mod labels;
pub mod layer;
pub mod legend;
pub mod path;
pub mod popup;
pub mod subunits;
pub mod symbology;

pub use context::{OverlayError, OverlayOutcome, RegionIndex, RenderContext};
pub use layer::*;
pub use path::PathGenerator;
pub use popup::{HoverSubject, Popup, PopupTemplate, TemplateError};
pub use symbology::{FillSpec, Fills};
