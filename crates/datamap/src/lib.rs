pub mod error;
pub mod map;
pub mod options;
pub mod plugins;
pub mod svg;

pub use error::MapError;
pub use map::{Datamap, DoneHook, ElementRef, OverlayRequest, ProjectionHook, ProjectionState};
pub use options::{ArcOptions, BubblesOptions, LabelsOptions, MapOptions, UpdateOptions};
pub use plugins::{OverlayConfig, OverlayDefaults, OverlayOptions, OverlayRenderer, PluginRegistry};
pub use svg::render_document;
