use formats::dataset::DatasetError;
use formats::topology::TopologyError;
use foundation::math::ProjectionError;
use layers::context::OverlayError;

#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// Options rejected at construction.
    Config(String),
    Topology(TopologyError),
    Dataset(DatasetError),
    /// Overlay input rejected; nothing was rendered for that call.
    InvalidOverlayData { overlay: String, reason: String },
    UnknownOverlay(String),
    /// The operation needs regions, which only exist after `draw`.
    NotDrawn,
    /// Remote topology or data could not be fetched by the host.
    Fetch(String),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::Config(msg) => write!(f, "invalid map options: {msg}"),
            MapError::Topology(e) => write!(f, "{e}"),
            MapError::Dataset(e) => write!(f, "{e}"),
            MapError::InvalidOverlayData { overlay, reason } => {
                write!(f, "invalid {overlay} data: {reason}")
            }
            MapError::UnknownOverlay(name) => write!(f, "unknown overlay: {name}"),
            MapError::NotDrawn => write!(f, "map has not been drawn"),
            MapError::Fetch(msg) => write!(f, "fetch failed: {msg}"),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Topology(e) => Some(e),
            MapError::Dataset(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TopologyError> for MapError {
    fn from(e: TopologyError) -> Self {
        MapError::Topology(e)
    }
}

impl From<DatasetError> for MapError {
    fn from(e: DatasetError) -> Self {
        MapError::Dataset(e)
    }
}

impl From<ProjectionError> for MapError {
    fn from(e: ProjectionError) -> Self {
        MapError::Config(e.to_string())
    }
}

impl From<OverlayError> for MapError {
    fn from(e: OverlayError) -> Self {
        MapError::InvalidOverlayData {
            overlay: e.overlay,
            reason: e.reason,
        }
    }
}
