pub mod element;
pub mod hover;
pub mod picking;
pub mod reconcile;
pub mod style;
pub mod transition;

pub use element::*;
pub use hover::*;
pub use reconcile::*;
pub use style::*;
pub use transition::*;
