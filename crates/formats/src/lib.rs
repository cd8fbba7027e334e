pub mod dataset;
pub mod region;
pub mod topology;

pub use dataset::*;
pub use region::*;
pub use topology::*;
