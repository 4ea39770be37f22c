pub mod splitting;
pub mod zone;

pub use splitting::*;
pub use zone::*;
