mod backend;
mod scope;
mod units;

pub use backend::*;
pub use scope::*;
pub use units::*;
