pub mod runtime;
pub mod universe;

pub use runtime::*;
pub use universe::*;
