pub mod series;
pub mod decision;

pub use series::*;
pub use decision::*;
