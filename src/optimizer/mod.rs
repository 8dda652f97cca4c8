pub mod constraints;
pub mod milp;
pub mod types;

pub use constraints::*;
pub use milp::*;
pub use types::*;
