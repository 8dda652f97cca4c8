pub mod action;
pub mod battery;
pub mod forecast;
pub mod pricing;
pub mod system;

pub use action::*;
pub use battery::*;
pub use forecast::*;
pub use pricing::*;
pub use system::*;
