pub mod demand;
pub mod engine;
pub mod weather;

pub use demand::*;
pub use engine::*;
pub use weather::*;
