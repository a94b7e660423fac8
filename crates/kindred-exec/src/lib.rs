pub mod assistant;
pub mod contracts;
pub mod driver;
pub mod pointer;

pub use assistant::*;
pub use contracts::*;
pub use driver::*;
pub use pointer::*;
