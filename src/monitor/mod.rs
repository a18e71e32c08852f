//! Background tasks
//!
//! The live topology refresher and the daily export scheduler

pub mod events;
pub mod refresher;
pub mod scheduler;

pub use events::*;
pub use refresher::*;
pub use scheduler::*;
