pub mod iterator;
pub mod navigator;
pub mod scheduler;

pub use iterator::{LimitRequest, VariantsIterator, VariantsOptions};
pub use scheduler::ModeStats;
