pub mod clock;
pub mod domain;
pub mod limit;
pub mod rng;
pub mod traversal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::ArgTemplates;
pub use limit::{LimitArgPolicy, LimitOutcome, RejectReason};
pub use traversal::{LimitRequest, ModeStats, VariantsIterator, VariantsOptions};
