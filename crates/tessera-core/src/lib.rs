pub mod campaign;
pub mod limits;
pub mod report;
pub mod store;
