pub mod parse;
pub mod types;
pub mod value;
