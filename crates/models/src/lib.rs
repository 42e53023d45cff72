pub mod counter;
pub mod errors;
