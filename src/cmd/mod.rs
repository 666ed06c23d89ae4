pub mod analyze;
pub mod diff;
