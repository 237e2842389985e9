pub mod catalog;
pub mod import;
pub mod schedule;
pub mod status;
