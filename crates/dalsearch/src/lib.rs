//! Schedule builder backend: time grid, conflict detection, layout, a
//! persisted selection of class sessions, portal import and a course catalog,
//! served over a JSON HTTP API.

pub mod catalog;
pub mod config;
pub mod db;
pub mod import;
pub mod schedule;
pub mod server;
pub mod types;
