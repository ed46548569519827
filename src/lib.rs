//! Attendance and points tracking for extracurricular activities.
//!
//! Staff mark students present or absent at events; each mark keeps the
//! event's attendance ledger, the student's point balance, and the student's
//! attendance history consistent with one another.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod graphql;
pub mod models;
pub mod routes;
pub mod util;
