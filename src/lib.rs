//! tab-suspender: lifecycle and suspension coordination for browser tabs.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod adapters;
pub mod app;
pub mod database;
pub mod engine;
pub mod managers;
pub mod services;
pub mod types;
