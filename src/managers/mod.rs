// Tab suspender state managers
// Managers own the engine's in-memory state: tab identity, per-tab properties, focus and timers.

pub mod focus_tracker;
pub mod property_store;
pub mod tab_registry;
pub mod timer_manager;
