// Shared type definitions
// Each submodule defines types used across the engine and its collaborators.

pub mod errors;
pub mod events;
pub mod settings;
pub mod status;
pub mod tab;
