//! Tauri IPC commands exposed to the frontend.
//!
//! Each command is callable via `invoke("command_name", { args })` from
//! the frontend TypeScript code.

pub mod profile;
pub mod settings;
pub mod sidecar;
pub mod sql;
pub mod window;
