//! Sidecar: the local helper process that serves the tool endpoint.
//!
//! Spawned from the app bundle, or adopted when an instance is already
//! running (detected through the OS process list).

pub mod errors;
pub mod process;
pub mod service;

pub use errors::SidecarError;
pub use process::{parse_ps_output, parse_tasklist_output, ProcessEntry, ProcessLister};
pub use service::{SidecarConfig, SidecarService, SidecarStatus};

/// Executable name of the SSE helper shipped in `binaries/`.
pub const SIDECAR_BINARY: &str = "userbank_core_sse";

/// Config for the bundled helper under `resource_dir/binaries`.
pub fn bundled_sidecar(resource_dir: &std::path::Path) -> SidecarConfig {
    let file = if cfg!(windows) {
        format!("{SIDECAR_BINARY}.exe")
    } else {
        SIDECAR_BINARY.to_string()
    };
    SidecarConfig {
        process_name: SIDECAR_BINARY.to_string(),
        ..SidecarConfig::new(resource_dir.join("binaries").join(file))
    }
}
