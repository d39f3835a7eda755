//! Tauri IPC commands for the local helper process.

use tauri::State;

use crate::sidecar::{SidecarService, SidecarStatus};

#[tauri::command]
pub async fn start_sidecar(sidecar: State<'_, SidecarService>) -> Result<SidecarStatus, String> {
    sidecar.start().await.map_err(|e| {
        tracing::error!(error = %e, "failed to start sidecar");
        e.to_string()
    })
}

#[tauri::command]
pub async fn stop_sidecar(sidecar: State<'_, SidecarService>) -> Result<(), String> {
    sidecar.stop().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn sidecar_status(sidecar: State<'_, SidecarService>) -> Result<SidecarStatus, String> {
    Ok(sidecar.status().await)
}

#[tauri::command]
pub async fn send_to_sidecar(
    data: String,
    sidecar: State<'_, SidecarService>,
) -> Result<(), String> {
    sidecar.send(&data).await.map_err(|e| e.to_string())
}
