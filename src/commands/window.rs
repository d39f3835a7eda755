//! Window visibility commands.

#[tauri::command]
pub fn hide_window(window: tauri::Window) {
    if let Err(e) = window.hide() {
        tracing::warn!(error = %e, "failed to hide window");
    }
}

#[tauri::command]
pub fn show_window(window: tauri::Window) {
    if let Err(e) = window.show().and_then(|_| window.set_focus()) {
        tracing::warn!(error = %e, "failed to show window");
    }
}
