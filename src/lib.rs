pub mod config;
pub mod mcp_client;
pub mod profile;
pub mod sidecar;

#[cfg(feature = "desktop")]
pub mod commands;

/// Async mutex for types that require `.await` inside their methods.
pub type TokioMutex<T> = tokio::sync::Mutex<T>;

/// Return the platform-standard data directory for UserBank.
///
/// - macOS: `~/Library/Application Support/com.userbank.app/`
/// - Windows: `{FOLDERID_RoamingAppData}\com.userbank.app\`
/// - Linux: `$XDG_DATA_HOME/com.userbank.app/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.userbank/` only if none of the above can be resolved.
pub(crate) fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.userbank.app");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".userbank")
}

/// Initialize the tracing subscriber. Logs go to the app data directory.
///
/// On each app startup:
/// 1. Rotates existing logs (userbank.log → userbank.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh userbank.log with a line-flushing writer for crash resilience.
/// 3. Logs a startup banner with the data directory path for discoverability.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    let log_path = log_dir.join("userbank.log");

    rotate_log_file(&log_path, 3);

    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("failed to open {}: {e}", log_path.display());
            return;
        }
    };

    let flushing_writer = FlushingWriter::new(log_file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("userbank=info,warn"));

    // USERBANK_LOG_FORMAT=json switches to one JSON object per line.
    let json = std::env::var("USERBANK_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(flushing_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    // Startup banner with the log location
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== UserBank starting ==="
    );
}

/// Rotate log files: `userbank.log` → `userbank.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &std::path::Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// Without explicit flushing, log entries may sit in OS buffers and be lost
/// on crash.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(feature = "desktop")]
pub fn run() {
    use tauri::Manager;

    use crate::config::ClientSettings;
    use crate::mcp_client::{ClientSlot, McpClient};
    use crate::profile::view::ViewState;
    use crate::sidecar::SidecarService;

    // Initialize tracing FIRST, before any tracing::info!() calls
    init_tracing();

    let settings = ClientSettings::load_or_default();

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .manage(TokioMutex::new(settings.clone()))
        .manage(TokioMutex::new(ViewState::default()))
        .setup(move |app| {
            // config.json and the helper binary ship as bundle resources.
            let resource_dir = app.path().resource_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "resource dir unavailable, using data dir");
                data_dir()
            });
            let resource = config::load_resource_config(&resource_dir);

            let endpoint = config::resolve_endpoint(&settings, resource.config.as_ref());
            tracing::info!(endpoint = %endpoint.label(), "MCP endpoint resolved");

            app.manage(ClientSlot::new(McpClient::for_endpoint(endpoint)));
            app.manage(SidecarService::new(sidecar::bundled_sidecar(&resource_dir)));
            app.manage(resource);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::profile::get_all_table_contents,
            commands::profile::get_table_stats,
            commands::profile::query_records,
            commands::profile::search_records,
            commands::profile::add_record,
            commands::profile::update_record,
            commands::profile::delete_record,
            commands::profile::get_persona,
            commands::profile::save_persona,
            commands::profile::get_table_schema,
            commands::profile::reconnect_mcp,
            commands::profile::mcp_status,
            commands::profile::check_mcp_server,
            commands::profile::get_view_records,
            commands::profile::get_all_tags,
            commands::profile::get_tab_counts,
            commands::sql::execute_custom_sql,
            commands::sql::get_recent_records,
            commands::sql::get_table_counts,
            commands::sql::get_record,
            commands::sidecar::start_sidecar,
            commands::sidecar::stop_sidecar,
            commands::sidecar::sidecar_status,
            commands::sidecar::send_to_sidecar,
            commands::settings::get_resource_config,
            commands::settings::get_mcp_servers_config,
            commands::settings::get_client_settings,
            commands::settings::update_client_settings,
            commands::settings::reset_client_settings,
            commands::window::hide_window,
            commands::window::show_window,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rotate_log_file_keeps_three() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("userbank.log");
        let suffixed = |n: u32| dir.path().join(format!("userbank.log.{n}"));

        for generation in 0..5 {
            std::fs::write(&base, format!("run {generation}")).unwrap();
            rotate_log_file(&base, 3);
        }

        assert!(!base.exists());
        assert_eq!(std::fs::read_to_string(suffixed(1)).unwrap(), "run 4");
        assert_eq!(std::fs::read_to_string(suffixed(3)).unwrap(), "run 2");
        assert!(!suffixed(4).exists());
    }

    #[test]
    fn test_rotate_without_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("userbank.log");
        rotate_log_file(&base, 3);
        assert!(!dir.path().join("userbank.log.1").exists());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();

        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"line one\n").unwrap();
        let mut clone = writer.clone();
        clone.write_all(b"line two\n").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "line one\nline two\n"
        );
    }
}
