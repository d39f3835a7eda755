//! Start, adopt, stop, and talk to the local helper process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;

use super::errors::SidecarError;
use super::process::{kill_pid, ProcessLister, SystemProcessLister};

/// How to launch and recognize the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Executable name looked for in the OS process list.
    pub process_name: String,
    /// Reuse an already-running instance instead of spawning a second one.
    pub adopt_existing: bool,
}

impl SidecarConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let process_name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            program,
            args: Vec::new(),
            process_name,
            adopt_existing: true,
        }
    }
}

enum SidecarHandle {
    /// Spawned by us; killed on drop.
    Owned { child: Child, stdin: Option<ChildStdin> },
    /// Found already running.
    Adopted { pid: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub adopted: bool,
    pub program: String,
    pub checked_at: String,
}

/// Owns at most one helper process.
pub struct SidecarService {
    config: SidecarConfig,
    lister: Arc<dyn ProcessLister>,
    handle: Mutex<Option<SidecarHandle>>,
}

impl SidecarService {
    pub fn new(config: SidecarConfig) -> Self {
        Self::with_lister(config, Arc::new(SystemProcessLister))
    }

    pub fn with_lister(config: SidecarConfig, lister: Arc<dyn ProcessLister>) -> Self {
        Self {
            config,
            lister,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    /// Start the helper. No-op when one is already running.
    pub async fn start(&self) -> Result<SidecarStatus, SidecarError> {
        let mut handle = self.handle.lock().await;
        if self.refresh(&mut handle).await {
            tracing::info!("sidecar already running");
            return Ok(self.status_of(&handle));
        }

        if self.config.adopt_existing {
            match self.find_existing().await {
                Ok(Some(pid)) => {
                    tracing::info!(pid, name = %self.config.process_name, "adopting running sidecar");
                    *handle = Some(SidecarHandle::Adopted { pid });
                    return Ok(self.status_of(&handle));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "process list unavailable, spawning"),
            }
        }

        let program = self.config.program.display().to_string();
        tracing::info!(program = %program, args = ?self.config.args, "starting sidecar");

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SidecarError::SpawnFailed {
                program: program.clone(),
                reason: e.to_string(),
            })?;
        let stdin = child.stdin.take();

        tracing::info!(program = %program, pid = ?child.id(), "sidecar started");
        *handle = Some(SidecarHandle::Owned { child, stdin });
        Ok(self.status_of(&handle))
    }

    /// Stop the helper. No-op when it is not running.
    pub async fn stop(&self) -> Result<(), SidecarError> {
        let mut handle = self.handle.lock().await;
        match handle.take() {
            None => {
                tracing::info!("sidecar not running");
                Ok(())
            }
            Some(SidecarHandle::Owned { mut child, stdin }) => {
                drop(stdin);
                child.kill().await?;
                tracing::info!("sidecar stopped");
                Ok(())
            }
            Some(SidecarHandle::Adopted { pid }) => {
                kill_pid(pid).await?;
                tracing::info!(pid, "adopted sidecar stopped");
                Ok(())
            }
        }
    }

    /// Write one line to the helper's stdin.
    pub async fn send(&self, data: &str) -> Result<(), SidecarError> {
        let mut handle = self.handle.lock().await;
        if !self.refresh(&mut handle).await {
            return Err(SidecarError::NotRunning);
        }
        match handle.as_mut() {
            Some(SidecarHandle::Owned {
                stdin: Some(stdin), ..
            }) => {
                let mut line = data.to_string();
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await?;
                tracing::debug!(bytes = line.len(), "sent data to sidecar");
                Ok(())
            }
            Some(SidecarHandle::Adopted { pid }) => Err(SidecarError::Io {
                reason: format!("sidecar pid {pid} was not started by this app; stdin unavailable"),
            }),
            _ => Err(SidecarError::Io {
                reason: "sidecar stdin is closed".into(),
            }),
        }
    }

    pub async fn is_running(&self) -> bool {
        let mut handle = self.handle.lock().await;
        self.refresh(&mut handle).await
    }

    pub async fn status(&self) -> SidecarStatus {
        let mut handle = self.handle.lock().await;
        self.refresh(&mut handle).await;
        self.status_of(&handle)
    }

    /// Drop the handle if its process has gone away; true when still alive.
    async fn refresh(&self, handle: &mut Option<SidecarHandle>) -> bool {
        let alive = match handle.as_mut() {
            None => return false,
            Some(SidecarHandle::Owned { child, .. }) => matches!(child.try_wait(), Ok(None)),
            Some(SidecarHandle::Adopted { pid }) => {
                let pid = *pid;
                match self.lister.list().await {
                    Ok(entries) => entries.iter().any(|e| e.pid == pid),
                    // Can't tell; assume it is still there.
                    Err(_) => true,
                }
            }
        };
        if !alive {
            tracing::warn!("sidecar exited");
            *handle = None;
        }
        alive
    }

    async fn find_existing(&self) -> Result<Option<u32>, SidecarError> {
        let entries = self.lister.list().await?;
        Ok(entries
            .iter()
            .find(|e| e.matches(&self.config.process_name))
            .map(|e| e.pid))
    }

    fn status_of(&self, handle: &Option<SidecarHandle>) -> SidecarStatus {
        let (running, pid, adopted) = match handle {
            None => (false, None, false),
            Some(SidecarHandle::Owned { child, .. }) => (true, child.id(), false),
            Some(SidecarHandle::Adopted { pid }) => (true, Some(*pid), true),
        };
        SidecarStatus {
            running,
            pid,
            adopted,
            program: self.config.program.display().to_string(),
            checked_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use futures::future::BoxFuture;

    use super::*;
    use crate::sidecar::process::{parse_ps_output, ProcessEntry};

    #[derive(Default)]
    struct FakeLister {
        entries: StdMutex<Vec<ProcessEntry>>,
    }

    impl FakeLister {
        fn with(entries: Vec<ProcessEntry>) -> Arc<Self> {
            Arc::new(Self {
                entries: StdMutex::new(entries),
            })
        }
    }

    impl ProcessLister for FakeLister {
        fn list(&self) -> BoxFuture<'_, Result<Vec<ProcessEntry>, SidecarError>> {
            Box::pin(async move { Ok(self.entries.lock().unwrap().clone()) })
        }
    }

    fn config(program: &str) -> SidecarConfig {
        SidecarConfig {
            process_name: "userbank_core_sse".into(),
            ..SidecarConfig::new(program)
        }
    }

    #[test]
    fn test_config_derives_process_name() {
        let cfg = SidecarConfig::new("/opt/userbank/binaries/userbank_core_sse");
        assert_eq!(cfg.process_name, "userbank_core_sse");
        assert!(cfg.adopt_existing);
    }

    #[tokio::test]
    async fn test_send_when_not_running() {
        let svc = SidecarService::with_lister(config("/nonexistent"), FakeLister::with(vec![]));
        assert!(matches!(svc.send("ping").await, Err(SidecarError::NotRunning)));
        assert!(!svc.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let svc = SidecarService::with_lister(config("/nonexistent"), FakeLister::with(vec![]));
        svc.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let svc = SidecarService::with_lister(
            config("/nonexistent/userbank_core_sse"),
            FakeLister::with(vec![]),
        );
        let err = svc.start().await.unwrap_err();
        assert!(matches!(err, SidecarError::SpawnFailed { .. }));
        assert!(!svc.status().await.running);
    }

    #[tokio::test]
    async fn test_adopts_existing_process() {
        let lister = FakeLister::with(vec![ProcessEntry {
            pid: 4242,
            name: "/usr/local/bin/userbank_core_sse".into(),
        }]);
        let svc = SidecarService::with_lister(config("/nonexistent"), lister.clone());

        let status = svc.start().await.unwrap();
        assert!(status.running);
        assert!(status.adopted);
        assert_eq!(status.pid, Some(4242));

        // Adopted processes have no stdin.
        assert!(matches!(svc.send("x").await, Err(SidecarError::Io { .. })));

        // Process disappears from the list.
        lister.entries.lock().unwrap().clear();
        assert!(!svc.is_running().await);
    }

    #[tokio::test]
    async fn test_adopts_process_with_truncated_comm() {
        let lister = FakeLister::with(parse_ps_output(" 2151 userbank_core_s\n"));
        let svc = SidecarService::with_lister(
            config("/nonexistent/binaries/userbank_core_sse"),
            lister,
        );

        let status = svc.start().await.unwrap();
        assert!(status.adopted);
        assert_eq!(status.pid, Some(2151));
    }

    #[tokio::test]
    async fn test_adoption_disabled_spawns() {
        let lister = FakeLister::with(vec![ProcessEntry {
            pid: 1,
            name: "userbank_core_sse".into(),
        }]);
        let cfg = SidecarConfig {
            adopt_existing: false,
            ..config("/nonexistent")
        };
        let svc = SidecarService::with_lister(cfg, lister);
        assert!(matches!(
            svc.start().await,
            Err(SidecarError::SpawnFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_owned_lifecycle() {
        let svc = SidecarService::with_lister(config("cat"), FakeLister::with(vec![]));

        let status = svc.start().await.unwrap();
        assert!(status.running);
        assert!(!status.adopted);
        let pid = status.pid;

        // Second start is a no-op.
        assert_eq!(svc.start().await.unwrap().pid, pid);

        svc.send("hello").await.unwrap();
        assert!(svc.is_running().await);

        svc.stop().await.unwrap();
        assert!(!svc.is_running().await);
        assert!(matches!(svc.send("again").await, Err(SidecarError::NotRunning)));
    }
}
