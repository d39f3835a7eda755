//! OS process listing via `ps` (Unix) or `tasklist` (Windows).

use futures::future::BoxFuture;
use tokio::process::Command;

use super::errors::SidecarError;

/// One row of the OS process list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

impl ProcessEntry {
    /// Whether this process runs the executable `name`.
    ///
    /// Compares base names case-insensitively, ignoring a `.exe` suffix.
    /// A Linux `comm` cut at 15 bytes matches the longer name it was cut from.
    pub fn matches(&self, name: &str) -> bool {
        let listed = normalize_name(&self.name);
        let wanted = normalize_name(name);
        listed == wanted
            || (listed.len() == COMM_MAX_LEN
                && wanted.len() > COMM_MAX_LEN
                && wanted.starts_with(&listed))
    }
}

/// Linux keeps at most 15 bytes of an executable name in `comm`.
const COMM_MAX_LEN: usize = 15;

fn normalize_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_lowercase();
    match base.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => base,
    }
}

/// Parse `ps -A -o pid=,comm=` output.
pub fn parse_ps_output(output: &str) -> Vec<ProcessEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, name) = line.split_once(char::is_whitespace)?;
            Some(ProcessEntry {
                pid: pid.parse().ok()?,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

/// Parse `tasklist /FO CSV /NH` output.
pub fn parse_tasklist_output(output: &str) -> Vec<ProcessEntry> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_csv_line(line.trim());
            let name = fields.first()?;
            let pid = fields.get(1)?.parse().ok()?;
            Some(ProcessEntry {
                pid,
                name: name.clone(),
            })
        })
        .collect()
}

/// Split a line of quoted CSV. `""` inside quotes is a literal quote.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if !line.is_empty() {
        fields.push(field);
    }
    fields
}

// ─── Listing ────────────────────────────────────────────────────────────────

/// Source of the OS process list.
pub trait ProcessLister: Send + Sync {
    fn list(&self) -> BoxFuture<'_, Result<Vec<ProcessEntry>, SidecarError>>;
}

/// Lists processes with the platform's shell tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessLister;

impl ProcessLister for SystemProcessLister {
    fn list(&self) -> BoxFuture<'_, Result<Vec<ProcessEntry>, SidecarError>> {
        Box::pin(async move {
            let (program, args, parse): (&str, &[&str], fn(&str) -> Vec<ProcessEntry>) =
                if cfg!(windows) {
                    ("tasklist", &["/FO", "CSV", "/NH"], parse_tasklist_output)
                } else {
                    ("ps", &["-A", "-o", "pid=,comm="], parse_ps_output)
                };

            let output = Command::new(program).args(args).output().await.map_err(|e| {
                SidecarError::ProcessList {
                    command: program.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !output.status.success() {
                return Err(SidecarError::ProcessList {
                    command: program.to_string(),
                    reason: format!("exited with {}", output.status),
                });
            }
            Ok(parse(&String::from_utf8_lossy(&output.stdout)))
        })
    }
}

/// Send a termination request to a process this app did not spawn.
pub async fn kill_pid(pid: u32) -> Result<(), SidecarError> {
    let pid_arg = pid.to_string();
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/PID", pid_arg.as_str(), "/F"]);
        cmd
    } else {
        let mut cmd = Command::new("kill");
        cmd.arg(pid_arg.as_str());
        cmd
    };
    let status = cmd.status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(SidecarError::Io {
            reason: format!("failed to kill pid {pid}: exited with {status}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_output() {
        let out = "    1 launchd\n  412 /Applications/UserBank.app/Contents/MacOS/userbank_core_sse\n\nbogus line\n 77 zsh\n";
        let entries = parse_ps_output(out);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].pid, 412);
        assert!(entries[1].matches("userbank_core_sse"));
        assert_eq!(entries[2].name, "zsh");
    }

    #[test]
    fn test_parse_tasklist_output() {
        let out = "\"System Idle Process\",\"0\",\"Services\",\"0\",\"8 K\"\r\n\
                   \"userbank_core_sse.exe\",\"5120\",\"Console\",\"1\",\"24,512 K\"\r\n";
        let entries = parse_tasklist_output(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "System Idle Process");
        assert_eq!(entries[1].pid, 5120);
        assert!(entries[1].matches("userbank_core_sse"));
        assert!(entries[1].matches("USERBANK_CORE_SSE.EXE"));
    }

    #[test]
    fn test_parse_tasklist_info_line() {
        // Printed when nothing matches a filter; has no pid column.
        let out = "INFO: No tasks are running which match the specified criteria.\r\n";
        assert!(parse_tasklist_output(out).is_empty());
    }

    #[test]
    fn test_split_csv_escaped_quotes() {
        assert_eq!(
            split_csv_line(r#""a ""b""","2",""#),
            vec!["a \"b\"", "2", ""]
        );
    }

    #[test]
    fn test_parse_ps_truncated_comm() {
        let out = " 2151 userbank_core_s\n 2200 userbank_core\n";
        let entries = parse_ps_output(out);
        assert!(entries[0].matches("userbank_core_sse"));
        assert!(!entries[1].matches("userbank_core_sse"));

        let other = ProcessEntry {
            pid: 3,
            name: "userbank_core_x".into(),
        };
        assert!(!other.matches("userbank_core_sse"));
    }

    #[test]
    fn test_matches_requires_full_name() {
        let entry = ProcessEntry {
            pid: 1,
            name: "userbank_core_sse_old".into(),
        };
        assert!(!entry.matches("userbank_core_sse"));
    }
}
