//! Process liveness probing.

use std::process::Command;

/// Answers whether a named process is currently running
pub trait ProcessInspector: Send + Sync {
    fn is_running(&self, process_name: &str) -> bool;
}

/// Probes the operating system's process table with the platform tool
/// (`tasklist` on Windows, `pgrep` elsewhere)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessInspector;

impl ProcessInspector for SystemProcessInspector {
    fn is_running(&self, process_name: &str) -> bool {
        let output = match probe_command(process_name).output() {
            Ok(o) => o,
            Err(e) => {
                tracing::debug!(process = process_name, error = %e, "Process probe failed");
                return false;
            }
        };

        if !output.status.success() {
            return false;
        }

        String::from_utf8_lossy(&output.stdout)
            .to_lowercase()
            .contains(&process_name.to_lowercase())
    }
}

#[cfg(windows)]
fn probe_command(process_name: &str) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut cmd = Command::new("tasklist");
    cmd.args(["/FI", &format!("IMAGENAME eq {}", process_name)])
        .creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn probe_command(process_name: &str) -> Command {
    // -l prints the process name next to the pid so the output can be matched
    let mut cmd = Command::new("pgrep");
    cmd.args(["-i", "-l", process_name]);
    cmd
}
