//! Subprocess helpers for the VCS command-line tools

use std::process::{Command, Output, Stdio};

/// Creates a Command for a VCS tool with prompts and localisation disabled
///
/// Stderr of failed calls is matched against English messages, and a
/// credential prompt would hang an unattended run.
pub fn create_command(program: &str) -> Command {
    let mut cmd = Command::new(program);

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // CREATE_NO_WINDOW
        cmd.creation_flags(0x08000000);
    }

    cmd.env("LC_ALL", "C").env("LANGUAGE", "C");

    match program {
        "git" => {
            cmd.env("GIT_TERMINAL_PROMPT", "0");
        }
        "hg" => {
            cmd.env("HGPLAIN", "1");
        }
        _ => {}
    }

    cmd.stdin(Stdio::null());
    cmd
}

/// Run to completion, capturing stdout and stderr
pub(crate) fn capture(cmd: &mut Command) -> std::io::Result<Output> {
    tracing::debug!(command = ?cmd, "Running");
    cmd.output()
}

/// Trimmed, lossily decoded stderr
pub(crate) fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Whether `program` can be spawned at all
pub fn tool_available(program: &str) -> bool {
    create_command(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
