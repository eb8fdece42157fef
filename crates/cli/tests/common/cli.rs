//! Driving the built `ferry` binary

use anyhow::{ensure, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// One invocation of `ferry`, run from `cwd`
pub struct Ferry {
    cwd: PathBuf,
    args: Vec<OsString>,
}

impl Ferry {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Run to completion; the developer's user config is hidden
    pub fn run(&self) -> Result<Outcome> {
        let started = Instant::now();
        let output = Command::new(env!("CARGO_BIN_EXE_ferry"))
            .args(&self.args)
            .current_dir(&self.cwd)
            .env("XDG_CONFIG_HOME", self.cwd.join(".no-user-config"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .with_context(|| format!("Failed to spawn ferry {:?}", self.args))?;

        Ok(Outcome {
            args: self.args.clone(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
            elapsed: started.elapsed(),
        })
    }

    /// Run and require exit code 0
    pub fn succeeds(&self) -> Result<Outcome> {
        let outcome = self.run()?;
        ensure!(outcome.code == Some(0), "expected success\n{}", outcome);
        Ok(outcome)
    }

    /// Run and require a specific non-zero exit code
    pub fn fails_with(&self, code: i32) -> Result<Outcome> {
        let outcome = self.run()?;
        ensure!(outcome.code == Some(code), "expected exit code {}\n{}", code, outcome);
        Ok(outcome)
    }
}

/// Captured result of a `ferry` invocation
#[derive(Debug, Clone)]
pub struct Outcome {
    pub args: Vec<OsString>,
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub elapsed: Duration,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ferry {:?} exited with {:?} after {:?}", self.args, self.code, self.elapsed)?;
        writeln!(f, "--- stdout\n{}", self.stdout)?;
        write!(f, "--- stderr\n{}", self.stderr)
    }
}

/// `ferry!(cwd, "config", "show")` builds a [`Ferry`] with those arguments
#[macro_export]
macro_rules! ferry {
    ($cwd:expr $(, $arg:expr)* $(,)?) => {{
        let mut cmd = $crate::common::cli::Ferry::new($cwd);
        $( cmd.arg($arg); )*
        cmd
    }};
}
