//! CLI command execution helpers
//!
//! Wraps the built `canopy` binary with a per-test data directory and
//! provides assertion helpers.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A scratch data directory plus the actor commands run as
pub struct TestTree {
    dir: TempDir,
    actor: String,
}

impl TestTree {
    /// Fresh directory with `canopy init` already run
    pub fn init() -> Result<Self> {
        let tree = Self::uninitialized()?;
        tree.run(&["init"]).assert_success()?;
        Ok(tree)
    }

    pub fn uninitialized() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create temp dir")?,
            actor: "tester".to_string(),
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Build a command as the default actor
    pub fn run(&self, args: &[&str]) -> CanopyCommand {
        self.run_as(&self.actor, args)
    }

    pub fn run_as(&self, actor: &str, args: &[&str]) -> CanopyCommand {
        let mut cmd = CanopyCommand::new(self.dir.path());
        cmd.args(&["--data-dir", &self.data_dir().to_string_lossy(), "--actor", actor]);
        cmd.args(args);
        cmd
    }

    /// Run with `--json` and parse stdout
    pub fn json(&self, args: &[&str]) -> Result<serde_json::Value> {
        let mut cmd = self.run(args);
        cmd.args(&["--json"]);
        let result = cmd.assert_success()?;
        serde_json::from_str(&result.stdout)
            .with_context(|| format!("stdout is not JSON: {}", result.stdout))
    }

    /// Ids printed by `ancestors`/`descendants`/`children` in JSON mode
    pub fn ids(&self, args: &[&str]) -> Result<Vec<String>> {
        let value = self.json(args)?;
        Ok(value
            .as_array()
            .context("expected an array")?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }
}

/// CLI command builder
pub struct CanopyCommand {
    working_dir: PathBuf,
    args: Vec<String>,
}

impl CanopyCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let output = Command::new(env!("CARGO_BIN_EXE_canopy"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to execute canopy")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}
