//! External process capability.
//!
//! Every device effect goes through [`ProcessRunner`]: argv in, exit status out.
//! The real implementation uses `tokio::process`; tests swap in a recorder.

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// Exit status of one finished invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl RunStatus {
    pub const SUCCESS: RunStatus = RunStatus { code: Some(0) };

    pub fn success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(c) => write!(f, "exit code {c}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

pub trait ProcessRunner: Send + Sync {
    /// Run to completion, discarding output.
    fn run<'a>(&'a self, argv: &'a [String]) -> BoxFuture<'a, Result<RunStatus>>;

    /// Start a long-lived process and return without waiting for it.
    fn spawn(&self, argv: &[String]) -> Result<()>;
}

/// Run and turn a non-zero exit into an error.
pub async fn run_checked(runner: &dyn ProcessRunner, argv: &[String]) -> Result<()> {
    log::debug!("exec: {}", argv.join(" "));
    let status = runner
        .run(argv)
        .await
        .with_context(|| format!("failed to run `{}`", argv.join(" ")))?;
    if !status.success() {
        bail!("`{}` failed with {}", argv.join(" "), status);
    }
    Ok(())
}

fn command_for(argv: &[String]) -> Result<Command> {
    let Some((program, args)) = argv.split_first() else {
        bail!("empty command line");
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    Ok(cmd)
}

/// Runs real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run<'a>(&'a self, argv: &'a [String]) -> BoxFuture<'a, Result<RunStatus>> {
        Box::pin(async move {
            let status = command_for(argv)?.status().await?;
            Ok(RunStatus {
                code: status.code(),
            })
        })
    }

    fn spawn(&self, argv: &[String]) -> Result<()> {
        let mut child = command_for(argv)?.spawn()?;
        let label = argv.join(" ");
        log::info!("started background process `{label}` (pid {:?})", child.id());
        // Reap the child so it does not linger as a zombie once it exits.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => log::info!("background process `{label}` exited: {status}"),
                Err(e) => log::warn!("waiting on `{label}` failed: {e}"),
            }
        });
        Ok(())
    }
}
