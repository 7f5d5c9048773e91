use crate::engine::process::ProcessRunner;
use crate::model::ControlConfig;
use std::sync::Arc;

/// Answers whether the emulation process is currently in the process table.
#[derive(Clone)]
pub struct Prober {
    runner: Arc<dyn ProcessRunner>,
    argv: Vec<String>,
}

impl Prober {
    pub fn new(runner: Arc<dyn ProcessRunner>, cfg: &ControlConfig) -> Self {
        Self {
            runner,
            argv: vec![
                cfg.probe_command.clone(),
                "-x".into(),
                cfg.emulator_process_name().to_string(),
            ],
        }
    }

    /// A failed lookup counts as "not running".
    pub async fn is_running(&self) -> bool {
        match self.runner.run(&self.argv).await {
            Ok(status) => status.success(),
            Err(e) => {
                log::debug!("liveness probe `{}` failed: {e:#}", self.argv.join(" "));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::process::fake::FakeRunner;
    use crate::engine::process::RunStatus;
    use anyhow::{anyhow, Result};
    use futures::future::BoxFuture;

    fn cfg() -> ControlConfig {
        ControlConfig::with_address("00:19:C1:AA:BB:CC".parse().unwrap())
    }

    #[tokio::test]
    async fn reflects_process_table() {
        let runner = Arc::new(FakeRunner::new(false));
        let prober = Prober::new(runner.clone(), &cfg());
        assert!(!prober.is_running().await);
        runner.set_running(true);
        assert!(prober.is_running().await);
        assert_eq!(runner.calls()[0].argv, vec!["pgrep", "-x", "gimx"]);
    }

    struct Broken;

    impl ProcessRunner for Broken {
        fn run<'a>(&'a self, _argv: &'a [String]) -> BoxFuture<'a, Result<RunStatus>> {
            Box::pin(async { Err(anyhow!("pgrep: not found")) })
        }

        fn spawn(&self, _argv: &[String]) -> Result<()> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn lookup_errors_mean_not_running() {
        let prober = Prober::new(Arc::new(Broken), &cfg());
        assert!(!prober.is_running().await);
    }
}
