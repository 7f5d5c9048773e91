//! Command sequencing against the controller-emulation process.
//!
//! Each action becomes an ordered list of blocking invocations with fixed waits
//! in between. A failing step aborts the rest of the sequence.

pub mod probe;
pub mod process;

use crate::model::{ControlConfig, ControllerKey};
use anyhow::{Context, Result};
use probe::Prober;
use process::{run_checked, ProcessRunner};
use std::sync::Arc;
use std::time::Duration;

const KEY_DOWN: u8 = 255;
const KEY_UP: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOnOutcome {
    /// Emulator was already running; nothing was sent.
    AlreadyOn,
    /// Emulator was started; the activation press is still owed.
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    PoweredOn(PowerOnOutcome),
    PoweredOff,
}

pub struct Sequencer {
    runner: Arc<dyn ProcessRunner>,
    prober: Prober,
    cfg: Arc<ControlConfig>,
}

impl Sequencer {
    pub fn new(runner: Arc<dyn ProcessRunner>, cfg: Arc<ControlConfig>) -> Self {
        let prober = Prober::new(runner.clone(), &cfg);
        Self {
            runner,
            prober,
            cfg,
        }
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    fn event_argv(&self, event: String) -> Vec<String> {
        vec![
            self.cfg.emulator.clone(),
            "--dst".into(),
            self.cfg.endpoint.clone(),
            "--event".into(),
            event,
        ]
    }

    fn start_argv(&self) -> Vec<String> {
        vec![
            self.cfg.emulator.clone(),
            "--type".into(),
            self.cfg.emulator_type.clone(),
            "--src".into(),
            self.cfg.endpoint.clone(),
            "--bdaddr".into(),
            self.cfg.device_address.to_string(),
        ]
    }

    /// Key-down, hold for `duration`, key-up.
    pub async fn key_press(&self, key: ControllerKey, duration: Duration) -> Result<()> {
        let down = self.event_argv(key.event(KEY_DOWN));
        run_checked(self.runner.as_ref(), &down)
            .await
            .with_context(|| format!("{} key-down", key.path_name()))?;
        tokio::time::sleep(duration).await;
        let up = self.event_argv(key.event(KEY_UP));
        run_checked(self.runner.as_ref(), &up)
            .await
            .with_context(|| format!("{} key-up", key.path_name()))?;
        Ok(())
    }

    /// A press with the default duration.
    pub async fn tap(&self, key: ControllerKey) -> Result<()> {
        self.key_press(key, self.cfg.press_duration).await
    }

    /// Starts the emulator unless it is already running. Waking the console
    /// from standby happens here; the PS press that finishes activation is
    /// left to the caller (see [`Sequencer::activate`]).
    pub async fn power_on(&self) -> Result<PowerOnOutcome> {
        if self.prober.is_running().await {
            log::info!("emulator already running, power-on is a no-op");
            return Ok(PowerOnOutcome::AlreadyOn);
        }
        self.start_emulator()?;
        Ok(PowerOnOutcome::Started)
    }

    fn start_emulator(&self) -> Result<()> {
        let argv = self.start_argv();
        log::debug!("spawn: {}", argv.join(" "));
        self.runner
            .spawn(&argv)
            .with_context(|| format!("failed to start emulator `{}`", argv.join(" ")))?;
        log::info!(
            "emulator started for {}, activation due in {}",
            self.cfg.device_address,
            humantime::format_duration(self.cfg.boot_delay)
        );
        Ok(())
    }

    /// Completes power-on once the console has booted.
    pub async fn activate(&self) -> Result<()> {
        self.tap(ControllerKey::Ps).await.context("activation press")
    }

    /// Hold PS to open the power menu, then confirm both dialogs.
    pub async fn power_off(&self) -> Result<()> {
        self.key_press(ControllerKey::Ps, self.cfg.power_off_hold)
            .await
            .context("power-off: PS hold")?;
        self.tap(ControllerKey::Cross)
            .await
            .context("power-off: first confirm")?;
        tokio::time::sleep(self.cfg.confirm_gap).await;
        self.tap(ControllerKey::Cross)
            .await
            .context("power-off: second confirm")?;
        log::info!("power-off sequence sent to {}", self.cfg.device_address);
        Ok(())
    }

    /// Probes once and branches; the probe is not repeated by the power-on leg.
    pub async fn toggle(&self) -> Result<ToggleOutcome> {
        if self.prober.is_running().await {
            self.power_off().await?;
            Ok(ToggleOutcome::PoweredOff)
        } else {
            self.start_emulator()?;
            Ok(ToggleOutcome::PoweredOn(PowerOnOutcome::Started))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::process::fake::FakeRunner;

    fn sequencer(running: bool) -> (Arc<FakeRunner>, Sequencer) {
        let runner = Arc::new(FakeRunner::new(running));
        let cfg = ControlConfig::with_address("00:19:C1:AA:BB:CC".parse().unwrap());
        let seq = Sequencer::new(runner.clone(), Arc::new(cfg));
        (runner, seq)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn key_press_sends_down_then_up() {
        for key in ControllerKey::ALL {
            let (runner, seq) = sequencer(true);
            seq.tap(key).await.unwrap();
            let calls = runner.calls();
            assert_eq!(calls.len(), 2, "{key:?}");
            assert_eq!(
                calls[0].argv,
                vec![
                    "gimx".to_string(),
                    "--dst".into(),
                    "127.0.0.1:51914".into(),
                    "--event".into(),
                    format!("{}(255)", key.wire_token()),
                ]
            );
            assert_eq!(calls[1].argv[4], format!("{}(0)", key.wire_token()));
            assert_eq!(calls[1].at - calls[0].at, ms(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn key_press_honours_duration() {
        let (runner, seq) = sequencer(true);
        seq.key_press(ControllerKey::L2, ms(1250)).await.unwrap();
        let ev = runner.events();
        assert_eq!(ev[0], (ms(0), "l2(255)".to_string()));
        assert_eq!(ev[1], (ms(1250), "l2(0)".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_is_a_no_op_when_running() {
        let (runner, seq) = sequencer(true);
        assert_eq!(seq.power_on().await.unwrap(), PowerOnOutcome::AlreadyOn);
        assert!(runner.effects().is_empty());
        assert_eq!(runner.probe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_starts_emulator_without_waiting() {
        let (runner, seq) = sequencer(false);
        assert_eq!(seq.power_on().await.unwrap(), PowerOnOutcome::Started);
        let effects = runner.effects();
        assert_eq!(effects.len(), 1);
        assert!(effects[0].background);
        assert_eq!(
            effects[0].argv,
            vec![
                "gimx",
                "--type",
                "Sixaxis",
                "--src",
                "127.0.0.1:51914",
                "--bdaddr",
                "00:19:C1:AA:BB:CC"
            ]
        );
        assert_eq!(effects[0].at, ms(0));
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_sequence_and_timing() {
        let (runner, seq) = sequencer(false);
        seq.power_off().await.unwrap();
        assert_eq!(runner.probe_count(), 0);
        let ev = runner.events();
        let expected = vec![
            (ms(0), "PS(255)"),
            (ms(3000), "PS(0)"),
            (ms(3000), "cross(255)"),
            (ms(3100), "cross(0)"),
            (ms(3600), "cross(255)"),
            (ms(3700), "cross(0)"),
        ];
        let expected: Vec<(Duration, String)> = expected
            .into_iter()
            .map(|(t, e)| (t, e.to_string()))
            .collect();
        assert_eq!(ev, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_the_sequence() {
        let (runner, seq) = sequencer(true);
        runner.fail_event("cross(0)");
        let err = seq.power_off().await.unwrap_err();
        assert!(format!("{err:#}").contains("first confirm"));
        let ev: Vec<String> = runner.events().into_iter().map(|(_, e)| e).collect();
        assert_eq!(ev, vec!["PS(255)", "PS(0)", "cross(255)", "cross(0)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_key_down_skips_key_up() {
        let (runner, seq) = sequencer(true);
        runner.fail_event("start(255)");
        assert!(seq.tap(ControllerKey::Start).await.is_err());
        assert_eq!(runner.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_follows_probe() {
        let (on_runner, seq) = sequencer(true);
        assert_eq!(seq.toggle().await.unwrap(), ToggleOutcome::PoweredOff);
        let (off_runner, direct) = sequencer(true);
        direct.power_off().await.unwrap();
        assert_eq!(on_runner.effects(), off_runner.effects());

        let (runner, seq) = sequencer(false);
        assert_eq!(
            seq.toggle().await.unwrap(),
            ToggleOutcome::PoweredOn(PowerOnOutcome::Started)
        );
        let (direct_runner, direct) = sequencer(false);
        direct.power_on().await.unwrap();
        assert_eq!(runner.effects(), direct_runner.effects());
        assert_eq!(runner.probe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_is_reported() {
        let (runner, seq) = sequencer(false);
        runner.fail_spawn();
        let err = seq.power_on().await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to start emulator"));
    }
}
