use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Everything the control core needs, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    pub device_address: DeviceAddress,
    /// Emulation binary. Its file name is also what the prober looks for.
    pub emulator: String,
    pub emulator_type: String,
    /// Loopback endpoint shared by the emulator and the event client.
    pub endpoint: String,
    pub probe_command: String,
    #[serde(with = "humantime_serde")]
    pub boot_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub press_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub power_off_hold: Duration,
    #[serde(with = "humantime_serde")]
    pub confirm_gap: Duration,
    #[serde(default, with = "humantime_serde")]
    pub reconcile_interval: Option<Duration>,
}

impl ControlConfig {
    /// Defaults matching the reference device and firmware.
    pub fn with_address(device_address: DeviceAddress) -> Self {
        Self {
            device_address,
            emulator: "gimx".into(),
            emulator_type: "Sixaxis".into(),
            endpoint: "127.0.0.1:51914".into(),
            probe_command: "pgrep".into(),
            boot_delay: Duration::from_secs(35),
            press_duration: Duration::from_millis(100),
            power_off_hold: Duration::from_secs(3),
            confirm_gap: Duration::from_millis(500),
            reconcile_interval: Some(Duration::from_secs(30)),
        }
    }

    /// Process name as it appears in the process table.
    pub fn emulator_process_name(&self) -> &str {
        std::path::Path::new(&self.emulator)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.emulator)
    }
}

/// Opaque identifier of the console the emulator pairs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("device address must not be empty");
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKey {
    Select,
    Start,
    Ps,
    Up,
    Right,
    Down,
    Left,
    Triangle,
    Circle,
    Cross,
    Square,
    L1,
    R1,
    L2,
    R2,
    L3,
    R3,
}

impl ControllerKey {
    pub const ALL: [ControllerKey; 17] = [
        ControllerKey::Select,
        ControllerKey::Start,
        ControllerKey::Ps,
        ControllerKey::Up,
        ControllerKey::Right,
        ControllerKey::Down,
        ControllerKey::Left,
        ControllerKey::Triangle,
        ControllerKey::Circle,
        ControllerKey::Cross,
        ControllerKey::Square,
        ControllerKey::L1,
        ControllerKey::R1,
        ControllerKey::L2,
        ControllerKey::R2,
        ControllerKey::L3,
        ControllerKey::R3,
    ];

    /// Lowercase name used in `/ps3/key/<name>`.
    pub fn path_name(self) -> &'static str {
        match self {
            ControllerKey::Select => "select",
            ControllerKey::Start => "start",
            ControllerKey::Ps => "ps",
            ControllerKey::Up => "up",
            ControllerKey::Right => "right",
            ControllerKey::Down => "down",
            ControllerKey::Left => "left",
            ControllerKey::Triangle => "triangle",
            ControllerKey::Circle => "circle",
            ControllerKey::Cross => "cross",
            ControllerKey::Square => "square",
            ControllerKey::L1 => "l1",
            ControllerKey::R1 => "r1",
            ControllerKey::L2 => "l2",
            ControllerKey::R2 => "r2",
            ControllerKey::L3 => "l3",
            ControllerKey::R3 => "r3",
        }
    }

    /// Control name understood by the emulation client.
    pub fn wire_token(self) -> &'static str {
        match self {
            ControllerKey::Ps => "PS",
            other => other.path_name(),
        }
    }

    /// Event string for one key-down (255) or key-up (0).
    pub fn event(self, intensity: u8) -> String {
        format!("{}({})", self.wire_token(), intensity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PowerOn,
    PowerOff,
    PowerToggle,
    KeyPress(ControllerKey),
}

/// Inferred console power state, kept by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Unknown,
    Off,
    On,
}

impl PowerState {
    pub fn from_running(running: bool) -> Self {
        if running {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ps_is_the_only_key_with_a_distinct_token() {
        for key in ControllerKey::ALL {
            if key == ControllerKey::Ps {
                assert_eq!(key.wire_token(), "PS");
            } else {
                assert_eq!(key.wire_token(), key.path_name());
            }
        }
        assert_eq!(ControllerKey::Cross.event(255), "cross(255)");
        assert_eq!(ControllerKey::Ps.event(0), "PS(0)");
    }

    #[test]
    fn device_address_rejects_blank() {
        assert!("  ".parse::<DeviceAddress>().is_err());
        let addr: DeviceAddress = " 00:19:C1:AA:BB:CC ".parse().unwrap();
        assert_eq!(addr.as_str(), "00:19:C1:AA:BB:CC");
    }

    #[test]
    fn emulator_process_name_strips_directories() {
        let mut cfg = ControlConfig::with_address("addr".parse().unwrap());
        cfg.emulator = "/usr/local/bin/gimx".into();
        assert_eq!(cfg.emulator_process_name(), "gimx");
    }

    #[test]
    fn config_serializes_durations_as_humantime() {
        let cfg = ControlConfig::with_address("addr".parse().unwrap());
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["boot_delay"], "35s");
        assert_eq!(v["confirm_gap"], "500ms");
        assert_eq!(v["device_address"], "addr");
    }
}
