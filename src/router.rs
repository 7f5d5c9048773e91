//! Path to action resolution.
//!
//! Exact matches only; anything else is reported as unsupported (`None`).

use crate::model::{Action, ControllerKey};

const POWER_ON: &str = "/ps3/power/on";
const POWER_OFF: &str = "/ps3/power/off";
const POWER_TOGGLE: &str = "/ps3/power/toggle";
const KEY_PREFIX: &str = "/ps3/key/";

pub fn resolve(path: &str) -> Option<Action> {
    match path {
        POWER_ON => Some(Action::PowerOn),
        POWER_OFF => Some(Action::PowerOff),
        POWER_TOGGLE => Some(Action::PowerToggle),
        _ => {
            let name = path.strip_prefix(KEY_PREFIX)?;
            ControllerKey::ALL
                .into_iter()
                .find(|k| k.path_name() == name)
                .map(Action::KeyPress)
        }
    }
}
