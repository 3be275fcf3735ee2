use std::fmt;

use crate::configuration::types::DemoActivity;

/// What the connect button of a sample app does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPolicy {
    /// The button only ever starts a session (Choose Color).
    ConnectOnly,
    /// The button starts a session, or leaves the current one (Choose Puppy).
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    Activate,
    Reset,
    Nothing,
}

impl ConnectPolicy {
    pub fn for_activity(activity: DemoActivity) -> Self {
        match activity {
            DemoActivity::Colors => ConnectPolicy::ConnectOnly,
            DemoActivity::Puppies => ConnectPolicy::Toggle,
        }
    }

    pub fn on_tap(&self, can_connect: bool, is_connected: bool) -> TapAction {
        match self {
            ConnectPolicy::Toggle if is_connected => TapAction::Reset,
            _ if can_connect => TapAction::Activate,
            _ => TapAction::Nothing,
        }
    }

    /// Label of the connect button for the given connection state.
    pub fn button_title(&self, is_connected: bool) -> &'static str {
        match (self, is_connected) {
            (ConnectPolicy::Toggle, true) => "Disconnect",
            _ => "Connect",
        }
    }
}

impl fmt::Display for ConnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectPolicy::ConnectOnly => write!(f, "connect-only"),
            ConnectPolicy::Toggle => write!(f, "toggle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_only_connect() {
        let policy = ConnectPolicy::for_activity(DemoActivity::Colors);
        assert_eq!(policy, ConnectPolicy::ConnectOnly);
        assert_eq!(policy.on_tap(true, false), TapAction::Activate);
        assert_eq!(policy.on_tap(false, true), TapAction::Nothing);
        assert_eq!(policy.button_title(true), "Connect");
    }

    #[test]
    fn puppies_toggle() {
        let policy = ConnectPolicy::for_activity(DemoActivity::Puppies);
        assert_eq!(policy.on_tap(true, false), TapAction::Activate);
        assert_eq!(policy.on_tap(false, true), TapAction::Reset);
        assert_eq!(policy.button_title(true), "Disconnect");
        assert_eq!(policy.button_title(false), "Connect");
    }

    #[test]
    fn ineligible_tap_does_nothing() {
        for policy in [ConnectPolicy::ConnectOnly, ConnectPolicy::Toggle] {
            assert_eq!(policy.on_tap(false, false), TapAction::Nothing);
        }
    }
}
