//! Simulated call between several devices.
//!
//! ```text
//!  device-0 ──tap──▶ activate ──▶ LoopbackHub ──offer──▶ device-0..N join
//!  round r: device-i picks choice[(r * N + i) % len] and sends it
//!  toggle policy: device-0 taps again and leaves (and, with `rejoin`,
//!  taps a third time to come back)
//! ```
//!
//! Every device owns a handler, a presenter and a dedicated callback thread
//! named `<device>-main`, standing in for the app's main thread.

use log::{debug, info};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::policy::{ConnectPolicy, TapAction};
use super::presenter::{DevicePresenter, Selection, StatusLines};
use crate::activity::catalog::{
    Choice, ChooseColorActivity, ChooseColorMessage, ChoosePuppyActivity, ChoosePuppyMessage,
    COLOR_PALETTE, PUPPY_GALLERY,
};
use crate::activity::GroupActivity;
use crate::configuration::types::DemoActivity;
use crate::configuration::Config;
use crate::error_handling::types::DemoError;
use crate::handler::{CallbackQueue, GroupActivityHandler};
use crate::message::GroupActivityMessage;
use crate::platform::loopback::LoopbackHub;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Final screen of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub name: String,
    pub connected: bool,
    pub participant_count: usize,
    pub selection: Option<String>,
    pub received: usize,
    pub errors: usize,
    pub screen: Option<StatusLines>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub activity: String,
    pub policy: ConnectPolicy,
    pub devices: Vec<DeviceReport>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} policy)", self.activity, self.policy)?;
        for device in &self.devices {
            let screen = device
                .screen
                .as_ref()
                .map(StatusLines::to_string)
                .unwrap_or_default();
            writeln!(
                f,
                "  {}: {} (received {}, errors {})",
                device.name, screen, device.received, device.errors
            )?;
        }
        Ok(())
    }
}

struct Device<A, M> {
    handler: GroupActivityHandler<A, M>,
    presenter: Arc<DevicePresenter<M>>,
}

/// Runs the simulation described by `config` and returns every device's
/// final screen.
pub async fn run(config: &Config) -> Result<SimulationReport, DemoError> {
    config.validate()?;
    match config.demo.activity {
        DemoActivity::Colors => {
            simulate::<_, ChooseColorMessage>(ChooseColorActivity, &COLOR_PALETTE, config).await
        }
        DemoActivity::Puppies => {
            simulate::<_, ChoosePuppyMessage>(ChoosePuppyActivity, &PUPPY_GALLERY, config).await
        }
    }
}

async fn simulate<A, M>(
    activity: A,
    choices: &[Choice],
    config: &Config,
) -> Result<SimulationReport, DemoError>
where
    A: GroupActivity + Clone,
    M: GroupActivityMessage + Selection + From<Choice>,
{
    let policy = ConnectPolicy::for_activity(config.demo.activity);
    let participants = config.demo.participants;
    let title = activity.metadata().title;
    info!(
        "Simulating {} with {} device(s), {} round(s), {} policy",
        title, participants, config.demo.rounds, policy
    );

    let hub = LoopbackHub::new();
    let mut devices: Vec<Device<A, M>> = Vec::with_capacity(participants);
    for index in 0..participants {
        let name = format!("device-{}", index);
        let platform = hub.device(&name);
        platform.set_eligible(config.demo.eligible);

        let presenter: Arc<DevicePresenter<M>> = Arc::new(DevicePresenter::new(&name));
        let callbacks = CallbackQueue::dedicated_thread(&format!("{}-main", name))
            .map_err(DemoError::CallbackLane)?;
        let handler = GroupActivityHandler::new(
            activity.clone(),
            Arc::new(platform),
            presenter.clone(),
            callbacks,
            config.handler.clone(),
        );
        presenter.bind(handler.watch_status());
        handler.begin_waiting_for_sessions();
        devices.push(Device { handler, presenter });
    }

    let mut connected = false;
    if let Some(host) = devices.first() {
        if tap(host, policy) == TapAction::Activate {
            wait_until("every device to join", || {
                devices.iter().all(|d| {
                    d.handler.is_connected() && d.handler.participant_count() == participants
                })
            })
            .await?;
            connected = true;
        }
    }

    for round in 0..config.demo.rounds {
        debug!("Round {}", round + 1);
        for (index, device) in devices.iter().enumerate() {
            let choice = choices[(round * participants + index) % choices.len()];
            device.presenter.show(choice.title);
            device.handler.send(M::from(choice));

            if connected {
                wait_until(&format!("{} to reach every device", choice.title), || {
                    devices
                        .iter()
                        .all(|d| d.presenter.selection().as_deref() == Some(choice.title))
                })
                .await?;
            }
        }
    }

    if !connected {
        let rounds = config.demo.rounds;
        wait_until("rejected sends to be reported", || {
            devices.iter().all(|d| d.presenter.errors().len() >= rounds)
        })
        .await?;
    }

    if connected && policy == ConnectPolicy::Toggle {
        if let Some(host) = devices.first() {
            tap(host, policy);
            wait_until("the host to leave", || {
                !host.handler.is_connected()
                    && devices[1..]
                        .iter()
                        .all(|d| d.handler.participant_count() == participants - 1)
            })
            .await?;

            if config.demo.rejoin && tap(host, policy) == TapAction::Activate {
                wait_until("the host to rejoin", || {
                    devices.iter().all(|d| {
                        d.handler.is_connected() && d.handler.participant_count() == participants
                    })
                })
                .await?;
            }
        }
    }

    let report = SimulationReport {
        activity: title,
        policy,
        devices: devices.iter().map(report_device).collect(),
    };

    for device in &devices {
        device.handler.shutdown();
    }
    Ok(report)
}

fn tap<A, M>(device: &Device<A, M>, policy: ConnectPolicy) -> TapAction
where
    A: GroupActivity,
    M: GroupActivityMessage,
{
    let handler = &device.handler;
    let action = policy.on_tap(handler.can_connect(), handler.is_connected());
    info!(
        "[{}] taps {}",
        device.presenter.name(),
        policy.button_title(handler.is_connected())
    );
    match action {
        TapAction::Activate => handler.activate(),
        TapAction::Reset => handler.reset(),
        TapAction::Nothing => debug!("[{}] tap ignored", device.presenter.name()),
    }
    action
}

fn report_device<A, M>(device: &Device<A, M>) -> DeviceReport
where
    A: GroupActivity,
    M: GroupActivityMessage,
{
    DeviceReport {
        name: device.presenter.name().to_string(),
        connected: device.handler.is_connected(),
        participant_count: device.handler.participant_count(),
        selection: device.presenter.selection(),
        received: device.presenter.received(),
        errors: device.presenter.errors().len(),
        screen: device.presenter.current(),
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) -> Result<(), DemoError> {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .map_err(|_| DemoError::Timeout(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::types::DemoConfig;

    fn config(activity: DemoActivity, participants: usize, rounds: usize) -> Config {
        Config {
            demo: DemoConfig {
                activity,
                participants,
                rounds,
                eligible: true,
                rejoin: false,
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn colors_end_with_everyone_on_the_same_picture() {
        let _ = env_logger::builder().is_test(true).try_init();
        let report = run(&config(DemoActivity::Colors, 2, 3)).await.expect("simulation");

        assert_eq!(report.activity, "Choose Color");
        assert_eq!(report.policy, ConnectPolicy::ConnectOnly);
        for device in &report.devices {
            assert!(device.connected);
            assert_eq!(device.participant_count, 2);
            assert_eq!(device.selection.as_deref(), Some("Indigo"));
            assert_eq!(device.received, 3);
            assert_eq!(device.errors, 0);
            assert_eq!(
                device.screen.as_ref().unwrap().to_string(),
                "Eligible | Connected | Participants: 2 | Indigo"
            );
        }
    }

    #[tokio::test]
    async fn puppies_host_disconnects_at_the_end() {
        let report = run(&config(DemoActivity::Puppies, 3, 1)).await.expect("simulation");

        assert_eq!(report.policy, ConnectPolicy::Toggle);
        let host = &report.devices[0];
        assert!(!host.connected);
        assert_eq!(host.participant_count, 0);
        for guest in &report.devices[1..] {
            assert!(guest.connected);
            assert_eq!(guest.participant_count, 2);
            assert_eq!(guest.selection.as_deref(), Some("Dachshund"));
        }
    }

    #[tokio::test]
    async fn puppies_host_disconnects_and_rejoins() {
        let mut config = config(DemoActivity::Puppies, 2, 1);
        config.demo.rejoin = true;
        let report = run(&config).await.expect("simulation");

        for device in &report.devices {
            assert!(device.connected);
            assert_eq!(device.participant_count, 2);
            assert_eq!(device.errors, 0);
        }
        assert_eq!(report.devices[0].selection.as_deref(), Some("Corgi"));
    }

    #[tokio::test]
    async fn ineligible_devices_never_connect() {
        let mut config = config(DemoActivity::Colors, 2, 2);
        config.demo.eligible = false;
        let report = run(&config).await.expect("simulation");

        for device in &report.devices {
            assert!(!device.connected);
            assert_eq!(device.errors, 2);
            assert_eq!(device.received, 0);
            assert!(device
                .screen
                .as_ref()
                .unwrap()
                .to_string()
                .starts_with("Not eligible | Not connected"));
        }
    }

    #[tokio::test]
    async fn a_single_device_connects_alone() {
        let report = run(&config(DemoActivity::Colors, 1, 2)).await.expect("simulation");
        let solo = &report.devices[0];
        assert!(solo.connected);
        assert_eq!(solo.participant_count, 1);
        assert_eq!(solo.received, 0);
        assert_eq!(solo.selection.as_deref(), Some("Orange"));
        assert!(report.to_string().contains("device-0: Eligible | Connected"));
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected() {
        let result = run(&config(DemoActivity::Colors, 0, 1)).await;
        assert!(matches!(result, Err(DemoError::Config(_))));
    }
}
