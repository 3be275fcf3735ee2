#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::{watch, Notify};

    use crate::activity::catalog::{ChooseColorActivity, ChoosePuppyMessage};
    use crate::activity::{ActivityDescriptor, GroupActivity};
    use crate::configuration::types::HandlerConfig;
    use crate::error_handling::types::{GroupActivityError, PlatformError};
    use crate::handler::test_support::*;
    use crate::handler::{CallbackQueue, GroupActivityHandler};
    use crate::message::MessageEnvelope;
    use crate::platform::loopback::{LoopbackHub, LoopbackPlatform};
    use crate::platform::{GroupSessionPlatform, ParticipantId, SessionStream};
    use crate::session_management::SessionPhase;

    async fn connected_solo(hub: &LoopbackHub) -> (LoopbackPlatform, ColorHandler, Arc<Recorder>) {
        let device = hub.device("solo");
        let (handler, recorder) = color_handler(&device);
        handler.begin_waiting_for_sessions();
        handler.activate();
        eventually("solo device connected", || handler.is_connected()).await;
        settle().await;
        (device, handler, recorder)
    }

    #[tokio::test]
    async fn begin_waiting_is_idempotent_and_silent() {
        let _ = env_logger::builder().is_test(true).try_init();
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        let (handler, recorder) = color_handler(&device);
        assert_eq!(handler.phase(), SessionPhase::Idle);

        handler.begin_waiting_for_sessions();
        handler.begin_waiting_for_sessions();
        eventually("waiting", || handler.phase() == SessionPhase::WaitingForSessions).await;
        settle().await;

        assert!(handler.can_connect());
        assert!(!handler.is_connected());
        assert_eq!(handler.participant_count(), 0);
        assert_eq!(recorder.len(), 0);
        assert_eq!(
            handler.descriptor().identifier(),
            ChooseColorActivity::ACTIVITY_IDENTIFIER
        );
    }

    #[tokio::test]
    async fn activate_while_ineligible_does_nothing() {
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        device.set_eligible(false);
        let (handler, recorder) = color_handler(&device);

        handler.begin_waiting_for_sessions();
        handler.activate();
        settle().await;

        assert!(!handler.can_connect());
        assert_eq!(handler.phase(), SessionPhase::WaitingForSessions);
        assert!(hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .is_none());
        assert_eq!(recorder.len(), 0);
    }

    #[tokio::test]
    async fn eligibility_changes_are_notified() {
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        device.set_eligible(false);
        let (handler, recorder) = color_handler(&device);
        handler.begin_waiting_for_sessions();
        settle().await;
        assert!(!handler.can_connect());

        device.set_eligible(true);
        eventually("eligible", || handler.can_connect()).await;
        eventually("notified", || recorder.state_changes() == 1).await;

        device.set_eligible(false);
        eventually("ineligible", || !handler.can_connect()).await;
        eventually("notified again", || recorder.state_changes() == 2).await;
    }

    #[tokio::test]
    async fn send_while_disconnected_reports_exactly_one_error() {
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        let (handler, recorder) = color_handler(&device);
        handler.begin_waiting_for_sessions();

        handler.send(color("red"));
        eventually("error reported", || !recorder.errors().is_empty()).await;
        settle().await;

        assert_eq!(recorder.errors(), vec![GroupActivityError::NotConnected]);
        assert_eq!(recorder.len(), 1);
        assert_eq!(hub.transport_send_count(), 0);
    }

    #[tokio::test]
    async fn activation_failure_is_reported_and_retry_succeeds() {
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        device.fail_next_activation(PlatformError::Refused("busy".to_string()));
        let (handler, recorder) = color_handler(&device);
        handler.begin_waiting_for_sessions();

        handler.activate();
        eventually("failure reported", || !recorder.errors().is_empty()).await;
        settle().await;
        assert_eq!(
            recorder.errors(),
            vec![GroupActivityError::ActivationFailed(PlatformError::Refused(
                "busy".to_string()
            ))]
        );
        assert_eq!(recorder.state_changes(), 0);
        assert!(handler.can_connect());

        handler.activate();
        eventually("connected on retry", || handler.is_connected()).await;
        assert_eq!(handler.participant_count(), 1);
        assert_eq!(recorder.errors().len(), 1);
    }

    #[tokio::test]
    async fn channel_open_failure_is_reported() {
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        device.fail_channel_open(true);
        let (handler, recorder) = color_handler(&device);
        handler.begin_waiting_for_sessions();
        handler.activate();

        eventually("error reported", || !recorder.errors().is_empty()).await;
        assert!(matches!(
            recorder.errors()[0],
            GroupActivityError::ChannelOpenFailed(_)
        ));
        assert!(handler.is_connected());

        handler.send(color("blue"));
        eventually("send rejected", || recorder.errors().len() == 2).await;
        assert_eq!(recorder.errors()[1], GroupActivityError::NotConnected);
    }

    #[tokio::test]
    async fn reset_leaves_the_session_and_waits_again() {
        let hub = LoopbackHub::new();
        let (_device, handler, recorder) = connected_solo(&hub).await;
        let session = hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .expect("live session");
        let before = recorder.state_changes();

        handler.reset();
        eventually("disconnected", || !handler.is_connected()).await;

        assert_eq!(handler.participant_count(), 0);
        assert_eq!(handler.phase(), SessionPhase::WaitingForSessions);
        assert!(handler.can_connect());
        assert_eq!(hub.participant_count(session), 0);
        eventually("reset notified", || recorder.state_changes() > before).await;

        handler.reset();
        settle().await;
        assert_eq!(handler.phase(), SessionPhase::WaitingForSessions);
    }

    #[tokio::test]
    async fn teardown_silences_every_callback() {
        let hub = LoopbackHub::new();
        let (_device, handler, recorder) = connected_solo(&hub).await;
        let session = hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .unwrap();
        settle().await;
        let delivered = recorder.len();

        handler.shutdown();
        eventually("actor stopped", || !handler.is_running()).await;
        handler.send(color("red"));
        handler.activate();
        hub.end_session(session);
        settle().await;

        assert_eq!(recorder.len(), delivered);
        assert_eq!(handler.phase(), SessionPhase::Idle);
        assert!(!handler.is_connected());
    }

    #[tokio::test]
    async fn dropping_the_handler_leaves_the_session() {
        let hub = LoopbackHub::new();
        let (_device, handler, _recorder) = connected_solo(&hub).await;
        let session = hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .unwrap();
        assert_eq!(hub.participant_count(session), 1);

        drop(handler);
        eventually("session released", || {
            hub.live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
                .is_none()
        })
        .await;
    }

    #[tokio::test]
    async fn foreign_message_type_stops_the_handler_without_reporting() {
        let hub = LoopbackHub::new();
        let (_device, handler, recorder) = connected_solo(&hub).await;
        let session = hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .unwrap();
        settle().await;
        let errors_before = recorder.errors().len();

        let stranger = ParticipantId::new();
        let bytes = MessageEnvelope::new(
            stranger,
            ChoosePuppyMessage {
                file_name: "husky".to_string(),
                title: "Husky".to_string(),
            },
        )
        .encode()
        .unwrap();
        hub.inject_raw(session, stranger, bytes);

        eventually("handler halted", || !handler.is_running()).await;
        settle().await;
        assert_eq!(recorder.errors().len(), errors_before);
        assert!(recorder.messages().is_empty());
        assert_eq!(hub.participant_count(session), 0);
        assert!(hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .is_none());
        assert_eq!(handler.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn malformed_bytes_are_reported_and_delivery_continues() {
        let hub = LoopbackHub::new();
        let (_device, handler, recorder) = connected_solo(&hub).await;
        let session = hub
            .live_session(ChooseColorActivity::ACTIVITY_IDENTIFIER)
            .unwrap();
        let stranger = ParticipantId::new();

        hub.inject_raw(session, stranger, b"not an envelope".to_vec());
        let bytes = MessageEnvelope::new(stranger, color("indigo")).encode().unwrap();
        hub.inject_raw(session, stranger, bytes);

        eventually("message delivered", || recorder.messages().len() == 1).await;
        assert!(matches!(
            recorder.errors()[..],
            [GroupActivityError::MalformedMessage(_)]
        ));
        assert!(handler.is_running());
    }

    #[tokio::test]
    async fn oversized_message_is_reported() {
        let hub = LoopbackHub::new();
        let device = hub.device("solo");
        let (handler, recorder) = color_handler_with(
            &device,
            HandlerConfig {
                max_message_bytes: 32,
                ..HandlerConfig::default()
            },
        );
        handler.activate();
        eventually("connected", || handler.is_connected()).await;

        handler.send(color("violet"));
        eventually("error reported", || !recorder.errors().is_empty()).await;
        assert!(matches!(
            recorder.errors()[0],
            GroupActivityError::MessageTooLarge { limit: 32, .. }
        ));
        assert_eq!(hub.transport_send_count(), 0);
    }

    #[tokio::test]
    async fn callbacks_run_on_the_designated_lane() {
        let hub = LoopbackHub::new();
        let device = hub.device("phone");
        let recorder = Arc::new(Recorder::default());
        let handler: ColorHandler = GroupActivityHandler::new(
            ChooseColorActivity,
            Arc::new(device.clone()),
            recorder.clone(),
            CallbackQueue::dedicated_thread("ui-main").expect("callback thread"),
            HandlerConfig::default(),
        );

        handler.activate();
        handler.send(color("orange"));
        eventually("connected", || handler.is_connected()).await;
        eventually("notifications", || recorder.len() >= 2).await;

        assert!(recorder
            .threads()
            .iter()
            .all(|name| name.as_deref() == Some("ui-main")));
    }

    /// Platform whose activation blocks until released, then fails.
    struct GatedPlatform {
        inner: LoopbackPlatform,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl GroupSessionPlatform for GatedPlatform {
        fn eligibility(&self) -> watch::Receiver<bool> {
            self.inner.eligibility()
        }

        fn sessions(&self, activity: &ActivityDescriptor) -> SessionStream {
            self.inner.sessions(activity)
        }

        async fn activate(&self, _activity: &ActivityDescriptor) -> Result<(), PlatformError> {
            self.gate.notified().await;
            Err(PlatformError::Refused("too late".to_string()))
        }
    }

    #[tokio::test]
    async fn activation_result_after_reset_is_discarded() {
        let hub = LoopbackHub::new();
        let gate = Arc::new(Notify::new());
        let recorder = Arc::new(Recorder::default());
        let handler: ColorHandler = GroupActivityHandler::new(
            ChooseColorActivity,
            Arc::new(GatedPlatform {
                inner: hub.device("phone"),
                gate: gate.clone(),
            }),
            recorder.clone(),
            CallbackQueue::spawn(),
            HandlerConfig::default(),
        );

        handler.begin_waiting_for_sessions();
        handler.activate();
        settle().await;
        handler.reset();
        settle().await;
        gate.notify_one();
        settle().await;

        assert!(recorder.errors().is_empty());
        assert!(handler.can_connect());
    }
}
