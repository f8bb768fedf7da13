//! Connection Gateway
//!
//! Owns the single logical link to the printer. All state transitions
//! happen here; consumers learn about them through [`AppEvent`]s.

use crate::domain::models::{
    AppEvent, ConnectionState, DeviceInfo, MessageSeverity, ReceivedFrame, StatusMessage,
};
use crate::infrastructure::bluetooth::protocol::{self, CommandSpec, PrinterCommand};
use crate::infrastructure::bluetooth::transport::{
    BleTransport, GatewayError, LinkEvent, LinkId, LinkTarget,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace, warn};

/// Aborts an in-flight connect attempt
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<Notify>);

impl CancelHandle {
    /// Wakes the attempt in progress, if any. Has no effect on later
    /// attempts. An attempt listens from before it publishes `Searching`.
    pub fn cancel(&self) {
        self.0.notify_waiters();
    }
}

pub struct ConnectionGateway {
    transport: Box<dyn BleTransport>,
    state: ConnectionState,
    /// Id of the open link, or of the attempt in progress
    current_link: Option<LinkId>,
    next_link: LinkId,
    link_events: mpsc::UnboundedSender<LinkEvent>,
    app_events: mpsc::UnboundedSender<AppEvent>,
    connect_timeout: Option<Duration>,
    cancel: CancelHandle,
}

impl ConnectionGateway {
    /// `link_events` is handed to the transport on every open; the owner
    /// of the matching receiver feeds events back via
    /// [`handle_link_event`](Self::handle_link_event).
    pub fn new(
        transport: Box<dyn BleTransport>,
        link_events: mpsc::UnboundedSender<LinkEvent>,
        app_events: mpsc::UnboundedSender<AppEvent>,
        connect_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            current_link: None,
            next_link: 1,
            link_events,
            app_events,
            connect_timeout,
            cancel: CancelHandle::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Connect and report plain success / failure. Failures are published
    /// as `OperationFailed`.
    pub async fn connect(&mut self, target: &LinkTarget) -> bool {
        match self.try_connect(target).await {
            Ok(_) => true,
            Err(e) => {
                self.report_failure("Connect", &e);
                false
            }
        }
    }

    /// Log a failed operation and publish it as `OperationFailed`
    pub fn report_failure(&self, operation: &str, err: &GatewayError) {
        warn!(kind = err.kind(), "{} failed: {}", operation, err);
        self.publish(AppEvent::OperationFailed {
            operation: operation.to_string(),
            message: err.to_string(),
        });
    }

    /// Only allowed from `Disconnected`; any failure leaves the gateway
    /// `Disconnected` with the transport closed.
    pub async fn try_connect(&mut self, target: &LinkTarget) -> Result<DeviceInfo, GatewayError> {
        if self.state != ConnectionState::Disconnected {
            warn!("Connect rejected, gateway is {:?}", self.state);
            return Err(GatewayError::Busy);
        }

        let link = self.next_link;
        self.next_link += 1;
        self.current_link = Some(link);

        // Listen before anyone can observe `Searching` and cancel
        let cancel = self.cancel.0.clone();
        let cancelled = cancel.notified();
        self.set_state(ConnectionState::Searching);
        info!(
            "Searching for {:?} via {} backend (link {})",
            target.device_name,
            self.transport.backend_name(),
            link
        );

        let result = self.open_bounded(target, link, cancelled).await;

        match result {
            Ok(device) => {
                info!("Connected to {} ({})", device.name, device.id);
                self.set_state(ConnectionState::Connected);
                self.publish(AppEvent::Connected(device.clone()));
                Ok(device)
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                self.transport.close().await;
                self.current_link = None;
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open_bounded(
        &mut self,
        target: &LinkTarget,
        link: LinkId,
        cancelled: Notified<'_>,
    ) -> Result<DeviceInfo, GatewayError> {
        let timeout = self.connect_timeout;
        let open = self.transport.open(target, link, self.link_events.clone());

        let bounded = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, open).await {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout(limit)),
                },
                None => open.await,
            }
        };

        tokio::select! {
            result = bounded => result,
            _ = cancelled => {
                info!("Connect attempt cancelled");
                Err(GatewayError::Cancelled)
            }
        }
    }

    /// Tear down the link. Safe to call in any state.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Connected {
            info!("Disconnecting from device");
        }
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        self.transport.close().await;
        self.current_link = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Fire-and-forget write to the printer
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), GatewayError> {
        if self.state != ConnectionState::Connected {
            return Err(GatewayError::NotConnected);
        }
        trace!("Writing {} bytes", bytes.len());
        self.transport.write(bytes).await
    }

    /// Send a table command and publish it as sent on success
    pub async fn send_command(
        &mut self,
        command: PrinterCommand,
    ) -> Result<CommandSpec, GatewayError> {
        self.send_spec(command.spec()).await
    }

    /// Send a command looked up by its table name, e.g. `QUERY_STATUS`
    pub async fn send_named(&mut self, name: &str) -> Result<CommandSpec, GatewayError> {
        let spec = protocol::lookup(name)?;
        self.send_spec(spec).await
    }

    async fn send_spec(&mut self, spec: CommandSpec) -> Result<CommandSpec, GatewayError> {
        self.send(spec.bytes).await?;
        debug!("Sent {} [{}]", spec.name, protocol::to_hex(spec.bytes));
        self.publish(AppEvent::CommandSent(spec));
        Ok(spec)
    }

    /// Send free-form text as UTF-8
    pub async fn send_text(&mut self, text: &str) -> Result<(), GatewayError> {
        self.send(text.as_bytes()).await?;
        self.publish(AppEvent::TextSent { length: text.len() });
        Ok(())
    }

    /// Route one event reported by the transport
    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        if self.current_link != Some(event.link()) || self.state != ConnectionState::Connected {
            debug!("Ignoring stale link event from link {}", event.link());
            return;
        }

        match event {
            LinkEvent::Notification { data, .. } => {
                let frame = ReceivedFrame::new(data);
                trace!("Received {} bytes: {}", frame.bytes, frame.hex);
                self.publish(AppEvent::FrameReceived(frame));
            }
            LinkEvent::Dropped { link } => {
                warn!("Link {} lost", link);
                self.publish(AppEvent::LogMessage(StatusMessage::new(
                    "Printer connection lost",
                    MessageSeverity::Warning,
                )));
                self.teardown().await;
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.publish(AppEvent::ConnectionState(state));
    }

    fn publish(&self, event: AppEvent) {
        let _ = self.app_events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::PrinterSession;
    use crate::infrastructure::bluetooth::protocol;
    use crate::infrastructure::bluetooth::simulated::{
        OpenBehavior, SimulatedTransport, SimulatorHandle,
    };

    struct Harness {
        gateway: ConnectionGateway,
        sim: SimulatorHandle,
        link_rx: mpsc::UnboundedReceiver<LinkEvent>,
        app_rx: mpsc::UnboundedReceiver<AppEvent>,
        session: PrinterSession,
    }

    impl Harness {
        fn new(timeout: Option<Duration>) -> Self {
            let sim = SimulatorHandle::default();
            let (link_tx, link_rx) = mpsc::unbounded_channel();
            let (app_tx, app_rx) = mpsc::unbounded_channel();
            let gateway = ConnectionGateway::new(
                Box::new(SimulatedTransport::new(sim.clone())),
                link_tx,
                app_tx,
                timeout,
            );
            Self {
                gateway,
                sim,
                link_rx,
                app_rx,
                session: PrinterSession::new(),
            }
        }

        /// Feed pending link events through the gateway, then pending app
        /// events into the session
        async fn pump(&mut self) {
            while let Ok(event) = self.link_rx.try_recv() {
                self.gateway.handle_link_event(event).await;
            }
            while let Ok(event) = self.app_rx.try_recv() {
                self.session.apply(event);
            }
        }

        fn states(&mut self) -> Vec<ConnectionState> {
            let mut states = Vec::new();
            while let Ok(event) = self.app_rx.try_recv() {
                if let AppEvent::ConnectionState(s) = event {
                    states.push(s);
                }
            }
            states
        }
    }

    fn target() -> LinkTarget {
        LinkTarget {
            device_name: protocol::DEVICE_NAME.to_string(),
            service_uuid: protocol::SERVICE_UUID.to_string(),
            characteristic_uuid: protocol::CHARACTERISTIC_UUID.to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_send_receive_end_to_end() {
        let mut h = Harness::new(Some(Duration::from_secs(5)));
        h.sim.set_auto_respond(false);

        assert!(h.gateway.connect(&target()).await);
        h.gateway
            .send_command(PrinterCommand::FeedPaper)
            .await
            .unwrap();
        h.pump().await;

        assert_eq!(h.session.activity.sent().len(), 1);
        assert_eq!(h.session.activity.sent()[0].bytes, vec![0x1B, 0x64, 0x03]);
        assert_eq!(h.sim.writes(), vec![vec![0x1B, 0x64, 0x03]]);

        assert!(h.sim.notify(&[0x10, 0x00, 45, 85]));
        h.pump().await;

        let status = h.session.status.unwrap();
        assert!(status.paper_ok);
        assert_eq!(status.head_temperature_c, 45);
        assert_eq!(status.battery_percent, 85);
        assert_eq!(h.session.activity.received().len(), 1);
        assert_eq!(h.session.connection_count, 1);
        assert!(h.session.is_connected());
    }

    #[tokio::test]
    async fn test_state_sequence() {
        let mut h = Harness::new(None);
        assert!(h.gateway.connect(&target()).await);
        h.gateway.disconnect().await;

        assert_eq!(
            h.states(),
            vec![
                ConnectionState::Searching,
                ConnectionState::Connected,
                ConnectionState::Disconnected
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_rejected_unless_disconnected() {
        let mut h = Harness::new(None);
        assert!(h.gateway.connect(&target()).await);

        assert_eq!(h.gateway.try_connect(&target()).await, Err(GatewayError::Busy));
        assert!(h.gateway.is_connected());
        assert!(h.sim.is_linked());
    }

    #[tokio::test]
    async fn test_connect_failures_end_disconnected() {
        for behavior in [
            OpenBehavior::NotFound,
            OpenBehavior::MissingService,
            OpenBehavior::MissingCharacteristic,
        ] {
            let mut h = Harness::new(None);
            h.sim.set_open_behavior(behavior);

            assert!(!h.gateway.connect(&target()).await);
            assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
            h.pump().await;
            assert_eq!(h.session.activity.statistics().error_count, 1);
            assert_eq!(h.session.connection_state, ConnectionState::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_wrong_device_name_is_not_found() {
        let mut h = Harness::new(None);
        let mut other = target();
        other.device_name = "Label-Maker".to_string();

        let err = h.gateway.try_connect(&other).await.unwrap_err();
        assert_eq!(err, GatewayError::DeviceNotFound("Label-Maker".to_string()));
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        let limit = Duration::from_millis(50);
        let mut h = Harness::new(Some(limit));
        h.sim.set_open_behavior(OpenBehavior::Hang);

        let err = h.gateway.try_connect(&target()).await.unwrap_err();
        assert_eq!(err, GatewayError::Timeout(limit));
        assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
        // the half-open link was released
        assert!(!h.sim.is_linked());
    }

    #[tokio::test]
    async fn test_connect_can_be_cancelled() {
        let mut h = Harness::new(None);
        h.sim.set_open_behavior(OpenBehavior::Hang);
        let cancel = h.gateway.cancel_handle();

        let canceller = async {
            tokio::task::yield_now().await;
            cancel.cancel();
        };
        let t = target();
        let (result, _) = tokio::join!(h.gateway.try_connect(&t), canceller);

        assert_eq!(result.unwrap_err(), GatewayError::Cancelled);
        assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
        assert!(!h.sim.is_linked());

        // a stale cancel does not affect the next attempt
        h.sim.set_open_behavior(OpenBehavior::Succeed);
        assert!(h.gateway.connect(&target()).await);
    }

    #[tokio::test]
    async fn test_cancel_right_after_searching_is_published() {
        let Harness {
            mut gateway,
            sim,
            mut app_rx,
            ..
        } = Harness::new(None);
        sim.set_open_behavior(OpenBehavior::Hang);
        let cancel = gateway.cancel_handle();

        // issued while idle, so it must not hit the attempt below
        cancel.cancel();

        let canceller = async {
            while let Some(event) = app_rx.recv().await {
                if let AppEvent::ConnectionState(ConnectionState::Searching) = event {
                    cancel.cancel();
                    break;
                }
            }
        };
        let t = target();
        let (result, _) = tokio::join!(gateway.try_connect(&t), canceller);

        assert_eq!(result.unwrap_err(), GatewayError::Cancelled);
        assert_eq!(gateway.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_named_uses_command_table() {
        let mut h = Harness::new(None);
        h.sim.set_auto_respond(false);
        assert!(h.gateway.connect(&target()).await);

        let spec = h.gateway.send_named("CUT_PAPER").await.unwrap();
        assert_eq!(spec.bytes, &[0x1D, 0x56, 0x00]);

        let err = h.gateway.send_named("JAM_PAPER").await.unwrap_err();
        assert!(err.is_send_failure());
        h.pump().await;

        assert_eq!(h.sim.writes(), vec![vec![0x1D, 0x56, 0x00]]);
        assert_eq!(h.session.activity.sent().len(), 1);
        assert_eq!(h.session.activity.sent()[0].command_name, "CUT_PAPER");
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let mut h = Harness::new(None);
        assert_eq!(
            h.gateway.send_command(PrinterCommand::Beep).await,
            Err(GatewayError::NotConnected)
        );
        assert!(h.sim.writes().is_empty());
        h.pump().await;
        assert!(h.session.activity.sent().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut h = Harness::new(None);
        h.gateway.disconnect().await;
        h.gateway.disconnect().await;
        assert_eq!(
            h.states(),
            vec![ConnectionState::Disconnected, ConnectionState::Disconnected]
        );

        assert!(h.gateway.connect(&target()).await);
        h.gateway.disconnect().await;
        h.gateway.disconnect().await;
        assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
        assert!(!h.sim.is_linked());
        assert_eq!(
            h.gateway.send(&[0x1B, 0x40]).await,
            Err(GatewayError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_link_loss_tears_down() {
        let mut h = Harness::new(None);
        assert!(h.gateway.connect(&target()).await);
        h.pump().await;

        assert!(h.sim.drop_link());
        h.pump().await;

        assert_eq!(h.gateway.state(), ConnectionState::Disconnected);
        assert_eq!(h.session.connection_state, ConnectionState::Disconnected);
        // link loss is not an error
        assert_eq!(h.session.activity.statistics().error_count, 0);
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let mut h = Harness::new(None);
        assert!(h.gateway.connect(&target()).await);
        h.gateway.disconnect().await;
        assert!(h.gateway.connect(&target()).await);
        h.pump().await;

        // events tagged with the first link id
        h.gateway
            .handle_link_event(LinkEvent::Dropped { link: 1 })
            .await;
        h.gateway
            .handle_link_event(LinkEvent::Notification {
                link: 1,
                data: vec![0x10, 0x01, 0, 0],
            })
            .await;
        h.pump().await;

        assert!(h.gateway.is_connected());
        assert!(h.session.activity.received().is_empty());
    }

    #[tokio::test]
    async fn test_query_status_round_trip() {
        let mut h = Harness::new(None);
        h.sim.set_status_frame(vec![0x10, 0x01, 52]);
        assert!(h.gateway.connect(&target()).await);

        h.gateway
            .send_command(PrinterCommand::QueryStatus)
            .await
            .unwrap();
        h.pump().await;

        let status = h.session.status.unwrap();
        assert!(!status.paper_ok);
        assert_eq!(status.head_temperature_c, 52);
        assert_eq!(status.battery_percent, 80);
    }

    #[tokio::test]
    async fn test_send_text() {
        let mut h = Harness::new(None);
        assert!(h.gateway.connect(&target()).await);
        let text = protocol::test_print_text("now");

        h.gateway.send_text(&text).await.unwrap();
        h.pump().await;

        assert_eq!(h.sim.writes(), vec![text.as_bytes().to_vec()]);
        // free-form text is not a table command
        assert!(h.session.activity.sent().is_empty());
    }
}
