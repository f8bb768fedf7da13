//! Bluetooth Service Module
//!
//! Runs the connection gateway on a dedicated thread with a
//! current-thread tokio runtime. The UI talks to it through
//! [`GatewayCommand`]s and hears back through [`AppEvent`]s.

use crate::domain::models::{AppEvent, GatewayCommand, MessageSeverity, StatusMessage};
use crate::domain::settings::{Settings, TransportBackend};
use crate::infrastructure::bluetooth::gateway::{CancelHandle, ConnectionGateway};
use crate::infrastructure::bluetooth::simulated::{SimulatedTransport, SimulatorHandle};
use crate::infrastructure::bluetooth::transport::{BleTransport, LinkEvent, LinkTarget};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-run knobs taken from settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub target: LinkTarget,
    /// Query status this long after every successful connect
    pub auto_query_delay: Option<Duration>,
    /// Table name of the command the auto query sends
    pub auto_query_command: String,
}

impl WorkerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            target: LinkTarget {
                device_name: settings.device_name_filter.clone(),
                service_uuid: settings.ble_service_uuid.clone(),
                characteristic_uuid: settings.ble_characteristic_uuid.clone(),
            },
            auto_query_delay: settings
                .auto_query_on_connect
                .then(|| Duration::from_millis(settings.auto_query_delay_ms)),
            auto_query_command: settings.auto_query_command.clone(),
        }
    }
}

/// Handle to the Bluetooth worker thread
pub struct BluetoothService {
    commands: mpsc::UnboundedSender<GatewayCommand>,
    cancel: CancelHandle,
    backend: &'static str,
}

impl BluetoothService {
    /// Build the transport named in settings and start the worker
    pub fn spawn(
        settings: &Settings,
        app_events: mpsc::UnboundedSender<AppEvent>,
    ) -> anyhow::Result<Self> {
        let transport = build_transport(settings.transport_backend, &app_events);
        let backend = transport.backend_name();

        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let gateway = ConnectionGateway::new(
            transport,
            link_tx,
            app_events.clone(),
            settings.connect_timeout(),
        );
        let cancel = gateway.cancel_handle();
        let config = WorkerConfig::from_settings(settings);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        std::thread::Builder::new()
            .name("bluetooth".to_string())
            .spawn(move || {
                rt.block_on(run_worker(gateway, cmd_rx, link_rx, config));
            })?;

        info!("Bluetooth worker started ({} backend)", backend);
        Ok(Self {
            commands: cmd_tx,
            cancel,
            backend,
        })
    }

    pub fn send(&self, command: GatewayCommand) {
        if self.commands.send(command).is_err() {
            warn!("Bluetooth worker is gone, command dropped");
        }
    }

    /// Abort a connect attempt that is still searching
    pub fn cancel_connect(&self) {
        self.cancel.cancel();
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

#[cfg(feature = "btleplug")]
fn native_transport() -> Option<Box<dyn BleTransport>> {
    Some(Box::new(
        crate::infrastructure::bluetooth::btle::BtleplugTransport::new(),
    ))
}

#[cfg(all(windows, not(feature = "btleplug")))]
fn native_transport() -> Option<Box<dyn BleTransport>> {
    Some(Box::new(
        crate::infrastructure::bluetooth::winrt::WinRtTransport::new(),
    ))
}

#[cfg(not(any(windows, feature = "btleplug")))]
fn native_transport() -> Option<Box<dyn BleTransport>> {
    None
}

fn build_transport(
    backend: TransportBackend,
    app_events: &mpsc::UnboundedSender<AppEvent>,
) -> Box<dyn BleTransport> {
    if backend == TransportBackend::Native {
        if let Some(transport) = native_transport() {
            return transport;
        }
        warn!("No native Bluetooth backend in this build, falling back to the simulator");
        let _ = app_events.send(AppEvent::LogMessage(StatusMessage::new(
            "No native Bluetooth backend available; using the simulated printer",
            MessageSeverity::Warning,
        )));
    }
    Box::new(SimulatedTransport::new(SimulatorHandle::default()))
}

enum WorkerInput {
    Command(GatewayCommand),
    Link(LinkEvent),
    AutoQuery,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Worker loop; returns once every command sender is dropped
pub async fn run_worker(
    mut gateway: ConnectionGateway,
    mut commands: mpsc::UnboundedReceiver<GatewayCommand>,
    mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
    config: WorkerConfig,
) {
    let mut auto_query_at: Option<Instant> = None;

    loop {
        let input = tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(cmd) => WorkerInput::Command(cmd),
                None => break,
            },
            Some(event) = link_events.recv() => WorkerInput::Link(event),
            _ = sleep_until_opt(auto_query_at) => WorkerInput::AutoQuery,
        };

        match input {
            WorkerInput::Command(GatewayCommand::Connect) => {
                debug!("Connect requested while {:?}", gateway.state());
                if gateway.connect(&config.target).await {
                    auto_query_at = config.auto_query_delay.map(|d| Instant::now() + d);
                }
            }
            WorkerInput::Command(GatewayCommand::Disconnect) => {
                auto_query_at = None;
                gateway.disconnect().await;
            }
            WorkerInput::Command(GatewayCommand::Send(command)) => {
                if let Err(e) = gateway.send_command(command).await {
                    gateway.report_failure(command.label(), &e);
                }
            }
            WorkerInput::Command(GatewayCommand::SendText(text)) => {
                if let Err(e) = gateway.send_text(&text).await {
                    gateway.report_failure("Send test data", &e);
                }
            }
            WorkerInput::Link(event) => {
                gateway.handle_link_event(event).await;
            }
            WorkerInput::AutoQuery => {
                auto_query_at = None;
                if gateway.is_connected() {
                    debug!("Auto status query after connect");
                    if let Err(e) = gateway.send_named(&config.auto_query_command).await {
                        gateway.report_failure("Auto status query", &e);
                    }
                }
            }
        }
    }

    gateway.disconnect().await;
    info!("Bluetooth worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ReceivedFrame;
    use crate::infrastructure::bluetooth::protocol::PrinterCommand;

    struct Worker {
        commands: mpsc::UnboundedSender<GatewayCommand>,
        events: mpsc::UnboundedReceiver<AppEvent>,
        sim: SimulatorHandle,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(auto_query_delay: Option<Duration>) -> Worker {
        start_with(WorkerConfig {
            auto_query_delay,
            ..WorkerConfig::from_settings(&Settings::default())
        })
    }

    fn start_with(config: WorkerConfig) -> Worker {
        let sim = SimulatorHandle::default();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (app_tx, app_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let gateway = ConnectionGateway::new(
            Box::new(SimulatedTransport::new(sim.clone())),
            link_tx,
            app_tx,
            Some(Duration::from_secs(5)),
        );
        let task = tokio::spawn(run_worker(gateway, cmd_rx, link_rx, config));
        Worker {
            commands: cmd_tx,
            events: app_rx,
            sim,
            task,
        }
    }

    async fn next_frame(events: &mut mpsc::UnboundedReceiver<AppEvent>) -> ReceivedFrame {
        let wait = async {
            loop {
                match events.recv().await {
                    Some(AppEvent::FrameReceived(frame)) => return frame,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), wait)
            .await
            .expect("no frame received")
    }

    #[tokio::test]
    async fn test_auto_query_after_connect() {
        let mut w = start(Some(Duration::from_millis(20)));
        w.commands.send(GatewayCommand::Connect).unwrap();
        w.commands
            .send(GatewayCommand::Send(PrinterCommand::FeedPaper))
            .unwrap();

        let frame = next_frame(&mut w.events).await;
        assert_eq!(frame.raw_bytes, vec![0x10, 0x00, 45, 85]);
        assert_eq!(
            w.sim.writes(),
            vec![
                PrinterCommand::FeedPaper.as_bytes().to_vec(),
                PrinterCommand::QueryStatus.as_bytes().to_vec()
            ]
        );

        drop(w.commands);
        w.task.await.unwrap();
        assert!(!w.sim.is_linked());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_reports_failure() {
        let mut w = start(None);
        w.commands
            .send(GatewayCommand::Send(PrinterCommand::CutPaper))
            .unwrap();
        drop(w.commands);
        w.task.await.unwrap();

        let mut failures = Vec::new();
        while let Ok(event) = w.events.try_recv() {
            if let AppEvent::OperationFailed { operation, message } = event {
                failures.push((operation, message));
            }
        }
        assert_eq!(
            failures,
            vec![("Cut Paper".to_string(), "Not connected to device".to_string())]
        );
        assert!(w.sim.writes().is_empty());
    }

    #[tokio::test]
    async fn test_worker_forwards_notifications() {
        let mut w = start(None);
        w.commands.send(GatewayCommand::Connect).unwrap();

        // wait until linked
        let linked = async {
            while !w.sim.is_linked() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), linked)
            .await
            .unwrap();

        assert!(w.sim.notify(b"READY"));
        let frame = next_frame(&mut w.events).await;
        assert_eq!(frame.decoded_text, "READY");

        w.commands.send(GatewayCommand::Disconnect).unwrap();
        drop(w.commands);
        w.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_auto_query_command_is_reported() {
        let mut w = start_with(WorkerConfig {
            auto_query_delay: Some(Duration::from_millis(10)),
            auto_query_command: "STATUS_PLEASE".to_string(),
            ..WorkerConfig::from_settings(&Settings::default())
        });
        w.commands.send(GatewayCommand::Connect).unwrap();

        let failure = async {
            loop {
                match w.events.recv().await {
                    Some(AppEvent::OperationFailed { operation, message }) => {
                        return (operation, message)
                    }
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        };
        let (operation, message) = tokio::time::timeout(Duration::from_secs(2), failure)
            .await
            .unwrap();

        assert_eq!(operation, "Auto status query");
        assert_eq!(message, "Unknown printer command: STATUS_PLEASE");
        assert!(w.sim.writes().is_empty());

        drop(w.commands);
        w.task.await.unwrap();
    }
}
