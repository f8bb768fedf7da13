//! Simulated printer
//!
//! An in-process stand-in for the Mini-Printer, used for offline demos and
//! for driving the gateway in tests. It answers QUERY_STATUS with a fixed
//! status frame. Under test, a [`SimulatorHandle`] can script failures,
//! push notifications, drop the link and inspect what was written.

use crate::domain::models::DeviceInfo;
use crate::infrastructure::bluetooth::protocol::{self, PrinterCommand};
use crate::infrastructure::bluetooth::transport::{
    BleTransport, GatewayError, LinkEvent, LinkId, LinkTarget,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How the next `open` behaves
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehavior {
    Succeed,
    NotFound,
    MissingService,
    MissingCharacteristic,
    /// Links up, then discovery never completes
    Hang,
}

struct SimState {
    link: Option<(LinkId, mpsc::UnboundedSender<LinkEvent>)>,
    /// Reply to QUERY_STATUS with `status_frame`
    auto_respond: bool,
    status_frame: Vec<u8>,
    #[cfg(test)]
    open_behavior: OpenBehavior,
    #[cfg(test)]
    writes: Vec<Vec<u8>>,
}

#[derive(Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatorHandle {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                link: None,
                auto_respond: true,
                status_frame: vec![protocol::STATUS_TAG, 0x00, 45, 85],
                #[cfg(test)]
                open_behavior: OpenBehavior::Succeed,
                #[cfg(test)]
                writes: Vec::new(),
            })),
        }
    }
}

impl SimulatorHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        // Ignore poisoning
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
impl SimulatorHandle {
    pub fn set_open_behavior(&self, behavior: OpenBehavior) {
        self.lock().open_behavior = behavior;
    }

    pub fn set_auto_respond(&self, enabled: bool) {
        self.lock().auto_respond = enabled;
    }

    pub fn set_status_frame(&self, frame: Vec<u8>) {
        self.lock().status_frame = frame;
    }

    /// Everything written so far, oldest first
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn is_linked(&self) -> bool {
        self.lock().link.is_some()
    }

    /// Deliver a notification on the open link. Returns false when no
    /// link is open.
    pub fn notify(&self, data: &[u8]) -> bool {
        let state = self.lock();
        match &state.link {
            Some((link, tx)) => tx
                .send(LinkEvent::Notification {
                    link: *link,
                    data: data.to_vec(),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Simulate the printer going out of range
    pub fn drop_link(&self) -> bool {
        let mut state = self.lock();
        match state.link.take() {
            Some((link, tx)) => tx.send(LinkEvent::Dropped { link }).is_ok(),
            None => false,
        }
    }
}

pub struct SimulatedTransport {
    handle: SimulatorHandle,
    advertised_name: String,
}

impl SimulatedTransport {
    pub fn new(handle: SimulatorHandle) -> Self {
        Self {
            handle,
            advertised_name: protocol::DEVICE_NAME.to_string(),
        }
    }

    #[cfg(test)]
    async fn scripted_open(
        &self,
        target: &LinkTarget,
        link: LinkId,
        events: &mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<(), GatewayError> {
        let behavior = self.handle.lock().open_behavior;
        debug!("Scripted open ({:?}) for {:?}", behavior, target.device_name);

        match behavior {
            OpenBehavior::Succeed => Ok(()),
            OpenBehavior::Hang => {
                // Half-open, the way a real stack is mid-discovery
                self.handle.lock().link = Some((link, events.clone()));
                std::future::pending().await
            }
            OpenBehavior::NotFound => Err(GatewayError::DeviceNotFound(target.device_name.clone())),
            OpenBehavior::MissingService => {
                Err(GatewayError::ServiceNotFound(target.service_uuid.clone()))
            }
            OpenBehavior::MissingCharacteristic => Err(GatewayError::CharacteristicNotFound(
                target.characteristic_uuid.clone(),
            )),
        }
    }
}

#[async_trait]
impl BleTransport for SimulatedTransport {
    async fn open(
        &mut self,
        target: &LinkTarget,
        link: LinkId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<DeviceInfo, GatewayError> {
        #[cfg(test)]
        self.scripted_open(target, link, &events).await?;

        if target.device_name != self.advertised_name {
            return Err(GatewayError::DeviceNotFound(target.device_name.clone()));
        }

        self.handle.lock().link = Some((link, events));
        info!("Simulated printer linked (link {})", link);

        Ok(DeviceInfo {
            name: self.advertised_name.clone(),
            id: format!("sim-{}", link),
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), GatewayError> {
        let mut state = self.handle.lock();
        let (link, tx) = state.link.clone().ok_or(GatewayError::NotConnected)?;
        #[cfg(test)]
        state.writes.push(data.to_vec());

        if state.auto_respond && data == PrinterCommand::QueryStatus.as_bytes() {
            let _ = tx.send(LinkEvent::Notification {
                link,
                data: state.status_frame.clone(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.handle.lock().link.take().is_some() {
            debug!("Simulated link closed");
        }
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}
