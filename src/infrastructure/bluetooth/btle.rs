//! btleplug BLE backend
//!
//! Cross-platform backend (BlueZ, CoreBluetooth, WinRT). Notifications and
//! disconnect events are forwarded by two tasks that live as long as the
//! link. Each step of `open` is recorded as it completes, so `close` also
//! releases a link whose open failed, timed out or was cancelled.

use crate::domain::models::DeviceInfo;
use crate::infrastructure::bluetooth::transport::{
    parse_uuid, BleTransport, GatewayError, LinkEvent, LinkId, LinkTarget,
};
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn link_err(e: btleplug::Error) -> GatewayError {
    GatewayError::Link(e.to_string())
}

/// Whatever part of a link has been set up so far; `close` tears down
/// exactly this much
struct OpenLink {
    peripheral: Peripheral,
    characteristic: Option<Characteristic>,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Default)]
pub struct BtleplugTransport {
    /// Adapter with a scan in progress
    scanning: Option<Adapter>,
    link: Option<OpenLink>,
}

impl BtleplugTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn adapter() -> Result<Adapter, GatewayError> {
        let manager = Manager::new().await.map_err(link_err)?;
        manager
            .adapters()
            .await
            .map_err(link_err)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Link("No Bluetooth adapter found".to_string()))
    }

    async fn has_name(peripheral: &Peripheral, name: &str) -> bool {
        matches!(
            peripheral.properties().await,
            Ok(Some(props)) if props.local_name.as_deref() == Some(name)
        )
    }

    async fn stop_scan(&mut self) {
        if let Some(adapter) = self.scanning.take() {
            if let Err(e) = adapter.stop_scan().await {
                debug!("Stop scan failed: {}", e);
            }
        }
    }

    /// Scan until a peripheral advertising `name` shows up
    async fn discover(
        &mut self,
        adapter: &Adapter,
        name: &str,
    ) -> Result<Peripheral, GatewayError> {
        let mut events = adapter.events().await.map_err(link_err)?;
        self.scanning = Some(adapter.clone());
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(link_err)?;
        info!("Scanning for {:?}", name);

        let found = Self::find_peripheral(adapter, &mut events, name).await;
        self.stop_scan().await;
        found
    }

    async fn find_peripheral(
        adapter: &Adapter,
        events: &mut (impl futures::Stream<Item = CentralEvent> + Unpin),
        name: &str,
    ) -> Result<Peripheral, GatewayError> {
        // Already cached by the stack from an earlier scan
        for peripheral in adapter.peripherals().await.map_err(link_err)? {
            if Self::has_name(&peripheral, name).await {
                return Ok(peripheral);
            }
        }

        while let Some(event) = events.next().await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };
            let Ok(peripheral) = adapter.peripheral(&id).await else {
                continue;
            };
            if Self::has_name(&peripheral, name).await {
                return Ok(peripheral);
            }
        }

        Err(GatewayError::DeviceNotFound(name.to_string()))
    }

    fn track_task(&mut self, task: JoinHandle<()>) {
        match self.link.as_mut() {
            Some(link) => link.tasks.push(task),
            None => task.abort(),
        }
    }
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    async fn open(
        &mut self,
        target: &LinkTarget,
        link: LinkId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<DeviceInfo, GatewayError> {
        let service_uuid = parse_uuid(&target.service_uuid)?;
        let char_uuid = parse_uuid(&target.characteristic_uuid)?;

        let adapter = Self::adapter().await?;
        let peripheral = self.discover(&adapter, &target.device_name).await?;

        // Recorded before connecting so an interrupted open is still closed
        self.link = Some(OpenLink {
            peripheral: peripheral.clone(),
            characteristic: None,
            tasks: Vec::new(),
        });

        peripheral.connect().await.map_err(link_err)?;
        peripheral.discover_services().await.map_err(link_err)?;

        if !peripheral.services().iter().any(|s| s.uuid == service_uuid) {
            return Err(GatewayError::ServiceNotFound(target.service_uuid.clone()));
        }
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == char_uuid && c.service_uuid == service_uuid)
            .ok_or_else(|| {
                GatewayError::CharacteristicNotFound(target.characteristic_uuid.clone())
            })?;

        if let Some(open) = self.link.as_mut() {
            open.characteristic = Some(characteristic.clone());
        }
        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| GatewayError::Subscribe(e.to_string()))?;

        let mut notifications = peripheral.notifications().await.map_err(link_err)?;
        let sender = events.clone();
        self.track_task(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != char_uuid {
                    continue;
                }
                let event = LinkEvent::Notification {
                    link,
                    data: notification.value,
                };
                if sender.send(event).is_err() {
                    break;
                }
            }
        }));

        let mut central_events = adapter.events().await.map_err(link_err)?;
        let peripheral_id = peripheral.id();
        self.track_task(tokio::spawn(async move {
            while let Some(event) = central_events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id == peripheral_id {
                        let _ = events.send(LinkEvent::Dropped { link });
                        break;
                    }
                }
            }
        }));

        let name = match peripheral.properties().await {
            Ok(Some(props)) => props.local_name.unwrap_or_else(|| target.device_name.clone()),
            _ => target.device_name.clone(),
        };

        Ok(DeviceInfo {
            name,
            id: peripheral.id().to_string(),
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), GatewayError> {
        let link = self.link.as_ref().ok_or(GatewayError::NotConnected)?;
        let characteristic = link
            .characteristic
            .as_ref()
            .ok_or(GatewayError::NotConnected)?;
        let write_type = if characteristic
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        link.peripheral
            .write(characteristic, data, write_type)
            .await
            .map_err(|e| GatewayError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        self.stop_scan().await;
        let Some(link) = self.link.take() else {
            return;
        };

        for task in &link.tasks {
            task.abort();
        }
        if let Some(characteristic) = &link.characteristic {
            if let Err(e) = link.peripheral.unsubscribe(characteristic).await {
                debug!("Unsubscribe failed: {}", e);
            }
        }
        if let Err(e) = link.peripheral.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        info!("Disconnected from device");
    }

    fn backend_name(&self) -> &'static str {
        "btleplug"
    }
}
