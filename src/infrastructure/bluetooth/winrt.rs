//! WinRT BLE backend
//!
//! Discovers the printer with an advertisement watcher, then resolves the
//! GATT service and characteristic and subscribes to value changes. The
//! watcher and every registration are recorded as they are made, so
//! `close` also undoes an open that failed, timed out or was cancelled.

use crate::domain::models::DeviceInfo;
use crate::infrastructure::bluetooth::transport::{
    parse_uuid, BleTransport, GatewayError, LinkEvent, LinkId, LinkTarget,
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattValueChangedEventArgs, GattWriteOption,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter, IBuffer};

fn link_err(e: windows::core::Error) -> GatewayError {
    GatewayError::Link(e.to_string())
}

fn guid(uuid_str: &str) -> Result<GUID, GatewayError> {
    Ok(GUID::from_u128(parse_uuid(uuid_str)?.as_u128()))
}

fn read_buffer(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let length = reader.UnconsumedBufferLength()? as usize;
    let mut bytes = vec![0u8; length];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}

struct Scan {
    watcher: BluetoothLEAdvertisementWatcher,
    token: i64,
}

/// Whatever part of a link has been set up so far
struct OpenLink {
    device: BluetoothLEDevice,
    characteristic: Option<GattCharacteristic>,
    value_token: Option<i64>,
    /// CCCD write was issued
    notifying: bool,
    status_token: Option<i64>,
}

#[derive(Default)]
pub struct WinRtTransport {
    scan: Option<Scan>,
    link: Option<OpenLink>,
}

impl WinRtTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn stop_scan(&mut self) {
        if let Some(scan) = self.scan.take() {
            let _ = scan.watcher.Stop();
            let _ = scan.watcher.RemoveReceived(scan.token);
        }
    }

    /// Watch advertisements until one carries the wanted local name
    async fn discover(&mut self, name: &str) -> Result<u64, GatewayError> {
        info!("Starting BLE scan for {:?}", name);
        let watcher = BluetoothLEAdvertisementWatcher::new().map_err(link_err)?;
        watcher
            .SetScanningMode(BluetoothLEScanningMode::Active)
            .map_err(link_err)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let wanted = name.to_string();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let local_name = args.Advertisement()?.LocalName()?.to_string();
                    if local_name == wanted {
                        let _ = tx.send(args.BluetoothAddress()?);
                    }
                }
                Ok(())
            },
        );

        let token = watcher.Received(&handler).map_err(link_err)?;
        self.scan = Some(Scan {
            watcher: watcher.clone(),
            token,
        });
        watcher.Start().map_err(link_err)?;

        let found = rx.recv().await;
        self.stop_scan();

        found.ok_or_else(|| GatewayError::DeviceNotFound(name.to_string()))
    }

    fn partial(&mut self) -> Option<&mut OpenLink> {
        self.link.as_mut()
    }

    async fn find_characteristic(
        device: &BluetoothLEDevice,
        target: &LinkTarget,
    ) -> Result<GattCharacteristic, GatewayError> {
        let service_guid = guid(&target.service_uuid)?;
        let char_guid = guid(&target.characteristic_uuid)?;

        let services_result = device
            .GetGattServicesForUuidAsync(service_guid)
            .map_err(link_err)?
            .await
            .map_err(link_err)?;
        if services_result.Status().map_err(link_err)? != GattCommunicationStatus::Success {
            return Err(GatewayError::ServiceNotFound(target.service_uuid.clone()));
        }
        let services = services_result.Services().map_err(link_err)?;
        if services.Size().map_err(link_err)? == 0 {
            return Err(GatewayError::ServiceNotFound(target.service_uuid.clone()));
        }
        let service = services.GetAt(0).map_err(link_err)?;
        debug!("Found printer service");

        let chars_result = service
            .GetCharacteristicsForUuidAsync(char_guid)
            .map_err(link_err)?
            .await
            .map_err(link_err)?;
        if chars_result.Status().map_err(link_err)? != GattCommunicationStatus::Success {
            return Err(GatewayError::CharacteristicNotFound(
                target.characteristic_uuid.clone(),
            ));
        }
        let characteristics = chars_result.Characteristics().map_err(link_err)?;
        if characteristics.Size().map_err(link_err)? == 0 {
            return Err(GatewayError::CharacteristicNotFound(
                target.characteristic_uuid.clone(),
            ));
        }
        characteristics.GetAt(0).map_err(link_err)
    }

    async fn enable_notifications(characteristic: &GattCharacteristic) -> Result<(), GatewayError> {
        let status = characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )
            .map_err(|e| GatewayError::Subscribe(e.to_string()))?
            .await
            .map_err(|e| GatewayError::Subscribe(e.to_string()))?;

        if status != GattCommunicationStatus::Success {
            return Err(GatewayError::Subscribe(format!("{:?}", status)));
        }
        Ok(())
    }
}

#[async_trait]
impl BleTransport for WinRtTransport {
    async fn open(
        &mut self,
        target: &LinkTarget,
        link: LinkId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<DeviceInfo, GatewayError> {
        let address = self.discover(&target.device_name).await?;
        info!("Connecting to Bluetooth device: {:#X}", address);

        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)
            .map_err(link_err)?
            .await
            .map_err(link_err)?;
        self.link = Some(OpenLink {
            device: device.clone(),
            characteristic: None,
            value_token: None,
            notifying: false,
            status_token: None,
        });

        let characteristic = Self::find_characteristic(&device, target).await?;
        if let Some(open) = self.partial() {
            open.characteristic = Some(characteristic.clone());
        }

        let sender = events.clone();
        let value_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let data = read_buffer(&args.CharacteristicValue()?)?;
                    let _ = sender.send(LinkEvent::Notification { link, data });
                }
                Ok(())
            },
        );
        let value_token = characteristic
            .ValueChanged(&value_handler)
            .map_err(link_err)?;
        if let Some(open) = self.partial() {
            open.value_token = Some(value_token);
            open.notifying = true;
        }

        Self::enable_notifications(&characteristic).await?;

        let sender = events;
        let status_handler =
            TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    if dev.ConnectionStatus()? == BluetoothConnectionStatus::Disconnected {
                        let _ = sender.send(LinkEvent::Dropped { link });
                    }
                }
                Ok(())
            });
        let status_token = device
            .ConnectionStatusChanged(&status_handler)
            .map_err(link_err)?;
        if let Some(open) = self.partial() {
            open.status_token = Some(status_token);
        }

        let name = device
            .Name()
            .map(|n| n.to_string())
            .unwrap_or_default();
        let name = if name.is_empty() {
            target.device_name.clone()
        } else {
            name
        };

        Ok(DeviceInfo {
            name,
            id: format!("{:012X}", address),
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), GatewayError> {
        let characteristic = self
            .link
            .as_ref()
            .and_then(|link| link.characteristic.as_ref())
            .ok_or(GatewayError::NotConnected)?;
        let write_err = |e: windows::core::Error| GatewayError::Write(e.to_string());

        let writer = DataWriter::new().map_err(write_err)?;
        writer.WriteBytes(data).map_err(write_err)?;
        let buffer = writer.DetachBuffer().map_err(write_err)?;

        let status = characteristic
            .WriteValueWithOptionAsync(&buffer, GattWriteOption::WriteWithoutResponse)
            .map_err(write_err)?
            .await
            .map_err(write_err)?;
        if status != GattCommunicationStatus::Success {
            return Err(GatewayError::Write(format!("{:?}", status)));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.stop_scan();
        let Some(link) = self.link.take() else {
            return;
        };

        if let Some(token) = link.status_token {
            let _ = link.device.RemoveConnectionStatusChanged(token);
        }
        if let Some(characteristic) = &link.characteristic {
            if let Some(token) = link.value_token {
                let _ = characteristic.RemoveValueChanged(token);
            }
            if link.notifying {
                if let Ok(op) = characteristic.WriteClientCharacteristicConfigurationDescriptorAsync(
                    GattClientCharacteristicConfigurationDescriptorValue::None,
                ) {
                    if let Err(e) = op.await {
                        warn!("Failed to disable notifications: {}", e);
                    }
                }
            }
        }
        let _ = link.device.Close();
        info!("Disconnected from device");
    }

    fn backend_name(&self) -> &'static str {
        "winrt"
    }
}
