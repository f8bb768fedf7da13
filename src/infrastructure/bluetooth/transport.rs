//! BLE Transport abstraction
//!
//! The gateway never talks to a Bluetooth stack directly. Each backend
//! implements [`BleTransport`] and reports inbound data and link loss as
//! [`LinkEvent`]s on a channel handed to it at `open` time.

use crate::domain::models::DeviceInfo;
use crate::infrastructure::bluetooth::protocol::UnknownCommand;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies one opened link; events from older links are stale
pub type LinkId = u64;

/// What to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Exact advertised name to match during discovery
    pub device_name: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Value-changed notification on the subscribed characteristic
    Notification { link: LinkId, data: Vec<u8> },
    /// Peripheral-initiated or stack-reported link loss
    Dropped { link: LinkId },
}

impl LinkEvent {
    pub fn link(&self) -> LinkId {
        match self {
            Self::Notification { link, .. } | Self::Dropped { link } => *link,
        }
    }
}

/// Errors at the gateway / transport boundary
///
/// Link-level variants are only raised by the native backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[cfg_attr(not(any(windows, feature = "btleplug")), allow(dead_code))]
    #[error("Link error: {0}")]
    Link(String),

    #[cfg_attr(not(any(windows, feature = "btleplug")), allow(dead_code))]
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[cfg_attr(not(any(windows, feature = "btleplug")), allow(dead_code))]
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    #[cfg_attr(not(any(windows, feature = "btleplug")), allow(dead_code))]
    #[error("Failed to enable notifications: {0}")]
    Subscribe(String),

    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection attempt cancelled")]
    Cancelled,

    #[error("Connection already in progress or established")]
    Busy,

    #[error("Not connected to device")]
    NotConnected,

    #[cfg_attr(not(any(windows, feature = "btleplug")), allow(dead_code))]
    #[error("Write failed: {0}")]
    Write(String),

    #[error(transparent)]
    UnknownCommand(#[from] UnknownCommand),

    #[cfg_attr(not(any(windows, feature = "btleplug")), allow(dead_code))]
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),
}

impl GatewayError {
    pub fn is_connection_failure(&self) -> bool {
        !self.is_send_failure()
    }

    pub fn is_send_failure(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Write(_) | Self::UnknownCommand(_)
        )
    }

    /// Short tag for logs
    pub fn kind(&self) -> &'static str {
        if self.is_connection_failure() {
            "connection"
        } else {
            "send"
        }
    }
}

#[async_trait]
pub trait BleTransport: Send {
    /// Discover the device, open the link, resolve the service and
    /// characteristic and subscribe to notifications. Events for this
    /// link must be tagged with `link`.
    async fn open(
        &mut self,
        target: &LinkTarget,
        link: LinkId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<DeviceInfo, GatewayError>;

    /// Write to the subscribed characteristic without waiting for a
    /// response
    async fn write(&mut self, data: &[u8]) -> Result<(), GatewayError>;

    /// Unsubscribe and release the link. Must be safe to call when
    /// nothing is open.
    async fn close(&mut self);

    fn backend_name(&self) -> &'static str;
}

/// Parse a textual UUID as used in settings
#[cfg(any(windows, feature = "btleplug", test))]
pub fn parse_uuid(uuid_str: &str) -> Result<uuid::Uuid, GatewayError> {
    uuid::Uuid::parse_str(uuid_str.trim())
        .map_err(|_| GatewayError::InvalidUuid(uuid_str.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid(protocol::SERVICE_UUID).unwrap();
        assert_eq!(uuid.as_u128() >> 96, 0x4fafc201);
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_error_classification() {
        assert!(GatewayError::NotConnected.is_send_failure());
        assert!(GatewayError::Write("gatt".into()).is_send_failure());
        assert!(GatewayError::DeviceNotFound("Printer".into()).is_connection_failure());
        assert!(GatewayError::Timeout(Duration::from_secs(30)).is_connection_failure());
        assert_eq!(GatewayError::Cancelled.kind(), "connection");
        assert_eq!(
            GatewayError::from(UnknownCommand("JAM".into())).kind(),
            "send"
        );
    }
}
