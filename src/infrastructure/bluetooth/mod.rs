//! Bluetooth Module
//!
//! Provides BLE communication with the Mini-Printer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │   (worker thread - runs UI commands against the gateway) │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionGateway                      │
//! │   (state machine, send, notification -> frame events)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  BleTransport
//!         ┌─────────────┼─────────────┐
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌───────────┐
//! │   WinRT   │  │  btleplug  │  │ Simulated │
//! │ (Windows) │  │ (feature)  │  │           │
//! └───────────┘  └────────────┘  └───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs, command table and status frame decoding
//! - [`transport`] - Backend trait, link events and gateway errors
//! - [`gateway`] - Connection state machine
//! - [`service`] - Worker thread wiring the UI to the gateway
//! - [`simulated`] - In-process printer

#[cfg(feature = "btleplug")]
pub mod btle;
pub mod gateway;
pub mod protocol;
pub mod service;
pub mod simulated;
pub mod transport;
#[cfg(windows)]
pub mod winrt;

// Re-export main service for convenience
pub use service::BluetoothService;
