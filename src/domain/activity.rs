//! Activity Log
//!
//! Append-only history of received frames and sent commands, with the
//! running counters the statistics panel is derived from.

use crate::domain::models::{ReceivedFrame, SentCommandRecord, StatusRecord};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::storage::{ExportDocument, SaveBatch};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Frames shown in the data panel
pub const RECENT_FRAMES: usize = 20;
/// Commands shown in the command panel
pub const RECENT_COMMANDS: usize = 10;

/// Snapshot of the counters, derived from the log on demand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub frames_received: usize,
    pub total_bytes_received: usize,
    pub error_count: u64,
    pub success_count: u64,
    /// Whole percent
    pub success_rate: u32,
    pub uptime: Duration,
}

impl Statistics {
    pub fn uptime_minutes(&self) -> u64 {
        self.uptime.as_secs() / 60
    }
}

pub struct ActivityLog {
    received: Vec<ReceivedFrame>,
    sent: Vec<SentCommandRecord>,
    total_bytes: usize,
    error_count: u64,
    success_count: u64,
    started_at: Instant,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            received: Vec::new(),
            sent: Vec::new(),
            total_bytes: 0,
            error_count: 0,
            success_count: 0,
            started_at: Instant::now(),
        }
    }

    /// Append an inbound frame; returns its status if it is a status frame
    pub fn record_received(&mut self, frame: ReceivedFrame) -> Option<StatusRecord> {
        let status = protocol::decode_status(&frame.raw_bytes);
        self.total_bytes += frame.bytes;
        self.success_count += 1;
        self.received.push(frame);
        status
    }

    /// Append a record for a command that was written successfully
    pub fn record_sent_command(&mut self, command_name: &str, bytes: &[u8]) {
        self.sent.push(SentCommandRecord::new(command_name, bytes));
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Drop received frames and the byte total. Success / error counters
    /// and the session start time are kept.
    pub fn clear(&mut self) {
        self.received.clear();
        self.total_bytes = 0;
    }

    pub fn statistics(&self) -> Statistics {
        let total = self.success_count + self.error_count;
        let success_rate = if total == 0 {
            100
        } else {
            ((self.success_count as f64 / total as f64) * 100.0).round() as u32
        };

        Statistics {
            frames_received: self.received.len(),
            total_bytes_received: self.total_bytes,
            error_count: self.error_count,
            success_count: self.success_count,
            success_rate,
            uptime: self.started_at.elapsed(),
        }
    }

    pub fn received(&self) -> &[ReceivedFrame] {
        &self.received
    }

    pub fn sent(&self) -> &[SentCommandRecord] {
        &self.sent
    }

    pub fn recent_frames(&self) -> &[ReceivedFrame] {
        tail(&self.received, RECENT_FRAMES)
    }

    pub fn recent_commands(&self) -> &[SentCommandRecord] {
        tail(&self.sent, RECENT_COMMANDS)
    }

    pub fn export_document(&self, device: &str, now: DateTime<Local>) -> ExportDocument {
        ExportDocument {
            export_time: now,
            device: device.to_string(),
            total_packets: self.received.len(),
            total_bytes: self.total_bytes,
            data: self.received.clone(),
        }
    }

    pub fn save_batch(&self, device: &str, now: DateTime<Local>) -> SaveBatch {
        SaveBatch {
            timestamp: now,
            device: device.to_string(),
            data: self.received.clone(),
        }
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::PrinterCommand;

    fn frame(bytes: &[u8]) -> ReceivedFrame {
        ReceivedFrame::new(bytes.to_vec())
    }

    #[test]
    fn test_success_rate_starts_at_100() {
        let log = ActivityLog::new();
        let stats = log.statistics();
        assert_eq!(stats.success_rate, 100);
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.total_bytes_received, 0);
    }

    #[test]
    fn test_success_rate_mixed() {
        let mut log = ActivityLog::new();
        for _ in 0..3 {
            log.record_received(frame(b"ok"));
        }
        log.record_error();

        let stats = log.statistics();
        assert_eq!(stats.success_count, 3);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.success_rate, 75);
    }

    #[test]
    fn test_received_log_is_append_only() {
        let mut log = ActivityLog::new();
        let payloads: Vec<Vec<u8>> = (0u8..5).map(|i| vec![i, i]).collect();
        for p in &payloads {
            log.record_received(frame(p));
        }

        assert_eq!(log.received().len(), 5);
        for (stored, expected) in log.received().iter().zip(&payloads) {
            assert_eq!(&stored.raw_bytes, expected);
        }
        assert_eq!(log.statistics().total_bytes_received, 10);
    }

    #[test]
    fn test_record_received_returns_status() {
        let mut log = ActivityLog::new();
        assert_eq!(log.record_received(frame(b"hello")), None);

        let status = log.record_received(frame(&[0x10, 0x00, 45, 85])).unwrap();
        assert!(status.paper_ok);
        assert_eq!(status.head_temperature_c, 45);
        assert_eq!(status.battery_percent, 85);
    }

    #[test]
    fn test_errors_do_not_touch_logs() {
        let mut log = ActivityLog::new();
        log.record_error();
        log.record_error();
        assert!(log.received().is_empty());
        assert!(log.sent().is_empty());
        assert_eq!(log.statistics().error_count, 2);
        assert_eq!(log.statistics().success_rate, 0);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut log = ActivityLog::new();
        log.record_received(frame(&[1, 2, 3]));
        log.record_received(frame(&[4]));
        log.record_error();
        let before = log.statistics();

        log.clear();

        let after = log.statistics();
        assert_eq!(after.frames_received, 0);
        assert_eq!(after.total_bytes_received, 0);
        assert_eq!(after.success_count, before.success_count);
        assert_eq!(after.error_count, before.error_count);
        assert_eq!(after.success_rate, before.success_rate);
    }

    #[test]
    fn test_recent_windows() {
        let mut log = ActivityLog::new();
        for i in 0..25u8 {
            log.record_received(frame(&[i]));
        }
        for _ in 0..12 {
            let cmd = PrinterCommand::FeedPaper;
            log.record_sent_command(cmd.name(), cmd.as_bytes());
        }

        let recent = log.recent_frames();
        assert_eq!(recent.len(), RECENT_FRAMES);
        assert_eq!(recent[0].raw_bytes, vec![5]);
        assert_eq!(recent[RECENT_FRAMES - 1].raw_bytes, vec![24]);
        assert_eq!(log.recent_commands().len(), RECENT_COMMANDS);
        assert_eq!(log.sent().len(), 12);
    }

    #[test]
    fn test_export_document() {
        let mut log = ActivityLog::new();
        log.record_received(frame(&[0x10, 0x00, 40]));
        log.record_received(frame(b"abc"));

        let doc = log.export_document("Mini-Printer", Local::now());
        assert_eq!(doc.device, "Mini-Printer");
        assert_eq!(doc.total_packets, 2);
        assert_eq!(doc.total_bytes, 6);
        assert_eq!(doc.data.len(), 2);
    }
}
