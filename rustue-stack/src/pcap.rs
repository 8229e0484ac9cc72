//! Packet capture sinks
//!
//! Capture is an opaque pass-through collaborator: layers hand PDUs to a
//! sink and never learn what happens to them. Sinks are owned by the layer
//! that writes to them and are only touched on the consumer thread.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

/// Where a layer hands off PDUs selected for capture.
pub trait PcapSink: Send {
    /// Records one PDU.
    fn write_pdu(&mut self, data: &[u8]);

    /// Flushes and closes the sink. Called once during teardown.
    fn close(&mut self);
}

/// File-backed sink writing length-delimited PDU records
/// (u32 big-endian length followed by the raw bytes).
pub struct FileSink {
    path: String,
    writer: Option<BufWriter<File>>,
    pdus: u64,
}

impl FileSink {
    /// Creates the capture file; failure here is an init-time hard error.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().display().to_string(),
            writer: Some(BufWriter::new(file)),
            pdus: 0,
        })
    }
}

impl PcapSink for FileSink {
    fn write_pdu(&mut self, data: &[u8]) {
        if let Some(writer) = self.writer.as_mut() {
            let len = data.len() as u32;
            if writer
                .write_all(&len.to_be_bytes())
                .and_then(|()| writer.write_all(data))
                .is_err()
            {
                warn!(path = %self.path, "capture write failed, disabling sink");
                self.writer = None;
                return;
            }
            self.pdus += 1;
        }
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
            info!(path = %self.path, pdus = self.pdus, "capture closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mac.cap");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_pdu(&[0xAA, 0xBB]);
        sink.write_pdu(&[0x01]);
        sink.close();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(
            contents,
            vec![0, 0, 0, 2, 0xAA, 0xBB, 0, 0, 0, 1, 0x01]
        );
    }

    #[test]
    fn test_create_fails_for_bad_path() {
        assert!(FileSink::create("/nonexistent-dir/x/y.cap").is_err());
    }

    #[test]
    fn test_write_after_close_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nas.cap");

        let mut sink = FileSink::create(&path).unwrap();
        sink.close();
        sink.write_pdu(&[0xFF]);

        assert!(std::fs::read(&path).unwrap().is_empty());
    }
}
