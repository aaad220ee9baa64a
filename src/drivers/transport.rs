use std::io::{Read, Write};
use std::time::Duration;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use crate::drivers::SyncError;
/// Full-duplex byte channel to the device console.
///
/// Reads never block waiting for data: `read_available` appends whatever is
/// already pending and returns how many bytes that was (possibly zero).
pub trait Transport {
    fn bytes_available(&mut self) -> Result<usize, SyncError>;
    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, SyncError>;
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SyncError>;
    /// Drops any unread input so it cannot leak into the next response.
    fn clear_input(&mut self) -> Result<(), SyncError>;
    fn close(&mut self);
}
fn closed_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "serial port already closed")
}
/// `serialport`-backed transport (8N1, no flow control).
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}
impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, SyncError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|source| SyncError::Open {
                port: port_name.to_string(),
                baud: baud_rate,
                source,
            })?;
        log::info!("🔌 Opened {port_name} at {baud_rate} baud");
        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
        })
    }
    fn port(&mut self, op: &'static str) -> Result<&mut Box<dyn SerialPort>, SyncError> {
        self.port
            .as_mut()
            .ok_or_else(|| SyncError::transport(op, closed_error()))
    }
}
impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> Result<usize, SyncError> {
        let port = self.port("bytes_to_read")?;
        let n = port
            .bytes_to_read()
            .map_err(|e| SyncError::transport("bytes_to_read", e.into()))?;
        Ok(n as usize)
    }
    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, SyncError> {
        let pending = self.bytes_available()?;
        if pending == 0 {
            return Ok(0);
        }
        let port = self.port("read")?;
        let mut chunk = vec![0u8; pending];
        match port.read(&mut chunk) {
            Ok(n) => {
                out.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(SyncError::transport("read", e)),
        }
    }
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SyncError> {
        let port = self.port("write")?;
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| SyncError::transport("write", e))
    }
    fn clear_input(&mut self) -> Result<(), SyncError> {
        let port = self.port("clear")?;
        port.clear(ClearBuffer::Input)
            .map_err(|e| SyncError::transport("clear", e.into()))
    }
    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("🔌 Serial port {} closed", self.port_name);
        }
    }
}
#[cfg(test)]
pub use manual::ManualTransport;
