use std::thread;
use std::time::{Duration, Instant};
use crate::drivers::{SyncError, Transport};
use crate::types::{Command, ResponseBuffer};
/// Exclusive owner of one open transport.
///
/// `send` takes `&mut self`, so there is never more than one command in
/// flight. The transport is closed by `close` or, failing that, on drop.
pub struct Session<T: Transport> {
    transport: T,
    poll_interval: Duration,
    closed: bool,
}
impl<T: Transport> Session<T> {
    pub fn new(transport: T, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
            closed: false,
        }
    }
    /// Sends one command and accumulates the reply until its terminator
    /// appears or the deadline passes. A timeout is not an error: the
    /// partial buffer comes back with `timed_out` set.
    pub fn send(&mut self, command: &Command) -> Result<ResponseBuffer, SyncError> {
        self.transport.clear_input()?;
        log::info!("📤 Sending command: {}", command.text);
        self.transport.write_all(&command.wire_bytes())?;
        let started = Instant::now();
        let deadline = started.checked_add(command.deadline);
        let mut response = ResponseBuffer::default();
        loop {
            if self.transport.bytes_available()? > 0 {
                self.transport.read_available(&mut response.bytes)?;
                if command.terminator.is_satisfied_by(&response.bytes) {
                    log::debug!(
                        "reply to `{}` complete ({} bytes)",
                        command.text,
                        response.len()
                    );
                    return Ok(response);
                }
            }
            let expired = match deadline {
                Some(deadline) => Instant::now() >= deadline,
                None => started.elapsed() >= command.deadline,
            };
            if expired {
                break;
            }
            thread::sleep(self.poll_interval);
        }
        response.timed_out = true;
        log::warn!(
            "⏱️ `{}` timed out after {:?} with {} bytes buffered",
            command.text,
            command.deadline,
            response.len()
        );
        Ok(response)
    }
    pub fn close(mut self) {
        self.shutdown();
    }
    fn shutdown(&mut self) {
        if !self.closed {
            self.transport.close();
            self.closed = true;
        }
    }
}
impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
