//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Read up to `buf.len()` bytes, waiting at most the port's read timeout
    ///
    /// `Ok(0)` means no data arrived in time. Any `Err` other than
    /// `TimedOut`, `WouldBlock` or `Interrupted` means the device is gone.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Whether a read error only means "no data yet"
pub fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Adapter giving any async byte stream bounded-timeout read semantics
///
/// Used with `tokio_serial::SerialStream` in production.
pub struct StreamPort<S> {
    stream: S,
    read_timeout: Duration,
}

/// Serial port backed by tokio-serial
pub type TokioSerialPort = StreamPort<tokio_serial::SerialStream>;

impl<S> StreamPort<S> {
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self { stream, read_timeout }
    }
}

#[async_trait]
impl<S> SerialPortIO for StreamPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match tokio::time::timeout(self.read_timeout, self.stream.read(buf)).await {
            // Timed out with nothing to read
            Err(_elapsed) => Ok(0),
            // A serial stream only reports EOF once the device has hung up
            Ok(Ok(0)) if !buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial device closed",
            )),
            Ok(result) => result,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Delay before an exhausted read script reports "no data"
    pub const IDLE_READ_DELAY: Duration = Duration::from_millis(10);

    /// Mock serial port for testing
    ///
    /// Reads are served from a script; once it runs out each read waits
    /// `IDLE_READ_DELAY` and returns `Ok(0)`.
    #[derive(Clone)]
    pub struct MockSerialPort {
        pub read_script: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub write_failures_left: Arc<Mutex<u32>>,
        pub flush_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                read_script: Arc::new(Mutex::new(VecDeque::new())),
                written_data: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
                write_failures_left: Arc::new(Mutex::new(u32::MAX)),
                flush_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn push_read(&self, data: &[u8]) {
            self.read_script.lock().unwrap().push_back(Ok(data.to_vec()));
        }

        pub fn push_read_error(&self, error: io::ErrorKind) {
            self.read_script
                .lock()
                .unwrap()
                .push_back(Err(io::Error::new(error, "Mock read error")));
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        /// Fail only the next `count` writes with `error`
        pub fn fail_next_writes(&self, error: io::ErrorKind, count: u32) {
            *self.write_error.lock().unwrap() = Some(error);
            *self.write_failures_left.lock().unwrap() = count;
        }

        pub fn set_flush_error(&self, error: io::ErrorKind) {
            *self.flush_error.lock().unwrap() = Some(error);
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let next = self.read_script.lock().unwrap().pop_front();
            match next {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => {
                    tokio::time::sleep(IDLE_READ_DELAY).await;
                    Ok(0)
                }
            }
        }

        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            let error = *self.write_error.lock().unwrap();
            if let Some(error) = error {
                let mut left = self.write_failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(io::Error::new(error, "Mock write error"));
                }
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            if let Some(error) = *self.flush_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock flush error"));
            }
            Ok(())
        }
    }
}
