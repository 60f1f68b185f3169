//! Byte sources feeding the capture loop.
//!
//! A source hands out whatever bytes arrived since the last call, blocking at most for
//! its read timeout. Chunk boundaries carry no meaning; a chunk may end halfway through
//! a marker.
//!
//! ## Serial configuration
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! read_timeout_ms = 1000
//! open_delay_ms = 500
//! ```
//!
//! ESP32 dev boards wire DTR/RTS to EN/IO0 through the auto-reset circuit. Both lines
//! are held low after opening so the camera keeps running instead of dropping into
//! the bootloader.
use std::io::{self, Read};

/// Supplier of raw bytes.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. `Ok(0)` means nothing arrived before the timeout.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Human readable name for logs and errors.
    fn describe(&self) -> String;

    /// True once the source can never produce more bytes (end of a recorded file).
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Errors that only mean "no data this time".
pub fn is_quiet_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Any `Read` as a source; used for replaying recorded streams and in tests.
pub struct ReaderSource<R> {
    name: String,
    inner: R,
    exhausted: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(name: impl Into<String>, inner: R) -> Self {
        Self {
            name: name.into(),
            inner,
            exhausted: false,
        }
    }
}

impl ReaderSource<std::fs::File> {
    pub fn open(path: &std::path::Path) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(path.display().to_string(), file))
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exhausted || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.exhausted = true;
        }
        Ok(n)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialSource;

#[cfg(feature = "serial")]
mod serial {
    use super::ByteSource;
    use anyhow::{anyhow, Result};
    use log::{debug, info, warn};
    use serialport::SerialPort;
    use std::io::{self, Read};
    use std::time::Duration;

    use crate::config::SerialConfig;

    /// Serial port held with flow control off and DTR/RTS low.
    pub struct SerialSource {
        port_name: String,
        baud_rate: u32,
        port: Box<dyn SerialPort>,
    }

    impl SerialSource {
        /// Open and settle the port. Blocks for `open_delay_ms`.
        pub fn open(cfg: &SerialConfig) -> Result<Self> {
            info!(
                "Opening camera serial port {} at {} baud",
                cfg.port, cfg.baud_rate
            );
            let mut builder = serialport::new(&cfg.port, cfg.baud_rate)
                .timeout(Duration::from_millis(cfg.read_timeout_ms))
                .flow_control(serialport::FlowControl::None);
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None);
            }
            let mut port = builder
                .open()
                .map_err(|e| anyhow!("Failed to open serial port {}: {}", cfg.port, e))?;

            // Keep the ESP32 out of reset/bootloader.
            if let Err(e) = port.write_data_terminal_ready(false) {
                warn!("Could not lower DTR on {}: {}", cfg.port, e);
            }
            if let Err(e) = port.write_request_to_send(false) {
                warn!("Could not lower RTS on {}: {}", cfg.port, e);
            }
            std::thread::sleep(Duration::from_millis(cfg.open_delay_ms));
            // Drop whatever piled up while the port was settling.
            if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
                warn!("Could not clear input buffer on {}: {}", cfg.port, e);
            }
            debug!("Serial port {} ready", cfg.port);
            Ok(Self {
                port_name: cfg.port.clone(),
                baud_rate: cfg.baud_rate,
                port,
            })
        }
    }

    impl ByteSource for SerialSource {
        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.port.read(buf)
        }

        fn describe(&self) -> String {
            format!("{} @ {} baud", self.port_name, self.baud_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_source_reports_exhaustion() {
        let mut src = ReaderSource::new("mem", &b"abc"[..]);
        let mut buf = [0u8; 8];
        assert_eq!(src.read_chunk(&mut buf).unwrap(), 3);
        assert!(!src.is_exhausted());
        assert_eq!(src.read_chunk(&mut buf).unwrap(), 0);
        assert!(src.is_exhausted());
        assert_eq!(src.describe(), "mem");
    }

    #[test]
    fn timeouts_are_quiet() {
        assert!(is_quiet_error(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_quiet_error(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_quiet_error(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
