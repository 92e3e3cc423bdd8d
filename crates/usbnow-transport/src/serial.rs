use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportConfig};

/// Serial port transport (8N1, no flow control).
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    config: TransportConfig,
}

impl SerialTransport {
    /// Describe a serial transport without opening it.
    pub fn new(port_name: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            port_name: port_name.into(),
            port: None,
            config,
        }
    }

    /// Describe and open a serial transport in one step.
    pub fn open_port(port_name: impl Into<String>, config: TransportConfig) -> Result<Self> {
        let mut transport = Self::new(port_name, config);
        transport.open()?;
        Ok(transport)
    }

    /// Name of the underlying port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&self.port_name, self.config.baud_rate)
            .timeout(self.config.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|err| TransportError::Open {
                port: self.port_name.clone(),
                source: std::io::Error::from(err),
            })?;

        info!(port = %self.port_name, baud_rate = self.config.baud_rate, "opened serial port");
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(port = %self.port_name, "closed serial port");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        let available = port.bytes_to_read()? as usize;
        if available == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = available.min(buf.len());
        match port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(err)
                if err.kind() == ErrorKind::Interrupted || err.kind() == ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        port.flush()?;
        Ok(())
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(timeout)?;
        }
        self.config.timeout = timeout;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if let Some(port) = self.port.as_mut() {
            port.set_baud_rate(baud_rate)?;
        }
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("open", &self.port.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Names of the serial ports currently present on this host.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
