//! Serial transport for the EVC300 controller (feature `hardware`).
use std::io::Write;
use std::time::Duration;

use evap_traits::Link;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::LinkSettings;
use crate::error::{HwError, Result};
use crate::framing::{ReplyTiming, read_reply};

pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
    timing: ReplyTiming,
}

impl SerialLink {
    /// Open the device with the controller's fixed line settings
    /// (8 data bits, no parity, 1 stop bit, XON/XOFF).
    pub fn open(settings: &LinkSettings) -> Result<Self> {
        let port = serialport::new(settings.port.as_str(), settings.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Software)
            // Per-read timeout only paces polling; read_reply owns the deadline.
            .timeout(settings.timing.poll.max(Duration::from_millis(1)))
            .open()
            .map_err(|e| HwError::LinkUnavailable {
                port: settings.port.clone(),
                reason: e.to_string(),
            })?;
        info!(port = %settings.port, baud = settings.baud, "serial link open");
        Ok(Self {
            port,
            name: settings.port.clone(),
            timing: settings.timing,
        })
    }

    fn write_line(&mut self, command: &str) -> Result<()> {
        let line = format!("{command}\r\n");
        self.port.write_all(line.as_bytes()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                HwError::Timeout
            } else {
                HwError::Io(e)
            }
        })?;
        self.port.flush()?;
        Ok(())
    }
}

impl Link for SerialLink {
    fn exchange(
        &mut self,
        command: &str,
        settle: Duration,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
        // Bytes left over from an earlier, abandoned reply must not be read
        // as the answer to this command.
        self.port.clear(ClearBuffer::Input).map_err(HwError::from)?;
        self.write_line(command)?;
        std::thread::sleep(settle);
        let reply = read_reply(self.port.as_mut(), &self.timing)?;
        debug!(port = %self.name, command, reply = %reply.escape_default(), "exchange");
        Ok(reply)
    }
}
