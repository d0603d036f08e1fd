//! Device port clients.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::{SerialPort, SerialPortType};

/// USB vendor/product ID of the firmware
pub const USB_ID: (u16, u16) = (0x303a, 0x4001);

/// USB interface number of the CDC-ACM port the tests drive
pub const CDC_INTERFACE: u8 = 0;

/// USB interface number of the CDC-ACM port carrying debug output
pub const DEBUG_INTERFACE: u8 = 2;

/// Find the firmware's serial port for the given USB interface number.
pub fn find_port(interface: u8) -> Result<String> {
    let ports = serialport::available_ports()?;

    for port_info in ports {
        if let SerialPortType::UsbPort(usb) = &port_info.port_type {
            if (usb.vid, usb.pid) == USB_ID && usb.interface == Some(interface) {
                return Ok(port_info.port_name);
            }
        }
    }

    anyhow::bail!(
        "No port found for {:04x}:{:04x} interface {} - ensure device is connected",
        USB_ID.0,
        USB_ID.1,
        interface
    )
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str, interface: u8) -> Result<String> {
    if port_arg == "auto" {
        find_port(interface)
    } else {
        Ok(port_arg.to_string())
    }
}

/// Client driving the firmware's CDC-ACM port.
pub struct CdcClient {
    port: Box<dyn SerialPort>,
}

impl CdcClient {
    /// Open the CDC port (the host asserts DTR on open).
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_secs(2))
            .open()?;

        Ok(Self { port })
    }

    /// Set or clear DTR.
    pub fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.port.write_data_terminal_ready(level)?;
        Ok(())
    }

    /// Set or clear RTS.
    pub fn set_rts(&mut self, level: bool) -> Result<()> {
        self.port.write_request_to_send(level)?;
        Ok(())
    }

    /// Change the baud rate (sends SET_LINE_CODING).
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port.set_baud_rate(baud_rate)?;
        Ok(())
    }

    /// Send bytes to the device.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Line reader for the device's debug output.
pub struct DebugMonitor {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl DebugMonitor {
    /// Open the debug port.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    /// Discard all pending debug output.
    pub fn drain(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        self.pending.clear();
        while self.read_line(Duration::from_millis(100))?.is_some() {}
        self.pending.clear();
        Ok(())
    }

    /// Read one line (without terminator), or None on timeout.
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let start = Instant::now();
        let mut buf = [0u8; 64];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line);
                return Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()));
            }

            if start.elapsed() >= timeout {
                return Ok(None);
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Collect the trace lines (those starting with `[sim]`) seen within a window.
    pub fn trace_lines(&mut self, window: Duration) -> Result<Vec<String>> {
        let start = Instant::now();
        let mut lines = Vec::new();

        while start.elapsed() < window {
            let remaining = window.saturating_sub(start.elapsed());
            match self.read_line(remaining)? {
                Some(line) if line.starts_with("[sim]") => lines.push(line),
                Some(_) => {}
                None => break,
            }
        }

        Ok(lines)
    }

    /// Wait for an exact trace line, skipping unrelated output.
    pub fn expect_line(&mut self, expected: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            let remaining = timeout.saturating_sub(start.elapsed());
            match self.read_line(remaining)? {
                Some(line) if line == expected => return Ok(()),
                Some(_) => continue,
                None => break,
            }
        }

        anyhow::bail!("Timeout waiting for '{}'", expected)
    }
}
