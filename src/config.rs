//! Build target selection and trace constants for the CDC event notifier

/// Firmware build target.
///
/// Selects whether CDC events are traced to the debug sink. The choice is a
/// runtime value so both behaviours can be exercised from a single build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Running under a simulator; CDC events are traced to the debug sink
    SimulatedHardware,
    /// Running on real hardware; CDC events are ignored
    Hardware,
}

impl Target {
    /// Target selected by the `simulated-hardware` Cargo feature.
    pub const fn from_build() -> Self {
        if cfg!(feature = "simulated-hardware") {
            Self::SimulatedHardware
        } else {
            Self::Hardware
        }
    }

    /// Returns true if CDC events should be traced.
    pub const fn traces_events(self) -> bool {
        matches!(self, Self::SimulatedHardware)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Debug trace text
pub mod trace {
    /// Emitted when the host asserts DTR (terminal attached)
    pub const LINE_STATE_ATTACHED: &str = "[sim] line-state dtr=1\n";

    /// Emitted when the host clears DTR (terminal detached)
    pub const LINE_STATE_DETACHED: &str = "[sim] line-state dtr=0\n";

    /// Emitted when the host sends data on a CDC interface
    pub const DATA_RECEIVED: &str = "[sim] data-received\n";
}

/// USB device configuration
pub mod usb {
    /// Espressif vendor ID
    pub const VID: u16 = 0x303a;
    /// Product ID for the CDC-ACM interface
    pub const PID: u16 = 0x4001;

    pub const MANUFACTURER: &str = "Espressif";
    pub const PRODUCT: &str = "CDC Event Notifier";

    /// Max packet size for the CDC-ACM bulk endpoints
    pub const MAX_PACKET_SIZE: u16 = 64;

    /// Logical CDC interface reported to the notifier
    pub const CDC_INTERFACE: u8 = 0;

    /// OTG endpoint OUT buffer size
    pub const EP_OUT_BUFFER_SIZE: usize = 1024;
}

/// Debug output port configuration
pub mod debug {
    /// Bytes of trace output buffered while the debug port is not read
    pub const PIPE_SIZE: usize = 256;
}
