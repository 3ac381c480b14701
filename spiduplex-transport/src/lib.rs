//! spiduplex Transport
//!
//! The two external collaborators of a duplex run:
//! - [`Transport`]: one full-duplex exchange of `len` bytes
//! - [`ReadinessGate`]: point-in-time "slave ready" status, polled by the master
//!
//! Backends:
//! - [`SpidevTransport`] drives a Linux `spidev` node through `SPI_IOC_MESSAGE`
//! - [`SysfsGate`] reads the slave-ready attribute exposed by an SPI slave controller
//! - [`LoopbackTransport`], [`SimulatedBus`], [`FaultyTransport`] and
//!   [`SimulatedGate`] run without hardware

mod error;
mod gate;
mod params;
mod sim;
#[cfg(target_os = "linux")]
mod spidev;

pub use error::{GateError, TransportError};
pub use gate::{AlwaysReady, GateController, Readiness, ReadinessGate, SimulatedGate, SysfsGate};
pub use params::{LaneWidth, SpiMode, TransferParams};
pub use sim::{BusEndpoint, FaultyTransport, LoopbackTransport, SimulatedBus};
#[cfg(target_os = "linux")]
pub use spidev::{DeviceSettings, SpidevTransport};

/// Default master device node.
pub const DEFAULT_MASTER_DEVICE: &str = "/dev/spidev0.0";

/// Default slave device node.
pub const DEFAULT_SLAVE_DEVICE: &str = "/dev/spidev9.0";

/// Largest transfer one `SPI_IOC_MESSAGE` can describe (`len` is a `u32`).
pub const MAX_TRANSFER_SIZE: usize = u32::MAX as usize;

/// Default slave-ready attribute.
pub const DEFAULT_READY_PATH: &str = "/sys/class/spi_slave/spi9/device/slave_ready";

/// One side of a full-duplex bus.
///
/// `exchange` clocks `tx.len()` bytes out and the same number in. An `Err` is
/// unrecoverable for the run; there is no retry.
pub trait Transport: Send {
    fn exchange(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        params: &TransferParams,
    ) -> Result<(), TransportError>;

    /// Short label for logs.
    fn name(&self) -> &str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        params: &TransferParams,
    ) -> Result<(), TransportError> {
        (**self).exchange(tx, rx, params)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub(crate) fn check_lengths(tx: &[u8], rx: &[u8]) -> Result<(), TransportError> {
    if tx.len() != rx.len() {
        return Err(TransportError::LengthMismatch {
            tx: tx.len(),
            rx: rx.len(),
        });
    }
    Ok(())
}

/// Length of a transfer as the kernel's 32-bit `len` field.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn wire_length(len: usize) -> Result<u32, TransportError> {
    u32::try_from(len).map_err(|_| TransportError::TransferTooLarge {
        len,
        max: MAX_TRANSFER_SIZE,
    })
}
