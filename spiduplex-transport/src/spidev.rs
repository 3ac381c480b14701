//! Linux spidev backend
//!
//! Talks to `/dev/spidevB.C` with the `SPI_IOC_*` ioctls from
//! `linux/spi/spidev.h`.

use crate::{check_lengths, wire_length, SpiMode, TransferParams, Transport, TransportError};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::debug;

const SPI_IOC_MAGIC: u8 = b'k';

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, nr: u8, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8) | nr as u32
}

const SPI_IOC_WR_BITS_PER_WORD: u32 = ioc(IOC_WRITE, 3, 1);
const SPI_IOC_RD_BITS_PER_WORD: u32 = ioc(IOC_READ, 3, 1);
const SPI_IOC_WR_MAX_SPEED_HZ: u32 = ioc(IOC_WRITE, 4, 4);
const SPI_IOC_RD_MAX_SPEED_HZ: u32 = ioc(IOC_READ, 4, 4);
const SPI_IOC_WR_MODE32: u32 = ioc(IOC_WRITE, 5, 4);
const SPI_IOC_RD_MODE32: u32 = ioc(IOC_READ, 5, 4);

/// `struct spi_ioc_transfer`
#[repr(C)]
#[derive(Debug, Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

const fn spi_ioc_message(n: usize) -> u32 {
    ioc(IOC_WRITE, 0, n * std::mem::size_of::<SpiIocTransfer>())
}

/// Settings read back from the driver after configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    pub mode: SpiMode,
    pub bits_per_word: u8,
    pub speed_hz: u32,
}

/// One spidev node.
pub struct SpidevTransport {
    file: File,
    path: PathBuf,
    label: String,
    settings: DeviceSettings,
}

impl SpidevTransport {
    /// Open the node and apply mode, bits per word and max speed, reading
    /// each back from the driver.
    pub fn open(path: impl AsRef<Path>, params: &TransferParams) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let fd = file.as_raw_fd();

        let mut mode = params.mode.bits();
        ioctl_set(fd, SPI_IOC_WR_MODE32, &mut mode, "set spi mode")?;
        ioctl_set(fd, SPI_IOC_RD_MODE32, &mut mode, "get spi mode")?;

        let mut bits = params.bits_per_word;
        ioctl_set(fd, SPI_IOC_WR_BITS_PER_WORD, &mut bits, "set bits per word")?;
        ioctl_set(fd, SPI_IOC_RD_BITS_PER_WORD, &mut bits, "get bits per word")?;

        let mut speed = params.speed_hz;
        ioctl_set(fd, SPI_IOC_WR_MAX_SPEED_HZ, &mut speed, "set max speed hz")?;
        ioctl_set(fd, SPI_IOC_RD_MAX_SPEED_HZ, &mut speed, "get max speed hz")?;

        let settings = DeviceSettings {
            mode: SpiMode::from_bits_truncate(mode),
            bits_per_word: bits,
            speed_hz: speed,
        };
        debug!(
            device = %path.display(),
            mode = format_args!("{:#x}", mode),
            bits_per_word = bits,
            speed_hz = speed,
            "spidev configured"
        );

        Ok(Self {
            label: path.display().to_string(),
            file,
            path,
            settings,
        })
    }

    pub fn settings(&self) -> DeviceSettings {
        self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ioctl_set<T>(fd: i32, request: u32, value: &mut T, what: &'static str) -> Result<(), TransportError> {
    // SAFETY: `value` is a live, exclusively borrowed object whose size
    // matches the one encoded in `request`.
    let ret = unsafe { libc::ioctl(fd, request as _, value as *mut T) };
    if ret == -1 {
        return Err(TransportError::Configure {
            what,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

impl Transport for SpidevTransport {
    fn exchange(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        params: &TransferParams,
    ) -> Result<(), TransportError> {
        check_lengths(tx, rx)?;
        let len = wire_length(tx.len())?;

        let mode = params.mode;
        let mut transfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len,
            speed_hz: params.speed_hz,
            delay_usecs: params.delay_us,
            bits_per_word: params.bits_per_word,
            tx_nbits: mode.tx_lanes().nbits(),
            rx_nbits: mode.rx_lanes().nbits(),
            ..Default::default()
        };
        if mode.is_tx_only() {
            transfer.rx_buf = 0;
        } else if mode.is_rx_only() {
            transfer.tx_buf = 0;
        }

        // SAFETY: the transfer descriptor points at `tx`/`rx`, both valid for
        // `len` bytes for the duration of the call.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                spi_ioc_message(1) as _,
                &mut transfer as *mut SpiIocTransfer,
            )
        };
        if ret < 1 {
            return Err(TransportError::Message(std::io::Error::last_os_error()));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
