//! Per-transfer timing and wire format.

use bitflags::bitflags;

bitflags! {
    /// Wire-mode flags, bit-compatible with the kernel's `SPI_*` mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpiMode: u32 {
        /// Clock phase.
        const CPHA      = 0x01;
        /// Clock polarity.
        const CPOL      = 0x02;
        /// Chip select active high.
        const CS_HIGH   = 0x04;
        /// Least significant bit first.
        const LSB_FIRST = 0x08;
        /// SI/SO signals shared.
        const THREE_WIRE = 0x10;
        /// Loopback.
        const LOOP      = 0x20;
        /// No chip select.
        const NO_CS     = 0x40;
        /// Slave pulls low to pause.
        const READY     = 0x80;
        const TX_DUAL   = 0x100;
        const TX_QUAD   = 0x200;
        const RX_DUAL   = 0x400;
        const RX_QUAD   = 0x800;
    }
}

impl SpiMode {
    /// In loopback, a dual/quad transmit implies the matching receive width.
    pub fn with_loopback_lanes(mut self) -> Self {
        if self.contains(SpiMode::LOOP) {
            if self.contains(SpiMode::TX_DUAL) {
                self |= SpiMode::RX_DUAL;
            }
            if self.contains(SpiMode::TX_QUAD) {
                self |= SpiMode::RX_QUAD;
            }
        }
        self
    }

    pub fn tx_lanes(self) -> LaneWidth {
        if self.contains(SpiMode::TX_QUAD) {
            LaneWidth::Quad
        } else if self.contains(SpiMode::TX_DUAL) {
            LaneWidth::Dual
        } else {
            LaneWidth::Single
        }
    }

    pub fn rx_lanes(self) -> LaneWidth {
        if self.contains(SpiMode::RX_QUAD) {
            LaneWidth::Quad
        } else if self.contains(SpiMode::RX_DUAL) {
            LaneWidth::Dual
        } else {
            LaneWidth::Single
        }
    }

    /// Outside loopback a multi-lane transmit cannot receive.
    pub fn is_tx_only(self) -> bool {
        !self.contains(SpiMode::LOOP) && self.tx_lanes() != LaneWidth::Single
    }

    /// Outside loopback a multi-lane receive does not drive data out.
    pub fn is_rx_only(self) -> bool {
        !self.contains(SpiMode::LOOP)
            && !self.is_tx_only()
            && self.rx_lanes() != LaneWidth::Single
    }
}

/// Data lanes used in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneWidth {
    Single,
    Dual,
    Quad,
}

impl LaneWidth {
    /// Value for `tx_nbits`/`rx_nbits`; zero lets the driver pick single.
    pub fn nbits(self) -> u8 {
        match self {
            LaneWidth::Single => 0,
            LaneWidth::Dual => 2,
            LaneWidth::Quad => 4,
        }
    }
}

/// Parameters applied to every exchange of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    pub speed_hz: u32,
    /// Delay after the transfer before the next one, in microseconds.
    pub delay_us: u16,
    pub bits_per_word: u8,
    pub mode: SpiMode,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            speed_hz: 24_000_000,
            delay_us: 0,
            bits_per_word: 32,
            mode: SpiMode::empty(),
        }
    }
}
