//! Hardware-free transports.
//!
//! - [`LoopbackTransport`]: every exchange echoes tx into rx, like `SPI_LOOP`
//! - [`SimulatedBus`]: a cross-wired master/slave pair; each side receives
//!   what the other side transmitted in the same exchange
//! - [`FaultyTransport`]: wraps another transport and corrupts chosen exchanges

use crate::{check_lengths, TransferParams, Transport, TransportError};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackTransport;

impl Transport for LoopbackTransport {
    fn exchange(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        _params: &TransferParams,
    ) -> Result<(), TransportError> {
        check_lengths(tx, rx)?;
        rx.copy_from_slice(tx);
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

/// In-memory full-duplex bus.
pub struct SimulatedBus;

impl SimulatedBus {
    /// Create the two endpoints of a bus: `(master, slave)`.
    ///
    /// Exchanges pair up in order: the n-th exchange on one side meets the
    /// n-th exchange on the other. Dropping an endpoint detaches it. From
    /// then on the peer's exchanges complete locally and receive the last
    /// frame the departed side transmitted (zeros if it never transmitted).
    pub fn pair() -> (BusEndpoint, BusEndpoint) {
        let (to_slave, from_master) = sync_channel(1);
        let (to_master, from_slave) = sync_channel(1);
        (
            BusEndpoint::new("sim-master", to_slave, from_slave),
            BusEndpoint::new("sim-slave", to_master, from_master),
        )
    }
}

/// One side of a [`SimulatedBus`].
pub struct BusEndpoint {
    label: &'static str,
    outbound: SyncSender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
    last_frame: Option<Vec<u8>>,
    peer_gone: bool,
}

impl BusEndpoint {
    fn new(label: &'static str, outbound: SyncSender<Vec<u8>>, inbound: Receiver<Vec<u8>>) -> Self {
        Self {
            label,
            outbound,
            inbound,
            last_frame: None,
            peer_gone: false,
        }
    }

    fn detach(&mut self) {
        if !self.peer_gone {
            debug!(endpoint = self.label, "bus peer left, holding its last frame");
            self.peer_gone = true;
        }
    }

    fn idle_fill(&self, rx: &mut [u8]) {
        match &self.last_frame {
            Some(frame) if frame.len() == rx.len() => rx.copy_from_slice(frame),
            _ => rx.fill(0),
        }
    }
}

impl Transport for BusEndpoint {
    fn exchange(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        _params: &TransferParams,
    ) -> Result<(), TransportError> {
        check_lengths(tx, rx)?;

        if !self.peer_gone && self.outbound.send(tx.to_vec()).is_err() {
            self.detach();
        }
        if !self.peer_gone {
            match self.inbound.recv() {
                Ok(frame) => {
                    check_lengths(&frame, rx)?;
                    rx.copy_from_slice(&frame);
                    self.last_frame = Some(frame);
                    trace!(endpoint = self.label, len = rx.len(), "simulated exchange");
                    return Ok(());
                }
                Err(_) => self.detach(),
            }
        }

        self.idle_fill(rx);
        Ok(())
    }

    fn name(&self) -> &str {
        self.label
    }
}

/// Wraps a transport and damages selected exchanges.
pub struct FaultyTransport<T> {
    inner: T,
    exchanges: u64,
    corrupt_on: Vec<u64>,
    fail_on: Option<u64>,
    offset: usize,
}

impl<T: Transport> FaultyTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            exchanges: 0,
            corrupt_on: Vec::new(),
            fail_on: None,
            offset: 1,
        }
    }

    /// Flip the bits of `rx[offset]` on the given 1-based exchange.
    pub fn corrupt_exchange(mut self, exchange: u64, offset: usize) -> Self {
        self.corrupt_on.push(exchange);
        self.offset = offset;
        self
    }

    /// Fail the given 1-based exchange with a transport error.
    pub fn fail_exchange(mut self, exchange: u64) -> Self {
        self.fail_on = Some(exchange);
        self
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }
}

impl<T: Transport> Transport for FaultyTransport<T> {
    fn exchange(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        params: &TransferParams,
    ) -> Result<(), TransportError> {
        self.exchanges += 1;
        if self.fail_on == Some(self.exchanges) {
            return Err(TransportError::Injected(format!(
                "exchange {} failed",
                self.exchanges
            )));
        }

        self.inner.exchange(tx, rx, params)?;

        if self.corrupt_on.contains(&self.exchanges) {
            if let Some(byte) = rx.get_mut(self.offset) {
                *byte = !*byte;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_loopback_echoes() {
        let mut t = LoopbackTransport;
        let tx = [1u8, 2, 3, 4];
        let mut rx = [0u8; 4];
        t.exchange(&tx, &mut rx, &TransferParams::default()).unwrap();
        assert_eq!(rx, tx);
    }

    #[test]
    fn test_loopback_length_check() {
        let mut t = LoopbackTransport;
        let mut rx = [0u8; 3];
        let err = t
            .exchange(&[1, 2], &mut rx, &TransferParams::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::LengthMismatch { tx: 2, rx: 3 }));
    }

    #[test]
    fn test_bus_crosses_buffers() {
        let (mut master, mut slave) = SimulatedBus::pair();
        let params = TransferParams::default();

        let slave_thread = thread::spawn(move || {
            let mut rx = [0u8; 3];
            slave.exchange(&[9, 8, 7], &mut rx, &params).unwrap();
            rx
        });

        let mut rx = [0u8; 3];
        master.exchange(&[1, 2, 3], &mut rx, &params).unwrap();

        assert_eq!(rx, [9, 8, 7]);
        assert_eq!(slave_thread.join().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_bus_detached_peer_reads_idle_line() {
        let (mut master, slave) = SimulatedBus::pair();
        drop(slave);

        let mut rx = [0xAAu8; 2];
        master
            .exchange(&[1, 2], &mut rx, &TransferParams::default())
            .unwrap();
        assert_eq!(rx, [0, 0]);
        assert!(master.peer_gone);
    }

    #[test]
    fn test_bus_holds_last_frame_after_peer_leaves() {
        let (mut master, mut slave) = SimulatedBus::pair();
        let params = TransferParams::default();

        let master_thread = thread::spawn(move || {
            let mut rx = [0u8; 3];
            master.exchange(&[4, 5, 6], &mut rx, &params).unwrap();
            rx
        });

        let mut rx = [0u8; 3];
        slave.exchange(&[9, 8, 7], &mut rx, &params).unwrap();
        assert_eq!(rx, [4, 5, 6]);
        assert_eq!(master_thread.join().unwrap(), [9, 8, 7]);

        // The master thread dropped its endpoint; the slave keeps clocking.
        for _ in 0..3 {
            let mut rx = [0u8; 3];
            slave.exchange(&[9, 8, 7], &mut rx, &params).unwrap();
            assert_eq!(rx, [4, 5, 6]);
        }
        assert!(slave.peer_gone);
    }

    #[test]
    fn test_faulty_corrupts_selected_exchange() {
        let mut t = FaultyTransport::new(LoopbackTransport).corrupt_exchange(2, 1);
        let params = TransferParams::default();
        let tx = [5u8, 0x0F, 7];
        let mut rx = [0u8; 3];

        t.exchange(&tx, &mut rx, &params).unwrap();
        assert_eq!(rx, tx);

        t.exchange(&tx, &mut rx, &params).unwrap();
        assert_eq!(rx, [5, 0xF0, 7]);
        assert_eq!(t.exchanges(), 2);
    }

    #[test]
    fn test_faulty_fails_selected_exchange() {
        let mut t = FaultyTransport::new(LoopbackTransport).fail_exchange(1);
        let mut rx = [0u8; 1];
        assert!(t
            .exchange(&[1], &mut rx, &TransferParams::default())
            .is_err());
    }
}
