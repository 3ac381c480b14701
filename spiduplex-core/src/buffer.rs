//! Payload Buffers
//!
//! Each actor owns its transmit buffer and its receive buffer. The peer only
//! ever reads a transmit buffer, and it does so without any handshake: the
//! owner may be rewriting the tag byte for its next iteration at the same
//! moment. To keep that read well-defined, every transmit buffer is mirrored
//! into relaxed atomics; [`PeerView::peek_unsynchronized`] copies the mirror
//! and promises nothing about which iteration it reflects.

use spiduplex_logic::{TransactionTag, TAG_INDEX};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("transmit buffers differ in length: master {master}, slave {slave}")]
    LengthMismatch { master: usize, slave: usize },

    #[error("transfer size must be at least 2 bytes, got {0}")]
    TooShort(usize),
}

fn mirror(bytes: &[u8]) -> Arc<[AtomicU8]> {
    bytes.iter().map(|&b| AtomicU8::new(b)).collect()
}

/// Transmit buffer, written only by its owning actor.
#[derive(Debug)]
pub struct TxBuffer {
    local: Vec<u8>,
    shared: Arc<[AtomicU8]>,
}

impl TxBuffer {
    /// Stamp the tag into byte 0 and publish it to the peer's view.
    pub fn set_tag(&mut self, tag: TransactionTag) {
        self.local[TAG_INDEX] = tag.value();
        self.shared[TAG_INDEX].store(tag.value(), Ordering::Relaxed);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.local
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

/// Read-only view of the peer's transmit buffer.
#[derive(Debug, Clone)]
pub struct PeerView {
    shared: Arc<[AtomicU8]>,
}

impl PeerView {
    /// Copy the peer's transmit buffer into `out` without synchronizing with
    /// the peer. The copy may mix bytes from two of the peer's iterations;
    /// validation built on it is best-effort.
    pub fn peek_unsynchronized(&self, out: &mut [u8]) {
        for (dst, src) in out.iter_mut().zip(self.shared.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }
}

/// The buffers one actor works with.
#[derive(Debug)]
pub struct ActorBuffers {
    pub tx: TxBuffer,
    pub rx: Vec<u8>,
    pub peer_tx: PeerView,
}

/// The four payload buffers of a run, split per actor.
#[derive(Debug)]
pub struct PayloadSet {
    pub master: ActorBuffers,
    pub slave: ActorBuffers,
}

impl PayloadSet {
    /// Build the set from seeded transmit payloads. Receive buffers start
    /// zeroed. All four buffers share one length.
    pub fn new(master_tx: Vec<u8>, slave_tx: Vec<u8>) -> Result<Self, BufferError> {
        if master_tx.len() != slave_tx.len() {
            return Err(BufferError::LengthMismatch {
                master: master_tx.len(),
                slave: slave_tx.len(),
            });
        }
        let len = master_tx.len();
        if len < 2 {
            return Err(BufferError::TooShort(len));
        }

        let master_shared = mirror(&master_tx);
        let slave_shared = mirror(&slave_tx);

        Ok(Self {
            master: ActorBuffers {
                tx: TxBuffer {
                    local: master_tx,
                    shared: master_shared.clone(),
                },
                rx: vec![0; len],
                peer_tx: PeerView {
                    shared: slave_shared.clone(),
                },
            },
            slave: ActorBuffers {
                tx: TxBuffer {
                    local: slave_tx,
                    shared: slave_shared,
                },
                rx: vec![0; len],
                peer_tx: PeerView {
                    shared: master_shared,
                },
            },
        })
    }

    pub fn transfer_size(&self) -> usize {
        self.master.tx.len()
    }
}
