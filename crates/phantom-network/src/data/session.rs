use crate::TransferError;
use phantom_core::constants::DATA_CHUNK_SIZE;
use tracing::{trace, warn};

/// Reassembly state of one image transfer.
///
/// Chunks are appended in arrival order. Once the declared size is known and
/// reached, the buffer is truncated to exactly that size and the session is
/// complete; further chunks are ignored.
///
/// The declared size is taken from the peer, so at most [`DATA_CHUNK_SIZE`]
/// bytes are reserved up front; the buffer grows with the data actually
/// received.
#[derive(Debug, Default)]
pub struct TransferSession {
    expected: Option<usize>,
    buffer: Vec<u8>,
    completed: bool,
}

impl TransferSession {
    /// Session whose size is declared later with [`set_expected`](Self::set_expected).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected(expected: usize) -> Self {
        let mut session = Self {
            expected: Some(expected),
            buffer: Vec::with_capacity(expected.min(DATA_CHUNK_SIZE)),
            completed: false,
        };
        session.check_complete();
        session
    }

    /// Declare the total size. Returns `true` if data already received
    /// completes the transfer.
    pub fn set_expected(&mut self, expected: usize) -> bool {
        self.expected = Some(expected);
        let missing = expected.saturating_sub(self.buffer.len());
        self.buffer.reserve(missing.min(DATA_CHUNK_SIZE));
        self.check_complete()
    }

    /// Append a chunk. Returns `true` once the transfer is complete.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.completed {
            return true;
        }
        self.buffer.extend_from_slice(chunk);
        trace!(
            received = self.buffer.len(),
            expected = ?self.expected,
            "Appended {} bytes",
            chunk.len()
        );
        self.check_complete()
    }

    /// Close a transfer whose peer stopped sending.
    ///
    /// Up to `tolerance` missing trailing bytes are padded with zeros.
    ///
    /// # Errors
    /// Returns `TransferError::Incomplete` if more bytes are missing or the
    /// size was never declared.
    pub fn finish_short(&mut self, tolerance: usize) -> Result<(), TransferError> {
        if self.completed {
            return Ok(());
        }
        let received = self.buffer.len();
        let Some(expected) = self.expected else {
            return Err(TransferError::Incomplete {
                received,
                expected: 0,
            });
        };

        let missing = expected - received;
        if missing > tolerance {
            return Err(TransferError::Incomplete { received, expected });
        }

        warn!(missing, expected, "Transfer ended short; padding with zeros");
        self.buffer.resize(expected, 0);
        self.completed = true;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    /// Hand over the buffer and reset the session for the next transfer.
    pub fn take(&mut self) -> Vec<u8> {
        self.expected = None;
        self.completed = false;
        std::mem::take(&mut self.buffer)
    }

    fn check_complete(&mut self) -> bool {
        if let Some(expected) = self.expected {
            if self.buffer.len() >= expected {
                self.buffer.truncate(expected);
                self.completed = true;
            }
        }
        self.completed
    }
}
