//! Receive mailbox
//!
//! Bounded byte FIFO between the data-received callback and the
//! application. The callback pushes whole packets; the application drains
//! bytes or lines at its own pace.

use heapless::{Deque, Vec};

/// What happens to a packet that does not fit the unread space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the whole incoming packet, keep unread data
    #[default]
    Refuse,
    /// Evict the oldest unread bytes to make room
    Overwrite,
}

#[cfg(feature = "defmt")]
impl defmt::Format for OverflowPolicy {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Refuse => defmt::write!(f, "refuse"),
            Self::Overwrite => defmt::write!(f, "overwrite"),
        }
    }
}

/// Outcome of a [`RxMailbox::push`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Bytes of the packet now stored
    pub accepted: usize,
    /// Bytes lost, either from the packet or evicted unread data
    pub dropped: usize,
}

impl Delivery {
    /// Check if anything was lost
    #[must_use]
    pub const fn overrun(&self) -> bool {
        self.dropped > 0
    }
}

/// Receive mailbox with fixed capacity `N`
pub struct RxMailbox<const N: usize> {
    queue: Deque<u8, N>,
    policy: OverflowPolicy,
}

impl<const N: usize> RxMailbox<N> {
    /// Create an empty mailbox
    #[must_use]
    pub const fn new(policy: OverflowPolicy) -> Self {
        Self {
            queue: Deque::new(),
            policy,
        }
    }

    /// Overflow policy in force
    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Push a packet according to the overflow policy
    pub fn push(&mut self, data: &[u8]) -> Delivery {
        if data.len() <= self.free() {
            self.extend(data);
            return Delivery {
                accepted: data.len(),
                dropped: 0,
            };
        }

        match self.policy {
            OverflowPolicy::Refuse => Delivery {
                accepted: 0,
                dropped: data.len(),
            },
            OverflowPolicy::Overwrite => {
                let tail = &data[data.len().saturating_sub(N)..];
                let lost_packet = data.len() - tail.len();
                let mut evicted = 0;
                while self.free() < tail.len() {
                    if self.queue.pop_front().is_none() {
                        break;
                    }
                    evicted += 1;
                }
                self.extend(tail);
                Delivery {
                    accepted: tail.len(),
                    dropped: lost_packet + evicted,
                }
            }
        }
    }

    fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            // Capacity checked by the caller
            let _ = self.queue.push_back(byte);
        }
    }

    /// Drain up to `buf.len()` bytes, returns count copied
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut read = 0;
        for slot in buf.iter_mut() {
            match self.queue.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    read += 1;
                }
                None => break,
            }
        }
        read
    }

    /// Read a line (up to newline or CR)
    pub fn read_line(&mut self) -> Option<Vec<u8, N>> {
        let end = self.queue.iter().position(|&b| b == b'\n' || b == b'\r')?;

        let mut line = Vec::new();
        for _ in 0..end {
            if let Some(byte) = self.queue.pop_front() {
                let _ = line.push(byte);
            }
        }

        // Skip the newline character(s)
        while matches!(self.queue.front(), Some(b'\n' | b'\r')) {
            self.queue.pop_front();
        }

        Some(line)
    }

    /// Clear the mailbox
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Get available bytes
    #[must_use]
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Get free space
    #[must_use]
    pub fn free(&self) -> usize {
        N - self.queue.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<const N: usize> Default for RxMailbox<N> {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}
