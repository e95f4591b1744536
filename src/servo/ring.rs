// Receive ring for the servo bus
//
// Single producer (UART interrupt or serial reader thread) pushes bytes,
// single consumer (the command caller) takes them. Each cursor has exactly
// one writer, so no lock is needed.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Default receive capacity, matching the servo's longest useful reply
pub const RECEIVE_BUFFER_LEN: usize = 32;

/// Fixed-capacity circular byte queue shared between producer and consumer
///
/// Cursors are free-running counters; a slot is `cursor % N`. When the
/// producer gets `N` bytes ahead the oldest unread byte is overwritten.
#[derive(Debug)]
pub struct ReceiveBuffer<const N: usize = RECEIVE_BUFFER_LEN> {
    slots: [AtomicU8; N],
    written: AtomicUsize,
    consumed: AtomicUsize,
}

impl<const N: usize> ReceiveBuffer<N> {
    /// Create an empty buffer (usable in a `static`)
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU8::new(0) }; N],
            written: AtomicUsize::new(0),
            consumed: AtomicUsize::new(0),
        }
    }

    /// Capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append a received byte. Producer side only.
    pub fn push(&self, byte: u8) {
        let written = self.written.load(Ordering::Relaxed);
        self.slots[written % N].store(byte, Ordering::Relaxed);
        self.written.store(written.wrapping_add(1), Ordering::Release);
    }

    /// Number of unread bytes
    pub fn available(&self) -> usize {
        let written = self.written.load(Ordering::Acquire);
        let consumed = self.consumed.load(Ordering::Relaxed);
        written.wrapping_sub(consumed).min(N)
    }

    /// Pop the oldest unread byte. Consumer side only.
    pub fn take(&self) -> Option<u8> {
        let written = self.written.load(Ordering::Acquire);
        let mut consumed = self.consumed.load(Ordering::Relaxed);

        let pending = written.wrapping_sub(consumed);
        if pending == 0 {
            return None;
        }
        // Producer lapped us: skip to the oldest byte still stored
        if pending > N {
            consumed = written.wrapping_sub(N);
        }

        let byte = self.slots[consumed % N].load(Ordering::Relaxed);
        self.consumed.store(consumed.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Discard everything queued. Consumer side only.
    pub fn reset(&self) {
        let written = self.written.load(Ordering::Acquire);
        self.consumed.store(written, Ordering::Release);
    }
}

impl<const N: usize> Default for ReceiveBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_buffer() {
        let ring: ReceiveBuffer<8> = ReceiveBuffer::new();
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.take(), None);
    }

    #[test]
    fn test_fifo_order() {
        let ring: ReceiveBuffer<8> = ReceiveBuffer::new();
        for b in [0xFF, 0xFF, 0x01, 0x02] {
            ring.push(b);
        }
        assert_eq!(ring.available(), 4);
        assert_eq!(ring.take(), Some(0xFF));
        assert_eq!(ring.take(), Some(0xFF));
        assert_eq!(ring.take(), Some(0x01));
        assert_eq!(ring.take(), Some(0x02));
        assert_eq!(ring.take(), None);
    }

    #[test]
    fn test_available_across_wraparound() {
        let ring: ReceiveBuffer<4> = ReceiveBuffer::new();
        // Walk the cursors around the ring several times
        for round in 0..10u8 {
            ring.push(round);
            ring.push(round.wrapping_add(100));
            assert_eq!(ring.available(), 2);
            assert_eq!(ring.take(), Some(round));
            assert_eq!(ring.available(), 1);
            assert_eq!(ring.take(), Some(round.wrapping_add(100)));
            assert_eq!(ring.available(), 0);
        }
    }

    #[test]
    fn test_overflow_overwrites_oldest() {
        let ring: ReceiveBuffer<4> = ReceiveBuffer::new();
        for b in 1..=6u8 {
            ring.push(b);
        }
        assert_eq!(ring.available(), 4);
        assert_eq!(ring.take(), Some(3));
        assert_eq!(ring.take(), Some(4));
        assert_eq!(ring.take(), Some(5));
        assert_eq!(ring.take(), Some(6));
        assert_eq!(ring.take(), None);
    }

    #[test]
    fn test_reset_discards_pending() {
        let ring: ReceiveBuffer<8> = ReceiveBuffer::new();
        ring.push(1);
        ring.push(2);
        ring.reset();
        assert_eq!(ring.available(), 0);
        ring.push(3);
        assert_eq!(ring.take(), Some(3));
    }

    #[test]
    fn test_cursor_counter_wrap() {
        let ring: ReceiveBuffer<4> = ReceiveBuffer::new();
        ring.written.store(usize::MAX - 1, Ordering::Relaxed);
        ring.consumed.store(usize::MAX - 1, Ordering::Relaxed);
        for b in 0..3u8 {
            ring.push(b);
        }
        assert_eq!(ring.available(), 3);
        assert_eq!(ring.take(), Some(0));
        assert_eq!(ring.take(), Some(1));
        assert_eq!(ring.take(), Some(2));
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn test_shared_with_producer_thread() {
        use std::sync::Arc;

        let ring: Arc<ReceiveBuffer<64>> = Arc::new(ReceiveBuffer::new());
        let producer = Arc::clone(&ring);
        let handle = std::thread::spawn(move || {
            for b in 0..40u8 {
                producer.push(b);
            }
        });
        handle.join().unwrap();

        let drained: Vec<u8> = std::iter::from_fn(|| ring.take()).collect();
        assert_eq!(drained, (0..40u8).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn prop_available_is_pushes_minus_takes(
            rounds in proptest::collection::vec((0usize..6, 0usize..6), 1..40)
        ) {
            let ring: ReceiveBuffer<8> = ReceiveBuffer::new();
            let mut expected = 0usize;
            for (pushes, takes) in rounds {
                // Stay under capacity so nothing is overwritten
                let pushes = pushes.min(8 - expected);
                for i in 0..pushes {
                    ring.push(i as u8);
                }
                expected += pushes;
                let takes = takes.min(expected);
                for _ in 0..takes {
                    prop_assert!(ring.take().is_some());
                }
                expected -= takes;
                prop_assert_eq!(ring.available(), expected);
            }
        }
    }
}
