//! Fixed-capacity ring buffer for mixed-rate PCM hand-off
//!
//! Unlike a lock-free SPSC ring, this buffer is guarded by a single
//! `parking_lot::Mutex` and overwrites the oldest unread samples when full
//! rather than rejecting new writes. Dropping the oldest data keeps the
//! mixer working from the most recent audio when a producer briefly outruns
//! the consumer, which matters more for a live capture than preserving a
//! stale tail.

use parking_lot::Mutex;

struct Inner {
    storage: Vec<f32>,
    /// Index of the oldest unread sample.
    read_pos: usize,
    /// Number of valid unread samples currently stored.
    len: usize,
}

/// A mutex-guarded ring buffer of `f32` PCM samples with drop-oldest overflow.
pub struct RingBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl RingBuffer {
    /// Create a buffer that holds up to `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be non-zero");
        Self {
            capacity,
            inner: Mutex::new(Inner {
                storage: vec![0.0; capacity],
                read_pos: 0,
                len: 0,
            }),
        }
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently available to read.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// True if there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `samples` into the buffer.
    ///
    /// If `samples` would overflow the remaining capacity, the oldest
    /// unread samples are discarded to make room. Returns the number of
    /// samples dropped to make room (0 if none were dropped).
    pub fn write(&self, samples: &[f32]) -> usize {
        if samples.is_empty() {
            return 0;
        }
        let mut inner = self.inner.lock();
        let capacity = self.capacity;

        // If the incoming batch alone exceeds capacity, only its tail survives.
        let incoming = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let mut dropped = 0usize;
        let free = capacity - inner.len;
        if incoming.len() > free {
            dropped = incoming.len() - free;
            inner.read_pos = (inner.read_pos + dropped) % capacity;
            inner.len -= dropped;
        }

        let write_pos = (inner.read_pos + inner.len) % capacity;
        for (i, &sample) in incoming.iter().enumerate() {
            let idx = (write_pos + i) % capacity;
            inner.storage[idx] = sample;
        }
        inner.len += incoming.len();
        dropped
    }

    /// Drain up to `max` samples into a freshly allocated `Vec`.
    pub fn read(&self, max: usize) -> Vec<f32> {
        let mut inner = self.inner.lock();
        let to_read = inner.len.min(max);
        let mut out = Vec::with_capacity(to_read);
        let capacity = self.capacity;
        for i in 0..to_read {
            out.push(inner.storage[(inner.read_pos + i) % capacity]);
        }
        inner.read_pos = (inner.read_pos + to_read) % capacity;
        inner.len -= to_read;
        out
    }

    /// Drain every available sample into a freshly allocated `Vec`.
    pub fn read_all(&self) -> Vec<f32> {
        let len = self.len();
        self.read(len)
    }

    /// Discard all buffered samples without reading them.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.read_pos = 0;
        inner.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let buf = RingBuffer::new(8);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn write_then_read_round_trips() {
        let buf = RingBuffer::new(8);
        let dropped = buf.write(&[1.0, 2.0, 3.0]);
        assert_eq!(dropped, 0);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read_all(), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_read_leaves_remainder() {
        let buf = RingBuffer::new(8);
        buf.write(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buf.read(2), vec![1.0, 2.0]);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.read_all(), vec![3.0, 4.0]);
    }

    #[test]
    fn overflow_drops_oldest_samples() {
        let buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0, 4.0]);
        let dropped = buf.write(&[5.0, 6.0]);
        assert_eq!(dropped, 2);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.read_all(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn oversized_single_write_keeps_only_the_tail() {
        let buf = RingBuffer::new(4);
        let dropped = buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(dropped, 2);
        assert_eq!(buf.read_all(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn wraparound_preserves_order() {
        let buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0]);
        buf.read(2);
        buf.write(&[4.0, 5.0]);
        assert_eq!(buf.read_all(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn reset_discards_buffered_data() {
        let buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0]);
        buf.reset();
        assert!(buf.is_empty());
    }

    #[test]
    fn concurrent_writers_and_reader_never_panic() {
        use std::sync::Arc;
        use std::thread;

        let buf = Arc::new(RingBuffer::new(256));
        let mut handles = Vec::new();
        for t in 0..4 {
            let buf = buf.clone();
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    buf.write(&[(t * 1000 + i) as f32]);
                }
            }));
        }
        let reader_buf = buf.clone();
        let reader = thread::spawn(move || {
            let mut total = 0usize;
            for _ in 0..50 {
                total += reader_buf.read_all().len();
                thread::yield_now();
            }
            total
        });
        for h in handles {
            h.join().unwrap();
        }
        reader.join().unwrap();
    }
}
