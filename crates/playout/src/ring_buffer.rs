//! Fixed-capacity single-producer/single-consumer sample ring buffer.
//!
//! The buffer is byte-addressed but counted in *samples*: every sample is
//! `sample_bytes` bytes wide (one interleaved sample-frame), and all counts
//! passed to or returned from the API are sample counts.
//!
//! ## Roles
//! - The driver domain is the only caller of [`RingBuffer::write`] and
//!   [`RingBuffer::write_capacity`].
//! - The real-time callback is the only caller of [`RingBuffer::read`] and
//!   [`RingBuffer::read_capacity`].
//!
//! Each cursor is owned by one side and published with release ordering, so
//! neither side ever waits on the other. Storage is a slice of atomic bytes,
//! which keeps the buffer free of `unsafe` even if the role split is broken;
//! broken roles corrupt audio, never memory.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Largest supported depth: `1 << MAX_POWER` samples.
pub const MAX_POWER: u32 = 24;

/// Lock-free SPSC ring of fixed-width samples.
pub struct RingBuffer {
    data: Box<[AtomicU8]>,
    sample_bytes: usize,
    /// Capacity in samples; always a power of two.
    capacity: usize,
    mask: usize,
    /// Total samples ever written (wrapping). Owned by the producer.
    write_pos: AtomicUsize,
    /// Total samples ever read (wrapping). Owned by the consumer.
    read_pos: AtomicUsize,
}

impl RingBuffer {
    /// Create a buffer holding `1 << power` samples of `sample_bytes` bytes each.
    ///
    /// `power` is clamped to [`MAX_POWER`].
    pub fn new(sample_bytes: usize, power: u32) -> Self {
        let sample_bytes = sample_bytes.max(1);
        let capacity = 1usize << power.min(MAX_POWER);
        let data = (0..capacity * sample_bytes)
            .map(|_| AtomicU8::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            data,
            sample_bytes,
            capacity,
            mask: capacity - 1,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity * self.sample_bytes
    }

    /// Width of one sample in bytes.
    pub fn sample_bytes(&self) -> usize {
        self.sample_bytes
    }

    /// Samples that can currently be written without overwriting unread data.
    pub fn write_capacity(&self) -> usize {
        let read = self.read_pos.load(Ordering::Acquire);
        let write = self.write_pos.load(Ordering::Acquire);
        self.capacity
            .saturating_sub(write.wrapping_sub(read).min(self.capacity))
    }

    /// Samples currently available to read.
    pub fn read_capacity(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read).min(self.capacity)
    }

    /// Copy up to `count` samples from `src` into the buffer.
    ///
    /// `count` must not exceed [`write_capacity`](Self::write_capacity) or the
    /// number of whole samples in `src`. Returns the number of samples
    /// written, which is less than `count` only when that contract is broken.
    pub fn write(&self, src: &[u8], count: usize) -> usize {
        let count = count
            .min(self.write_capacity())
            .min(src.len() / self.sample_bytes);
        if count == 0 {
            return 0;
        }

        let write = self.write_pos.load(Ordering::Relaxed);
        let bytes = &src[..count * self.sample_bytes];
        let (head, tail) = self.split_at_wrap(write, bytes.len());
        for (slot, b) in self.data[head.0..head.1].iter().zip(&bytes[..head.1 - head.0]) {
            slot.store(*b, Ordering::Relaxed);
        }
        for (slot, b) in self.data[..tail].iter().zip(&bytes[head.1 - head.0..]) {
            slot.store(*b, Ordering::Relaxed);
        }

        self.write_pos
            .store(write.wrapping_add(count), Ordering::Release);
        count
    }

    /// Copy up to `count` samples out of the buffer into `dst`.
    ///
    /// Returns the number of samples read; fewer than requested is normal and
    /// means only that many were available (or fit in `dst`).
    pub fn read(&self, dst: &mut [u8], count: usize) -> usize {
        let count = count
            .min(self.read_capacity())
            .min(dst.len() / self.sample_bytes);
        if count == 0 {
            return 0;
        }

        let read = self.read_pos.load(Ordering::Relaxed);
        let bytes = &mut dst[..count * self.sample_bytes];
        let (head, tail) = self.split_at_wrap(read, bytes.len());
        let head_len = head.1 - head.0;
        for (b, slot) in bytes[..head_len].iter_mut().zip(&self.data[head.0..head.1]) {
            *b = slot.load(Ordering::Relaxed);
        }
        for (b, slot) in bytes[head_len..].iter_mut().zip(&self.data[..tail]) {
            *b = slot.load(Ordering::Relaxed);
        }

        self.read_pos
            .store(read.wrapping_add(count), Ordering::Release);
        count
    }

    /// Discard all buffered samples and reset both cursors.
    ///
    /// Only valid while no read or write is in flight: callers stop the
    /// hardware stream first.
    pub fn flush(&self) {
        self.read_pos.store(0, Ordering::Release);
        self.write_pos.store(0, Ordering::Release);
    }

    /// Byte range from the cursor to the physical end of storage, plus the
    /// number of bytes that wrap around to the start.
    fn split_at_wrap(&self, pos: usize, len: usize) -> ((usize, usize), usize) {
        let start = (pos & self.mask) * self.sample_bytes;
        let end = (start + len).min(self.data.len());
        ((start, end), len - (end - start))
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("sample_bytes", &self.sample_bytes)
            .field("capacity", &self.capacity)
            .field("read_capacity", &self.read_capacity())
            .finish()
    }
}
