//! Cursor over the decoded frame currently being fed into the ring buffer.
//!
//! A frame is one decode step's worth of interleaved sample bytes. The cursor
//! owns the frame and a byte offset into it, and keeps one invariant: the
//! frame is empty exactly when the cursor is finished. Advancing to the end
//! clears the frame, and replacing the frame always resets the offset.

/// Owned frame plus read offset.
#[derive(Debug, Default)]
pub struct FrameCursor {
    frame: Vec<u8>,
    offset: usize,
}

impl FrameCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every byte of the current frame has been consumed.
    ///
    /// An empty frame is a finished one.
    pub fn is_finished(&self) -> bool {
        self.offset >= self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Replace the frame with a freshly decoded one, rewinding to its start.
    pub fn replace(&mut self, frame: Vec<u8>) {
        self.frame = frame;
        self.offset = 0;
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.frame[self.offset.min(self.frame.len())..]
    }

    /// Consume `bytes` bytes; clears the frame once it is exhausted.
    pub fn advance(&mut self, bytes: usize) {
        self.offset = self.offset.saturating_add(bytes);
        if self.is_finished() {
            self.clear();
        }
    }

    /// Drop the frame and any unconsumed bytes.
    pub fn clear(&mut self) {
        self.frame = Vec::new();
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(c: &FrameCursor) {
        assert_eq!(c.is_empty(), c.is_finished());
    }

    #[test]
    fn new_cursor_is_finished() {
        let c = FrameCursor::new();
        assert!(c.is_finished());
        assert!(c.remaining().is_empty());
        assert_invariant(&c);
    }

    #[test]
    fn partial_advance_keeps_frame() {
        let mut c = FrameCursor::new();
        c.replace(vec![1, 2, 3, 4]);
        c.advance(3);
        assert!(!c.is_finished());
        assert_eq!(c.remaining(), &[4]);
        assert_invariant(&c);
    }

    #[test]
    fn exact_advance_clears_frame() {
        let mut c = FrameCursor::new();
        c.replace(vec![1, 2, 3, 4]);
        c.advance(2);
        c.advance(2);
        assert!(c.is_finished());
        assert!(c.is_empty());
        assert_invariant(&c);
    }

    #[test]
    fn replace_rewinds() {
        let mut c = FrameCursor::new();
        c.replace(vec![1, 2]);
        c.advance(1);
        c.replace(vec![7, 8, 9]);
        assert_eq!(c.remaining(), &[7, 8, 9]);
    }

    #[test]
    fn replacing_with_empty_frame_stays_finished() {
        let mut c = FrameCursor::new();
        c.replace(Vec::new());
        assert!(c.is_finished());
        assert_invariant(&c);
    }
}
