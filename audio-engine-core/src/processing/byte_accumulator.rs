use std::collections::VecDeque;

/// FIFO of PCM bytes between the relay queue and the device buffer.
///
/// Unlike a capture ring buffer this never drops data: audio that was
/// produced must be played. Capacity is reserved up front so the device
/// callback does not allocate in the common case; it only grows when a
/// single frame is larger than anything seen before.
#[derive(Debug)]
pub struct ByteAccumulator {
    buffer: VecDeque<u8>,
}

impl ByteAccumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Append bytes to the back.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().copied());
    }

    /// Move up to `out.len()` bytes from the front into `out`.
    ///
    /// Returns the number of bytes copied.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let to_copy = out.len().min(self.buffer.len());
        if to_copy == 0 {
            return 0;
        }

        let (front, back) = self.buffer.as_slices();
        let from_front = to_copy.min(front.len());
        out[..from_front].copy_from_slice(&front[..from_front]);
        let from_back = to_copy - from_front;
        out[from_front..to_copy].copy_from_slice(&back[..from_back]);

        self.buffer.drain(..to_copy);
        to_copy
    }

    /// Number of bytes available.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_drain() {
        let mut acc = ByteAccumulator::with_capacity(8);
        acc.push(&[1, 2, 3]);

        let mut out = [0u8; 3];
        assert_eq!(acc.drain_into(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert!(acc.is_empty());
    }

    #[test]
    fn drain_partial() {
        let mut acc = ByteAccumulator::with_capacity(8);
        acc.push(&[1, 2, 3, 4, 5]);

        let mut out = [0u8; 2];
        assert_eq!(acc.drain_into(&mut out), 2);
        assert_eq!(out, [1, 2]);
        assert_eq!(acc.len(), 3);

        let mut rest = [0u8; 10]; // request more than available
        assert_eq!(acc.drain_into(&mut rest), 3);
        assert_eq!(&rest[..3], &[3, 4, 5]);
    }

    #[test]
    fn grows_instead_of_dropping() {
        let mut acc = ByteAccumulator::with_capacity(2);
        acc.push(&[1, 2, 3, 4]);
        acc.push(&[5, 6]);

        let mut out = [0u8; 6];
        assert_eq!(acc.drain_into(&mut out), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn wraparound() {
        let mut acc = ByteAccumulator::with_capacity(4);
        acc.push(&[1, 2, 3]);
        let mut skip = [0u8; 2];
        acc.drain_into(&mut skip);

        acc.push(&[4, 5, 6]);

        let mut out = [0u8; 4];
        assert_eq!(acc.drain_into(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn empty_operations() {
        let mut acc = ByteAccumulator::with_capacity(4);
        let mut out = [9u8; 4];
        assert_eq!(acc.drain_into(&mut out), 0);
        assert_eq!(out, [9u8; 4]);

        acc.push(&[]);
        assert!(acc.is_empty());
    }
}
