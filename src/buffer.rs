use core::cmp;

/// One fixed-capacity slot of a channel ring.
///
/// `limit` is the usable size chosen when the channel is created and never exceeds `N`. wpos
/// points to the first byte that can be written, rpos points at the next byte the consumer will
/// read.
///
/// invariants: 0 <= rpos <= wpos <= limit <= N
pub struct Buffer<const N: usize> {
    store: [u8; N],
    limit: usize,
    rpos: usize,
    wpos: usize,
}

impl<const N: usize> Buffer<N> {
    pub const fn new() -> Self {
        Self {
            store: [0; N],
            limit: N,
            rpos: 0,
            wpos: 0,
        }
    }

    /// Sets the usable size of the slot and clears it. `limit` is clamped to the capacity.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = cmp::min(limit, N);
        self.clear();
    }

    // Clears the buffer
    pub fn clear(&mut self) {
        self.rpos = 0;
        self.wpos = 0;
    }

    // Number of bytes written so far
    pub fn len(&self) -> usize {
        self.wpos
    }

    pub fn is_empty(&self) -> bool {
        self.wpos == 0
    }

    pub fn is_full(&self) -> bool {
        self.wpos == self.limit
    }

    // Amount of bytes available for reading
    pub fn available_read(&self) -> usize {
        self.wpos - self.rpos
    }

    // Amount of space in bytes available for writing
    pub fn available_write(&self) -> usize {
        self.limit - self.wpos
    }

    // Writes as much as possible of data to the buffer and returns the number of bytes written
    pub fn write(&mut self, data: &[u8]) -> usize {
        let count = cmp::min(self.available_write(), data.len());
        if count == 0 {
            return 0;
        }

        self.store[self.wpos..self.wpos + count].copy_from_slice(&data[..count]);

        self.wpos += count;
        count
    }

    /// Drops everything past the first `count` written bytes. Used when a commit forwards fewer
    /// bytes than were produced.
    pub fn truncate(&mut self, count: usize) {
        if count < self.wpos {
            self.wpos = count;
            self.rpos = cmp::min(self.rpos, count);
        }
    }

    // Takes up to max_count bytes from the buffer and passes a slice pointing to them to a closure
    // for reading. The closure should return the number of bytes actually read and is allowed to
    // read less than max_count. If the callback returns an error, the data is not discarded from
    // the buffer.
    pub fn read<E>(
        &mut self,
        max_count: usize,
        f: impl FnOnce(&[u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        let count = cmp::min(max_count, self.available_read());

        f(&self.store[self.rpos..self.rpos + count]).map(|count| {
            self.rpos += count;
            count
        })
    }
}

impl<const N: usize> Default for Buffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
