//! Fixed-capacity byte buffer with an explicit fill/drain state machine.
//!
//! A `ByteBuffer` is the unit of I/O for a connection: inbound bytes are
//! filled from the socket and drained into the parser, outbound bytes are
//! filled from a serialized response and drained to the socket. The storage
//! is allocated once and never grows; running out of room is an error the
//! caller must handle by draining or compacting first.

/// Which operation the buffer currently permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Freshly created; the first fill or drain picks the direction.
    Idle,
    /// Accepting bytes at the write position.
    Filling,
    /// Yielding bytes from the read position.
    Draining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// No free capacity remains and the source still has bytes.
    Overflow,
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Overflow => write!(f, "buffer capacity exhausted"),
        }
    }
}

impl std::error::Error for BufferError {}

/// Fixed-capacity byte storage.
///
/// Bytes between the read position and the write position are valid unread
/// content. `flip` is the only way to switch between filling and draining.
pub struct ByteBuffer {
    storage: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
    state: BufferState,
}

impl ByteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
            state: BufferState::Idle,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Number of valid unread bytes.
    pub fn remaining(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Free space available for filling at the write position.
    pub fn free(&self) -> usize {
        self.storage.len() - self.write_pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread region, without consuming it.
    pub fn unread(&self) -> &[u8] {
        &self.storage[self.read_pos..self.write_pos]
    }

    /// Appends as many bytes of `src` as fit at the write position.
    ///
    /// Returns the count appended, which may be less than `src.len()`.
    /// Filling zero bytes is a no-op returning 0. Fails only when free
    /// capacity is zero while `src` still has data.
    pub fn fill(&mut self, src: &[u8]) -> Result<usize, BufferError> {
        self.enter_filling();
        if src.is_empty() {
            return Ok(0);
        }
        let free = self.free();
        if free == 0 {
            return Err(BufferError::Overflow);
        }
        let n = free.min(src.len());
        self.storage[self.write_pos..self.write_pos + n].copy_from_slice(&src[..n]);
        self.write_pos += n;
        Ok(n)
    }

    /// Fills from a byte-producing function handed the free-capacity slice.
    ///
    /// This is the readiness-I/O entry point: a non-blocking read writes
    /// straight into the buffer. The function's return value is the number
    /// of bytes produced. If no free capacity remains the function is not
    /// called and 0 is returned; callers check `free()` before reading.
    pub fn fill_with<E>(
        &mut self,
        f: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        self.enter_filling();
        if self.free() == 0 {
            return Ok(0);
        }
        let n = f(&mut self.storage[self.write_pos..])?;
        debug_assert!(n <= self.storage.len() - self.write_pos);
        self.write_pos += n;
        Ok(n)
    }

    /// Switches between filling and draining.
    ///
    /// Unread bytes survive the flip. Flipping an exhausted buffer back to
    /// filling resets both positions so the full capacity is writable again.
    pub fn flip(&mut self) {
        self.state = match self.state {
            BufferState::Idle | BufferState::Filling => BufferState::Draining,
            BufferState::Draining => {
                if self.read_pos == self.write_pos {
                    self.read_pos = 0;
                    self.write_pos = 0;
                }
                BufferState::Filling
            }
        };
    }

    /// Consumes up to `n` unread bytes, returning them in fill order.
    ///
    /// Draining an empty buffer yields an empty slice, not an error.
    pub fn drain(&mut self, n: usize) -> &[u8] {
        self.enter_draining();
        let start = self.read_pos;
        let end = self.read_pos.saturating_add(n).min(self.write_pos);
        self.read_pos = end;
        &self.storage[start..end]
    }

    /// Repeatedly offers the unread region to `sink`, consuming whatever it
    /// reports. Stops when the sink consumes zero bytes or the buffer is
    /// exhausted. Returns the total consumed.
    pub fn drain_to<E>(
        &mut self,
        mut sink: impl FnMut(&[u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        self.enter_draining();
        let mut total = 0;
        while self.read_pos < self.write_pos {
            let consumed = sink(&self.storage[self.read_pos..self.write_pos])?;
            if consumed == 0 {
                break;
            }
            assert!(
                consumed <= self.write_pos - self.read_pos,
                "sink consumed more than it was offered"
            );
            self.read_pos += consumed;
            total += consumed;
        }
        Ok(total)
    }

    /// Shifts unread bytes to the start of storage and resets positions,
    /// reclaiming consumed space as fill room. Idempotent.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        let len = self.remaining();
        self.storage.copy_within(self.read_pos..self.write_pos, 0);
        self.read_pos = 0;
        self.write_pos = len;
    }

    fn enter_filling(&mut self) {
        match self.state {
            BufferState::Draining => panic!("fill on a draining buffer, flip first"),
            _ => self.state = BufferState::Filling,
        }
    }

    fn enter_draining(&mut self) {
        match self.state {
            BufferState::Filling => panic!("drain on a filling buffer, flip first"),
            _ => self.state = BufferState::Draining,
        }
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("capacity", &self.storage.len())
            .field("read_pos", &self.read_pos)
            .field("write_pos", &self.write_pos)
            .field("state", &self.state)
            .finish()
    }
}
