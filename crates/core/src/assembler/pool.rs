/// Reusable payload buffer for one packet of an in-progress frame.
///
/// A fragment is owned by exactly one of the [`FragmentPool`] or the
/// assembler's window at any time.
#[derive(Debug, Default)]
pub struct Fragment {
    seq: u16,
    data: Vec<u8>,
}

impl Fragment {
    pub fn seq(&self) -> u16 {
        self.seq
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrite the contents with `payload`, keeping the allocation.
    pub fn fill(&mut self, seq: u16, payload: &[u8]) {
        self.seq = seq;
        self.data.clear();
        self.data.extend_from_slice(payload);
    }
}

/// Bounded free list of [`Fragment`] buffers.
///
/// Avoids a heap allocation per received packet: buffers released after a
/// frame is emitted or dropped are handed out again by
/// [`acquire`](Self::acquire). Fragments released while the pool already
/// holds `capacity` buffers are dropped.
#[derive(Debug)]
pub struct FragmentPool {
    free: Vec<Fragment>,
    capacity: usize,
}

impl FragmentPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Pop a free fragment, or allocate one if the pool is empty.
    pub fn acquire(&mut self) -> Fragment {
        self.free.pop().unwrap_or_default()
    }

    /// Return a fragment for reuse.
    pub fn release(&mut self, mut fragment: Fragment) {
        if self.free.len() < self.capacity {
            fragment.data.clear();
            self.free.push(fragment);
        }
    }

    /// Number of fragments ready for reuse.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
