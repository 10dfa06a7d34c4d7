use super::pool::Fragment;
use crate::seq;

/// Fixed-capacity circular store of fragments indexed by `seq mod capacity`.
///
/// Lookups and inserts are O(1). Ordering comes from walking the wrapping
/// range `[first, last]`, so the held span must stay below
/// [`capacity`](Self::capacity); the assembler enforces that before
/// calling [`insert`](Self::insert).
#[derive(Debug)]
pub struct FragmentWindow {
    slots: Vec<Option<Fragment>>,
    mask: usize,
    len: usize,
}

impl FragmentWindow {
    /// `capacity` is rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(2, 1 << 15).next_power_of_two();
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            mask: capacity - 1,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn index(&self, seq: u16) -> usize {
        seq as usize & self.mask
    }

    pub fn contains(&self, seq: u16) -> bool {
        self.slots[self.index(seq)]
            .as_ref()
            .is_some_and(|f| f.seq() == seq)
    }

    /// Store a fragment. Returns whatever occupied its slot before.
    pub fn insert(&mut self, fragment: Fragment) -> Option<Fragment> {
        let idx = self.index(fragment.seq());
        let displaced = self.slots[idx].replace(fragment);
        if displaced.is_none() {
            self.len += 1;
        }
        displaced
    }

    pub fn take(&mut self, seq: u16) -> Option<Fragment> {
        let idx = self.index(seq);
        match &self.slots[idx] {
            Some(f) if f.seq() == seq => {
                self.len -= 1;
                self.slots[idx].take()
            }
            _ => None,
        }
    }

    /// Every sequence number in `[first, last]` is present.
    pub fn is_contiguous(&self, first: u16, last: u16) -> bool {
        seq::range_inclusive(first, last).all(|s| self.contains(s))
    }

    /// Remove the fragments of `[first, last]` in ascending order.
    pub fn drain_range(&mut self, first: u16, last: u16) -> impl Iterator<Item = Fragment> + '_ {
        seq::range_inclusive(first, last).filter_map(move |s| self.take(s))
    }
}
