//! Wraparound-aware ordering of 16-bit RTP sequence numbers (RFC 3550 §A.1).
//!
//! RTP sequence numbers increment by one per packet and wrap modulo 2^16.
//! Two values are ordered by the shorter way around the circle:
//!
//! ```text
//!   a == b             -> Equal
//!   |a - b| <  0x8000  -> numerically larger is after
//!   |a - b| >= 0x8000  -> numerically smaller is after (it has wrapped)
//! ```
//!
//! This is a total order **only** over a set of values spanning fewer
//! than 2^15 sequence numbers. Callers must uphold that precondition;
//! it is not checked. Comparing values further apart yields an
//! arbitrary but deterministic answer.

use std::cmp::Ordering;

const HALF_RANGE: u16 = 1 << 15;

/// Compare two sequence numbers, accounting for wraparound.
#[inline]
pub fn compare(a: u16, b: u16) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let diff = a.abs_diff(b);
    if diff < HALF_RANGE {
        a.cmp(&b)
    } else {
        b.cmp(&a)
    }
}

/// `a` comes strictly after `b`.
#[inline]
pub fn is_after(a: u16, b: u16) -> bool {
    compare(a, b) == Ordering::Greater
}

/// `a` comes strictly before `b`.
#[inline]
pub fn is_before(a: u16, b: u16) -> bool {
    compare(a, b) == Ordering::Less
}

/// Number of steps from `first` forward to `last`, modulo 2^16.
#[inline]
pub fn span(first: u16, last: u16) -> u16 {
    last.wrapping_sub(first)
}

/// Iterate `first..=last` in wrapping order.
pub fn range_inclusive(first: u16, last: u16) -> impl Iterator<Item = u16> {
    (0..=span(first, last) as u32).map(move |i| first.wrapping_add(i as u16))
}
