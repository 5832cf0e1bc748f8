use arrayvec::ArrayVec;

use crate::domain::{Reclaimer, MAX_RETIRED};

/// A thread-private container of retired pointers.
///
/// Both shapes share the contract: `retire` is O(1)-ish bookkeeping, and
/// `scan` reclaims every member that no thread currently publishes.
pub trait RetireList {
    fn new() -> Self;

    /// Appends a retired pointer.
    fn retire(&mut self, ptr: *mut u8);

    /// Number of pointers currently retired and not yet reclaimed.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reclaims every member that no thread publishes. `tid` is the calling
    /// thread's identity.
    ///
    /// # Safety
    ///
    /// Must run on the thread owning this list, after a seq-cst fence.
    unsafe fn scan(&mut self, tid: usize, reclaimer: &Reclaimer<'_>);

    /// Tears the list down, reclaiming every remaining member.
    ///
    /// # Safety
    ///
    /// No mutator may be active in the owning domain.
    unsafe fn drain(&mut self, reclaimer: &Reclaimer<'_>);
}

/// Bounded dense array of retired pointers.
///
/// The scan is O(retired * threads * slots): it probes every slot for every
/// retiree and compacts reclaimed entries out.
pub struct RetireArray {
    list: ArrayVec<*mut u8, MAX_RETIRED>,
}

// Retired pointers are owned by this list until reclaimed; the list moves
// between threads only wholesale (domain teardown).
unsafe impl Send for RetireArray {}

impl RetireList for RetireArray {
    fn new() -> Self {
        Self { list: ArrayVec::new() }
    }

    fn retire(&mut self, ptr: *mut u8) {
        self.list.push(ptr);
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    unsafe fn scan(&mut self, _tid: usize, reclaimer: &Reclaimer<'_>) {
        self.list.retain(|&mut ptr| {
            if reclaimer.is_protected(ptr) {
                true
            } else {
                unsafe { reclaimer.reclaim(ptr) };
                false
            }
        });
    }

    unsafe fn drain(&mut self, reclaimer: &Reclaimer<'_>) {
        for ptr in self.list.drain(..) {
            unsafe { reclaimer.reclaim(ptr) };
        }
    }
}
