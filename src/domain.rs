use core::cell::UnsafeCell;
use core::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::retire::{RetireArray, RetireList};
use crate::stats::Counters;
use crate::tid::{thread_id, MAX_THREADS};

/// Per-thread hazard slot count bound and default ('K' in the HP paper).
pub const MAX_HPS: usize = 5;

/// Per-thread retire capacity. Twice the classical `T * K` bound so the
/// default scan threshold has headroom before the capacity assertion fires.
pub const MAX_RETIRED: usize = 2 * MAX_THREADS * MAX_HPS;

/// Frees one retired object. Must not call back into the list or the domain.
pub type Deleter = unsafe fn(*mut u8);

type SlotArray = CachePadded<[AtomicUsize; MAX_HPS]>;

/// A hazard-pointer domain: one cache-padded slot array and one private
/// retire list per potential thread.
///
/// A thread announces "I am about to dereference this pointer" by publishing
/// its address into one of its slots; the publication only counts once the
/// thread has re-read the shared source and confirmed it still names the
/// pointer. Unlinked objects are handed to [`Domain::retire`]; a scan frees
/// every retiree that no thread currently publishes.
pub struct Domain<R: RetireList = RetireArray> {
    max_hps: usize,
    threshold: usize,
    slots: Box<[SlotArray]>,
    retired: Box<[CachePadded<UnsafeCell<R>>]>,
    deleter: Deleter,
    counters: Arc<Counters>,
}

// The slot arrays are shared by design (single writer, many readers). Each
// retire cell is touched only by the thread whose id indexes it, and by
// `drop`, which owns the domain exclusively.
unsafe impl<R: RetireList + Send> Send for Domain<R> {}
unsafe impl<R: RetireList + Send> Sync for Domain<R> {}

impl<R: RetireList> Domain<R> {
    /// Creates a domain with `max_hps` slots per thread (0 selects the
    /// default [`MAX_HPS`]) and the classical `MAX_THREADS * max_hps` scan
    /// threshold. `deleter` frees a retired pointer once it is proven
    /// unprotected.
    pub fn new(max_hps: usize, deleter: Deleter) -> Self {
        let max_hps = if max_hps == 0 { MAX_HPS } else { max_hps };
        Self::with_threshold(max_hps, MAX_THREADS * max_hps, deleter)
    }

    /// Creates a domain that scans whenever a thread's retire list reaches
    /// `threshold` entries. Threshold 0 scans on every retire.
    pub fn with_threshold(max_hps: usize, threshold: usize, deleter: Deleter) -> Self {
        let max_hps = if max_hps == 0 { MAX_HPS } else { max_hps };
        assert!(max_hps <= MAX_HPS, "slot count above MAX_HPS");
        assert!(threshold < MAX_RETIRED, "scan threshold above retire capacity");
        Self {
            max_hps,
            threshold,
            slots: (0..MAX_THREADS)
                .map(|_| CachePadded::new(core::array::from_fn(|_| AtomicUsize::new(0))))
                .collect(),
            retired: (0..MAX_THREADS)
                .map(|_| CachePadded::new(UnsafeCell::new(R::new())))
                .collect(),
            deleter,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Slots available to each thread.
    pub fn max_hps(&self) -> usize {
        self.max_hps
    }

    /// Handle to this domain's operation counters.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    pub(crate) fn stats(&self) -> &Counters {
        &self.counters
    }

    /// Publishes `ptr` into slot `slot` of the calling thread and returns it.
    ///
    /// The caller must follow up by re-reading the shared location `ptr` was
    /// loaded from (after a seq-cst fence; see [`Reclaimer`]) and retry if it
    /// no longer names `ptr`. Wait-free population oblivious.
    #[inline]
    pub fn protect(&self, slot: usize, ptr: usize) -> usize {
        debug_assert!(slot < self.max_hps);
        self.slots[thread_id()][slot].store(ptr, Ordering::SeqCst);
        ptr
    }

    /// Same as [`Domain::protect`] but with release ordering only.
    ///
    /// Sound solely for moving a pointer between two slots of the calling
    /// thread while the old slot still protects it (scanners observe at least
    /// one of the two publications).
    #[inline]
    pub fn protect_release(&self, slot: usize, ptr: usize) -> usize {
        debug_assert!(slot < self.max_hps);
        self.slots[thread_id()][slot].store(ptr, Ordering::Release);
        ptr
    }

    /// Clears every slot of the calling thread. Wait-free, bounded by the
    /// slot count.
    pub fn clear(&self) {
        let tid = thread_id();
        for slot in &self.slots[tid][..self.max_hps] {
            slot.store(0, Ordering::Release);
        }
    }

    /// Hands an unlinked pointer to the calling thread's retire list and
    /// scans once the list has reached the domain threshold.
    ///
    /// # Safety
    ///
    /// `ptr` must be unreachable for new traversals (physically unlinked),
    /// retired at most once, and compatible with the domain's deleter.
    pub unsafe fn retire(&self, ptr: *mut u8) {
        let tid = thread_id();
        let retired = unsafe { &mut *self.retired[tid].get() };
        retired.retire(ptr);
        assert!(retired.len() <= MAX_RETIRED, "retire capacity exceeded");

        if retired.len() < self.threshold {
            return;
        }
        fence(Ordering::SeqCst);
        unsafe { retired.scan(tid, &self.reclaimer()) };
    }

    fn reclaimer(&self) -> Reclaimer<'_> {
        Reclaimer {
            slots: &self.slots,
            max_hps: self.max_hps,
            deleter: self.deleter,
            counters: &self.counters,
        }
    }
}

impl<R: RetireList> Drop for Domain<R> {
    fn drop(&mut self) {
        // No mutator can still be active: dropping requires exclusivity.
        let reclaimer = self.reclaimer();
        for cell in self.retired.iter() {
            unsafe { (*cell.get()).drain(&reclaimer) };
        }
    }
}

/// Scan-side view of a domain: the published slots and the deleter.
pub struct Reclaimer<'d> {
    slots: &'d [SlotArray],
    max_hps: usize,
    deleter: Deleter,
    counters: &'d Counters,
}

impl Reclaimer<'_> {
    /// Whether any thread currently publishes `ptr` in any slot.
    pub fn is_protected(&self, ptr: *mut u8) -> bool {
        let addr = ptr as usize;
        self.slots
            .iter()
            .any(|slots| slots[..self.max_hps].iter().any(|s| s.load(Ordering::Acquire) == addr))
    }

    /// Every non-zero value published by threads other than `skip_tid`.
    pub fn published(&self, skip_tid: usize) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(tid, _)| *tid != skip_tid)
            .flat_map(move |(_, slots)| {
                slots[..self.max_hps].iter().map(|s| s.load(Ordering::Acquire))
            })
            .filter(|&v| v != 0)
    }

    /// Frees a retiree through the domain deleter.
    ///
    /// # Safety
    ///
    /// `ptr` must be a retired pointer that no thread protects, reclaimed
    /// exactly once.
    pub unsafe fn reclaim(&self, ptr: *mut u8) {
        unsafe { (self.deleter)(ptr) };
        self.counters.node_destroyed_inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbtree::RetireIndex;
    use core::sync::atomic::AtomicBool;
    use std::thread::scope;

    unsafe fn free_box(ptr: *mut u8) {
        drop(unsafe { Box::from_raw(ptr as *mut u64) });
    }

    fn new_block() -> *mut u8 {
        Box::into_raw(Box::new(0u64)) as *mut u8
    }

    #[test]
    fn zero_selects_default_slot_count() {
        let hp = Domain::<RetireArray>::new(0, free_box);
        assert_eq!(hp.max_hps(), MAX_HPS);
    }

    #[test]
    #[cfg(feature = "stats")]
    fn unprotected_retiree_is_reclaimed_at_once() {
        let hp = Domain::<RetireArray>::with_threshold(2, 0, free_box);
        unsafe { hp.retire(new_block()) };
        assert_eq!(hp.counters().nodes_destroyed(), 1);
    }

    #[test]
    #[cfg(feature = "stats")]
    fn protection_defers_reclamation() {
        let hp = Domain::<RetireArray>::with_threshold(2, 0, free_box);
        let ptr = new_block();
        hp.protect(0, ptr as usize);
        unsafe { hp.retire(ptr) };
        // The array-form scan probes every thread, the caller included.
        assert_eq!(hp.counters().nodes_destroyed(), 0);

        hp.clear();
        unsafe { hp.retire(new_block()) };
        assert_eq!(hp.counters().nodes_destroyed(), 2);
    }

    #[test]
    #[cfg(feature = "stats")]
    fn threshold_batches_scans() {
        let hp = Domain::<RetireArray>::with_threshold(2, 4, free_box);
        for _ in 0..3 {
            unsafe { hp.retire(new_block()) };
        }
        assert_eq!(hp.counters().nodes_destroyed(), 0);
        unsafe { hp.retire(new_block()) };
        assert_eq!(hp.counters().nodes_destroyed(), 4);
    }

    #[test]
    #[cfg(feature = "stats")]
    fn indexed_scan_skips_own_slots() {
        let hp = Domain::<RetireIndex>::with_threshold(2, 0, free_box);
        let ptr = new_block();
        hp.protect(0, ptr as usize);
        unsafe { hp.retire(ptr) };
        // Own publications do not count: the caller promised not to use the
        // pointer after retiring it.
        assert_eq!(hp.counters().nodes_destroyed(), 1);
        hp.clear();
    }

    #[test]
    #[cfg(feature = "stats")]
    fn indexed_scan_honors_other_threads() {
        let hp = Domain::<RetireIndex>::with_threshold(2, 0, free_box);
        let ptr = new_block();
        let addr = ptr as usize;
        let published = AtomicBool::new(false);
        let release = AtomicBool::new(false);

        scope(|s| {
            s.spawn(|| {
                hp.protect(0, addr);
                published.store(true, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    std::hint::spin_loop();
                }
                hp.clear();
            });

            while !published.load(Ordering::SeqCst) {
                std::hint::spin_loop();
            }
            unsafe { hp.retire(ptr) };
            assert_eq!(hp.counters().nodes_destroyed(), 0);
            release.store(true, Ordering::SeqCst);
        });

        // The protector is gone; the next scan frees both retirees.
        unsafe { hp.retire(new_block()) };
        assert_eq!(hp.counters().nodes_destroyed(), 2);
    }

    #[test]
    #[cfg(feature = "stats")]
    fn drop_reclaims_the_backlog() {
        let hp = Domain::<RetireArray>::with_threshold(2, MAX_RETIRED - 1, free_box);
        let counters = hp.counters();
        for _ in 0..5 {
            unsafe { hp.retire(new_block()) };
        }
        assert_eq!(counters.nodes_destroyed(), 0);
        drop(hp);
        assert_eq!(counters.nodes_destroyed(), 5);
    }
}
