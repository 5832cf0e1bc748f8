//! Sorted lock-free singly-linked set with a low-bit deletion mark.
//!
//! Every link word packs the successor address and the logical-deletion mark.
//! A delete first marks the victim's own link (after which no traversal
//! reports the key), then makes one attempt to swing the predecessor past it;
//! traversals that run into marked nodes finish the unlinking cooperatively
//! and retire what they unlink into the owned hazard-pointer domain.

use core::mem;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use static_assertions::const_assert;

use crate::domain::Domain;
use crate::rbtree::RetireIndex;
use crate::retire::{RetireArray, RetireList};
use crate::stats::Counters;
use crate::tag::{is_marked, marked, unmarked, MARK};

/// Hazard slot naming shared by both find disciplines.
pub const HP_NEXT: usize = 0;
pub const HP_CURR: usize = 1;
pub const HP_PREV: usize = 2;
/// Origin of a window search; only the ordered discipline uses it.
pub const HP_START: usize = 3;

const NODE_MAGIC: u32 = 0xDEAD_BEAF;

#[repr(C)]
struct Node {
    magic: u32,
    /// Successor address with the deletion mark in the low bit.
    next: AtomicUsize,
    key: usize,
}

// The mark bit needs the low bit of every node address to be free.
const_assert!(mem::align_of::<Node>() >= 2);

fn new_node(key: usize) -> *mut Node {
    Box::into_raw(Box::new(Node {
        magic: NODE_MAGIC,
        next: AtomicUsize::new(0),
        key,
    }))
}

/// # Safety
///
/// `node` must come from [`new_node`] and must not be freed twice.
unsafe fn destroy_node(node: *mut Node) {
    let node = unsafe { Box::from_raw(node) };
    assert_eq!(node.magic, NODE_MAGIC, "freeing a corrupt or recycled node");
}

unsafe fn node_deleter(ptr: *mut u8) {
    unsafe { destroy_node(ptr as *mut Node) };
}

/// A search window: `prev` is the live node whose link names `curr`, `curr`
/// is the first candidate with key >= the search key (possibly the tail),
/// and `next` is `curr`'s link word as last read.
struct Cursor {
    prev: *mut Node,
    curr: usize,
    next: usize,
}

/// Sorted set of `usize` keys between two permanent sentinels (key 0 and key
/// `usize::MAX`). Real keys must lie strictly between the sentinel keys.
///
/// Both find disciplines are available; `max_hps` must cover the slots the
/// chosen discipline uses (3 for `michael_*`, 4 for `harris_*`). The
/// [`HList`] and [`HMList`] wrappers pin the intended pairings.
pub struct List<R: RetireList = RetireArray> {
    head: *mut Node,
    tail: *mut Node,
    hp: Domain<R>,
}

// The sentinels are immutable after construction and all shared mutation
// goes through the per-node atomics and the domain.
unsafe impl<R: RetireList + Send> Send for List<R> {}
unsafe impl<R: RetireList + Send> Sync for List<R> {}

impl<R: RetireList> List<R> {
    /// Creates an empty list owning a scan-on-every-retire domain with
    /// `max_hps` hazard slots per thread.
    pub fn new(max_hps: usize) -> Self {
        let hp = Domain::with_threshold(max_hps, 0, node_deleter);
        let tail = new_node(usize::MAX);
        let head = new_node(0);
        unsafe { (*head).next.store(tail as usize, Ordering::Relaxed) };
        hp.stats().node_created_inc();
        hp.stats().node_created_inc();
        Self { head, tail, hp }
    }

    /// Handle to the operation counters of the owned domain.
    pub fn counters(&self) -> Arc<Counters> {
        self.hp.counters()
    }

    fn alloc_node(&self, key: usize) -> *mut Node {
        self.hp.stats().node_created_inc();
        new_node(key)
    }

    unsafe fn destroy(&self, node: *mut Node) {
        unsafe { destroy_node(node) };
        self.hp.stats().node_destroyed_inc();
    }

    /// Conservative search from the head sentinel.
    ///
    /// Every publication is validated by re-reading its source; any
    /// inconsistency restarts the traversal. A marked successor is spliced
    /// out with a single predecessor CAS and retired on the spot.
    fn find_michael(&self, key: usize) -> (bool, Cursor) {
        let stats = self.hp.stats();
        'restart: loop {
            let mut prev = self.head;
            let mut curr = unsafe { &*prev }.next.load(Ordering::Acquire);
            loop {
                stats.traversal_inc();
                self.hp.protect(HP_CURR, curr);
                if unsafe { &*prev }.next.load(Ordering::SeqCst) != curr {
                    stats.abort_inc();
                    stats.restart_inc();
                    continue 'restart;
                }

                let curr_node = unsafe { &*(curr as *const Node) };
                let next = curr_node.next.load(Ordering::SeqCst);
                self.hp.protect(HP_NEXT, unmarked(next));
                if curr_node.next.load(Ordering::SeqCst) != next {
                    stats.abort_inc();
                    stats.restart_inc();
                    continue 'restart;
                }

                if is_marked(next) {
                    // curr is logically deleted: unlink it before moving on.
                    stats.cas_attempt_inc();
                    if unsafe { &*prev }
                        .next
                        .compare_exchange(curr, unmarked(next), Ordering::SeqCst, Ordering::SeqCst)
                        .is_err()
                    {
                        stats.restart_inc();
                        continue 'restart;
                    }
                    unsafe { self.hp.retire(curr as *mut u8) };
                    curr = unmarked(next);
                    continue;
                }

                if curr_node.key < key {
                    self.hp.protect_release(HP_PREV, curr);
                    prev = curr as *mut Node;
                    curr = next;
                } else {
                    return (curr_node.key == key, Cursor { prev, curr, next });
                }
            }
        }
    }

    /// Window search from `start` (the head sentinel or a predecessor kept
    /// alive through `HP_START` by the caller).
    ///
    /// Tracks the last live predecessor while walking over runs of marked
    /// nodes; a whole run is spliced out with one CAS and every skipped node
    /// is retired. Inconsistencies restart from `start`; `Err` reports that
    /// the origin itself is logically deleted and the caller must re-anchor.
    fn find_harris(&self, key: usize, start: *mut Node) -> Result<(bool, Cursor), ()> {
        let stats = self.hp.stats();
        'restart: loop {
            let first = unsafe { &*start }.next.load(Ordering::Acquire);
            if is_marked(first) {
                return Err(());
            }
            let mut prev = start;
            let mut curr = first;
            self.hp.protect(HP_CURR, curr);
            // First node of the marked run currently being walked over;
            // zero while the window is clean.
            let mut run_head: usize = 0;
            loop {
                stats.traversal_inc();
                let link = unsafe { &(*prev).next };
                let expected = if run_head == 0 { curr } else { run_head };
                if link.load(Ordering::SeqCst) != expected {
                    // Window changed, or the predecessor itself got marked.
                    stats.abort_inc();
                    stats.restart_inc();
                    continue 'restart;
                }

                let curr_node = unsafe { &*(curr as *const Node) };
                let next = curr_node.next.load(Ordering::SeqCst);
                self.hp.protect(HP_NEXT, unmarked(next));
                if curr_node.next.load(Ordering::SeqCst) != next {
                    stats.abort_inc();
                    stats.restart_inc();
                    continue 'restart;
                }

                if is_marked(next) {
                    if run_head == 0 {
                        run_head = curr;
                    }
                    self.hp.protect_release(HP_CURR, unmarked(next));
                    curr = unmarked(next);
                    continue;
                }

                if run_head != 0 {
                    // Splice the whole run [run_head, curr) with one CAS on
                    // the last live predecessor, then retire what it cut out.
                    stats.cas_attempt_inc();
                    if link
                        .compare_exchange(run_head, curr, Ordering::SeqCst, Ordering::SeqCst)
                        .is_err()
                    {
                        stats.restart_inc();
                        continue 'restart;
                    }
                    let mut node = run_head;
                    while node != curr {
                        let skipped = unsafe { &*(node as *const Node) };
                        let after = unmarked(skipped.next.load(Ordering::Relaxed));
                        unsafe { self.hp.retire(node as *mut u8) };
                        node = after;
                    }
                    run_head = 0;
                    continue;
                }

                if curr_node.key < key {
                    self.hp.protect_release(HP_PREV, curr);
                    prev = curr as *mut Node;
                    self.hp.protect_release(HP_CURR, next);
                    curr = next;
                } else {
                    return Ok((curr_node.key == key, Cursor { prev, curr, next }));
                }
            }
        }
    }

    /// Inserts `key` with the window discipline. Returns false if present.
    pub fn harris_insert(&self, key: usize) -> bool {
        assert_real_key(key);
        let stats = self.hp.stats();
        let node = self.alloc_node(key);
        let mut start = self.head;
        loop {
            let Ok((found, cursor)) = self.find_harris(key, start) else {
                start = self.head;
                continue;
            };
            if found {
                unsafe { self.destroy(node) };
                self.hp.clear();
                return false;
            }

            unsafe { &*node }.next.store(cursor.curr, Ordering::Relaxed);
            stats.cas_attempt_inc();
            match unsafe { &*cursor.prev }.next.compare_exchange(
                cursor.curr,
                node as usize,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.hp.clear();
                    return true;
                }
                Err(word) => {
                    stats.insert_retry_inc();
                    if is_marked(word) {
                        start = self.head;
                    } else {
                        // The predecessor is still live: resume from it.
                        self.hp.protect_release(HP_START, cursor.prev as usize);
                        start = cursor.prev;
                    }
                }
            }
        }
    }

    /// Deletes `key` with the window discipline. Returns false if absent.
    pub fn harris_remove(&self, key: usize) -> bool {
        assert_real_key(key);
        let stats = self.hp.stats();
        let mut start = self.head;
        loop {
            let Ok((found, cursor)) = self.find_harris(key, start) else {
                stats.delete_retry_inc();
                start = self.head;
                continue;
            };
            if !found {
                self.hp.clear();
                return false;
            }

            let curr_node = unsafe { &*(cursor.curr as *const Node) };
            let old = curr_node.next.fetch_or(MARK, Ordering::SeqCst);
            if is_marked(old) {
                // Another delete won; the key is gone either way.
                self.hp.clear();
                return true;
            }

            // One unlink attempt with the word the fetch_or returned; on
            // failure some traversal finishes the job.
            stats.cas_attempt_inc();
            if unsafe { &*cursor.prev }
                .next
                .compare_exchange(cursor.curr, unmarked(old), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.hp.clear();
                unsafe { self.hp.retire(cursor.curr as *mut u8) };
            } else {
                self.hp.clear();
            }
            return true;
        }
    }

    /// Whether `key` is present (window discipline).
    pub fn harris_contains(&self, key: usize) -> bool {
        assert_real_key(key);
        loop {
            if let Ok((found, _)) = self.find_harris(key, self.head) {
                self.hp.clear();
                return found;
            }
        }
    }

    /// Inserts `key` with the conservative discipline.
    pub fn michael_insert(&self, key: usize) -> bool {
        assert_real_key(key);
        let stats = self.hp.stats();
        let node = self.alloc_node(key);
        loop {
            let (found, cursor) = self.find_michael(key);
            if found {
                unsafe { self.destroy(node) };
                self.hp.clear();
                return false;
            }

            unsafe { &*node }.next.store(cursor.curr, Ordering::Relaxed);
            stats.cas_attempt_inc();
            if unsafe { &*cursor.prev }
                .next
                .compare_exchange(cursor.curr, node as usize, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.hp.clear();
                return true;
            }
            stats.insert_retry_inc();
        }
    }

    /// Deletes `key` with the conservative discipline.
    pub fn michael_remove(&self, key: usize) -> bool {
        assert_real_key(key);
        let stats = self.hp.stats();
        loop {
            let (found, cursor) = self.find_michael(key);
            if !found {
                self.hp.clear();
                return false;
            }

            let curr_node = unsafe { &*(cursor.curr as *const Node) };
            stats.cas_attempt_inc();
            match curr_node.next.compare_exchange(
                cursor.next,
                marked(cursor.next),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {}
                Err(word) if is_marked(word) => {
                    // Another delete won the race.
                    self.hp.clear();
                    return true;
                }
                Err(_) => {
                    stats.delete_retry_inc();
                    continue;
                }
            }

            stats.cas_attempt_inc();
            if unsafe { &*cursor.prev }
                .next
                .compare_exchange(cursor.curr, cursor.next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.hp.clear();
                unsafe { self.hp.retire(cursor.curr as *mut u8) };
            } else {
                self.hp.clear();
            }
            return true;
        }
    }

    /// Whether `key` is present (conservative discipline).
    pub fn michael_contains(&self, key: usize) -> bool {
        assert_real_key(key);
        let (found, _) = self.find_michael(key);
        self.hp.clear();
        found
    }
}

impl<R: RetireList> Drop for List<R> {
    fn drop(&mut self) {
        // Exclusive access: free the whole chain, sentinels included. The
        // owned domain reclaims the retired backlog when it drops after us.
        let mut curr = self.head;
        while !curr.is_null() {
            let next = unmarked(unsafe { &*curr }.next.load(Ordering::Relaxed));
            unsafe { self.destroy(curr) };
            curr = next as *mut Node;
        }
    }
}

#[inline]
fn assert_real_key(key: usize) {
    debug_assert!(key != 0 && key != usize::MAX, "key collides with a sentinel");
}

/// Ordered set: window search paired with the array-form retire list.
pub struct HList {
    inner: List<RetireArray>,
}

impl HList {
    pub fn new() -> Self {
        Self { inner: List::new(4) }
    }

    pub fn insert(&self, key: usize) -> bool {
        self.inner.harris_insert(key)
    }

    pub fn remove(&self, key: usize) -> bool {
        self.inner.harris_remove(key)
    }

    pub fn contains(&self, key: usize) -> bool {
        self.inner.harris_contains(key)
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.inner.counters()
    }
}

impl Default for HList {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered set: conservative search paired with the red-black retire index.
pub struct HMList {
    inner: List<RetireIndex>,
}

impl HMList {
    pub fn new() -> Self {
        Self { inner: List::new(3) }
    }

    pub fn insert(&self, key: usize) -> bool {
        self.inner.michael_insert(key)
    }

    pub fn remove(&self, key: usize) -> bool {
        self.inner.michael_remove(key)
    }

    pub fn contains(&self, key: usize) -> bool {
        self.inner.michael_contains(key)
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.inner.counters()
    }
}

impl Default for HMList {
    fn default() -> Self {
        Self::new()
    }
}
