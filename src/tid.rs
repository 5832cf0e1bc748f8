use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Maximum number of threads a domain can track.
pub const MAX_THREADS: usize = 128;

const TID_UNKNOWN: usize = usize::MAX;

static NEXT_TID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static TID: Cell<usize> = Cell::new(TID_UNKNOWN);
}

/// Dense identity of the calling thread in `0..MAX_THREADS`.
///
/// The first call by a thread reserves its id for the lifetime of the
/// process; ids are never recycled. Wait-free population oblivious.
#[inline]
pub fn thread_id() -> usize {
    TID.with(|tid| {
        let mut v = tid.get();
        if v == TID_UNKNOWN {
            v = NEXT_TID.fetch_add(1, Ordering::Relaxed);
            assert!(v < MAX_THREADS, "too many threads");
            tid.set(v);
        }
        v
    })
}
