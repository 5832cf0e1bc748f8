//! Per-domain operation counters.
//!
//! Enabled by the `stats` feature; without it every increment site compiles
//! to a no-op. Counters are monotonic and are never read on the fast path.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "stats")] {
        use core::sync::atomic::{AtomicU64, Ordering};

        /// Monotonic counters describing the work a domain and its list did.
        #[derive(Debug, Default)]
        pub struct Counters {
            restarts: AtomicU64,
            aborts: AtomicU64,
            traversals: AtomicU64,
            cas_attempts: AtomicU64,
            delete_retries: AtomicU64,
            insert_retries: AtomicU64,
            nodes_created: AtomicU64,
            nodes_destroyed: AtomicU64,
        }

        macro_rules! counter {
            ($inc:ident, $field:ident) => {
                #[inline]
                pub(crate) fn $inc(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }

                #[doc = concat!("Current value of the `", stringify!($field), "` counter.")]
                pub fn $field(&self) -> u64 {
                    self.$field.load(Ordering::Relaxed)
                }
            };
        }

        impl Counters {
            counter!(restart_inc, restarts);
            counter!(abort_inc, aborts);
            counter!(traversal_inc, traversals);
            counter!(cas_attempt_inc, cas_attempts);
            counter!(delete_retry_inc, delete_retries);
            counter!(insert_retry_inc, insert_retries);
            counter!(node_created_inc, nodes_created);
            counter!(node_destroyed_inc, nodes_destroyed);
        }
    } else {
        /// Counter stub compiled when the `stats` feature is off.
        #[derive(Debug, Default)]
        pub struct Counters;

        impl Counters {
            #[inline]
            pub(crate) fn restart_inc(&self) {}
            #[inline]
            pub(crate) fn abort_inc(&self) {}
            #[inline]
            pub(crate) fn traversal_inc(&self) {}
            #[inline]
            pub(crate) fn cas_attempt_inc(&self) {}
            #[inline]
            pub(crate) fn delete_retry_inc(&self) {}
            #[inline]
            pub(crate) fn insert_retry_inc(&self) {}
            #[inline]
            pub(crate) fn node_created_inc(&self) {}
            #[inline]
            pub(crate) fn node_destroyed_inc(&self) {}
        }
    }
}
