//! A Harris-style lock-free ordered set of `usize` keys, protected by a
//! hazard-pointer reclamation domain.
//!
//! The crate has two halves:
//!
//! - [`Domain`]: per-thread hazard-pointer slot arrays plus per-thread retire
//!   lists. A thread publishes a pointer it is about to dereference, retires
//!   pointers it has unlinked, and the scan reclaims retirees no other thread
//!   protects. Two retire-list shapes exist with the same external contract:
//!   a bounded array ([`RetireArray`]) and a red-black index keyed by pointer
//!   value ([`RetireIndex`]).
//! - [`List`]: a sorted singly-linked set whose link words carry a logical
//!   deletion mark in the low bit. Traversals assist physical unlinking and
//!   hand unlinked nodes to the domain. Two find disciplines are provided;
//!   [`HList`] (window search over the array-form domain) and [`HMList`]
//!   (conservative search over the index-form domain) pin the supported
//!   pairings.
//!
//! All list operations are lock-free; the domain operations are wait-free.
//! Operations report outcomes as booleans and never surface errors.

mod domain;
mod list;
mod rbtree;
mod retire;
mod set;
mod stats;
mod tag;
mod tid;

pub use domain::{Deleter, Domain, Reclaimer, MAX_HPS, MAX_RETIRED};
pub use list::{HList, HMList, List, HP_CURR, HP_NEXT, HP_PREV, HP_START};
pub use rbtree::RetireIndex;
pub use retire::{RetireArray, RetireList};
pub use set::ConcurrentSet;
pub use stats::Counters;
pub use tid::{thread_id, MAX_THREADS};

pub use tag::{is_marked, marked, unmarked};
