#![deny(missing_docs)]

//! This crate implements an ordered [Set] as a threaded binary search tree, with the tree
//! nodes kept in a slab pool rather than allocated one by one.
//!
//! A threaded tree stores, in each link that would otherwise be null, a thread to the
//! in-order predecessor or successor, so iteration in either direction needs neither
//! parent pointers nor a stack. The nodes live in fixed size slabs owned by a
//! [Pool]; they are addressed by a [NodeRef] (pool identity and slot index) and freed
//! slots are recycled through a free list, never returned to the system allocator.
//!
//! The tree is not balanced.
//!
//! Most of the implementation is in the [tbst] module (tree algorithms) and the [pool]
//! module (node storage); see [set::Set] for the container built on them.
//!
//! # Example
//!
//! ```
//!     use slabtree::Set;
//!     let mut s = Set::new();
//!     s.insert("London");
//!     s.insert("Paris");
//!     s.insert("Berlin");
//!     assert!(s.contains(&"Paris"));
//!     assert_eq!(s.iter().copied().collect::<Vec<_>>(), ["Berlin", "London", "Paris"]);
//! ```
//!
//!# Features
//!
//! This crate supports the following cargo features:
//! - `serde` : enables serialisation of [Set] via serde crate.
//! - `unsafe-optim` : disables precondition assertions in release builds.
//! - `tracing` : logs pool growth and exhaustion via the tracing crate.

#[macro_use]
mod macros;

pub mod noderef;

pub mod pool;

pub mod tbst;

/// Module with version of Set that allows the comparator and node store to be specified.
pub mod set;

pub use noderef::{Link, NodeRef, PoolId, Side, SlotIndex};
pub use pool::{AllocationExhausted, ExhaustedReason, Node, NodeStore};
pub use set::{Compare, Natural};

/// Default slab size (number of node slots per slab).
pub const DS: usize = 256;

/// Node pool with default index type and slab size [DS].
pub type Pool<T> = pool::NodePool<T, u32, DS>;

/// Set with natural key order whose nodes live in a [Pool].
pub type Set<T> = set::Set<T, Natural, Pool<T>>;

/// Iterator returned by [set::Set::iter].
pub type Iter<'a, T> = set::Iter<'a, T, Pool<T>>;

/// Consuming iterator returned by [set::Set::into_iter].
pub type IntoIter<T> = set::IntoIter<T, Natural, Pool<T>>;

// Tests.

/* mimalloc cannot be used with miri */
#[cfg(all(test, not(miri)))]
use mimalloc::MiMalloc;

#[cfg(all(test, not(miri)))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;


#[cfg(test)]
mod proptests;
