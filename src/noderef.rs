//! Handles used to address nodes stored in a [`NodePool`](crate::pool::NodePool).

use std::{
    fmt,
    fmt::Debug,
    hash::Hash,
    sync::atomic::{AtomicU32, Ordering},
};

/// Unsigned integer type used for slot indices.
///
/// Index zero is never handed out by a pool, it is the universal "no node" value.
pub trait SlotIndex: Copy + Eq + Ord + Hash + Debug {
    /// The null index.
    const NULL: Self;

    /// Convert from `usize`, `None` if the value is not representable.
    fn from_usize(i: usize) -> Option<Self>;

    /// Convert to `usize`.
    fn to_usize(self) -> usize;
}

macro_rules! impl_slot_index {
    ( $($t: ty),* ) => {
        $(
            impl SlotIndex for $t {
                const NULL: Self = 0;

                #[inline]
                fn from_usize(i: usize) -> Option<Self> {
                    Self::try_from(i).ok()
                }

                #[inline]
                fn to_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_slot_index!(u8, u16, u32, u64, usize);

/// Identity of a pool, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u32);

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

impl PoolId {
    pub(crate) fn next() -> Self {
        PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Reference to a slot in a pool: the pool identity plus the slot index.
///
/// A `NodeRef` does not own the slot. After the slot has been returned to the pool
/// every copy of the ref is stale and must not be resolved.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef<I> {
    pool: PoolId,
    index: I,
}

impl<I: SlotIndex> NodeRef<I> {
    pub(crate) fn new(pool: PoolId, index: I) -> Self {
        Self { pool, index }
    }

    /// The null ref of the given pool.
    #[must_use]
    pub fn null(pool: PoolId) -> Self {
        Self::new(pool, I::NULL)
    }

    /// Is this the null ref?
    #[must_use]
    pub fn is_null(self) -> bool {
        self.index == I::NULL
    }

    /// Slot index.
    #[must_use]
    pub fn index(self) -> I {
        self.index
    }

    /// Identity of the pool the slot belongs to.
    #[must_use]
    pub fn pool(self) -> PoolId {
        self.pool
    }
}

impl<I: Debug> Debug for NodeRef<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({}:{:?})", self.pool.0, self.index)
    }
}

/// Side of a node. Left leads to smaller keys and the in-order predecessor, right to
/// larger keys and the in-order successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Left child or predecessor thread.
    Left = 0,
    /// Right child or successor thread.
    Right = 1,
}

impl Side {
    /// The other side.
    #[inline]
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    #[inline]
    pub(crate) fn ix(self) -> usize {
        self as usize
    }
}

/// One of the two links of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link<I> {
    /// A real child in the tree.
    Child(NodeRef<I>),
    /// In-order predecessor (left) or successor (right).
    Thread(NodeRef<I>),
}

impl<I: SlotIndex> Link<I> {
    /// The node linked to, whatever the kind of link.
    #[inline]
    #[must_use]
    pub fn target(self) -> NodeRef<I> {
        match self {
            Link::Child(r) | Link::Thread(r) => r,
        }
    }

    /// Is this link a thread?
    #[inline]
    #[must_use]
    pub fn is_thread(self) -> bool {
        matches!(self, Link::Thread(_))
    }

    /// The child, if this link is a real child.
    #[inline]
    #[must_use]
    pub fn child(self) -> Option<NodeRef<I>> {
        match self {
            Link::Child(r) => Some(r),
            Link::Thread(_) => None,
        }
    }
}
