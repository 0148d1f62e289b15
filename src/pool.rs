//! Slab pool of tree nodes.
//!
//! Nodes are kept in boxed slabs of `N` slots each. A slot is addressed by a flat
//! index, slab `index / N`, offset `index % N`. Free slots form a singly linked
//! stack threaded through the slots themselves. Slabs are appended when the stack
//! runs dry and are never moved or released until the pool is dropped, so a ref
//! (and any address derived from it) stays valid for the pool's whole lifetime.

use crate::noderef::{Link, NodeRef, PoolId, Side, SlotIndex};
use crate::DS;
use std::{error::Error, fmt};

/// A tree node: the key and the two links.
///
/// A freshly popped node has no key. The head node of a tree never gets one.
#[derive(Debug)]
pub struct Node<T, I> {
    link: [Link<I>; 2],
    key: Option<T>,
}

impl<T, I: SlotIndex> Node<T, I> {
    fn vacant(me: NodeRef<I>) -> Self {
        Self {
            link: [Link::Thread(me), Link::Thread(me)],
            key: None,
        }
    }

    /// Get the link on the specified side.
    #[inline]
    #[must_use]
    pub fn link(&self, side: Side) -> Link<I> {
        self.link[side.ix()]
    }

    /// Set the link on the specified side.
    #[inline]
    pub fn set_link(&mut self, side: Side, link: Link<I>) {
        self.link[side.ix()] = link;
    }

    /// Get reference to the key, `None` for a head node or a node not yet constructed.
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&T> {
        self.key.as_ref()
    }

    /// Construct key in the node, returning any previous key.
    pub fn construct(&mut self, key: T) -> Option<T> {
        self.key.replace(key)
    }

    /// Move the key out of the node.
    pub fn take_key(&mut self) -> Option<T> {
        self.key.take()
    }
}

/// Error returned when a pool cannot grow any further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationExhausted {
    /// Number of slabs the pool had when growth failed.
    pub blocks: usize,
    /// Why growth failed.
    pub reason: ExhaustedReason,
}

/// Cause of [`AllocationExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedReason {
    /// The next slab would contain indices the index type cannot represent.
    IndexOverflow,
    /// The system allocator refused the slab.
    OutOfMemory,
}

impl fmt::Display for AllocationExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            ExhaustedReason::IndexOverflow => write!(
                f,
                "node pool exhausted: index type cannot address slab {}",
                self.blocks
            ),
            ExhaustedReason::OutOfMemory => write!(
                f,
                "node pool exhausted: allocation of slab {} failed",
                self.blocks
            ),
        }
    }
}

impl Error for AllocationExhausted {}

/// Storage the tree algorithms work against.
pub trait NodeStore<T> {
    /// Slot index type.
    type Index: SlotIndex;

    /// Take a slot off the free list, growing the store if necessary.
    ///
    /// The returned node has no key, and both its links are threads to itself.
    fn pop(&mut self) -> Result<NodeRef<Self::Index>, AllocationExhausted>;

    /// Return a slot to the free list. Any key still in the node is dropped.
    ///
    /// The ref must have been returned by [`NodeStore::pop`] and not pushed since.
    fn push(&mut self, node: NodeRef<Self::Index>);

    /// Get reference to a live node.
    fn resolve(&self, node: NodeRef<Self::Index>) -> &Node<T, Self::Index>;

    /// Get mutable reference to a live node.
    fn resolve_mut(&mut self, node: NodeRef<Self::Index>) -> &mut Node<T, Self::Index>;

    /// Number of slabs allocated.
    fn block_count(&self) -> usize;
}

enum Slot<T, I> {
    Free { next: I },
    Live(Node<T, I>),
}

type Slab<T, I> = Box<[Slot<T, I>]>;

/// Pool of tree nodes with slab capacity `N` (a power of two, at least 2) and slot
/// index type `I`.
pub struct NodePool<T, I = u32, const N: usize = DS> {
    id: PoolId,
    free: I,
    live: usize,
    slabs: Vec<Slab<T, I>>,
}

impl<T, I: SlotIndex, const N: usize> Default for NodePool<T, I, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I: SlotIndex, const N: usize> NodePool<T, I, N> {
    /// This should produce a compile-time error if N is not a power of two >= 2.
    const CHECK_N: () = assert!(N >= 2 && N.is_power_of_two());

    /// Returns a new, empty pool. No slab is allocated until the first pop.
    #[must_use]
    pub fn new() -> Self {
        let () = Self::CHECK_N;
        Self {
            id: PoolId::next(),
            free: I::NULL,
            live: 0,
            slabs: Vec::new(),
        }
    }

    /// Identity of the pool.
    #[must_use]
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Number of slabs allocated.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.slabs.len()
    }

    /// Number of slots currently popped and not yet pushed back.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Number of slots that can be handed out without growing, plus the live ones.
    #[must_use]
    pub fn capacity(&self) -> usize {
        // Slot zero of the first slab is reserved.
        (self.slabs.len() * N).saturating_sub(1)
    }

    /// Is the slot a live node?
    #[must_use]
    pub fn is_live(&self, node: NodeRef<I>) -> bool {
        let i = node.index().to_usize();
        node.pool() == self.id
            && i != 0
            && i / N < self.slabs.len()
            && matches!(self.slabs[i / N][i % N], Slot::Live(_))
    }

    /// Get the ref for a raw index of this pool.
    #[must_use]
    pub fn node_ref(&self, index: I) -> NodeRef<I> {
        NodeRef::new(self.id, index)
    }

    /// Take a free slot, appending a slab when there is none.
    pub fn pop(&mut self) -> Result<NodeRef<I>, AllocationExhausted> {
        if self.free == I::NULL {
            self.grow()?;
        }
        let i = self.free;
        let me = self.node_ref(i);
        let slot = self.slot_mut(i);
        let next = match slot {
            Slot::Free { next } => *next,
            Slot::Live(_) => panic!("NodePool: free list reached live slot {i:?}"),
        };
        *slot = Slot::Live(Node::vacant(me));
        self.free = next;
        self.live += 1;
        Ok(me)
    }

    /// Put a slot back on the free list.
    pub fn push(&mut self, node: NodeRef<I>) {
        safe_assert!(node.pool() == self.id, "NodePool: ref from another pool");
        safe_assert!(!node.is_null(), "NodePool: pushing the null ref");
        let i = node.index();
        let next = self.free;
        let slot = self.slot_mut(i);
        safe_assert!(
            matches!(slot, Slot::Live(_)),
            "NodePool: slot {i:?} pushed twice"
        );
        *slot = Slot::Free { next };
        self.free = i;
        self.live -= 1;
    }

    /// Get reference to a live node.
    #[must_use]
    pub fn resolve(&self, node: NodeRef<I>) -> &Node<T, I> {
        safe_assert!(node.pool() == self.id, "NodePool: ref from another pool");
        let i = node.index().to_usize();
        match &self.slabs[i / N][i % N] {
            Slot::Live(n) => n,
            Slot::Free { .. } => panic!("NodePool: slot {i} is not in use"),
        }
    }

    /// Get mutable reference to a live node.
    pub fn resolve_mut(&mut self, node: NodeRef<I>) -> &mut Node<T, I> {
        safe_assert!(node.pool() == self.id, "NodePool: ref from another pool");
        let i = node.index().to_usize();
        match &mut self.slabs[i / N][i % N] {
            Slot::Live(n) => n,
            Slot::Free { .. } => panic!("NodePool: slot {i} is not in use"),
        }
    }

    fn slot_mut(&mut self, i: I) -> &mut Slot<T, I> {
        let i = i.to_usize();
        &mut self.slabs[i / N][i % N]
    }

    /// Append a slab and make its slots the free list.
    ///
    /// In the first slab slot 0 is skipped, it stands for the null index. The lowest
    /// usable slot of each slab terminates the list.
    fn grow(&mut self) -> Result<(), AllocationExhausted> {
        let blocks = self.slabs.len();
        let exhausted = |reason| {
            warn_log!(blocks, ?reason, "NodePool: cannot grow");
            AllocationExhausted { blocks, reason }
        };
        let base = blocks
            .checked_mul(N)
            .ok_or_else(|| exhausted(ExhaustedReason::IndexOverflow))?;
        let top = base
            .checked_add(N - 1)
            .and_then(I::from_usize)
            .ok_or_else(|| exhausted(ExhaustedReason::IndexOverflow))?;

        self.slabs
            .try_reserve(1)
            .map_err(|_| exhausted(ExhaustedReason::OutOfMemory))?;
        let mut slab = Vec::new();
        slab.try_reserve_exact(N)
            .map_err(|_| exhausted(ExhaustedReason::OutOfMemory))?;
        for off in 0..N {
            let next = match off {
                0 => I::NULL,
                // Cannot fail, base + off <= top.
                _ => I::from_usize(base + off - 1).unwrap_or(I::NULL),
            };
            slab.push(Slot::Free { next });
        }
        self.slabs.push(slab.into_boxed_slice());
        self.free = top;
        debug_log!(pool = self.id.as_u32(), blocks = blocks + 1, "NodePool: appended slab");
        Ok(())
    }
}

impl<T, I: SlotIndex, const N: usize> NodeStore<T> for NodePool<T, I, N> {
    type Index = I;

    fn pop(&mut self) -> Result<NodeRef<I>, AllocationExhausted> {
        NodePool::pop(self)
    }

    fn push(&mut self, node: NodeRef<I>) {
        NodePool::push(self, node);
    }

    fn resolve(&self, node: NodeRef<I>) -> &Node<T, I> {
        NodePool::resolve(self, node)
    }

    fn resolve_mut(&mut self, node: NodeRef<I>) -> &mut Node<T, I> {
        NodePool::resolve_mut(self, node)
    }

    fn block_count(&self) -> usize {
        NodePool::block_count(self)
    }
}

impl<T, I: SlotIndex, const N: usize> fmt::Debug for NodePool<T, I, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("id", &self.id)
            .field("slab_size", &N)
            .field("blocks", &self.slabs.len())
            .field("live", &self.live)
            .field("free_head", &self.free)
            .finish()
    }
}
