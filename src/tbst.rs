//! Threaded binary search tree algorithms.
//!
//! A link that would be null in an ordinary BST instead holds a thread to the
//! in-order predecessor (left) or successor (right). Every tree has a head node
//! holding no key: its left link is the root (or a thread to itself when the tree is
//! empty) and its right link is a child link to itself. The leftmost and rightmost
//! nodes thread to the head, so in-order walks in either direction end there.
//!
//! All functions are written once and parameterised by [`Side`]. They work on refs
//! resolved through a [`NodeStore`], and do no allocation.

use crate::noderef::{Link, NodeRef, Side};
use crate::pool::NodeStore;
use std::cmp::Ordering;

type Ref<S, T> = NodeRef<<S as NodeStore<T>>::Index>;

#[inline]
fn link<T, S>(store: &S, p: Ref<S, T>, side: Side) -> Link<S::Index>
where
    S: NodeStore<T> + ?Sized,
{
    store.resolve(p).link(side)
}

#[inline]
fn set_link<T, S>(store: &mut S, p: Ref<S, T>, side: Side, l: Link<S::Index>)
where
    S: NodeStore<T> + ?Sized,
{
    store.resolve_mut(p).set_link(side, l);
}

/// Initialise a freshly popped node as the head of an empty tree.
pub fn init_head<T, S>(store: &mut S, head: Ref<S, T>)
where
    S: NodeStore<T> + ?Sized,
{
    set_link(store, head, Side::Left, Link::Thread(head));
    set_link(store, head, Side::Right, Link::Child(head));
}

/// Is the tree with this head empty?
pub fn is_empty<T, S>(store: &S, head: Ref<S, T>) -> bool
where
    S: NodeStore<T> + ?Sized,
{
    link(store, head, Side::Left).is_thread()
}

/// In-order neighbour of `p`: successor for [`Side::Right`], predecessor for [`Side::Left`].
///
/// From the head this gives the minimum (right) or maximum (left), and the head is
/// the neighbour past either end.
pub fn inorder<T, S>(store: &S, side: Side, p: Ref<S, T>) -> Ref<S, T>
where
    S: NodeStore<T> + ?Sized,
{
    let mut q = match link(store, p, side) {
        Link::Thread(q) => return q,
        Link::Child(q) => q,
    };
    let o = side.opposite();
    while let Link::Child(c) = link(store, q, o) {
        q = c;
    }
    q
}

/// Parent of the node [`inorder`] would return for the same arguments.
///
/// Returns `p` itself when the neighbour is `p`'s direct child, and the thread
/// target when `p`'s link on `side` is a thread.
pub fn inorder_parent<T, S>(store: &S, side: Side, p: Ref<S, T>) -> Ref<S, T>
where
    S: NodeStore<T> + ?Sized,
{
    let mut q = match link(store, p, side) {
        Link::Thread(q) => return q,
        Link::Child(q) => q,
    };
    let mut pq = p;
    let o = side.opposite();
    while let Link::Child(c) = link(store, q, o) {
        pq = q;
        q = c;
    }
    pq
}

/// Next node in preorder. Returns the head after the last node.
pub fn preorder_successor<T, S>(store: &S, p: Ref<S, T>) -> Ref<S, T>
where
    S: NodeStore<T> + ?Sized,
{
    if let Link::Child(c) = link(store, p, Side::Left) {
        return c;
    }
    if let Link::Child(c) = link(store, p, Side::Right) {
        return c;
    }
    // Leaf: climb successor threads until a node with a right subtree.
    let mut q = link(store, p, Side::Right).target();
    while let Link::Thread(t) = link(store, q, Side::Right) {
        q = t;
    }
    link(store, q, Side::Right).target()
}

/// Attach `q` as the `side` child of `p`.
///
/// `q` takes over whatever `p` had on that side, child or thread, and threads back
/// to `p` on the other side. If `q` inherited a subtree, the node of that subtree
/// which threaded to `p` is retargeted to `q`.
///
/// `q` must be vacant, as returned by [`NodeStore::pop`]: both links thread to itself.
pub fn attach_node<T, S>(store: &mut S, side: Side, p: Ref<S, T>, q: Ref<S, T>)
where
    S: NodeStore<T> + ?Sized,
{
    let o = side.opposite();
    safe_assert!(p != q, "attach_node: {q:?} attached to itself");
    safe_assert!(
        link(store, q, side) == Link::Thread(q) && link(store, q, o) == Link::Thread(q),
        "attach_node: {q:?} is already linked"
    );
    let inherited = link(store, p, side);
    set_link(store, q, side, inherited);
    set_link(store, q, o, Link::Thread(p));
    set_link(store, p, side, Link::Child(q));

    if !inherited.is_thread() {
        let qs = inorder(store, side, q);
        set_link(store, qs, o, Link::Thread(q));
    }
}

/// Detach `q`, a child of `pq`, from the tree and return it for recycling.
///
/// When `q` has two children its in-order neighbour on side `policy` is moved into
/// its place ([`Side::Right`] promotes the successor, [`Side::Left`] the
/// predecessor). The key of `q` is left untouched.
pub fn erase_node<T, S>(store: &mut S, policy: Side, pq: Ref<S, T>, q: Ref<S, T>) -> Ref<S, T>
where
    S: NodeStore<T> + ?Sized,
{
    safe_assert!(pq != q, "erase_node: parent and node are the same");
    let ps = if link(store, pq, Side::Left) == Link::Child(q) {
        Side::Left
    } else {
        Side::Right
    };
    safe_assert!(
        link(store, pq, ps) == Link::Child(q),
        "erase_node: {q:?} is not a child of {pq:?}"
    );

    let left = link(store, q, Side::Left);
    let right = link(store, q, Side::Right);
    match (left, right) {
        (Link::Child(_), Link::Child(_)) => {
            let i = policy;
            let o = i.opposite();
            // s replaces q, u is the parent of s.
            let s = inorder(store, i, q);
            let u = inorder_parent(store, i, q);
            // The neighbour on the other side threads to q.
            let p = inorder(store, o, q);

            if u != q {
                let surviving = match link(store, s, i) {
                    Link::Child(c) => Link::Child(c),
                    Link::Thread(_) => Link::Thread(s),
                };
                set_link(store, u, o, surviving);
                let qi = link(store, q, i);
                set_link(store, s, i, qi);
            }
            let qo = link(store, q, o);
            set_link(store, s, o, qo);
            set_link(store, p, i, Link::Thread(s));
            set_link(store, pq, ps, Link::Child(s));
        }
        (Link::Child(c), Link::Thread(t)) | (Link::Thread(t), Link::Child(c)) => {
            let cs = if left.is_thread() {
                Side::Right
            } else {
                Side::Left
            };
            let ts = cs.opposite();
            // The extreme of the child subtree threads to q.
            let m = inorder(store, cs, q);
            set_link(store, m, ts, Link::Thread(t));
            set_link(store, pq, ps, Link::Child(c));
        }
        (Link::Thread(_), Link::Thread(_)) => {
            let t = link(store, q, ps);
            set_link(store, pq, ps, t);
        }
    }
    q
}

/// Search from the head for a node whose key compares equal to `key`.
///
/// Returns `(node, parent)`, or `(head, head)` when there is no such node.
pub fn find_with_parent<T, S, Q, F>(
    store: &S,
    head: Ref<S, T>,
    key: &Q,
    mut comp: F,
) -> (Ref<S, T>, Ref<S, T>)
where
    S: NodeStore<T> + ?Sized,
    Q: ?Sized,
    F: FnMut(&Q, &T) -> Ordering,
{
    let mut u = head;
    let mut p = match link(store, head, Side::Left) {
        Link::Thread(_) => return (head, head),
        Link::Child(root) => root,
    };
    loop {
        let node = store.resolve(p);
        let Some(pk) = node.key() else {
            unreachable!("descent reached a node without a key")
        };
        let side = match comp(key, pk) {
            Ordering::Less => Side::Left,
            Ordering::Greater => Side::Right,
            Ordering::Equal => return (p, u),
        };
        match node.link(side) {
            Link::Child(c) => {
                u = p;
                p = c;
            }
            Link::Thread(_) => return (head, head),
        }
    }
}

/// Outcome of [`find_insert_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint<R> {
    /// A node with an equal key exists.
    Found(R),
    /// The key belongs on the given side of the given node, where there is a thread.
    Vacant(R, Side),
}

/// Descend from the head to where `key` is or would be attached.
pub fn find_insert_point<T, S, Q, F>(
    store: &S,
    head: Ref<S, T>,
    key: &Q,
    mut comp: F,
) -> InsertPoint<Ref<S, T>>
where
    S: NodeStore<T> + ?Sized,
    Q: ?Sized,
    F: FnMut(&Q, &T) -> Ordering,
{
    let mut p = match link(store, head, Side::Left) {
        Link::Thread(_) => return InsertPoint::Vacant(head, Side::Left),
        Link::Child(root) => root,
    };
    loop {
        let node = store.resolve(p);
        let Some(pk) = node.key() else {
            unreachable!("descent reached a node without a key")
        };
        let side = match comp(key, pk) {
            Ordering::Less => Side::Left,
            Ordering::Greater => Side::Right,
            Ordering::Equal => return InsertPoint::Found(p),
        };
        match node.link(side) {
            Link::Child(c) => p = c,
            Link::Thread(_) => return InsertPoint::Vacant(p, side),
        }
    }
}
