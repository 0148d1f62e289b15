/// Ordered set stored as a threaded binary search tree whose nodes live in a [`NodeStore`].
///
/// General guide to implementation:
///
/// The set owns its store, a comparator and the head node of the tree. The head is
/// popped from the store on first insertion, so an empty set allocates nothing.
/// Dropping the set pushes every node, the head last, back to the store.
///
/// Search and insertion descend from the root. Iteration, in both directions, only
/// follows [`tbst::inorder`], and removal is [`tbst::find_with_parent`] followed by
/// [`tbst::erase_node`] (promoting the successor), then the slot is pushed back.
///
/// The tree is not balanced. Keys inserted in sorted order give a degenerate tree.
pub struct Set<T, C = Natural, S = NodePool<T>>
where
    S: NodeStore<T>,
{
    store: S,
    head: Option<NodeRef<S::Index>>,
    comp: C,
    len: usize,
}

/// Total order over keys used by a [`Set`].
pub trait Compare<T: ?Sized> {
    /// Compare two keys.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Natural;

impl<T: Ord + ?Sized> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

impl<T, C, S> Default for Set<T, C, S>
where
    C: Compare<T> + Default,
    S: NodeStore<T> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

type Ref<S, T> = NodeRef<<S as NodeStore<T>>::Index>;

impl<T, C, S> Set<T, C, S>
where
    C: Compare<T>,
    S: NodeStore<T>,
{
    #[cfg(test)]
    pub(crate) fn check(&self) {
        let Some(head) = self.head else {
            assert_eq!(self.len, 0);
            return;
        };
        let st = &self.store;
        assert_eq!(st.resolve(head).link(Side::Right), Link::Child(head));

        // Walk the real children only, without using any thread.
        let mut order = Vec::new();
        let mut stack = Vec::new();
        let mut cur = st.resolve(head).link(Side::Left).child();
        while cur.is_some() || !stack.is_empty() {
            while let Some(c) = cur {
                stack.push(c);
                cur = st.resolve(c).link(Side::Left).child();
            }
            if let Some(n) = stack.pop() {
                order.push(n);
                cur = st.resolve(n).link(Side::Right).child();
            }
        }
        assert_eq!(order.len(), self.len);
        assert_eq!(tbst::is_empty(st, head), order.is_empty());

        for w in order.windows(2) {
            let (a, b) = (st.resolve(w[0]).key(), st.resolve(w[1]).key());
            let (Some(a), Some(b)) = (a, b) else {
                panic!("tree node without key")
            };
            assert_eq!(self.comp.compare(a, b), Ordering::Less);
        }

        for (k, &n) in order.iter().enumerate() {
            let prev = if k == 0 { head } else { order[k - 1] };
            let next = order.get(k + 1).copied().unwrap_or(head);
            if let Link::Thread(t) = st.resolve(n).link(Side::Left) {
                assert_eq!(t, prev, "bad predecessor thread at position {k}");
            }
            if let Link::Thread(t) = st.resolve(n).link(Side::Right) {
                assert_eq!(t, next, "bad successor thread at position {k}");
            }
            assert_eq!(tbst::inorder(st, Side::Left, n), prev);
            assert_eq!(tbst::inorder(st, Side::Right, n), next);
        }
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> Option<&T> {
        let head = self.head?;
        let root = self.store.resolve(head).link(Side::Left).child()?;
        self.store.resolve(root).key()
    }

    #[cfg(test)]
    pub(crate) fn preorder(&self) -> Vec<&T> {
        let mut keys = Vec::new();
        let Some(head) = self.head else {
            return keys;
        };
        let mut p = tbst::preorder_successor(&self.store, head);
        while p != head {
            keys.extend(self.store.resolve(p).key());
            p = tbst::preorder_successor(&self.store, p);
        }
        keys
    }

    /// Returns a new, empty set.
    #[must_use]
    pub fn new() -> Self
    where
        C: Default,
        S: Default,
    {
        Self::with_store(S::default(), C::default())
    }

    /// Returns a new, empty set ordered by `comp`.
    #[must_use]
    pub fn with_comparator(comp: C) -> Self
    where
        S: Default,
    {
        Self::with_store(S::default(), comp)
    }

    /// Returns a new, empty set using the given store and comparator.
    ///
    /// The set owns the store from then on, every node it holds is released when the
    /// set is cleared or dropped.
    #[must_use]
    pub fn with_store(store: S, comp: C) -> Self {
        Self {
            store,
            head: None,
            comp,
            len: 0,
        }
    }

    /// Get number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the set empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get reference to the store the nodes live in.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get reference to the comparator.
    #[must_use]
    pub fn comparator(&self) -> &C {
        &self.comp
    }

    fn head_or_init(&mut self) -> Result<Ref<S, T>, AllocationExhausted> {
        if let Some(head) = self.head {
            return Ok(head);
        }
        let head = self.store.pop()?;
        tbst::init_head(&mut self.store, head);
        self.head = Some(head);
        Ok(head)
    }

    fn locate(&mut self, key: &T) -> Result<InsertPoint<Ref<S, T>>, AllocationExhausted> {
        let head = self.head_or_init()?;
        let comp = &self.comp;
        Ok(tbst::find_insert_point(
            &self.store,
            head,
            key,
            |a: &T, b: &T| comp.compare(a, b),
        ))
    }

    fn attach(
        &mut self,
        p: Ref<S, T>,
        side: Side,
        key: T,
    ) -> Result<Ref<S, T>, AllocationExhausted> {
        let q = self.store.pop()?;
        self.store.resolve_mut(q).construct(key);
        tbst::attach_node(&mut self.store, side, p, q);
        self.len += 1;
        Ok(q)
    }

    fn key_of(&self, n: Ref<S, T>) -> &T {
        match self.store.resolve(n).key() {
            Some(k) => k,
            None => unreachable!("tree node without key"),
        }
    }

    /// Insert key into set unless an equal key is present. Returns the resident key
    /// and whether `key` was inserted.
    ///
    /// If an equal key is present the set is not modified, `key` is dropped and the
    /// key already in the set is returned.
    /// Returns an error if the store cannot supply a node.
    pub fn try_get_or_insert(&mut self, key: T) -> Result<(&T, bool), AllocationExhausted> {
        let (n, inserted) = match self.locate(&key)? {
            InsertPoint::Found(n) => (n, false),
            InsertPoint::Vacant(p, side) => (self.attach(p, side, key)?, true),
        };
        Ok((self.key_of(n), inserted))
    }

    /// Insert key into set unless an equal key is present, and get reference to the
    /// key in the set.
    ///
    /// Panics if the store cannot supply a node, see [`Set::try_get_or_insert`].
    pub fn get_or_insert(&mut self, key: T) -> &T {
        match self.try_get_or_insert(key) {
            Ok((k, _)) => k,
            Err(e) => panic!("{e}"),
        }
    }

    /// Insert key into set, returns false if an equal key was already present.
    ///
    /// If the key is present the set is not modified and `key` is dropped.
    /// Returns an error if the store cannot supply a node.
    pub fn try_insert(&mut self, key: T) -> Result<bool, AllocationExhausted> {
        self.try_get_or_insert(key).map(|(_, inserted)| inserted)
    }

    /// Insert key into set, returns false if an equal key was already present.
    ///
    /// Panics if the store cannot supply a node, see [`Set::try_insert`].
    pub fn insert(&mut self, key: T) -> bool {
        match self.try_insert(key) {
            Ok(inserted) => inserted,
            Err(e) => panic!("{e}"),
        }
    }

    /// Insert key into set, replacing an equal key if present. Returns the key that
    /// was replaced.
    ///
    /// Panics if the store cannot supply a node.
    pub fn replace(&mut self, key: T) -> Option<T> {
        let point = match self.locate(&key) {
            Ok(point) => point,
            Err(e) => panic!("{e}"),
        };
        match point {
            InsertPoint::Found(n) => self.store.resolve_mut(n).construct(key),
            InsertPoint::Vacant(p, side) => {
                if let Err(e) = self.attach(p, side, key) {
                    panic!("{e}");
                }
                None
            }
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<(Ref<S, T>, Ref<S, T>)>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let head = self.head?;
        let comp = &self.comp;
        let (n, p) = tbst::find_with_parent(&self.store, head, key, |a: &Q, b: &T| {
            <C as Compare<Q>>::compare(comp, a, <T as Borrow<Q>>::borrow(b))
        });
        if n == head {
            None
        } else {
            Some((n, p))
        }
    }

    /// Get reference to the key in the set equal to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (n, _) = self.find(key)?;
        self.store.resolve(n).key()
    }

    /// Does the set contain a key equal to `key`?
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.find(key).is_some()
    }

    /// Number of keys equal to `key`, either 0 or 1.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        usize::from(self.contains(key))
    }

    /// Remove and return the key equal to `key`.
    pub fn take<Q>(&mut self, key: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (n, p) = self.find(key)?;
        self.detach(p, n)
    }

    /// Remove the key equal to `key`, returns true if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.take(key).is_some()
    }

    /// Remove and return the key equal to `key`. If its node has two children, the
    /// in-order neighbour on side `policy` takes its place in the tree.
    pub fn take_promoting<Q>(&mut self, key: &Q, policy: Side) -> Option<T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (n, p) = self.find(key)?;
        self.detach_promoting(p, n, policy)
    }

    fn detach(&mut self, parent: Ref<S, T>, node: Ref<S, T>) -> Option<T> {
        self.detach_promoting(parent, node, Side::Right)
    }

    fn detach_promoting(&mut self, parent: Ref<S, T>, node: Ref<S, T>, policy: Side) -> Option<T> {
        let r = tbst::erase_node(&mut self.store, policy, parent, node);
        let key = self.store.resolve_mut(r).take_key();
        self.store.push(r);
        self.len -= 1;
        key
    }

    /// Smallest (side Left) or largest (side Right) node, with its parent.
    fn extreme_with_parent(&self, side: Side) -> Option<(Ref<S, T>, Ref<S, T>)> {
        let head = self.head?;
        let mut u = head;
        let mut p = self.store.resolve(head).link(Side::Left).child()?;
        while let Link::Child(c) = self.store.resolve(p).link(side) {
            u = p;
            p = c;
        }
        Some((p, u))
    }

    /// Get reference to the smallest key.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Get reference to the largest key.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.iter().next_back()
    }

    /// Remove and return the smallest key.
    pub fn pop_first(&mut self) -> Option<T> {
        let (n, p) = self.extreme_with_parent(Side::Left)?;
        self.detach(p, n)
    }

    /// Remove and return the largest key.
    pub fn pop_last(&mut self) -> Option<T> {
        let (n, p) = self.extreme_with_parent(Side::Right)?;
        self.detach(p, n)
    }

    /// Remove all keys. Every node goes back to the store, the head is kept.
    pub fn clear(&mut self) {
        self.release();
    }

    /// Get iterator of references to keys, in ascending order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T, S> {
        let ends = self.head.map(|head| {
            (
                tbst::inorder(&self.store, Side::Right, head),
                tbst::inorder(&self.store, Side::Left, head),
            )
        });
        Iter {
            store: &self.store,
            ends,
            len: self.len,
            _pd: PhantomData,
        }
    }

    /// Copy the set, reproducing the exact shape of the tree in a new store.
    ///
    /// Returns an error if the new store cannot supply enough nodes.
    pub fn try_clone(&self) -> Result<Self, AllocationExhausted>
    where
        T: Clone,
        C: Clone,
        S: Default,
    {
        let mut other = Self::with_store(S::default(), self.comp.clone());
        let Some(src_head) = self.head else {
            return Ok(other);
        };
        trace_log!(len = self.len, "Set: copy");
        let dst_head = other.head_or_init()?;
        let (src, dst) = (&self.store, &mut other.store);
        let (mut p, mut q) = (src_head, dst_head);
        loop {
            if src.resolve(p).link(Side::Left).child().is_some() {
                let t = dst.pop()?;
                tbst::attach_node(dst, Side::Left, q, t);
            }
            p = tbst::preorder_successor(src, p);
            q = tbst::preorder_successor(&*dst, q);
            if p == src_head {
                break;
            }
            if src.resolve(p).link(Side::Right).child().is_some() {
                let t = dst.pop()?;
                tbst::attach_node(dst, Side::Right, q, t);
            }
            if let Some(k) = src.resolve(p).key() {
                dst.resolve_mut(q).construct(k.clone());
            }
        }
        other.len = self.len;
        Ok(other)
    }
} // End impl Set

impl<T, C, S: NodeStore<T>> Set<T, C, S> {
    /// Push every key node back to the store and reset the head.
    fn release(&mut self) {
        let Some(head) = self.head else {
            return;
        };
        trace_log!(len = self.len, "Set: release nodes");
        let mut p = tbst::inorder(&self.store, Side::Right, head);
        while p != head {
            let q = tbst::inorder(&self.store, Side::Right, p);
            self.store.push(p);
            p = q;
        }
        tbst::init_head(&mut self.store, head);
        self.len = 0;
    }
}

impl<T, C, S: NodeStore<T>> Drop for Set<T, C, S> {
    fn drop(&mut self) {
        self.release();
        if let Some(head) = self.head.take() {
            self.store.push(head);
        }
    }
}

impl<T, C, S> Clone for Set<T, C, S>
where
    T: Clone,
    C: Compare<T> + Clone,
    S: NodeStore<T> + Default,
{
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(set) => set,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T, C, S> PartialEq for Set<T, C, S>
where
    T: PartialEq,
    C: Compare<T>,
    S: NodeStore<T>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}
impl<T: Eq, C: Compare<T>, S: NodeStore<T>> Eq for Set<T, C, S> {}

impl<T, C, S> PartialOrd for Set<T, C, S>
where
    T: PartialOrd,
    C: Compare<T>,
    S: NodeStore<T>,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}
impl<T: Ord, C: Compare<T>, S: NodeStore<T>> Ord for Set<T, C, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash, C: Compare<T>, S: NodeStore<T>> Hash for Set<T, C, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for elt in self {
            elt.hash(state);
        }
    }
}

impl<T: Debug, C: Compare<T>, S: NodeStore<T>> Debug for Set<T, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, C, S> FromIterator<T> for Set<T, C, S>
where
    C: Compare<T> + Default,
    S: NodeStore<T> + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Set::new();
        set.extend(iter);
        set
    }
}

impl<T, C, S, const M: usize> From<[T; M]> for Set<T, C, S>
where
    C: Compare<T> + Default,
    S: NodeStore<T> + Default,
{
    fn from(arr: [T; M]) -> Self {
        Self::from_iter(arr)
    }
}

impl<T, C, S> Extend<T> for Set<T, C, S>
where
    C: Compare<T>,
    S: NodeStore<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<'a, T, C, S> Extend<&'a T> for Set<T, C, S>
where
    T: Copy + 'a,
    C: Compare<T>,
    S: NodeStore<T>,
{
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        for &key in iter {
            self.insert(key);
        }
    }
}

impl<'a, T, C, S> IntoIterator for &'a Set<T, C, S>
where
    C: Compare<T>,
    S: NodeStore<T>,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, S>;
    fn into_iter(self) -> Iter<'a, T, S> {
        self.iter()
    }
}

impl<T, C, S> IntoIterator for Set<T, C, S>
where
    C: Compare<T>,
    S: NodeStore<T>,
{
    type Item = T;
    type IntoIter = IntoIter<T, C, S>;

    /// Convert `Set` to [`IntoIter`].
    fn into_iter(self) -> IntoIter<T, C, S> {
        let ends = self.head.map(|head| {
            (
                tbst::inorder(&self.store, Side::Right, head),
                tbst::inorder(&self.store, Side::Left, head),
            )
        });
        IntoIter {
            len: self.len,
            ends,
            set: self,
        }
    }
}

#[cfg(feature = "serde")]
use serde::{
    de::{SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize,
};

#[cfg(feature = "serde")]
impl<T, C, S> Serialize for Set<T, C, S>
where
    T: serde::Serialize,
    C: Compare<T>,
    S: NodeStore<T>,
{
    fn serialize<Z>(&self, serializer: Z) -> Result<Z::Ok, Z::Error>
    where
        Z: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for k in self {
            seq.serialize_element(k)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct SetVisitor<T, C, S> {
    marker: PhantomData<fn() -> (T, C, S)>,
}

#[cfg(feature = "serde")]
impl<'de, T, C, S> Visitor<'de> for SetVisitor<T, C, S>
where
    T: Deserialize<'de>,
    C: Compare<T> + Default,
    S: NodeStore<T> + Default,
{
    type Value = Set<T, C, S>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("Set")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut set = Set::new();
        while let Some(k) = access.next_element()? {
            set.try_insert(k)
                .map_err(<A::Error as serde::de::Error>::custom)?;
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, C, S> Deserialize<'de> for Set<T, C, S>
where
    T: Deserialize<'de>,
    C: Compare<T> + Default,
    S: NodeStore<T> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(SetVisitor {
            marker: PhantomData,
        })
    }
}

use crate::noderef::{Link, NodeRef, Side};
use crate::pool::{AllocationExhausted, NodePool, NodeStore};
use crate::tbst::{self, InsertPoint};
use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt,
    fmt::Debug,
    hash::{Hash, Hasher},
    iter::FusedIterator,
    marker::PhantomData,
};

/// Iterator returned by [`Set::iter`].
pub struct Iter<'a, T, S: NodeStore<T>> {
    store: &'a S,
    ends: Option<(Ref<S, T>, Ref<S, T>)>,
    len: usize,
    _pd: PhantomData<&'a T>,
}
impl<'a, T, S: NodeStore<T>> Iterator for Iter<'a, T, S> {
    type Item = &'a T;
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let (front, _) = self.ends.as_mut()?;
        let n = *front;
        *front = tbst::inorder(self.store, Side::Right, n);
        self.len -= 1;
        self.store.resolve(n).key()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
impl<'a, T, S: NodeStore<T>> DoubleEndedIterator for Iter<'a, T, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let (_, back) = self.ends.as_mut()?;
        let n = *back;
        *back = tbst::inorder(self.store, Side::Left, n);
        self.len -= 1;
        self.store.resolve(n).key()
    }
}
impl<'a, T, S: NodeStore<T>> ExactSizeIterator for Iter<'a, T, S> {
    fn len(&self) -> usize {
        self.len
    }
}
impl<'a, T, S: NodeStore<T>> FusedIterator for Iter<'a, T, S> {}
impl<'a, T, S: NodeStore<T>> Clone for Iter<'a, T, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            ends: self.ends,
            len: self.len,
            _pd: PhantomData,
        }
    }
}

/// Consuming iterator returned by [`Set::into_iter`].
///
/// Keys are moved out of the nodes without unlinking them, the nodes are released
/// when the iterator is dropped.
pub struct IntoIter<T, C, S: NodeStore<T>> {
    set: Set<T, C, S>,
    ends: Option<(Ref<S, T>, Ref<S, T>)>,
    len: usize,
}
impl<T, C, S: NodeStore<T>> Iterator for IntoIter<T, C, S> {
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let (front, _) = self.ends.as_mut()?;
        let n = *front;
        *front = tbst::inorder(&self.set.store, Side::Right, n);
        self.len -= 1;
        self.set.store.resolve_mut(n).take_key()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
impl<T, C, S: NodeStore<T>> DoubleEndedIterator for IntoIter<T, C, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let (_, back) = self.ends.as_mut()?;
        let n = *back;
        *back = tbst::inorder(&self.set.store, Side::Left, n);
        self.len -= 1;
        self.set.store.resolve_mut(n).take_key()
    }
}
impl<T, C, S: NodeStore<T>> ExactSizeIterator for IntoIter<T, C, S> {
    fn len(&self) -> usize {
        self.len
    }
}
impl<T, C, S: NodeStore<T>> FusedIterator for IntoIter<T, C, S> {}
