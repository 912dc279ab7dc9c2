//! Nodes and the exclusively owned chain hanging off the head slot.

use std::alloc::{self, Layout};

pub(crate) type Link<T> = Option<Box<Node<T>>>;

pub(crate) struct Node<T> {
    value: T,
    next: Link<T>,
}

impl<T> Node<T> {
    /// Allocate a detached node, handing `value` back if the allocator
    /// has no memory.
    pub(crate) fn try_new(value: T) -> Result<Box<Self>, T> {
        #[cfg(any(test, feature = "alloc-fault"))]
        if alloc_fault::take() {
            return Err(value);
        }

        let layout = Layout::new::<Self>();
        debug_assert!(layout.size() > 0, "a node always carries a link");

        // SAFETY: `layout` has non-zero size because `Node` holds a `Link`.
        let ptr = unsafe { alloc::alloc(layout) }.cast::<Self>();
        if ptr.is_null() {
            return Err(value);
        }

        // SAFETY: `ptr` is non-null, aligned for `Self` and valid for writes.
        // It was obtained from the global allocator with `Layout::new::<Self>()`,
        // which is exactly what `Box<Self>` frees with.
        unsafe {
            ptr.write(Node { value, next: None });
            Ok(Box::from_raw(ptr))
        }
    }
}

/// Forced node allocation failures.
///
/// Built for the crate's own tests and with the `alloc-fault` feature.
/// An armed failure belongs to the calling thread and is consumed by that
/// thread's next node allocation.
#[cfg(any(test, feature = "alloc-fault"))]
pub mod alloc_fault {
    use std::cell::Cell;

    thread_local! {
        static FAIL_NEXT: Cell<bool> = const { Cell::new(false) };
    }

    /// Make the next node allocation on this thread fail.
    pub fn fail_next_allocation() {
        FAIL_NEXT.with(|flag| flag.set(true));
    }

    /// Cancel an armed failure that no allocation consumed.
    pub fn disarm() {
        FAIL_NEXT.with(|flag| flag.set(false));
    }

    /// True if an armed failure is still waiting on this thread.
    pub fn is_armed() -> bool {
        FAIL_NEXT.with(Cell::get)
    }

    pub(crate) fn take() -> bool {
        FAIL_NEXT.with(|flag| flag.replace(false))
    }
}

/// Singly linked chain; each node owned by exactly one predecessor.
pub(crate) struct Chain<T> {
    head: Link<T>,
    len: usize,
}

impl<T> Chain<T> {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Link `node` as the new head and return its value.
    pub(crate) fn push(&mut self, mut node: Box<Node<T>>) -> &T {
        node.next = self.head.take();
        self.len += 1;
        &self.head.insert(node).value
    }

    /// Unlink the head node, free it, and return its value.
    pub(crate) fn pop(&mut self) -> Option<T> {
        self.head.take().map(|node| {
            let Node { value, next } = *node;
            self.head = next;
            self.len -= 1;
            value
        })
    }

    pub(crate) fn peek(&self) -> Option<&T> {
        self.head.as_deref().map(|node| &node.value)
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    /// Free every node without recursing down the chain.
    pub(crate) fn clear(&mut self) -> usize {
        let released = self.len;
        let mut link = self.head.take();
        while let Some(mut node) = link {
            link = node.next.take();
        }
        self.len = 0;
        released
    }
}

impl<T> Drop for Chain<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

pub(crate) struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            &node.value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node<T>(value: T) -> Box<Node<T>> {
        match Node::try_new(value) {
            Ok(node) => node,
            Err(_) => panic!("allocation failed"),
        }
    }

    #[test]
    fn test_push_pop_lifo() {
        let mut chain = Chain::new();
        assert_eq!(*chain.push(node(1)), 1);
        chain.push(node(2));
        chain.push(node(3));
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);

        assert_eq!(chain.pop(), Some(3));
        assert_eq!(chain.peek(), Some(&2));
        assert_eq!(chain.pop(), Some(2));
        assert_eq!(chain.pop(), Some(1));
        assert_eq!(chain.pop(), None);
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_forced_allocation_failure_returns_value() {
        alloc_fault::fail_next_allocation();
        assert!(alloc_fault::is_armed());
        assert!(matches!(Node::try_new(17), Err(17)));
        assert!(!alloc_fault::is_armed());

        // Only the next allocation fails.
        assert!(Node::try_new(18).is_ok());
    }

    #[test]
    fn test_clear_long_chain_does_not_recurse() {
        let mut chain = Chain::new();
        for i in 0..200_000u64 {
            chain.push(node(i));
        }
        assert_eq!(chain.clear(), 200_000);
        assert!(chain.is_empty());
        assert_eq!(chain.clear(), 0);
    }

    #[test]
    fn test_values_dropped_exactly_once() {
        use std::rc::Rc;

        let marker = Rc::new(());
        let mut chain = Chain::new();
        for _ in 0..10 {
            chain.push(node(Rc::clone(&marker)));
        }
        assert_eq!(Rc::strong_count(&marker), 11);

        drop(chain.pop());
        assert_eq!(Rc::strong_count(&marker), 10);

        drop(chain);
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
