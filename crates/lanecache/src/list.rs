//! Recency list for LRU eviction
//!
//! Doubly-linked list stored in an arena: nodes live in a `Vec` and link to
//! each other by index. Slots 0 and 1 are the head and tail sentinels; they
//! never hold a key and are never unlinked. Freed slots are recycled through
//! a free list, so indices handed out by [`EvictionList::insert`] stay stable
//! until [`EvictionList::release`].
//!
//! Not thread-safe; the owner provides locking.

/// Head sentinel slot
const HEAD: usize = 0;

/// Tail sentinel slot
const TAIL: usize = 1;

/// Link value of a node that is not in the list
const DETACHED: usize = usize::MAX;

/// Node in the recency list
struct Node<K> {
    key: Option<K>,
    prev: usize,
    next: usize,
}

impl<K> Node<K> {
    fn detached(key: Option<K>) -> Self {
        Self {
            key,
            prev: DETACHED,
            next: DETACHED,
        }
    }

    fn is_linked(&self) -> bool {
        self.prev != DETACHED
    }
}

/// Arena-backed doubly-linked list, most-recently-used first
pub(crate) struct EvictionList<K> {
    nodes: Vec<Node<K>>,
    free_list: Vec<usize>,
    len: usize,
}

impl<K> EvictionList<K> {
    /// Create an empty list (just the two sentinels)
    pub(crate) fn new() -> Self {
        let mut nodes = Vec::with_capacity(2);
        nodes.push(Node {
            key: None,
            prev: DETACHED,
            next: TAIL,
        });
        nodes.push(Node {
            key: None,
            prev: HEAD,
            next: DETACHED,
        });

        Self {
            nodes,
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocate a detached node holding `key` and return its index
    pub(crate) fn insert(&mut self, key: K) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = Node::detached(Some(key));
            idx
        } else {
            self.nodes.push(Node::detached(Some(key)));
            self.nodes.len() - 1
        }
    }

    /// Unlink (if needed) and free the node at `idx`, returning its key
    pub(crate) fn release(&mut self, idx: usize) -> Option<K> {
        if idx <= TAIL || idx >= self.nodes.len() {
            return None;
        }
        self.remove(idx);
        let key = self.nodes[idx].key.take();
        if key.is_some() {
            self.free_list.push(idx);
        }
        key
    }

    /// Link `idx` right after the head sentinel
    pub(crate) fn add_front(&mut self, idx: usize) {
        debug_assert!(idx > TAIL, "sentinels cannot be relinked");
        debug_assert!(!self.nodes[idx].is_linked(), "node is already linked");

        let first = self.nodes[HEAD].next;
        self.nodes[idx].prev = HEAD;
        self.nodes[idx].next = first;
        self.nodes[first].prev = idx;
        self.nodes[HEAD].next = idx;
        self.len += 1;
    }

    /// Unlink `idx` from wherever it sits. Returns false if it was not linked.
    pub(crate) fn remove(&mut self, idx: usize) -> bool {
        if idx <= TAIL || !self.nodes[idx].is_linked() {
            return false;
        }

        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = DETACHED;
        self.nodes[idx].next = DETACHED;
        self.len -= 1;
        true
    }

    /// Move a linked node to the front
    pub(crate) fn move_to_front(&mut self, idx: usize) {
        if self.nodes[HEAD].next == idx {
            return;
        }
        self.remove(idx);
        self.add_front(idx);
    }

    /// The node just before the tail sentinel, i.e. the LRU entry
    pub(crate) fn tail_predecessor(&self) -> Option<usize> {
        let last = self.nodes[TAIL].prev;
        (last != HEAD).then_some(last)
    }

    /// Key stored at `idx`
    #[cfg(test)]
    pub(crate) fn key(&self, idx: usize) -> Option<&K> {
        self.nodes.get(idx).and_then(|node| node.key.as_ref())
    }

    /// Check if only the sentinels remain
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes[HEAD].next == TAIL
    }

    /// Number of linked nodes
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Keys from most to least recently used
    pub(crate) fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cursor = self.nodes[HEAD].next;
        std::iter::from_fn(move || {
            if cursor == TAIL {
                return None;
            }
            let node = &self.nodes[cursor];
            cursor = node.next;
            node.key.as_ref()
        })
    }
}
