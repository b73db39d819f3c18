/*
    RotatingPool - membership set + FIFO rotation queue

    The set answers "is X a member" in O(1), the queue gives round-robin
    selection in admission order. Both live behind one mutex and every public
    operation takes it exactly once, so the two can never disagree.

    Two ways to draw from a pool:

    - next():     rotate the head to the tail and hand out a clone. Two callers
                  racing may receive the same element.
    - checkout(): like next(), but skips elements already leased; the lease is
                  returned when the PoolLease guard is dropped.

    ┌──────────── Mutex ────────────┐
    │  members: HashSet<E>          │
    │  queue:   VecDeque<E>  ◄─┐    │
    │  leased:  HashSet<E>     │    │
    └──────────────────────────┼────┘
              pop_front ───────┘ push_back
*/

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct PoolState<E> {
    members: HashSet<E>,
    queue: VecDeque<E>,
    leased: HashSet<E>,
}

/// Thread-safe membership set paired with a rotation queue
pub struct RotatingPool<E> {
    name: &'static str,
    state: Arc<Mutex<PoolState<E>>>,
}

impl<E> RotatingPool<E>
where
    E: Eq + Hash + Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(PoolState {
                members: HashSet::new(),
                queue: VecDeque::new(),
                leased: HashSet::new(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // A panic while holding the lock cannot leave the set and queue out of
    // step: every mutation below updates both before returning.
    fn lock(&self) -> MutexGuard<'_, PoolState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit an element. Returns `false` if it was already a member.
    pub fn try_admit(&self, element: E) -> bool {
        let mut state = self.lock();
        if state.members.contains(&element) {
            return false;
        }
        state.members.insert(element.clone());
        state.queue.push_back(element);
        true
    }

    /// Remove an element. Removing a non-member is a no-op.
    pub fn remove(&self, element: &E) -> bool {
        let mut state = self.lock();
        if !state.members.remove(element) {
            return false;
        }
        state.queue.retain(|e| e != element);
        true
    }

    /// Remove every member matching `predicate`, returning what was removed
    pub fn remove_matching<F>(&self, mut predicate: F) -> Vec<E>
    where
        F: FnMut(&E) -> bool,
    {
        let mut state = self.lock();
        let removed: Vec<E> = state.queue.iter().filter(|e| predicate(*e)).cloned().collect();
        for element in &removed {
            state.members.remove(element);
        }
        state.queue.retain(|e| !removed.contains(e));
        removed
    }

    /// Round-robin selection: rotate the head to the tail and return it
    pub fn next(&self) -> Option<E> {
        let mut state = self.lock();
        let head = state.queue.pop_front()?;
        state.queue.push_back(head.clone());
        Some(head)
    }

    /// Exclusive round-robin selection
    ///
    /// Walks the queue from the head, rotating every visited element, and
    /// leases the first one nobody else holds.
    pub fn checkout(&self) -> Option<PoolLease<E>> {
        let mut state = self.lock();
        for _ in 0..state.queue.len() {
            let head = state.queue.pop_front()?;
            state.queue.push_back(head.clone());
            if state.leased.insert(head.clone()) {
                return Some(PoolLease {
                    element: head,
                    state: Arc::clone(&self.state),
                });
            }
        }
        None
    }

    pub fn contains(&self, element: &E) -> bool {
        self.lock().members.contains(element)
    }

    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    /// Members in current rotation order
    pub fn snapshot(&self) -> Vec<E> {
        self.lock().queue.iter().cloned().collect()
    }
}

impl<E> fmt::Debug for RotatingPool<E>
where
    E: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingPool")
            .field("name", &self.name)
            .field("queue", &self.snapshot())
            .finish()
    }
}

/// Exclusive borrow of a pool member, released on drop
pub struct PoolLease<E>
where
    E: Eq + Hash,
{
    element: E,
    state: Arc<Mutex<PoolState<E>>>,
}

impl<E> PoolLease<E>
where
    E: Eq + Hash,
{
    pub fn get(&self) -> &E {
        &self.element
    }
}

impl<E> std::ops::Deref for PoolLease<E>
where
    E: Eq + Hash,
{
    type Target = E;

    fn deref(&self) -> &E {
        self.get()
    }
}

impl<E> Drop for PoolLease<E>
where
    E: Eq + Hash,
{
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.leased.remove(&self.element);
    }
}

impl<E> fmt::Debug for PoolLease<E>
where
    E: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolLease").field(&self.element).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_admit_is_idempotent() {
        let pool = RotatingPool::new("test");
        assert!(pool.try_admit("a"));
        assert!(!pool.try_admit("a"));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.snapshot(), vec!["a"]);
    }

    #[test]
    fn test_next_cycles_in_admission_order() {
        let pool = RotatingPool::new("test");
        for e in ["a", "b", "c"] {
            pool.try_admit(e);
        }

        let first_round: Vec<_> = (0..3).filter_map(|_| pool.next()).collect();
        assert_eq!(first_round, vec!["a", "b", "c"]);

        let second_round: Vec<_> = (0..3).filter_map(|_| pool.next()).collect();
        assert_eq!(second_round, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_next_on_empty_pool() {
        let pool: RotatingPool<&str> = RotatingPool::new("test");
        assert_eq!(pool.next(), None);
        assert!(pool.checkout().is_none());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let pool = RotatingPool::new("test");
        pool.try_admit("a");
        pool.try_admit("b");
        pool.next();

        assert!(!pool.remove(&"zzz"));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.snapshot(), vec!["b", "a"]);
    }

    #[test]
    fn test_remove_keeps_set_and_queue_aligned() {
        let pool = RotatingPool::new("test");
        pool.try_admit("a");
        pool.try_admit("b");

        assert!(pool.remove(&"a"));
        assert!(!pool.contains(&"a"));
        assert_eq!(pool.snapshot(), vec!["b"]);

        // Re-admission goes to the tail as a fresh candidate
        assert!(pool.try_admit("a"));
        assert_eq!(pool.snapshot(), vec!["b", "a"]);
    }

    #[test]
    fn test_remove_matching() {
        let pool = RotatingPool::new("test");
        for e in [1, 2, 3, 4] {
            pool.try_admit(e);
        }
        let removed = pool.remove_matching(|e| e % 2 == 0);
        assert_eq!(removed, vec![2, 4]);
        assert_eq!(pool.snapshot(), vec![1, 3]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_checkout_is_exclusive() {
        let pool = RotatingPool::new("test");
        pool.try_admit("a");
        pool.try_admit("b");

        let first = pool.checkout().unwrap();
        let second = pool.checkout().unwrap();
        assert_ne!(*first, *second);
        assert!(pool.checkout().is_none());

        drop(first);
        let third = pool.checkout().unwrap();
        assert_eq!(*third, "a");
    }

    #[test]
    fn test_lease_survives_removal() {
        let pool = RotatingPool::new("test");
        pool.try_admit("a");
        let lease = pool.checkout().unwrap();
        assert!(pool.remove(&"a"));
        drop(lease);
        assert!(pool.is_empty());
        assert!(pool.checkout().is_none());
    }

    #[test]
    fn test_concurrent_admit_and_remove() {
        let pool = Arc::new(RotatingPool::new("test"));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = (t * 1000) + (i % 50);
                        pool.try_admit(key);
                        if i % 3 == 0 {
                            pool.remove(&key);
                        }
                        pool.next();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = pool.snapshot();
        let unique: HashSet<_> = snapshot.iter().cloned().collect();
        assert_eq!(unique.len(), snapshot.len());
        assert_eq!(pool.len(), snapshot.len());
        for e in &snapshot {
            assert!(pool.contains(e));
        }
    }

    proptest! {
        #[test]
        fn prop_next_visits_each_member_once_per_round(
            keys in proptest::collection::hash_set(0u32..10_000, 1..40)
        ) {
            let pool = RotatingPool::new("prop");
            let mut order = Vec::new();
            for k in &keys {
                if pool.try_admit(*k) {
                    order.push(*k);
                }
            }
            let round: Vec<_> = (0..order.len()).filter_map(|_| pool.next()).collect();
            prop_assert_eq!(round, order);
        }

        #[test]
        fn prop_admit_twice_never_grows(keys in proptest::collection::vec(0u8..20, 0..60)) {
            let pool = RotatingPool::new("prop");
            for k in &keys {
                pool.try_admit(*k);
            }
            let size = pool.len();
            for k in &keys {
                prop_assert!(!pool.try_admit(*k));
            }
            prop_assert_eq!(pool.len(), size);
            prop_assert_eq!(pool.snapshot().len(), size);
        }
    }
}
