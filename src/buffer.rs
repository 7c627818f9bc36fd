//! Memoizing, deduplicating, growable enumeration shared by many cursors.
//!
//! A [`Buffer`] pulls items lazily from, in order: a pending queue (items and
//! deferred thunks pushed at any time, possibly from other threads), a primary
//! source iterator, and at most once a "last chance" batch fired when both are
//! drained. Every produced item is cached in first-seen order; cursors behind
//! the cache head only take the shared read lock, advancing takes the advance
//! lock.
//!
//! Deferred thunks run while the advance lock is held. They may push new
//! items through a [`BufferPusher`], but must not advance a cursor of the same
//! buffer.
use parking_lot::{Mutex, RwLock};
use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Weak},
};

use crate::error::Result;

pub type Thunk<T> = Box<dyn FnOnce() -> Result<Option<T>> + Send>;

/// A candidate item: ready now, or evaluated once when a cursor first reaches it.
pub enum Pending<T> {
    Ready(T),
    Deferred(Thunk<T>),
}

impl<T> Pending<T> {
    pub fn deferred(f: impl FnOnce() -> Result<Option<T>> + Send + 'static) -> Self {
        Pending::Deferred(Box::new(f))
    }
}

type Primary<T> = Box<dyn Iterator<Item = Pending<T>> + Send>;
type LastChance<T> = Box<dyn FnOnce() -> Vec<Pending<T>> + Send>;
type SameFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

struct Advance<T> {
    primary: Primary<T>,
    last_chance: Option<LastChance<T>>,
}

struct Shared<T> {
    items: RwLock<Vec<T>>,
    pending: Mutex<VecDeque<Pending<T>>>,
    advance: Mutex<Advance<T>>,
    same: SameFn<T>,
}

pub struct Buffer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Buffer {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Buffer<T> {
    /// `primary` may return `None` and later yield again; it is polled on every
    /// advance that finds the pending queue empty.
    pub fn new<I>(primary: I, same: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self
    where
        I: Iterator<Item = Pending<T>> + Send + 'static,
    {
        Buffer {
            shared: Arc::new(Shared {
                items: RwLock::new(Vec::new()),
                pending: Mutex::new(VecDeque::new()),
                advance: Mutex::new(Advance {
                    primary: Box::new(primary),
                    last_chance: None,
                }),
                same: Arc::new(same),
            }),
        }
    }

    pub fn from_items<I>(items: I, same: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::new(items.into_iter().map(Pending::Ready), same)
    }

    /// Installs the one-shot fallback batch. Replaces a callback that has not fired yet.
    pub fn with_last_chance(self, f: impl FnOnce() -> Vec<Pending<T>> + Send + 'static) -> Self {
        self.shared.advance.lock().last_chance = Some(Box::new(f));
        self
    }

    pub fn push(&self, item: T) {
        self.shared.pending.lock().push_back(Pending::Ready(item));
    }

    pub fn push_deferred(&self, f: impl FnOnce() -> Result<Option<T>> + Send + 'static) {
        self.shared.pending.lock().push_back(Pending::deferred(f));
    }

    /// Weak handle for event callbacks; pushes are dropped once the buffer is gone.
    pub fn pusher(&self) -> BufferPusher<T> {
        BufferPusher {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn cursor(&self) -> BufferCursor<T> {
        BufferCursor {
            buffer: self.clone(),
            pos: 0,
        }
    }

    /// Number of items produced so far.
    pub fn len(&self) -> usize {
        self.shared.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items produced so far, without pulling anything new.
    pub fn snapshot(&self) -> Vec<T> {
        self.shared.items.read().clone()
    }

    /// Pulls until every source is drained.
    pub fn fill(&self) -> Result<usize> {
        let mut cursor = BufferCursor {
            buffer: self.clone(),
            pos: self.len(),
        };
        while cursor.try_next()?.is_some() {}
        Ok(self.len())
    }

    fn item_at(&self, pos: usize) -> Result<Option<T>> {
        if let Some(item) = self.shared.items.read().get(pos) {
            return Ok(Some(item.clone()));
        }
        let mut advance = self.shared.advance.lock();
        loop {
            // 其他游标可能已在等待锁期间推进了缓存
            if let Some(item) = self.shared.items.read().get(pos) {
                return Ok(Some(item.clone()));
            }
            let queued = self.shared.pending.lock().pop_front();
            let next = match queued.or_else(|| advance.primary.next()) {
                Some(next) => next,
                None => match advance.last_chance.take() {
                    Some(f) => {
                        tracing::debug!("buffer sources drained; running last-chance probe");
                        let batch = f();
                        self.shared.pending.lock().extend(batch);
                        continue;
                    }
                    None => return Ok(None),
                },
            };
            let item = match next {
                Pending::Ready(item) => item,
                Pending::Deferred(f) => match f()? {
                    Some(item) => item,
                    None => continue,
                },
            };
            let mut items = self.shared.items.write();
            if items.iter().any(|seen| (self.shared.same)(seen, &item)) {
                continue;
            }
            items.push(item);
        }
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("items", &self.shared.items.read().len())
            .field("pending", &self.shared.pending.lock().len())
            .finish()
    }
}

/// Detached handle used by load-event callbacks.
pub struct BufferPusher<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Clone for BufferPusher<T> {
    fn clone(&self) -> Self {
        BufferPusher {
            shared: self.shared.clone(),
        }
    }
}

impl<T> BufferPusher<T> {
    pub fn push(&self, item: T) -> bool {
        self.push_pending(Pending::Ready(item))
    }
    pub fn push_deferred(&self, f: impl FnOnce() -> Result<Option<T>> + Send + 'static) -> bool {
        self.push_pending(Pending::deferred(f))
    }
    fn push_pending(&self, p: Pending<T>) -> bool {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.pending.lock().push_back(p);
                true
            }
            None => false,
        }
    }
}

/// Independent position over a [`Buffer`]. Cloning keeps the position.
pub struct BufferCursor<T> {
    buffer: Buffer<T>,
    pos: usize,
}

impl<T> Clone for BufferCursor<T> {
    fn clone(&self) -> Self {
        BufferCursor {
            buffer: self.buffer.clone(),
            pos: self.pos,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> BufferCursor<T> {
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn try_next(&mut self) -> Result<Option<T>> {
        let item = self.buffer.item_at(self.pos)?;
        if item.is_some() {
            self.pos += 1;
        }
        Ok(item)
    }
}

impl<T: Clone + Send + Sync + 'static> Iterator for BufferCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActivationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn numbers(items: Vec<u32>) -> Buffer<u32> {
        Buffer::from_items(items, |a, b| a == b)
    }

    #[test]
    fn dedups_and_preserves_first_seen_order() {
        let buf = numbers(vec![3, 1, 3, 2, 1]);
        let got: Vec<u32> = buf.cursor().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![3, 1, 2]);
        let again: Vec<u32> = buf.cursor().map(|r| r.unwrap()).collect();
        assert_eq!(again, got);
    }

    #[test]
    fn cursors_advance_independently() {
        let buf = numbers(vec![1, 2, 3]);
        let mut a = buf.cursor();
        assert_eq!(a.next().unwrap().unwrap(), 1);
        let mut b = a.clone();
        assert_eq!(a.next().unwrap().unwrap(), 2);
        assert_eq!(b.next().unwrap().unwrap(), 2);
        assert_eq!(buf.cursor().count(), 3);
    }

    #[test]
    fn deferred_thunks_run_once_and_may_drop_their_slot() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let buf = numbers(vec![1]);
        buf.push_deferred(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(Some(9))
        });
        buf.push_deferred(|| Ok(None));
        let first: Vec<u32> = buf.cursor().map(|r| r.unwrap()).collect();
        let second: Vec<u32> = buf.cursor().map(|r| r.unwrap()).collect();
        assert_eq!(first, vec![9, 1]);
        assert_eq!(second, first);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_chance_fires_once_after_exhaustion() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let buf = numbers(vec![1, 2]).with_last_chance(move || {
            f.fetch_add(1, Ordering::SeqCst);
            vec![Pending::Ready(2), Pending::Ready(5)]
        });
        let mut c = buf.cursor();
        assert_eq!(c.next().unwrap().unwrap(), 1);
        assert_eq!(c.next().unwrap().unwrap(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(c.next().unwrap().unwrap(), 5);
        assert!(c.next().is_none());
        assert!(buf.cursor().nth(3).is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn items_pushed_after_exhaustion_are_picked_up() {
        let buf = numbers(vec![1]);
        let mut c = buf.cursor();
        assert_eq!(c.by_ref().count(), 1);
        assert!(buf.pusher().push(4));
        assert_eq!(c.next().unwrap().unwrap(), 4);
    }

    #[test]
    fn thunk_errors_reach_the_cursor_that_ran_them() {
        let buf = numbers(vec![]);
        buf.push_deferred(|| Err(ActivationError::Internal("boom")));
        buf.push(7);
        let mut c = buf.cursor();
        assert!(matches!(c.next(), Some(Err(ActivationError::Internal("boom")))));
        assert_eq!(c.next().unwrap().unwrap(), 7);
    }

    #[test]
    fn concurrent_cursors_see_the_same_history() {
        let buf = numbers((0..200).collect());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = buf.clone();
                std::thread::spawn(move || b.cursor().map(|r| r.unwrap()).collect::<Vec<u32>>())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), (0..200).collect::<Vec<u32>>());
        }
    }
}
