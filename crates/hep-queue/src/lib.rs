//! Named in-process FIFO queues of opaque byte messages (§4.6 C11).
//! Producers and consumers open the same named queue in different modes; a
//! type tag declared at `open` and rechecked on every `push`/`pop` catches
//! a caller that opened a queue as one type and is pushing/popping another
//! -- the same "caller declares a stable type name, the store never parses
//! it" pattern `hep-product-store` uses for product values.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Producer,
    Consumer,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("queue {0:?} already exists")]
    AlreadyExists(String),
    #[error("queue {0:?} does not exist")]
    NotFound(String),
    #[error("queue {queue:?} is typed {expected:?}, not {found:?}")]
    TypeMismatch {
        queue: String,
        expected: String,
        found: String,
    },
    #[error("queue {0:?} was opened as {1:?} and cannot be used in that direction")]
    WrongMode(String, &'static str),
    #[error("this handle on queue {0:?} is already closed")]
    AlreadyClosed(String),
}

struct Data {
    buffer: VecDeque<Vec<u8>>,
    producer_count: usize,
}

struct Inner {
    name: String,
    type_tag: String,
    data: Mutex<Data>,
    notify: Notify,
}

/// The provider-side registry of named queues. One registry per daemon
/// process; handles obtained from it may be handed out to any number of
/// producer/consumer tasks.
#[derive(Default)]
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, Arc<Inner>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, empty, untyped queue. The first `open` call fixes
    /// its type tag.
    pub fn create(&self, name: &str) -> Result<(), Error> {
        let mut queues = self.queues.lock();
        if queues.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        queues.insert(
            name.to_string(),
            Arc::new(Inner {
                name: name.to_string(),
                type_tag: String::new(),
                data: Mutex::new(Data {
                    buffer: VecDeque::new(),
                    producer_count: 0,
                }),
                notify: Notify::new(),
            }),
        );
        Ok(())
    }

    /// Opens `name` in `mode`, binding `type_tag` to this handle. The first
    /// `open` of a freshly created queue adopts `type_tag` as the queue's
    /// canonical type; later opens (by any handle) must agree with it.
    pub fn open(&self, name: &str, mode: Mode, type_tag: &str) -> Result<Queue, Error> {
        let inner = {
            let mut queues = self.queues.lock();
            let inner = queues.get(name).cloned().ok_or_else(|| Error::NotFound(name.to_string()))?;
            if inner.type_tag.is_empty() && !type_tag.is_empty() {
                // Adopt the first declared type tag. `Inner.type_tag` is
                // otherwise immutable, so this is the one place it's set,
                // guarded by replacing the whole Arc under the registry lock.
                let replaced = Arc::new(Inner {
                    name: inner.name.clone(),
                    type_tag: type_tag.to_string(),
                    data: Mutex::new(Data {
                        buffer: std::mem::take(&mut inner.data.lock().buffer),
                        producer_count: inner.data.lock().producer_count,
                    }),
                    notify: Notify::new(),
                });
                queues.insert(name.to_string(), replaced.clone());
                replaced
            } else {
                inner
            }
        };

        if !inner.type_tag.is_empty() && inner.type_tag != type_tag {
            return Err(Error::TypeMismatch {
                queue: name.to_string(),
                expected: inner.type_tag.clone(),
                found: type_tag.to_string(),
            });
        }

        if mode == Mode::Producer {
            inner.data.lock().producer_count += 1;
        }

        Ok(Queue {
            inner,
            mode,
            type_tag: type_tag.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    /// Removes `name` entirely (admin op). Handles already opened on it
    /// keep their `Arc<Inner>` and continue to work against the now
    /// unregistered queue; they simply can no longer be reopened by name.
    pub fn destroy(&self, name: &str) -> Result<(), Error> {
        self.queues
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

/// A single producer or consumer's handle on a named queue.
pub struct Queue {
    inner: Arc<Inner>,
    mode: Mode,
    type_tag: String,
    closed: AtomicBool,
}

impl Queue {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn check_type(&self, type_tag: &str) -> Result<(), Error> {
        if type_tag != self.type_tag {
            return Err(Error::TypeMismatch {
                queue: self.inner.name.clone(),
                expected: self.type_tag.clone(),
                found: type_tag.to_string(),
            });
        }
        Ok(())
    }

    /// Appends `value`, waking one waiting `pop`. Only valid on a handle
    /// opened in `Mode::Producer`.
    pub fn push(&self, type_tag: &str, value: Vec<u8>) -> Result<(), Error> {
        if self.mode != Mode::Producer {
            return Err(Error::WrongMode(self.inner.name.clone(), "push requires Mode::Producer"));
        }
        self.check_type(type_tag)?;
        self.inner.data.lock().buffer.push_back(value);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Blocks until an item is available, or the queue is empty with no
    /// producers left open, in which case it returns `None` immediately
    /// rather than waiting forever (§9 open question). Only valid on a
    /// handle opened in `Mode::Consumer`.
    pub async fn pop(&self, type_tag: &str) -> Result<Option<Vec<u8>>, Error> {
        if self.mode != Mode::Consumer {
            return Err(Error::WrongMode(self.inner.name.clone(), "pop requires Mode::Consumer"));
        }
        self.check_type(type_tag)?;
        loop {
            {
                let mut data = self.inner.data.lock();
                if let Some(value) = data.buffer.pop_front() {
                    return Ok(Some(value));
                }
                if data.producer_count == 0 {
                    return Ok(None);
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// If this is a producer handle, decrements the queue's producer count
    /// and, if it reaches zero, wakes every waiting consumer so they can
    /// observe the closed state instead of blocking forever.
    pub fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyClosed(self.inner.name.clone()));
        }
        if self.mode == Mode::Producer {
            let mut data = self.inner.data.lock();
            data.producer_count = data.producer_count.saturating_sub(1);
            let exhausted = data.producer_count == 0;
            drop(data);
            if exhausted {
                self.inner.notify.notify_waiters();
            }
        }
        Ok(())
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_twice_is_an_error() {
        let registry = QueueRegistry::new();
        registry.create("q").unwrap();
        assert!(matches!(registry.create("q"), Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn push_then_pop_round_trips() {
        let registry = QueueRegistry::new();
        registry.create("q").unwrap();
        let producer = registry.open("q", Mode::Producer, "hep::Event").unwrap();
        let consumer = registry.open("q", Mode::Consumer, "hep::Event").unwrap();

        producer.push("hep::Event", b"payload".to_vec()).unwrap();
        let got = consumer.pop("hep::Event").await.unwrap();
        assert_eq!(got, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn type_mismatch_is_rejected() {
        let registry = QueueRegistry::new();
        registry.create("q").unwrap();
        let _producer = registry.open("q", Mode::Producer, "hep::Event").unwrap();
        let err = registry.open("q", Mode::Consumer, "hep::Hit").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn producer_open_then_close_before_any_push_does_not_block_pop() {
        let registry = QueueRegistry::new();
        registry.create("q").unwrap();
        let producer = registry.open("q", Mode::Producer, "hep::Event").unwrap();
        producer.close().unwrap();

        let consumer = registry.open("q", Mode::Consumer, "hep::Event").unwrap();
        let got = tokio::time::timeout(std::time::Duration::from_secs(1), consumer.pop("hep::Event"))
            .await
            .expect("pop must return immediately, not block")
            .unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn pop_waits_for_a_push_then_returns_it() {
        let registry = QueueRegistry::new();
        registry.create("q").unwrap();
        let producer = registry.open("q", Mode::Producer, "hep::Event").unwrap();
        let consumer = registry.open("q", Mode::Consumer, "hep::Event").unwrap();

        let waiter = tokio::spawn(async move { consumer.pop("hep::Event").await });
        tokio::task::yield_now().await;
        producer.push("hep::Event", b"late".to_vec()).unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), Some(b"late".to_vec()));
    }
}
