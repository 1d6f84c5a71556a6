//! Bounded concurrency guard for embedders that are not internally reentrant.
//!
//! `OnnxStdIoEmbedder` already serializes through a `Mutex<Session>`, but the
//! spec (§4.2, §5) calls for a *bounded queue* in front of any non-reentrant
//! provider rather than unbounded blocking. `BoundedEmbedder` caps the number
//! of callers that can be inside `embed_one`/`embed_batch` at once; callers
//! beyond the cap block on a condition variable instead of piling up on the
//! inner mutex.

use std::sync::{Arc, Condvar, Mutex};

use crate::embedder::{Embedder, EmbedderError, EmbedderInfo};

struct Slots {
    available: Mutex<usize>,
    condvar: Condvar,
}

impl Slots {
    fn acquire(&self) {
        let mut guard = self.available.lock().expect("embedder pool mutex poisoned");
        while *guard == 0 {
            guard = self.condvar.wait(guard).expect("embedder pool mutex poisoned");
        }
        *guard -= 1;
    }

    fn release(&self) {
        let mut guard = self.available.lock().expect("embedder pool mutex poisoned");
        *guard += 1;
        self.condvar.notify_one();
    }
}

/// Wraps any [`Embedder`] with a bounded queue of `capacity` concurrent callers.
pub struct BoundedEmbedder<E: Embedder> {
    inner: E,
    slots: Arc<Slots>,
}

impl<E: Embedder> BoundedEmbedder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            slots: Arc::new(Slots { available: Mutex::new(capacity), condvar: Condvar::new() }),
        }
    }
}

impl<E: Embedder> Embedder for BoundedEmbedder<E> {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.slots.acquire();
        let result = self.inner.embed_one(text);
        self.slots.release();
        result
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        self.slots.acquire();
        let result = self.inner.embed_batch(texts);
        self.slots.release();
        result
    }

    fn info(&self) -> &EmbedderInfo {
        self.inner.info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::DeterministicEmbedder;

    #[test]
    fn pooled_embedder_still_embeds_correctly() {
        let inner = DeterministicEmbedder::new(8, "m", 4096).unwrap();
        let pooled = BoundedEmbedder::new(inner, 2);
        let a = pooled.embed_one("hello").unwrap();
        let b = pooled.embed_one("hello").unwrap();
        assert_eq!(a, b);
    }
}
