//! Hand-off queue between request handlers and the flush worker.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Sample;

/// Capacity a drain buffer always keeps.
const MIN_RETAINED_CAPACITY: usize = 1024;

/// A drain buffer larger than this many times the current backlog is shrunk
/// before it is handed to the producers.
const SHRINK_FACTOR: usize = 4;

/// Multi-producer, single-consumer sample buffer.
///
/// Producers hold the lock only for a `Vec::push`. The consumer swaps the
/// whole buffer out in [`drain_into`](Self::drain_into), so folding and disk
/// writes never happen under the lock.
///
/// The queue starts closed. It accepts samples only between [`open`](Self::open)
/// and [`close`](Self::close); pushes outside that window are ignored.
#[derive(Debug)]
pub struct SampleQueue {
    inner: Mutex<QueueInner>,
    /// Maximum buffered samples. None means unbounded.
    max_pending: Option<usize>,
    /// Samples rejected because the queue was full or the input was invalid.
    dropped: AtomicU64,
}

#[derive(Debug, Default)]
struct QueueInner {
    samples: Vec<Sample>,
    open: bool,
}

impl SampleQueue {
    /// Create a closed, unbounded queue.
    pub fn new() -> Self {
        Self::with_max_pending(None)
    }

    /// Create a closed queue holding at most `max_pending` samples.
    pub fn with_max_pending(max_pending: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            max_pending,
            dropped: AtomicU64::new(0),
        }
    }

    /// Start accepting samples.
    pub fn open(&self) {
        self.inner.lock().open = true;
    }

    /// Stop accepting samples. Already queued samples stay for the next drain.
    pub fn close(&self) {
        self.inner.lock().open = false;
    }

    /// Check if the queue currently accepts samples.
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Enqueue a sample.
    ///
    /// Returns `true` if the sample was accepted. An accepted sample is
    /// folded by exactly one later drain.
    pub fn push(&self, sample: Sample) -> bool {
        let mut inner = self.inner.lock();
        if !inner.open {
            return false;
        }
        if let Some(max) = self.max_pending {
            if inner.samples.len() >= max {
                drop(inner);
                self.note_dropped();
                return false;
            }
        }
        inner.samples.push(sample);
        true
    }

    /// Move every queued sample into `buf`.
    ///
    /// `buf` is cleared first; its allocation is handed to the producers so
    /// the steady state does not reallocate every cycle. An allocation left
    /// over from a burst is shrunk back towards the current backlog first.
    pub fn drain_into(&self, buf: &mut Vec<Sample>) {
        buf.clear();
        let target = self.len().max(MIN_RETAINED_CAPACITY);
        if buf.capacity() > target.saturating_mul(SHRINK_FACTOR) {
            buf.shrink_to(target);
        }

        let mut inner = self.inner.lock();
        std::mem::swap(&mut inner.samples, buf);
    }

    /// Number of samples waiting for the next drain.
    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    /// Check if no samples are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total samples rejected since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Count a sample that was rejected before reaching the buffer.
    pub(crate) fn note_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn sample(category: u32, latency_ms: i64) -> Sample {
        Sample {
            category,
            latency_ms,
        }
    }

    #[test]
    fn test_closed_queue_ignores_pushes() {
        let queue = SampleQueue::new();
        assert!(!queue.push(sample(1, 5)));
        assert!(queue.is_empty());
        // Ignored, not dropped: nothing was ever accepted.
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_drain_takes_everything() {
        let queue = SampleQueue::new();
        queue.open();
        assert!(queue.push(sample(1, 5)));
        assert!(queue.push(sample(2, 7)));
        assert_eq!(queue.len(), 2);

        let mut buf = vec![sample(9, 9)];
        queue.drain_into(&mut buf);
        assert_eq!(buf, vec![sample(1, 5), sample(2, 7)]);
        assert!(queue.is_empty());

        queue.drain_into(&mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_close_keeps_queued_samples() {
        let queue = SampleQueue::new();
        queue.open();
        queue.push(sample(1, 1));
        queue.close();

        assert!(!queue.push(sample(1, 2)));
        let mut buf = Vec::new();
        queue.drain_into(&mut buf);
        assert_eq!(buf, vec![sample(1, 1)]);
    }

    #[test]
    fn test_bounded_queue_drops_overflow() {
        let queue = SampleQueue::with_max_pending(Some(2));
        queue.open();
        assert!(queue.push(sample(1, 1)));
        assert!(queue.push(sample(1, 2)));
        assert!(!queue.push(sample(1, 3)));
        assert_eq!(queue.dropped(), 1);

        let mut buf = Vec::new();
        queue.drain_into(&mut buf);
        assert!(queue.push(sample(1, 4)));
    }

    #[test]
    fn test_burst_capacity_is_released() {
        let queue = SampleQueue::new();
        queue.open();
        for i in 0..100_000 {
            queue.push(sample(1, i));
        }

        let mut buf = Vec::new();
        queue.drain_into(&mut buf);
        assert_eq!(buf.len(), 100_000);

        queue.push(sample(1, 1));
        queue.drain_into(&mut buf);
        assert_eq!(buf, vec![sample(1, 1)]);

        // The burst-sized buffer went back to the producers shrunk.
        let producer_capacity = queue.inner.lock().samples.capacity();
        assert!(producer_capacity < 100_000 / SHRINK_FACTOR);
        assert!(producer_capacity >= MIN_RETAINED_CAPACITY);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(SampleQueue::new());
        queue.open();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        queue.push(sample(t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut buf = Vec::new();
        queue.drain_into(&mut buf);
        assert_eq!(buf.len(), 8000);
    }
}
