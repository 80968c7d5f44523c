use crate::record::Record;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Ordered, append-only sequence of records waiting to be shipped.
///
/// Producers call [`push`](Self::push) from any thread; the scheduler takes
/// everything with [`drain_all`](Self::drain_all). A push that races a drain
/// lands either in the drained batch or in the next one, never both.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    records: Mutex<Vec<Record>>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Never blocks beyond the swap in `drain_all`.
    pub fn push(&self, record: Record) {
        self.lock().push(record);
    }

    /// Swap the pending records for an empty sequence and return them in
    /// push order. Empty when nothing was pending.
    pub fn drain_all(&self) -> Vec<Record> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking producer cannot leave the Vec half-written, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::envelope;
    use crate::record::EventKind;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn numbered(n: u64) -> Record {
        envelope(EventKind::Server).with_data(json!(n))
    }

    fn number(record: &Record) -> u64 {
        record.data.as_ref().and_then(|d| d.as_u64()).unwrap()
    }

    #[test]
    fn drain_returns_push_order_and_resets() {
        let buffer = BatchBuffer::new();
        for n in 0..5 {
            buffer.push(numbered(n));
        }
        assert_eq!(buffer.len(), 5);

        let batch = buffer.drain_all();
        assert_eq!(batch.iter().map(number).collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn drain_on_empty_buffer_is_empty() {
        assert!(BatchBuffer::new().drain_all().is_empty());
    }

    #[test]
    fn interleaved_pushes_and_drains_deliver_each_record_once() {
        let buffer = BatchBuffer::new();
        let mut delivered = Vec::new();
        for n in 0..100 {
            buffer.push(numbered(n));
            if n % 7 == 0 {
                delivered.extend(buffer.drain_all());
            }
        }
        delivered.extend(buffer.drain_all());

        let numbers: Vec<u64> = delivered.iter().map(number).collect();
        assert_eq!(numbers, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_producers_lose_and_duplicate_nothing() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 500;

        let buffer = Arc::new(BatchBuffer::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        buffer.push(numbered(p * PER_PRODUCER + i));
                    }
                })
            })
            .collect();

        let mut batches = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            batches.push(buffer.drain_all());
        }
        for handle in producers {
            handle.join().unwrap();
        }
        batches.push(buffer.drain_all());

        let mut seen = HashSet::new();
        for batch in &batches {
            for record in batch {
                assert!(seen.insert(number(record)), "duplicate delivery");
            }
        }
        assert_eq!(seen.len() as u64, PRODUCERS * PER_PRODUCER);

        // Per-producer order survives across batches.
        for p in 0..PRODUCERS {
            let own: Vec<u64> = batches
                .iter()
                .flatten()
                .map(number)
                .filter(|n| n / PER_PRODUCER == p)
                .collect();
            assert!(own.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
