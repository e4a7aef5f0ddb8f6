//! The two notifying-queue flavours the pipeline runs on.
//!
//! `Queue<T>` is a plain blocking FIFO used for slabs, which are already
//! bounded in number by the buffer pool and never need to spill.
//! `SpillQueue<T>` additionally pages overflow to a sequence of numbered
//! files on disk once its resident backlog reaches `capacity`, and is what
//! the files queue (§4.1/§4.2 of the design doc) is built on.
//! `DoublePopQueue<T>` wraps a `SpillQueue<T>` with the pair-pop protocol
//! the reduce coordinator needs.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};

/// An element a `SpillQueue` can write to and read back from a plain-text
/// spill file, one serialised value per line.
pub trait Spillable: Sized {
    fn serialise(&self) -> String;
    fn deserialise(line: &str) -> Self;
}

impl Spillable for String {
    fn serialise(&self) -> String {
        self.clone()
    }

    fn deserialise(line: &str) -> Self {
        line.to_string()
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    finished: bool,
}

/// A blocking FIFO with no capacity limit and no disk spillover.
pub struct Queue<T> {
    state: Mutex<QueueState<T>>,
    cv: Condvar,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Queue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                finished: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return;
        }
        state.items.push_back(item);
        self.cv.notify_one();
    }

    /// Blocks until an element is available or the queue has finished and
    /// drained. Returns `None` only in the latter case.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.finished {
                return None;
            }
            state = self.cv.wait(state).unwrap();
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        state.items.pop_front()
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.finished = true;
        self.cv.notify_all();
    }
}

/// Internal state behind a `SpillQueue`: a resident FIFO `Q`, a staging
/// FIFO `S` awaiting its own spill file, and the half-open range of spill
/// files currently on disk.
struct SpillState<T> {
    resident: VecDeque<T>,
    staging: VecDeque<T>,
    spill_range: Option<(u64, u64)>,
    size: usize,
    finished: bool,
}

/// A blocking FIFO that caps its resident backlog at `capacity` and spills
/// overflow to `<prefix><N>` files under `work_dir`.
pub struct SpillQueue<T: Spillable> {
    state: Mutex<SpillState<T>>,
    cv: Condvar,
    capacity: usize,
    work_dir: PathBuf,
    prefix: String,
    next_spill_index: std::sync::atomic::AtomicU64,
}

impl<T: Spillable> SpillQueue<T> {
    pub fn new(capacity: usize, work_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        SpillQueue {
            state: Mutex::new(SpillState {
                resident: VecDeque::new(),
                staging: VecDeque::new(),
                spill_range: None,
                size: 0,
                finished: false,
            }),
            cv: Condvar::new(),
            capacity: capacity.max(1),
            work_dir: work_dir.into(),
            prefix: prefix.into(),
            next_spill_index: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn spill_path(&self, index: u64) -> PathBuf {
        self.work_dir.join(format!("{}{}", self.prefix, index))
    }

    /// Writes every element of `staging` to a fresh spill file, in order,
    /// and clears `staging`. Must be called with the lock held.
    fn spill_staging(&self, state: &mut SpillState<T>) -> io::Result<()> {
        let index = self
            .next_spill_index
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let path = self.spill_path(index);
        {
            let file = File::create(&path)?;
            let mut writer = BufWriter::new(file);
            for item in state.staging.drain(..) {
                writer.write_all(item.serialise().as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        state.spill_range = Some(match state.spill_range {
            Some((first, _)) => (first, index),
            None => (index, index),
        });
        Ok(())
    }

    /// Reads the oldest spill file back into `resident` and deletes it,
    /// or splices `staging` into `resident` if no spill files remain.
    /// Must be called with the lock held, and only when `resident` is
    /// empty.
    fn refill(&self, state: &mut SpillState<T>) -> io::Result<()> {
        if let Some((first, last)) = state.spill_range {
            let path = self.spill_path(first);
            let file = File::open(&path)?;
            for line in BufReader::new(file).lines() {
                state.resident.push_back(T::deserialise(&line?));
            }
            fs::remove_file(&path)?;
            state.spill_range = if first >= last {
                None
            } else {
                Some((first + 1, last))
            };
        } else if !state.staging.is_empty() {
            state.resident.extend(state.staging.drain(..));
        }
        Ok(())
    }

    fn push_locked(&self, state: &mut SpillState<T>, item: T) -> io::Result<()> {
        if state.spill_range.is_none() && state.staging.is_empty() && state.resident.len() < self.capacity {
            state.resident.push_back(item);
        } else if state.staging.len() < self.capacity {
            state.staging.push_back(item);
        } else {
            self.spill_staging(state)?;
            state.staging.push_back(item);
        }
        state.size += 1;
        Ok(())
    }

    /// Drops the push silently if `finish()` has already been called.
    pub fn push(&self, item: T) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return Ok(());
        }
        self.push_locked(&mut state, item)?;
        self.cv.notify_one();
        Ok(())
    }

    /// Pushes unconditionally, even after `finish()`. Used by the reduce
    /// coordinator to re-enqueue merge results once the files queue has
    /// been told no more fresh runs are coming.
    pub fn push_force(&self, item: T) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.push_locked(&mut state, item)?;
        if state.size > 1 {
            self.cv.notify_one();
        }
        Ok(())
    }

    fn pop_front_locked(&self, state: &mut SpillState<T>) -> io::Result<T> {
        if state.resident.is_empty() {
            self.refill(state)?;
        }
        let item = state
            .resident
            .pop_front()
            .expect("size > 0 guarantees an element after refill");
        state.size -= 1;
        if state.resident.is_empty() {
            self.refill(state)?;
        }
        Ok(item)
    }

    /// Blocks until an element is available or the queue has finished and
    /// drained.
    pub fn wait_and_pop(&self) -> io::Result<Option<T>> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.size > 0 {
                return self.pop_front_locked(&mut state).map(Some);
            }
            if state.finished {
                return Ok(None);
            }
            state = self.cv.wait(state).unwrap();
        }
    }

    pub fn try_pop(&self) -> io::Result<Option<T>> {
        let mut state = self.state.lock().unwrap();
        if state.size == 0 {
            return Ok(None);
        }
        self.pop_front_locked(&mut state).map(Some)
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.finished = true;
        self.cv.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().size
    }
}

/// A `SpillQueue` with the pair-pop protocol the reduce coordinator needs
/// to merge files two at a time without two threads racing for partners.
pub struct DoublePopQueue<T: Spillable>(SpillQueue<T>);

impl<T: Spillable> DoublePopQueue<T> {
    pub fn new(capacity: usize, work_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        DoublePopQueue(SpillQueue::new(capacity, work_dir, prefix))
    }

    pub fn push(&self, item: T) -> io::Result<()> {
        self.0.push(item)
    }

    pub fn push_force(&self, item: T) -> io::Result<()> {
        self.0.push_force(item)
    }

    pub fn finish(&self) {
        self.0.finish()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Waits until two elements are resident or the queue has finished.
    /// Finish always wins, even with one element left resident: that last
    /// element is reserved for `wait_and_pop_force`.
    pub fn wait_and_pop(&self) -> io::Result<Option<(T, T)>> {
        let mut state = self.0.state.lock().unwrap();
        loop {
            if state.finished {
                return Ok(None);
            }
            if state.size > 1 {
                let first = self.0.pop_front_locked(&mut state)?;
                let second = self.0.pop_front_locked(&mut state)?;
                return Ok(Some((first, second)));
            }
            state = self.0.cv.wait(state).unwrap();
        }
    }

    /// Waits until at least one element is resident, ignoring `finished`.
    /// Used by the main thread to collect the single surviving run.
    pub fn wait_and_pop_force(&self) -> io::Result<T> {
        let mut state = self.0.state.lock().unwrap();
        loop {
            if state.size > 0 {
                return self.0.pop_front_locked(&mut state);
            }
            state = self.0.cv.wait(state).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_queue_fifo_and_finish() {
        let q: Queue<i32> = Queue::new();
        q.push(1);
        q.push(2);
        assert_eq!(q.wait_and_pop(), Some(1));
        q.finish();
        assert_eq!(q.wait_and_pop(), Some(2));
        assert_eq!(q.wait_and_pop(), None);
        assert_eq!(q.wait_and_pop(), None);
    }

    #[test]
    fn spill_queue_preserves_fifo_across_spill() {
        let dir = tempfile::tempdir().unwrap();
        let q: SpillQueue<String> = SpillQueue::new(4, dir.path(), "tmp_queue");
        let pushed: Vec<String> = (0..20).map(|i| format!("item{i}")).collect();
        for item in &pushed {
            q.push(item.clone()).unwrap();
        }
        let mut popped = Vec::new();
        for _ in 0..pushed.len() {
            popped.push(q.try_pop().unwrap().unwrap());
        }
        assert_eq!(pushed, popped);
        assert!(q.try_pop().unwrap().is_none());
        // every spill file created along the way must have been cleaned up
        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(remaining.is_empty());
    }

    #[test]
    fn spill_queue_finish_drops_pushes_but_push_force_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let q: SpillQueue<String> = SpillQueue::new(4, dir.path(), "tmp_queue");
        q.push("a".to_string()).unwrap();
        q.finish();
        q.push("b".to_string()).unwrap();
        q.push_force("c".to_string()).unwrap();
        assert_eq!(q.try_pop().unwrap(), Some("a".to_string()));
        assert_eq!(q.try_pop().unwrap(), Some("c".to_string()));
        assert_eq!(q.try_pop().unwrap(), None);
    }

    #[test]
    fn double_pop_queue_pairs_are_disjoint_and_cover_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let q: DoublePopQueue<String> = DoublePopQueue::new(4, dir.path(), "tmp_queue");
        for item in ["x1", "x2", "x3", "x4"] {
            q.push(item.to_string()).unwrap();
        }
        let (a, b) = q.wait_and_pop().unwrap().unwrap();
        let (c, d) = q.wait_and_pop().unwrap().unwrap();
        assert_eq!(
            vec![a, b, c, d],
            vec!["x1".to_string(), "x2".to_string(), "x3".to_string(), "x4".to_string()]
        );
    }

    #[test]
    fn double_pop_queue_finish_reserves_last_element() {
        let dir = tempfile::tempdir().unwrap();
        let q: DoublePopQueue<String> = DoublePopQueue::new(4, dir.path(), "tmp_queue");
        q.push("only".to_string()).unwrap();
        q.finish();
        assert!(q.wait_and_pop().unwrap().is_none());
        assert_eq!(q.wait_and_pop_force().unwrap(), "only".to_string());
    }

    #[test]
    fn push_force_wakes_waiter_even_when_spilling_keeps_resident_at_one() {
        // Capacity 1 means a second push_force lands in staging, not the
        // resident VecDeque: resident.len() stays 1 while the logical
        // size counter goes to 2. A waiter blocked on `size > 1` must
        // still be woken by this push.
        let dir = tempfile::tempdir().unwrap();
        let q = std::sync::Arc::new(DoublePopQueue::<String>::new(1, dir.path(), "tmp_queue"));
        q.push("seed".to_string()).unwrap();

        let waiter = {
            let q = std::sync::Arc::clone(&q);
            std::thread::spawn(move || q.wait_and_pop().unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));

        q.push_force("second".to_string()).unwrap();

        let result = waiter
            .join()
            .expect("waiter thread panicked");
        assert_eq!(
            result,
            Some(("seed".to_string(), "second".to_string()))
        );
    }
}
