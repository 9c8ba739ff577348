use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SHUTDOWN_SLICE: Duration = Duration::from_millis(50);

/// Sleeps for `total`, waking early once `shutdown` is set.
pub(crate) fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SHUTDOWN_SLICE));
    }
}

pub type TimerJob = Box<dyn FnOnce() + Send>;

/// Runs a job once after a delay, off the caller's thread.
pub trait Timer: Send + Sync {
    fn after(&self, delay: Duration, job: TimerJob);
}

/// Hands out tokens; taking a new one makes every older token stale.
#[derive(Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    /// A token for the generation in effect now, without starting a new one.
    pub fn current(&self) -> Generation {
        Generation {
            current: Arc::clone(&self.current),
            value: self.current.load(Ordering::SeqCst),
        }
    }

    pub fn advance(&self) -> Generation {
        let value = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Generation {
            current: Arc::clone(&self.current),
            value,
        }
    }
}

#[derive(Clone)]
pub struct Generation {
    current: Arc<AtomicU64>,
    value: u64,
}

impl Generation {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.value
    }
}

const MUTE_WINDOW: Duration = Duration::from_millis(1800);
const MUTE_BURST: Duration = Duration::from_millis(500);
const MUTE_BURST_STEP: Duration = Duration::from_millis(15);
const MUTE_STEP: Duration = Duration::from_millis(30);

/// Offsets (from window start) at which a mute window polls again after its
/// immediate attempt.
pub fn mute_poll_offsets() -> Vec<Duration> {
    let mut out = Vec::new();
    let mut elapsed = Duration::ZERO;
    while elapsed < MUTE_WINDOW {
        elapsed += if elapsed < MUTE_BURST {
            MUTE_BURST_STEP
        } else {
            MUTE_STEP
        };
        out.push(elapsed);
    }
    out
}

struct Entry {
    at: Instant,
    seq: u64,
    job: TimerJob,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    // Reversed so the heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// One worker thread serving every delayed job. Jobs still waiting at
/// shutdown are dropped without running.
pub struct ThreadTimer {
    tx: Mutex<Option<Sender<(Instant, TimerJob)>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimer {
    pub fn spawn() -> Self {
        let (tx, rx) = unbounded::<(Instant, TimerJob)>();
        let join_handle = thread::spawn(move || {
            let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
            let mut seq = 0u64;
            loop {
                let received = match heap.peek() {
                    Some(next) => rx.recv_timeout(next.at.saturating_duration_since(Instant::now())),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok((at, job)) => {
                        seq += 1;
                        heap.push(Entry { at, seq, job });
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
                let now = Instant::now();
                while heap.peek().is_some_and(|e| e.at <= now) {
                    if let Some(entry) = heap.pop() {
                        (entry.job)();
                    }
                }
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
            join_handle: Mutex::new(Some(join_handle)),
        }
    }

    pub fn shutdown(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Timer for ThreadTimer {
    fn after(&self, delay: Duration, job: TimerJob) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send((Instant::now() + delay, job));
        }
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
