//! Per-worker latency capture during parallel iteration.
//!
//! Every worker owns a private shard summary behind its [`WorkerHandle`] and
//! is the only thing that writes to it, so recording a sample takes no lock.
//! The time recorded for an iteration is the span between two successive
//! iteration boundaries, which costs one clock read per iteration instead of
//! a bracketing start/stop pair.
//!
//! Shards meet again only when a worker finishes: the shard is handed back to
//! the sampler under a mutex, once per worker, and the reporter combines them
//! after every worker is done.
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::ckms::Ckms;
use crate::error::{Error, Result};
use crate::harness::Iterations;
use crate::summary::Summary;
use crate::target::Targets;

/// Default number of samples buffered before being folded into a shard.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// A monotonic time source.
pub trait Clock: Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hands out worker handles and collects their shards.
pub struct ConcurrentSampler<S = Ckms<Duration>, C = MonotonicClock> {
    targets: Targets,
    clock: C,
    batch_size: usize,
    active: AtomicUsize,
    closed: AtomicBool,
    finished: Mutex<Vec<S>>,
}

impl<S, C> fmt::Debug for ConcurrentSampler<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentSampler")
            .field("targets", &self.targets)
            .field("batch_size", &self.batch_size)
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("finished", &self.finished.lock().len())
            .finish()
    }
}

impl<S> ConcurrentSampler<S, MonotonicClock>
where
    S: Summary<Duration>,
{
    /// A sampler whose shards answer `targets`, timed by the monotonic clock.
    pub fn new(targets: Targets) -> ConcurrentSampler<S, MonotonicClock> {
        ConcurrentSampler::with_clock(targets, MonotonicClock)
    }
}

impl<S, C> ConcurrentSampler<S, C>
where
    S: Summary<Duration>,
    C: Clock,
{
    /// A sampler reading time from `clock`.
    pub fn with_clock(targets: Targets, clock: C) -> ConcurrentSampler<S, C> {
        ConcurrentSampler {
            targets,
            clock,
            batch_size: DEFAULT_BATCH_SIZE,
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            finished: Mutex::new(Vec::new()),
        }
    }

    /// Buffer `batch_size` samples per worker before folding them into its
    /// shard. Values below 1 are treated as 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Reserve room for the shards of `workers` workers.
    pub fn expect_workers(self, workers: usize) -> Self {
        self.finished.lock().reserve(workers);
        self
    }

    /// The targets every shard answers.
    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Start a worker
    ///
    /// The handle drives `iterations` and records into a fresh shard. Fails
    /// with [`Error::ContractViolation`] once the sampler has been drained for
    /// reporting.
    pub fn begin<I>(&self, iterations: I) -> Result<WorkerHandle<'_, S, C, I>>
    where
        I: Iterations,
    {
        {
            // drain checks `active` and closes under this same lock
            let _finished = self.finished.lock();
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::ContractViolation("sampling has already closed"));
            }
            self.active.fetch_add(1, Ordering::AcqRel);
        }
        Ok(WorkerHandle {
            sampler: self,
            iterations,
            shard: Some(S::with_targets(self.targets.clone())),
            buffer: Vec::with_capacity(self.batch_size),
            tick: None,
            recorded: 0,
            _not_sync: PhantomData,
        })
    }

    /// Workers begun and not yet finished.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Workers that have finished and handed back their shard.
    pub fn finished_workers(&self) -> usize {
        self.finished.lock().len()
    }

    fn deposit(&self, shard: S) {
        let mut finished = self.finished.lock();
        finished.push(shard);
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Close the sampler and take every finished shard
    ///
    /// Fails with [`Error::ContractViolation`] while any worker is still
    /// active; the sampler stays open in that case.
    pub fn drain(&self) -> Result<Vec<S>> {
        let mut finished = self.finished.lock();
        if self.active.load(Ordering::Acquire) != 0 {
            return Err(Error::ContractViolation("workers are still sampling"));
        }
        self.closed.store(true, Ordering::Release);
        Ok(mem::replace(&mut *finished, Vec::new()))
    }
}

/// One worker's view of the sampler
///
/// Call [`WorkerHandle::next`] at every iteration boundary. The handle is
/// meant to live on one thread and is not `Sync`. Finishing consumes it, so
/// nothing can be recorded into a shard after its worker ends; dropping it
/// finishes it too.
pub struct WorkerHandle<'a, S, C, I>
where
    S: Summary<Duration>,
    C: Clock,
{
    sampler: &'a ConcurrentSampler<S, C>,
    iterations: I,
    shard: Option<S>,
    buffer: Vec<Duration>,
    tick: Option<Instant>,
    recorded: usize,
    _not_sync: PhantomData<std::cell::Cell<()>>,
}

impl<'a, S, C, I> fmt::Debug for WorkerHandle<'a, S, C, I>
where
    S: Summary<Duration>,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("recorded", &self.recorded)
            .field("buffered", &self.buffer.len())
            .field("started", &self.tick.is_some())
            .finish()
    }
}

impl<'a, S, C, I> WorkerHandle<'a, S, C, I>
where
    S: Summary<Duration>,
    C: Clock,
    I: Iterations,
{
    /// Mark an iteration boundary and report whether another iteration runs
    ///
    /// The first call only starts the clock. Each later call records the time
    /// since the previous boundary, so a loop of `n` iterations yields `n`
    /// samples. Time spent folding a full buffer into the shard is not
    /// charged to any iteration.
    #[inline]
    pub fn next(&mut self) -> bool {
        let mut now = self.sampler.clock.now();
        if let Some(tick) = self.tick {
            self.buffer.push(now.saturating_duration_since(tick));
            self.recorded += 1;
            if self.buffer.len() >= self.sampler.batch_size {
                self.flush();
                now = self.sampler.clock.now();
            }
        }
        self.tick = Some(now);
        self.iterations.next()
    }

    /// Samples recorded so far by this worker.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if let Some(shard) = self.shard.as_mut() {
            if let Err(err) = shard.insert_batch(&mut self.buffer) {
                tracing::error!(%err, dropped = self.buffer.len(), "rejected latency batch");
            }
        }
        self.buffer.clear();
    }

    /// End this worker, handing its shard back to the sampler
    ///
    /// Returns the number of samples the worker recorded.
    pub fn finish(mut self) -> usize {
        self.close();
        self.recorded
    }

    fn close(&mut self) {
        self.flush();
        if let Some(shard) = self.shard.take() {
            tracing::debug!(samples = shard.count(), "worker finished");
            self.sampler.deposit(shard);
        }
    }
}

impl<'a, S, C, I> Drop for WorkerHandle<'a, S, C, I>
where
    S: Summary<Duration>,
    C: Clock,
{
    fn drop(&mut self) {
        // finish() has already taken the shard; otherwise the worker unwound
        // or was dropped early and hands back what it has
        if let Some(mut shard) = self.shard.take() {
            if !self.buffer.is_empty() {
                if let Err(err) = shard.insert_batch(&mut self.buffer) {
                    tracing::error!(%err, "rejected latency batch");
                }
            }
            tracing::warn!(samples = shard.count(), "worker dropped without finishing");
            self.sampler.deposit(shard);
        }
    }
}
