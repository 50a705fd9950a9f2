//! Parallel dispatch of one kernel over a partitioned buffer.
//!
//! [`Dispatcher::dispatch`] splits the output buffer into one disjoint
//! mutable slice per [`WorkRange`], runs the kernel for every range on a
//! fixed-size rayon pool and joins before returning. Kernels only ever see
//! their own output slice, so no two workers can write the same element.
//!
//! Failures do not hang the caller: panics are caught, the first failure
//! cancels the rest of the stage, and an optional timeout bounds the join.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{FxError, FxResult, WorkerFault};
use crate::partition::WorkRange;

/// How many items a kernel processes between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Cooperative cancellation flag shared between the caller and workers.
///
/// A child token is cancelled when either it or its parent is.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once this token or any of its ancestors has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self.parent.as_deref().is_some_and(CancelToken::is_cancelled)
    }

    /// A token that can be cancelled independently without touching `self`.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }
}

/// What a kernel invocation is asked to do.
#[derive(Debug)]
pub struct Job<'a> {
    pub worker: usize,
    pub range: WorkRange,
    pub cancel: &'a CancelToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// The job observed its cancellation token and stopped early.
    Cancelled,
    Failed(String),
}

/// A unit of parallel work writing `T` elements.
///
/// `process` receives the slice of the output belonging to `job.range`,
/// `job.range.count * stride` elements long, where element 0 corresponds to
/// item `job.range.start`. Inputs are captured by the implementing type and
/// must be read-only for the whole dispatch.
pub trait Kernel<T>: Sync {
    fn name(&self) -> &'static str;

    fn process(&self, job: &Job<'_>, out: &mut [T]) -> Result<(), KernelError>;
}

/// Runs `f` for each item of the job, checking for cancellation between
/// blocks of [`CANCEL_CHECK_INTERVAL`] items.
///
/// `f` gets the absolute item index and that item's `stride`-long output.
pub fn for_each_item<T, F>(
    job: &Job<'_>,
    out: &mut [T],
    stride: usize,
    mut f: F,
) -> Result<(), KernelError>
where
    F: FnMut(usize, &mut [T]),
{
    for (block_idx, block) in out.chunks_mut(CANCEL_CHECK_INTERVAL * stride).enumerate() {
        if job.cancel.is_cancelled() {
            return Err(KernelError::Cancelled);
        }
        let first = job.range.start + block_idx * CANCEL_CHECK_INTERVAL;
        for (i, item) in block.chunks_exact_mut(stride).enumerate() {
            f(first + i, item);
        }
    }
    Ok(())
}

/// Fixed-size pool of worker threads, built once per apply.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(workers: NonZeroUsize) -> FxResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|i| format!("lensfx-worker-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }
}

struct Report {
    worker: usize,
    range: WorkRange,
    outcome: Result<(), KernelError>,
    panic: Option<String>,
}

/// Runs kernels over partitioned buffers on a [`WorkerPool`].
pub struct Dispatcher<'p> {
    pool: &'p WorkerPool,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl<'p> Dispatcher<'p> {
    pub fn new(pool: &'p WorkerPool) -> Self {
        Self {
            pool,
            cancel: CancelToken::new(),
            timeout: None,
        }
    }

    /// Ties every stage to an external token, e.g. a UI cancel button.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bounds how long a stage may take before it is cancelled.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.pool.workers()
    }

    /// Processes every range of `ranges` with `kernel` and waits for all of
    /// them. `output` must hold exactly `stride` elements per item.
    pub fn dispatch<T, K>(
        &self,
        stage: &'static str,
        ranges: &[WorkRange],
        stride: usize,
        output: &mut [T],
        kernel: &K,
    ) -> FxResult<()>
    where
        T: Send,
        K: Kernel<T> + ?Sized,
    {
        let total: usize = ranges.iter().map(|r| r.count).sum();
        let expected = total * stride;
        if output.len() != expected {
            return Err(FxError::BufferSize {
                what: stage,
                expected,
                actual: output.len(),
            });
        }
        if self.cancel.is_cancelled() {
            return Err(FxError::Cancelled { stage });
        }

        let started = Instant::now();
        let stage_cancel = self.cancel.child();
        let slices = split_by_ranges(output, ranges, stride);
        let (tx, rx) = mpsc::channel::<Report>();
        debug!(
            stage,
            kernel = kernel.name(),
            workers = ranges.len(),
            total,
            "dispatching stage"
        );

        let failure = self.pool.pool.in_place_scope(|scope| {
            for (worker, (range, slice)) in ranges.iter().copied().zip(slices).enumerate() {
                let tx = tx.clone();
                let cancel = &stage_cancel;
                scope.spawn(move |_| {
                    let job = Job {
                        worker,
                        range,
                        cancel,
                    };
                    let caught =
                        panic::catch_unwind(AssertUnwindSafe(|| kernel.process(&job, slice)));
                    let report = match caught {
                        Ok(outcome) => Report {
                            worker,
                            range,
                            outcome,
                            panic: None,
                        },
                        Err(payload) => Report {
                            worker,
                            range,
                            outcome: Ok(()),
                            panic: Some(panic_message(payload.as_ref())),
                        },
                    };
                    let _ = tx.send(report);
                });
            }
            drop(tx);
            self.collect(stage, ranges, &rx, &stage_cancel, started)
        });

        if let Some(err) = failure {
            warn!(stage, error = %err, "stage failed");
            return Err(err);
        }
        debug!(stage, elapsed_ms = started.elapsed().as_secs_f64() * 1000.0, "stage joined");
        Ok(())
    }

    /// Waits for one report per range and returns the first failure.
    fn collect(
        &self,
        stage: &'static str,
        ranges: &[WorkRange],
        rx: &mpsc::Receiver<Report>,
        stage_cancel: &CancelToken,
        started: Instant,
    ) -> Option<FxError> {
        let mut finished = vec![false; ranges.len()];
        let mut failure: Option<FxError> = None;
        let mut cancelled = false;

        for _ in 0..ranges.len() {
            let received = match self.timeout {
                Some(limit) => {
                    let remaining = limit.saturating_sub(started.elapsed());
                    rx.recv_timeout(remaining)
                        .map_err(|e| matches!(e, mpsc::RecvTimeoutError::Timeout))
                }
                None => rx.recv().map_err(|_| false),
            };
            let report = match received {
                Ok(report) => report,
                Err(timed_out) => {
                    stage_cancel.cancel();
                    if failure.is_none() {
                        let worker = finished.iter().position(|done| !done).unwrap_or(0);
                        let fault = if timed_out {
                            WorkerFault::TimedOut(self.timeout.unwrap_or_default())
                        } else {
                            WorkerFault::Panicked("worker exited without reporting".to_string())
                        };
                        failure = Some(FxError::WorkerFailure {
                            stage,
                            worker,
                            range: ranges[worker],
                            fault,
                        });
                    }
                    break;
                }
            };
            finished[report.worker] = true;

            let fault = match (report.panic, report.outcome) {
                (Some(msg), _) => Some(WorkerFault::Panicked(msg)),
                (None, Err(KernelError::Failed(msg))) => Some(WorkerFault::Kernel(msg)),
                (None, Err(KernelError::Cancelled)) => {
                    cancelled = true;
                    None
                }
                (None, Ok(())) => None,
            };
            if let Some(fault) = fault {
                stage_cancel.cancel();
                if failure.is_none() {
                    warn!(stage, worker = report.worker, %fault, "worker failed");
                    failure = Some(FxError::WorkerFailure {
                        stage,
                        worker: report.worker,
                        range: report.range,
                        fault,
                    });
                }
            }
        }

        if failure.is_none() && (cancelled || self.cancel.is_cancelled()) {
            failure = Some(FxError::Cancelled { stage });
        }
        failure
    }
}

/// Cuts `output` into one mutable slice per range, in range order.
fn split_by_ranges<'a, T>(
    mut output: &'a mut [T],
    ranges: &[WorkRange],
    stride: usize,
) -> Vec<&'a mut [T]> {
    let mut slices = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = std::mem::take(&mut output).split_at_mut(range.count * stride);
        slices.push(head);
        output = tail;
    }
    slices
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Writes each item's own index, `stride` times.
    struct IndexKernel;

    impl Kernel<u32> for IndexKernel {
        fn name(&self) -> &'static str {
            "index"
        }

        fn process(&self, job: &Job<'_>, out: &mut [u32]) -> Result<(), KernelError> {
            for_each_item(job, out, 2, |i, item| item.fill(i as u32))
        }
    }

    struct PanicKernel {
        bad_worker: usize,
    }

    impl Kernel<u8> for PanicKernel {
        fn name(&self) -> &'static str {
            "panic"
        }

        fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
            if job.worker == self.bad_worker {
                panic!("kernel exploded");
            }
            out.fill(1);
            Ok(())
        }
    }

    /// Spins until cancelled.
    struct StallKernel;

    impl Kernel<u8> for StallKernel {
        fn name(&self) -> &'static str {
            "stall"
        }

        fn process(&self, job: &Job<'_>, _out: &mut [u8]) -> Result<(), KernelError> {
            while !job.cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(KernelError::Cancelled)
        }
    }

    #[test]
    fn every_item_is_written_by_its_own_worker() {
        let pool = WorkerPool::new(nz(4)).unwrap();
        let ranges = partition(10_003, nz(4));
        let mut out = vec![u32::MAX; 10_003 * 2];
        Dispatcher::new(&pool)
            .dispatch("index", &ranges, 2, &mut out, &IndexKernel)
            .unwrap();
        for (i, pair) in out.chunks_exact(2).enumerate() {
            assert_eq!(pair, [i as u32, i as u32]);
        }
    }

    #[test]
    fn empty_ranges_are_no_ops() {
        let pool = WorkerPool::new(nz(8)).unwrap();
        let ranges = partition(3, nz(8));
        let mut out = vec![u32::MAX; 6];
        Dispatcher::new(&pool)
            .dispatch("index", &ranges, 2, &mut out, &IndexKernel)
            .unwrap();
        assert_eq!(out, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn wrong_output_length_is_rejected_before_work() {
        let pool = WorkerPool::new(nz(2)).unwrap();
        let ranges = partition(10, nz(2));
        let mut out = vec![0u32; 7];
        let err = Dispatcher::new(&pool)
            .dispatch("index", &ranges, 2, &mut out, &IndexKernel)
            .unwrap_err();
        assert!(matches!(
            err,
            FxError::BufferSize {
                expected: 20,
                actual: 7,
                ..
            }
        ));
    }

    #[test]
    fn panicking_worker_surfaces_as_worker_failure() {
        let pool = WorkerPool::new(nz(4)).unwrap();
        let ranges = partition(400, nz(4));
        let mut out = vec![0u8; 400];
        let err = Dispatcher::new(&pool)
            .dispatch("explode", &ranges, 1, &mut out, &PanicKernel { bad_worker: 2 })
            .unwrap_err();
        match err {
            FxError::WorkerFailure {
                stage,
                worker,
                range,
                fault,
            } => {
                assert_eq!(stage, "explode");
                assert_eq!(worker, 2);
                assert_eq!(range, WorkRange::new(200, 100));
                assert_eq!(fault, WorkerFault::Panicked("kernel exploded".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stalled_stage_times_out_instead_of_hanging() {
        let pool = WorkerPool::new(nz(2)).unwrap();
        let ranges = partition(10, nz(2));
        let mut out = vec![0u8; 10];
        let err = Dispatcher::new(&pool)
            .with_timeout(Some(Duration::from_millis(50)))
            .dispatch("stall", &ranges, 1, &mut out, &StallKernel)
            .unwrap_err();
        assert!(matches!(
            err,
            FxError::WorkerFailure {
                fault: WorkerFault::TimedOut(_),
                ..
            }
        ));
    }

    #[test]
    fn cancelled_token_stops_dispatch() {
        let pool = WorkerPool::new(nz(2)).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let ranges = partition(10, nz(2));
        let mut out = vec![0u32; 20];
        let err = Dispatcher::new(&pool)
            .with_cancel(token)
            .dispatch("index", &ranges, 2, &mut out, &IndexKernel)
            .unwrap_err();
        assert!(matches!(err, FxError::Cancelled { stage: "index" }));
    }

    #[test]
    fn cancelling_a_grandparent_stops_running_workers() {
        let pool = WorkerPool::new(nz(2)).unwrap();
        let root = CancelToken::new();
        let caller = root.child();
        let ranges = partition(10, nz(2));
        let mut out = vec![0u8; 10];
        let started = Instant::now();
        let err = std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                root.cancel();
            });
            Dispatcher::new(&pool)
                .with_cancel(caller)
                .with_timeout(Some(Duration::from_secs(10)))
                .dispatch("stall", &ranges, 1, &mut out, &StallKernel)
                .unwrap_err()
        });
        assert!(matches!(err, FxError::Cancelled { stage: "stall" }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn child_token_follows_parent_but_not_the_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
        assert!(other.child().child().is_cancelled());
    }
}
