// crates/mediaforge-core/src/scheduler.rs
//
// Scheduler: fixed pool of worker threads draining a FIFO of transcode jobs.
// All public API a front end calls lives here.
//
// Locking:
//   queue: parking_lot Mutex around the pending FIFO, paired with `cvar`.
//          `paused` and `running` are only *written* while holding it, so a
//          worker that checks them under the lock and then waits can never
//          miss the wakeup.
//   jobs:  RwLock'd list of every submitted job in submission order; read by
//          list_jobs(), appended by submit().
// Job fields themselves are atomics (see job.rs); workers never hold either
// lock while a pipeline runs.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::job::{EncoderPreference, Job, JobId, JobSnapshot, JobStatus};
use crate::transcode::{DecodeMode, PipelineHooks, TranscodeRequest, Transcoder};

pub const DEFAULT_WORKERS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers:      usize,
    /// Jobs queue up but nothing is dequeued until `set_paused(false)`.
    pub start_paused: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, start_paused: true }
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct Shared<T> {
    transcoder: T,
    queue:      Mutex<VecDeque<Arc<Job>>>,
    cvar:       Condvar,
    paused:     AtomicBool,
    running:    AtomicBool,
    jobs:       RwLock<Vec<Arc<Job>>>,
    next_id:    AtomicU64,
}

impl<T> Shared<T> {
    /// Gate seen by a running pipeline. Releases blocked jobs on stop so the
    /// join in `Scheduler::stop` cannot hang on a paused job.
    fn hold_running_jobs(&self) -> bool {
        self.paused.load(Ordering::Acquire) && self.running.load(Ordering::Acquire)
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

pub struct Scheduler<T: Transcoder> {
    shared:  Arc<Shared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    count:   usize,
}

impl<T: Transcoder> Scheduler<T> {
    /// Build the pool and start its workers. A worker count of 0 is raised to 1.
    pub fn new(transcoder: T, config: SchedulerConfig) -> Self {
        let sched = Self {
            shared: Arc::new(Shared {
                transcoder,
                queue:   Mutex::new(VecDeque::new()),
                cvar:    Condvar::new(),
                paused:  AtomicBool::new(config.start_paused),
                running: AtomicBool::new(false),
                jobs:    RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
            workers: Mutex::new(Vec::new()),
            count:   config.workers.max(1),
        };
        sched.start();
        sched
    }

    pub fn worker_count(&self) -> usize {
        self.count
    }

    pub fn transcoder(&self) -> &T {
        &self.shared.transcoder
    }

    /// Spawn the worker threads. No-op if already running.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        {
            let _q = self.shared.queue.lock();
            if self.shared.running.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        for i in 0..self.count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("mediaforge-worker-{i}"))
                .spawn(move || worker_loop(&shared));
            match handle {
                Ok(h)  => workers.push(h),
                Err(e) => error!("failed to spawn worker {i}: {e}"),
            }
        }
        debug!(workers = workers.len(), "scheduler started");
    }

    /// Stop accepting work from the queue, wake every worker and join them.
    /// A job that is mid-pipeline runs to completion first; pending jobs stay
    /// Pending.
    pub fn stop(&self) {
        let mut workers = self.workers.lock();
        {
            let _q = self.shared.queue.lock();
            self.shared.running.store(false, Ordering::Release);
            self.shared.cvar.notify_all();
        }
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }

    pub fn submit(&self, input: impl Into<PathBuf>, output: impl Into<PathBuf>, encoder: EncoderPreference) -> JobId {
        let id  = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let job = Arc::new(Job::new(id, input.into(), output.into(), encoder));
        debug!(id, input = %job.input().display(), "job submitted");

        self.shared.jobs.write().push(Arc::clone(&job));
        let mut q = self.shared.queue.lock();
        q.push_back(job);
        self.shared.cvar.notify_one();
        id
    }

    pub fn set_paused(&self, paused: bool) {
        let _q = self.shared.queue.lock();
        self.shared.paused.store(paused, Ordering::Release);
        if !paused {
            self.shared.cvar.notify_all();
        }
        info!(paused, "scheduler pause state changed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Every submitted job, in submission order.
    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.shared.jobs.read().iter().map(|j| j.snapshot()).collect()
    }

    pub fn job(&self, id: JobId) -> Option<JobSnapshot> {
        self.shared.jobs.read().iter().find(|j| j.id() == id).map(|j| j.snapshot())
    }

    /// True when every submitted job reached a terminal status.
    pub fn all_finished(&self) -> bool {
        self.shared.jobs.read().iter().all(|j| j.status().is_terminal())
    }
}

impl<T: Transcoder> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

fn worker_loop<T: Transcoder>(shared: &Shared<T>) {
    loop {
        let job = {
            let mut q = shared.queue.lock();
            loop {
                if !shared.running.load(Ordering::Acquire) {
                    return;
                }
                if !shared.paused.load(Ordering::Acquire) {
                    if let Some(job) = q.pop_front() {
                        break job;
                    }
                }
                shared.cvar.wait(&mut q);
            }
        };
        process_job(shared, &job);
    }
}

fn process_job<T: Transcoder>(shared: &Shared<T>, job: &Job) {
    let transcoder = &shared.transcoder;

    if transcoder.is_target_codec(job.input()) {
        let msg = format!("Skipped (Already {})", transcoder.target_name());
        job.finish(JobStatus::Skipped, &msg);
        info!(id = job.id(), file = %job.filename(), "already {}, skipped", transcoder.target_name());
        return;
    }

    job.set_running("Transcoding...");

    let progress = |fraction: f32| job.publish_progress(fraction);
    let paused   = || shared.hold_running_jobs();
    let hooks    = PipelineHooks { progress: &progress, paused: &paused };

    let mut req = TranscodeRequest {
        input:   job.input().to_path_buf(),
        output:  job.output().to_path_buf(),
        encoder: job.encoder().clone(),
        mode:    DecodeMode::Auto,
    };

    // Set once any attempt got far enough to write to the output path.
    let mut wrote_output = false;
    let outcome = match transcoder.transcode(&req, &hooks) {
        Ok(attempt) => Ok((attempt, "Completed")),
        Err(e) if e.is_retryable() => {
            wrote_output = true;
            warn!(id = job.id(), file = %job.filename(), "hardware pipeline failed ({e}); retrying in software");
            job.set_running("Retrying (Software)...");
            req.mode = DecodeMode::Software;
            transcoder.transcode(&req, &hooks).map(|attempt| (attempt, "Completed (Software)"))
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok((attempt, msg)) => {
            job.finish(JobStatus::Completed, msg);
            info!(
                id = job.id(),
                file = %job.filename(),
                decoder = %attempt.decoder,
                encoder = %attempt.encoder,
                "{msg}"
            );
        }
        Err(e) => {
            job.finish(JobStatus::Failed, "Failed");
            error!(id = job.id(), file = %job.filename(), "transcode failed: {e}");
            if wrote_output || e.may_have_written_output() {
                remove_partial_output(job.output());
            }
        }
    }
}

/// Best-effort; a failed removal never changes the job's status.
fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed partial output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove partial output {}: {e}", path.display()),
    }
}
