//! Job queue and playback state shared by submitters and the streamer.
//!
//! All state lives behind one mutex. Two condition variables carry the
//! wake-ups: `queue_ready` for a consumer blocked on an empty queue and
//! `resumed` for a consumer blocked on pause (or sleeping through a
//! reconnect backoff).
//!
//! Stops are epoch based. A dequeued job remembers the epoch it started
//! in; any stop bumps the epoch, so the running job sees the change while
//! jobs taken afterwards start clean.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use super::{Job, PlaybackRequest};

/// Initial queue capacity. The queue grows past it; jobs are never dropped.
const QUEUE_CAPACITY: usize = 3;

/// How a submitted job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The source ran out of frames.
    Completed { frames: u64 },
    /// A stop, clear or replacing submission ended the job early.
    Stopped { frames: u64 },
    /// The job could not be started or its source failed.
    Failed(String),
    /// Cleared from the queue before it started.
    Discarded,
    /// The output connection dropped mid-job; progress is not resumed.
    Abandoned { frames: u64 },
}

/// Receives the outcome of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    outcome: Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Blocks until the job ends.
    pub fn wait(&self) -> JobOutcome {
        self.outcome.recv().unwrap_or(JobOutcome::Abandoned { frames: 0 })
    }

    /// Blocks until the job ends or `timeout` passes.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        match self.outcome.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(JobOutcome::Abandoned { frames: 0 }),
        }
    }

    /// Returns the outcome if the job has ended.
    pub fn try_outcome(&self) -> Option<JobOutcome> {
        match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(JobOutcome::Abandoned { frames: 0 }),
        }
    }
}

struct QueuedJob {
    id: u64,
    job: Job,
    reply: Sender<JobOutcome>,
}

/// A job the streamer has taken off the queue.
#[derive(Debug)]
pub struct ActiveJob {
    id: u64,
    job: Job,
    epoch: u64,
    reply: Sender<JobOutcome>,
}

impl ActiveJob {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Reports the outcome to the submitter.
    pub fn finish(self, outcome: JobOutcome) {
        debug!(job = self.id, ?outcome, "Job finished");
        // The submitter may have dropped its handle.
        let _ = self.reply.send(outcome);
    }
}

struct QueueState {
    pending: VecDeque<QueuedJob>,
    /// A consumer is blocked waiting for a job.
    waiting: bool,
    playing: bool,
    stop_epoch: u64,
    shutdown: bool,
    next_id: u64,
}

/// What the streamer should do with the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Stop,
}

/// Queue of streaming jobs plus play/pause/stop state.
pub struct JobController {
    state: Mutex<QueueState>,
    queue_ready: Condvar,
    resumed: Condvar,
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

impl JobController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::with_capacity(QUEUE_CAPACITY),
                waiting: false,
                playing: true,
                stop_epoch: 0,
                shutdown: false,
                next_id: 1,
            }),
            queue_ready: Condvar::new(),
            resumed: Condvar::new(),
        }
    }

    /// Queues a job.
    ///
    /// Unless the job is marked `enqueue`, everything queued is discarded,
    /// the running job is stopped and playback resumes before the job is
    /// appended, so it plays next.
    pub fn submit(&self, job: Job) -> JobHandle {
        let (reply, outcome) = channel::bounded(1);
        let mut state = self.state.lock();
        if !job.enqueue {
            Self::clear_locked(&mut state, true);
            state.playing = true;
            self.resumed.notify_all();
        }

        let id = state.next_id;
        state.next_id += 1;
        info!(job = id, enqueue = job.enqueue, queued = state.pending.len(), "Job submitted");
        state.pending.push_back(QueuedJob { id, job, reply });
        if state.waiting {
            state.waiting = false;
            self.queue_ready.notify_one();
        }
        JobHandle { id, outcome }
    }

    /// Removes the oldest job, blocking while the queue is empty.
    ///
    /// Returns `None` only after [`JobController::shutdown`].
    pub fn take(&self) -> Option<ActiveJob> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(queued) = state.pending.pop_front() {
                return Some(ActiveJob {
                    id: queued.id,
                    job: queued.job,
                    epoch: state.stop_epoch,
                    reply: queued.reply,
                });
            }
            state.waiting = true;
            self.queue_ready.wait(&mut state);
        }
    }

    /// Empties the queue. With `stop_also` the running job is stopped too.
    pub fn clear(&self, stop_also: bool) {
        let mut state = self.state.lock();
        Self::clear_locked(&mut state, stop_also);
        self.resumed.notify_all();
        self.queue_ready.notify_all();
        info!(stop = stop_also, "Queue cleared");
    }

    fn clear_locked(state: &mut QueueState, stop_also: bool) {
        for queued in state.pending.drain(..) {
            let _ = queued.reply.send(JobOutcome::Discarded);
        }
        if stop_also {
            state.stop_epoch += 1;
        }
    }

    /// Stops the running job after its current frame.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stop_epoch += 1;
        self.resumed.notify_all();
        info!("Stopping");
    }

    pub fn pause(&self) {
        self.state.lock().playing = false;
        info!("Pausing");
    }

    pub fn play(&self) {
        let mut state = self.state.lock();
        state.playing = true;
        self.resumed.notify_all();
        info!("Playing");
    }

    /// Applies a playback request: `clear` (optionally with `stop`), else
    /// `stop`, else `pause`, else `play`.
    pub fn playback(&self, request: PlaybackRequest) {
        if request.clear {
            self.clear(request.stop);
        } else if request.stop {
            self.stop();
        } else if request.pause {
            self.pause();
        } else if request.play {
            self.play();
        }
    }

    /// Called by the streamer before every frame. Blocks while paused;
    /// reports whether the job should keep going.
    pub fn checkpoint(&self, job: &ActiveJob) -> Checkpoint {
        let mut state = self.state.lock();
        loop {
            if state.shutdown || state.stop_epoch != job.epoch {
                return Checkpoint::Stop;
            }
            if state.playing {
                return Checkpoint::Continue;
            }
            self.resumed.wait(&mut state);
        }
    }

    /// True if `job` has been asked to stop.
    pub fn is_stopped(&self, job: &ActiveJob) -> bool {
        let state = self.state.lock();
        state.shutdown || state.stop_epoch != job.epoch
    }

    /// Wakes every waiter and makes [`JobController::take`] return `None`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        for queued in state.pending.drain(..) {
            let _ = queued.reply.send(JobOutcome::Discarded);
        }
        self.queue_ready.notify_all();
        self.resumed.notify_all();
        info!("Controller shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Sleeps for `duration` unless shut down first. Returns false if the
    /// controller was shut down.
    pub fn sleep_unless_shutdown(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        while !state.shutdown {
            if self.resumed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        !state.shutdown
    }

    /// Jobs waiting behind the running one.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// True while a consumer is blocked in [`JobController::take`].
    pub fn has_waiter(&self) -> bool {
        self.state.lock().waiting
    }
}
