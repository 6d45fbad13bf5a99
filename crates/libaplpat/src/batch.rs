
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::error;

use crate::error::ExportError;
use crate::export;
use crate::models::{BatchRequest, BatchState, BatchStatus};

/// Called with a status snapshot after every state change of a batch job.
pub type ProgressObserver = dyn Fn(&BatchStatus) + Send + Sync;

pub const DEFAULT_MAX_JOBS: usize = 50;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// In-memory registry of batch export jobs.
///
/// One worker thread per job walks the APL set in order; each item failure
/// increments `failed` and the walk continues. Cancellation is cooperative,
/// checked between items. Finished jobs are pruned by age and count.
#[derive(Clone)]
pub struct BatchManager {
    inner: Arc<BatchInner>,
}

struct BatchInner {
    jobs: Mutex<HashMap<String, JobEntry>>,
    observer: Mutex<Option<Box<ProgressObserver>>>,
    max_jobs: usize,
    max_age: Duration,
    next_id: AtomicU64,
}

struct JobEntry {
    status: BatchStatus,
    cancel: Arc<AtomicBool>,
    created: Instant,
    handle: Option<JoinHandle<()>>,
}

impl Default for BatchManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS, DEFAULT_MAX_AGE)
    }
}

impl BatchManager {
    pub fn new(max_jobs: usize, max_age: Duration) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                jobs: Mutex::new(HashMap::new()),
                observer: Mutex::new(None),
                max_jobs,
                max_age,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register an observer for progress snapshots. Snapshots are delivered
    /// outside the registry lock, so the observer may call back into the
    /// manager (e.g. to cancel the job it is watching).
    pub fn set_progress_observer(&self, observer: Box<ProgressObserver>) {
        *self.inner.observer.lock().expect("observer lock poisoned") = Some(observer);
    }

    /// Start a batch job. Returns the batch id immediately; the export runs
    /// on a worker thread.
    pub fn start(&self, request: BatchRequest) -> Result<String, ExportError> {
        request.validate()?;

        let batch_id = self.next_batch_id();
        let apl_values = request.apl_values();
        let cancel = Arc::new(AtomicBool::new(false));

        let status = BatchStatus {
            batch_id: batch_id.clone(),
            state: BatchState::Running,
            total: apl_values.len() as u32,
            completed: 0,
            failed: 0,
            current_apl: None,
        };

        {
            let mut jobs = self.inner.jobs.lock().expect("jobs lock poisoned");
            prune_jobs(&mut jobs, self.inner.max_jobs, self.inner.max_age);
            jobs.insert(
                batch_id.clone(),
                JobEntry {
                    status,
                    cancel: Arc::clone(&cancel),
                    created: Instant::now(),
                    handle: None,
                },
            );
        }

        let inner = Arc::clone(&self.inner);
        let thread_id = batch_id.clone();
        let handle = std::thread::spawn(move || {
            execute_batch(&inner, &thread_id, &request, &apl_values, &cancel);
        });
        if let Some(entry) = self
            .inner
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get_mut(&batch_id)
        {
            entry.handle = Some(handle);
        }

        Ok(batch_id)
    }

    pub fn status(&self, batch_id: &str) -> Option<BatchStatus> {
        self.inner
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(batch_id)
            .map(|entry| entry.status.clone())
    }

    /// Request cancellation. Returns whether the batch id was known. The
    /// job stops before its next item.
    pub fn cancel(&self, batch_id: &str) -> bool {
        match self
            .inner
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(batch_id)
        {
            Some(entry) => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Block until the batch's worker thread has finished.
    pub fn wait(&self, batch_id: &str) {
        let handle = self
            .inner
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get_mut(batch_id)
            .and_then(|entry| entry.handle.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("batch {batch_id}: worker thread panicked");
            }
        }
    }

    fn next_batch_id(&self) -> String {
        let nonce = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        format!("{:08x}", (nanos ^ nonce.wrapping_mul(0x9E37_79B9)) as u32)
    }
}

fn execute_batch(
    inner: &BatchInner,
    batch_id: &str,
    request: &BatchRequest,
    apl_values: &[u8],
    cancel: &AtomicBool,
) {
    for &apl in apl_values {
        if cancel.load(Ordering::Relaxed) {
            let snapshot = update_status(inner, batch_id, |status| {
                status.state = BatchState::Cancelled;
                status.current_apl = None;
            });
            notify(inner, snapshot);
            break;
        }

        let snapshot = update_status(inner, batch_id, |status| {
            status.current_apl = Some(apl);
        });
        notify(inner, snapshot);

        let result = export::export_single(&request.single(apl));
        let snapshot = update_status(inner, batch_id, |status| match result {
            Ok(_) => status.completed += 1,
            Err(ref e) => {
                error!("batch {batch_id}: APL {apl}% failed: {e}");
                status.failed += 1;
            }
        });
        notify(inner, snapshot);
    }

    let snapshot = update_status(inner, batch_id, |status| {
        if status.state == BatchState::Running {
            status.state = if status.failed == 0 {
                BatchState::Completed
            } else {
                BatchState::Failed
            };
        }
        status.current_apl = None;
    });
    notify(inner, snapshot);
}

/// Mutate a job's status under the lock and return a snapshot for
/// observers.
fn update_status(
    inner: &BatchInner,
    batch_id: &str,
    apply: impl FnOnce(&mut BatchStatus),
) -> Option<BatchStatus> {
    let mut jobs = inner.jobs.lock().expect("jobs lock poisoned");
    let entry = jobs.get_mut(batch_id)?;
    apply(&mut entry.status);
    Some(entry.status.clone())
}

fn notify(inner: &BatchInner, snapshot: Option<BatchStatus>) {
    let Some(snapshot) = snapshot else {
        return;
    };
    let observer = inner.observer.lock().expect("observer lock poisoned");
    if let Some(observer) = observer.as_ref() {
        observer(&snapshot);
    }
}

/// Drop finished jobs that are past the age limit, then enforce the job
/// cap, preferring to keep running jobs.
fn prune_jobs(jobs: &mut HashMap<String, JobEntry>, max_jobs: usize, max_age: Duration) {
    let now = Instant::now();
    jobs.retain(|_, entry| {
        entry.status.state == BatchState::Running || now.duration_since(entry.created) <= max_age
    });

    if jobs.len() <= max_jobs {
        return;
    }
    let excess: Vec<String> = jobs
        .iter()
        .filter(|(_, entry)| entry.status.state != BatchState::Running)
        .map(|(id, _)| id.clone())
        .take(jobs.len() - max_jobs)
        .collect();
    for id in excess {
        jobs.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::models::{ColorSpaceId, ExportFormat, HdrMode, Shape};

    fn batch_request(dir: &str) -> BatchRequest {
        BatchRequest {
            width: 16,
            height: 16,
            apl_range_start: 10,
            apl_range_end: 30,
            apl_step: 10,
            shape: Shape::Rectangle,
            color_space: ColorSpaceId::Rec709,
            hdr_mode: HdrMode::None,
            hdr_peak_nits: 1000,
            export_format: ExportFormat::Png,
            output_directory: std::env::temp_dir().join(dir),
        }
    }

    #[test]
    fn batch_completes_and_counts() {
        let manager = BatchManager::default();
        let notifications = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&notifications);
        manager.set_progress_observer(Box::new(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        }));

        let id = manager.start(batch_request("aplpat-batch-ok")).unwrap();
        manager.wait(&id);

        let status = manager.status(&id).unwrap();
        assert_eq!(status.state, BatchState::Completed);
        assert_eq!(status.total, 3);
        assert_eq!(status.completed, 3);
        assert_eq!(status.failed, 0);
        assert_eq!(status.current_apl, None);
        // Two per item plus the final transition.
        assert_eq!(notifications.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn cancellation_stops_between_items() {
        let manager = BatchManager::default();
        let from_observer = manager.clone();
        manager.set_progress_observer(Box::new(move |status| {
            // Cancel as soon as the first item starts; the worker must
            // notice before item two.
            if status.current_apl == Some(10) {
                from_observer.cancel(&status.batch_id);
            }
        }));

        let id = manager.start(batch_request("aplpat-batch-cancel")).unwrap();
        manager.wait(&id);

        let status = manager.status(&id).unwrap();
        assert_eq!(status.state, BatchState::Cancelled);
        assert_eq!(status.completed, 1);
        assert_eq!(status.failed, 0);
    }

    #[test]
    fn cancel_of_unknown_batch_is_rejected() {
        let manager = BatchManager::default();
        assert!(!manager.cancel("does-not-exist"));
    }

    #[test]
    fn invalid_batch_request_never_spawns() {
        let manager = BatchManager::default();
        let mut request = batch_request("aplpat-batch-invalid");
        request.apl_step = 0;
        assert!(manager.start(request).is_err());
    }

    #[test]
    fn prune_caps_finished_jobs() {
        let mut jobs = HashMap::new();
        for i in 0..4 {
            jobs.insert(
                format!("job-{i}"),
                JobEntry {
                    status: BatchStatus {
                        batch_id: format!("job-{i}"),
                        state: if i == 0 { BatchState::Running } else { BatchState::Completed },
                        total: 1,
                        completed: 1,
                        failed: 0,
                        current_apl: None,
                    },
                    cancel: Arc::new(AtomicBool::new(false)),
                    created: Instant::now(),
                    handle: None,
                },
            );
        }
        prune_jobs(&mut jobs, 2, Duration::from_secs(3600));
        assert_eq!(jobs.len(), 2);
        assert!(jobs.contains_key("job-0"));
    }
}
