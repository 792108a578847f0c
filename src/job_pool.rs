//! A genuine multi-threaded [`JobManager`], backing the render graph's
//! recorder with a small pool of persistent worker threads fed through a
//! `flume` channel — the way the teacher's `CoreThreadJobManager` feeds a
//! platform thread pool, generalized away from any particular platform API.

use crate::device::JobManager;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of OS threads, each blocked on a `flume` receiver waiting for
/// recording tasks.
///
/// `dispatch_tasks` hands out tasks that borrow frame-local data (lifetime
/// `'a`, not `'static`); since the worker threads are long-lived, each job's
/// lifetime is extended to `'static` for the trip across the channel and
/// narrowed back by blocking until every task in the batch has signalled
/// completion before `dispatch_tasks` returns. This is the same soundness
/// argument a scoped thread pool (`std::thread::scope`, `rayon::scope`)
/// relies on, just implemented by hand against a channel instead of
/// `JoinHandle`s, so the pool can stay alive across frames instead of being
/// torn down and rebuilt every `dispatch_tasks` call.
pub struct ThreadPoolJobManager {
    job_tx: flume::Sender<(Job, flume::Sender<()>)>,
    thread_count: u32,
    _workers: Vec<std::thread::JoinHandle<()>>,
}

impl ThreadPoolJobManager {
    /// Spawns `thread_count` persistent worker threads. `thread_count == 0`
    /// makes `dispatch_tasks` run every task inline on the calling thread
    /// instead.
    #[must_use]
    pub fn new(thread_count: u32) -> Self {
        let (job_tx, job_rx) = flume::unbounded::<(Job, flume::Sender<()>)>();
        let workers = (0..thread_count)
            .map(|i| {
                let job_rx = job_rx.clone();
                std::thread::Builder::new()
                    .name(format!("render-graph-worker-{i}"))
                    .spawn(move || {
                        while let Ok((job, done)) = job_rx.recv() {
                            // Catch so a panicking recording task still signals
                            // completion; otherwise `dispatch_tasks` would block
                            // forever waiting on a `done` that never arrives.
                            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
                            let _ = done.send(());
                            if let Err(payload) = result {
                                std::panic::resume_unwind(payload);
                            }
                        }
                    })
                    .expect("failed to spawn render graph worker thread")
            })
            .collect();
        Self { job_tx, thread_count, _workers: workers }
    }
}

impl JobManager for ThreadPoolJobManager {
    fn thread_count(&self) -> u32 {
        self.thread_count.max(1)
    }

    fn dispatch_tasks<'a>(&self, tasks: Vec<Box<dyn FnOnce() + Send + 'a>>) {
        if self.thread_count == 0 {
            for task in tasks {
                task();
            }
            return;
        }

        let count = tasks.len();
        let (done_tx, done_rx) = flume::bounded::<()>(count);
        for task in tasks {
            // SAFETY: the borrow checker sees `'a`, but every job handed to a
            // worker here is guaranteed to finish before this function
            // returns: we block below on exactly `count` completions, one
            // per job sent. The extended lifetime never actually escapes the
            // stack frame that produced it.
            let job: Job = unsafe { std::mem::transmute::<Box<dyn FnOnce() + Send + 'a>, Job>(task) };
            self.job_tx.send((job, done_tx.clone())).expect("worker threads outlive the job manager");
        }
        for _ in 0..count {
            done_rx.recv().expect("a worker thread panicked before signalling completion");
        }
    }
}
