use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};

use common::error::Error;
use common::types::{RatePath, RateSnapshot};
use tracing::{debug, trace};

/// Outgoing edges per vertex, distilled from the snapshot's raw rate matrix
/// for the duration of one search session. Shared read-only across workers.
type Adjacency = Vec<Vec<(usize, f64)>>;

/// One backtracking branch, self-contained so it can cross worker
/// boundaries: the visited prefix (source first), the vertex to expand and
/// the rate product accumulated along the prefix.
#[derive(Debug, Clone)]
pub struct SearchTask {
    path: Vec<usize>,
    vertex: usize,
    product: f64,
}

/// Messages workers send back to the orchestrator. An explicit tagged union
/// so the protocol is self-describing.
enum WorkerReport {
    /// A branch handed off instead of being explored locally; costs the
    /// delegating worker one credit.
    Delegated(SearchTask),

    /// A worker finished (or fully delegated) the subtree of its current
    /// task; `best` is the best target-reaching path found locally.
    SubtreeComplete {
        worker: usize,
        best: Option<RatePath>,
    },

    /// The worker's exploration panicked; the session cannot complete.
    Failed { worker: usize },
}

/// Picks the session's worker-pool size: two cores are left for the runtime
/// and the pool never exceeds the vertex count, but at least one worker
/// always runs even on tiny machines.
pub fn default_worker_count(num_vertices: usize) -> usize {
    let available = thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    available.saturating_sub(2).min(num_vertices).max(1)
}

/// Finds the simple path (no repeated vertex) from `source` to `target`
/// maximizing the product of edge rates, via backtracking DFS parallelized
/// over `worker_count` OS threads.
///
/// Flow control uses one atomic credit counter per worker: holding a credit
/// lets a worker hand a branch back to the orchestrator instead of recursing
/// into it, so idle workers keep receiving work without a round trip per
/// delegation decision. The seed task starts on one worker with `W - 1`
/// credits; the orchestrator tops credits up whenever its task queue runs
/// dry while workers are still busy.
///
/// All session state (channels, credits, threads) is created here and torn
/// down unconditionally before returning. Branch-local path state is copied
/// across every delegation boundary; workers share nothing mutable beyond
/// the credit counters.
///
/// Returns `Ok(None)` when `target` is unreachable from `source`, and
/// `Err(SearchSessionFailed)` if a worker dies mid-session.
pub fn best_simple_path(
    snapshot: &RateSnapshot,
    source: usize,
    target: usize,
    worker_count: usize,
) -> Result<Option<RatePath>, Error> {
    let adjacency = Arc::new(build_adjacency(snapshot));
    let worker_count = worker_count.max(1);

    let credits: Arc<Vec<AtomicUsize>> =
        Arc::new((0..worker_count).map(|_| AtomicUsize::new(0)).collect());

    let (report_sender, report_receiver) = channel::<WorkerReport>();

    let mut task_senders: Vec<Sender<SearchTask>> = Vec::with_capacity(worker_count);
    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count);

    for worker_id in 0..worker_count {
        let (task_sender, task_receiver) = channel::<SearchTask>();
        task_senders.push(task_sender);

        let worker = Worker {
            id: worker_id,
            adjacency: Arc::clone(&adjacency),
            target,
            credits: Arc::clone(&credits),
            reports: report_sender.clone(),
        };
        handles.push(thread::spawn(move || worker.run(task_receiver)));
    }
    // The orchestrator keeps only the workers' clones; recv() then reports
    // a disconnect as soon as every worker has exited.
    drop(report_sender);

    debug!(workers = worker_count, source, target, "search session started");

    let seed = SearchTask {
        path: vec![source],
        vertex: source,
        product: 1.0,
    };
    credits[0].store(worker_count - 1, Ordering::Release);

    let outcome =
        Orchestrator::new(task_senders, Arc::clone(&credits)).run(seed, report_receiver);

    // Task senders were dropped by the orchestrator; every worker unblocks
    // from recv() and exits.
    for handle in handles {
        let _ = handle.join();
    }

    outcome
}

fn build_adjacency(snapshot: &RateSnapshot) -> Adjacency {
    let n = snapshot.len();
    let mut adjacency = vec![Vec::new(); n];

    for (from, neighbors) in adjacency.iter_mut().enumerate() {
        for to in 0..n {
            if from != to && snapshot.has_edge(from, to) {
                neighbors.push((to, snapshot.rate(from, to)));
            }
        }
    }

    adjacency
}

/// Session-scoped dispatcher: tracks which workers are idle, queues branches
/// that arrive while all workers are busy, and reduces subtree results into
/// the running best.
struct Orchestrator {
    task_senders: Vec<Sender<SearchTask>>,
    credits: Arc<Vec<AtomicUsize>>,
    idle: VecDeque<usize>,
    busy: Vec<bool>,
    queue: VecDeque<SearchTask>,
    best: Option<RatePath>,
}

impl Orchestrator {
    fn new(task_senders: Vec<Sender<SearchTask>>, credits: Arc<Vec<AtomicUsize>>) -> Self {
        let worker_count = task_senders.len();
        Orchestrator {
            task_senders,
            credits,
            idle: (0..worker_count).collect(),
            busy: vec![false; worker_count],
            queue: VecDeque::new(),
            best: None,
        }
    }

    fn run(
        mut self,
        seed: SearchTask,
        reports: Receiver<WorkerReport>,
    ) -> Result<Option<RatePath>, Error> {
        self.queue.push_back(seed);
        self.dispatch_next()?;

        loop {
            let report = reports
                .recv()
                .map_err(|_| Error::SearchSessionFailed(usize::MAX))?;

            match report {
                WorkerReport::Delegated(task) => {
                    self.queue.push_back(task);
                    self.dispatch_next()?;
                }

                WorkerReport::SubtreeComplete { worker, best } => {
                    self.merge_best(best);
                    self.busy[worker] = false;
                    self.idle.push_back(worker);

                    if self.queue.is_empty() && self.idle.len() == self.busy.len() {
                        // No branch queued, no worker busy: the tree is
                        // fully explored.
                        return Ok(self.best.take());
                    }

                    if !self.queue.is_empty() {
                        self.dispatch_next()?;
                    } else {
                        self.grant_credits();
                    }
                }

                WorkerReport::Failed { worker } => {
                    return Err(Error::SearchSessionFailed(worker));
                }
            }
        }
    }

    fn dispatch_next(&mut self) -> Result<(), Error> {
        if self.queue.is_empty() || self.idle.is_empty() {
            return Ok(());
        }

        let task = self.queue.pop_front().expect("queue checked non-empty");
        let worker = self.idle.pop_front().expect("idle list checked non-empty");
        self.busy[worker] = true;

        self.task_senders[worker]
            .send(task)
            .map_err(|_| Error::SearchSessionFailed(worker))
    }

    /// Strictly-greater merge: on a tie the first recorded path stands.
    fn merge_best(&mut self, candidate: Option<RatePath>) {
        let Some(candidate) = candidate else { return };

        match &self.best {
            Some(current) if candidate.rate <= current.rate => {}
            _ => self.best = Some(candidate),
        }
    }

    /// The queue ran dry but some subtrees are still in flight: give every
    /// busy worker one more credit so future fan-out keeps the idle workers
    /// fed.
    fn grant_credits(&self) {
        for (worker, busy) in self.busy.iter().enumerate() {
            if *busy {
                self.credits[worker].fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}

struct Worker {
    id: usize,
    adjacency: Arc<Adjacency>,
    target: usize,
    credits: Arc<Vec<AtomicUsize>>,
    reports: Sender<WorkerReport>,
}

impl Worker {
    fn run(self, tasks: Receiver<SearchTask>) {
        while let Ok(task) = tasks.recv() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.explore(task)));

            let report = match outcome {
                Ok(best) => WorkerReport::SubtreeComplete {
                    worker: self.id,
                    best,
                },
                Err(_) => WorkerReport::Failed { worker: self.id },
            };

            let failed = matches!(report, WorkerReport::Failed { .. });
            if self.reports.send(report).is_err() || failed {
                // Orchestrator gone (session torn down) or this worker is
                // no longer trustworthy.
                break;
            }
        }
    }

    fn explore(&self, task: SearchTask) -> Option<RatePath> {
        let SearchTask {
            mut path,
            vertex,
            product,
        } = task;

        let mut visited = vec![false; self.adjacency.len()];
        for &v in &path {
            visited[v] = true;
        }

        let mut best: Option<RatePath> = None;
        self.backtrack(vertex, product, &mut path, &mut visited, &mut best);

        trace!(worker = self.id, "subtree complete");
        best
    }

    fn backtrack(
        &self,
        vertex: usize,
        product: f64,
        path: &mut Vec<usize>,
        visited: &mut Vec<bool>,
        best: &mut Option<RatePath>,
    ) {
        if vertex == self.target {
            let improves = best.as_ref().is_none_or(|b| product > b.rate);
            if improves {
                *best = Some(RatePath {
                    path: path.clone(),
                    rate: product,
                });
            }
            return;
        }

        for &(next, rate) in &self.adjacency[vertex] {
            if visited[next] {
                continue;
            }

            if self.take_credit() {
                let mut branch_path = path.clone();
                branch_path.push(next);
                let branch = SearchTask {
                    path: branch_path,
                    vertex: next,
                    product: product * rate,
                };

                if self.reports.send(WorkerReport::Delegated(branch)).is_ok() {
                    continue;
                }
                // Orchestrator already gone; finish the branch locally so
                // the recursion still terminates cleanly.
            }

            visited[next] = true;
            path.push(next);
            self.backtrack(next, product * rate, path, visited, best);
            path.pop();
            visited[next] = false;
        }
    }

    /// Consumes one delegation credit if any is available. The decrement is
    /// a single compare-and-swap so a concurrent grant from the
    /// orchestrator can never be lost or double-spent.
    fn take_credit(&self) -> bool {
        self.credits[self.id]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |credit| {
                credit.checked_sub(1)
            })
            .is_ok()
    }
}
