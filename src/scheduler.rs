//! Concurrent search service.
//!
//! A master thread takes the newest queued query, releases a fixed pool of
//! workers that each score a contiguous slice of the pinned snapshot, waits
//! for all of them, ranks the merged hits and publishes them to a single-slot
//! [`ResultSlot`]. Submitting a query drops every query still waiting, and
//! results of a query that was superseded while running are discarded.

use std::collections::VecDeque;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::{CancelToken, Outcome};
use crate::config::SearchConfig;
use crate::error::{DictError, Result};
use crate::query::SearchQuery;
use crate::snapshot::{DictionarySnapshot, SharedDictionary, WordRef};

const WARMUP_QUERY: &str = "warmup";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub relevance: f32,
    /// Record position in the snapshot the hit was scored against.
    pub index: usize,
}

/// State of the most recently submitted query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Queued,
    Running,
    Delivered,
    Cancelled,
    /// A worker panicked while scoring; nothing was delivered.
    Failed,
}

/// Ranked hits of one query, with the snapshot they index into.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub request: u64,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub snapshot: Arc<DictionarySnapshot>,
    pub elapsed: Duration,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = (f32, WordRef<'_>)> + '_ {
        self.hits
            .iter()
            .filter_map(|hit| self.snapshot.word(hit.index).map(|word| (hit.relevance, word)))
    }
}

/// Fixed-point ranking key; equal-looking scores compare equal.
fn rank_key(relevance: f32) -> i64 {
    (f64::from(relevance) * 65536.0).round() as i64
}

/// Sorts by descending relevance, then headword and traditional spelling,
/// and keeps the first `max_results`.
pub fn rank_hits(snapshot: &DictionarySnapshot, hits: &mut Vec<SearchHit>, max_results: usize) {
    hits.sort_by(|a, b| {
        rank_key(b.relevance).cmp(&rank_key(a.relevance)).then_with(|| {
            let (a, b) = (&snapshot.records()[a.index], &snapshot.records()[b.index]);
            snapshot
                .string(a.headword)
                .cmp(snapshot.string(b.headword))
                .then_with(|| snapshot.string(a.traditional).cmp(snapshot.string(b.traditional)))
        })
    });
    hits.truncate(max_results);
}

/// Scores records in `range`, keeping those above the query's threshold.
pub fn score_range(
    snapshot: &DictionarySnapshot,
    query: &SearchQuery,
    range: Range<usize>,
    cancel: &CancelToken,
) -> Outcome<Vec<SearchHit>> {
    let mut hits = Vec::new();
    for index in range {
        if cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        let Some(word) = snapshot.word(index) else {
            break;
        };
        let relevance = query.score(word);
        if relevance > query.min_relevance() {
            hits.push(SearchHit { relevance, index });
        }
    }
    Outcome::Complete(hits)
}

/// Runs one query on the calling thread.
pub fn search_snapshot(snapshot: &DictionarySnapshot, text: &str, config: &SearchConfig) -> Vec<SearchHit> {
    let query = SearchQuery::with_min_relevance(text, config.min_relevance);
    if query.is_empty() {
        return Vec::new();
    }
    let mut hits = score_range(snapshot, &query, 0..snapshot.len(), &CancelToken::new())
        .complete()
        .unwrap_or_default();
    rank_hits(snapshot, &mut hits, config.max_results);
    hits
}

/// Contiguous, nearly equal slices of `0..len`.
fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let chunk = len.div_ceil(parts.max(1));
    (0..parts)
        .map(|part| (part * chunk).min(len)..((part + 1) * chunk).min(len))
        .collect()
}

/// Holds only the latest delivered results.
#[derive(Debug, Default)]
pub struct ResultSlot {
    latest: Mutex<Option<SearchResults>>,
    ready: Condvar,
}

impl ResultSlot {
    fn put(&self, results: SearchResults) {
        *self.latest.lock() = Some(results);
        self.ready.notify_all();
    }

    fn clear(&self) {
        self.latest.lock().take();
    }

    pub fn take(&self) -> Option<SearchResults> {
        self.latest.lock().take()
    }

    /// Blocks until results arrive or `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> Option<SearchResults> {
        let deadline = Instant::now() + timeout;
        let mut latest = self.latest.lock();
        while latest.is_none() {
            if self.ready.wait_until(&mut latest, deadline).timed_out() {
                break;
            }
        }
        latest.take()
    }

    /// Waits for the results of `request` only. Results of a newer request
    /// stay in the slot for whoever submitted it.
    fn wait_for(&self, request: u64, timeout: Duration) -> SlotWait {
        let deadline = Instant::now() + timeout;
        let mut latest = self.latest.lock();
        let mut timed_out = false;
        loop {
            if let Some(results) = latest.take_if(|results| results.request == request) {
                return SlotWait::Ready(results);
            }
            if let Some(newer) = latest.as_ref().map(|results| results.request).filter(|&id| id > request) {
                return SlotWait::Superseded(newer);
            }
            if timed_out {
                return SlotWait::TimedOut;
            }
            timed_out = self.ready.wait_until(&mut latest, deadline).timed_out();
        }
    }
}

pub type SearchCallback = Box<dyn FnOnce(&SearchResults) + Send + 'static>;

/// Scores one worker's slice of the snapshot. Always [`score_range`] outside tests.
type Scorer = Arc<
    dyn Fn(&DictionarySnapshot, &SearchQuery, Range<usize>, &CancelToken) -> Outcome<Vec<SearchHit>> + Send + Sync,
>;

enum SlotWait {
    Ready(SearchResults),
    Superseded(u64),
    TimedOut,
}

struct Request {
    id: u64,
    text: String,
    callback: Option<SearchCallback>,
}

struct Queue {
    pending: VecDeque<Request>,
    stopping: bool,
    latest: u64,
    state: SessionState,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
    slot: Arc<ResultSlot>,
}

impl Shared {
    /// Next request, or `None` once the service is stopping.
    fn next_request(&self) -> Option<Request> {
        let mut queue = self.queue.lock();
        loop {
            if queue.stopping {
                return None;
            }
            if let Some(request) = queue.pending.pop_front() {
                if request.id == queue.latest {
                    queue.state = SessionState::Running;
                }
                return Some(request);
            }
            self.wake.wait(&mut queue);
        }
    }

    fn finish(&self, id: u64, state: SessionState) {
        let mut queue = self.queue.lock();
        if queue.latest == id {
            queue.state = state;
        }
    }

    fn deliver(&self, callback: Option<SearchCallback>, results: SearchResults) {
        {
            let mut queue = self.queue.lock();
            if queue.stopping || queue.latest != results.request {
                debug!(request = results.request, "discarding superseded results");
                return;
            }
            queue.state = SessionState::Delivered;
            self.slot.put(results.clone());
        }
        if let Some(callback) = callback {
            callback(&results);
        }
    }
}

#[derive(Default)]
struct Round {
    generation: u64,
    query: Option<Arc<SearchQuery>>,
    pending: usize,
    partials: Vec<Vec<SearchHit>>,
    failures: usize,
    shutdown: bool,
}

/// Start gate and completion barrier shared by the master and its workers.
struct Rendezvous {
    workers: usize,
    round: Mutex<Round>,
    start: Condvar,
    done: Condvar,
}

impl Rendezvous {
    fn new(workers: usize) -> Self {
        Self {
            workers,
            round: Mutex::new(Round {
                partials: vec![Vec::new(); workers],
                ..Round::default()
            }),
            start: Condvar::new(),
            done: Condvar::new(),
        }
    }

    /// Releases every worker on `query` and waits for all of them. `Err`
    /// carries the number of workers that panicked.
    fn run_round(&self, query: Arc<SearchQuery>) -> std::result::Result<Vec<SearchHit>, usize> {
        let mut round = self.round.lock();
        round.generation += 1;
        round.query = Some(query);
        round.pending = self.workers;
        round.failures = 0;
        self.start.notify_all();
        while round.pending > 0 {
            self.done.wait(&mut round);
        }
        round.query = None;
        if round.failures > 0 {
            round.partials.iter_mut().for_each(Vec::clear);
            return Err(round.failures);
        }
        Ok(round.partials.iter_mut().flat_map(std::mem::take).collect())
    }

    fn shutdown(&self) {
        self.round.lock().shutdown = true;
        self.start.notify_all();
    }
}

fn worker_loop(
    id: usize,
    range: Range<usize>,
    snapshot: &DictionarySnapshot,
    rendezvous: &Rendezvous,
    scorer: &Scorer,
    cancel: &CancelToken,
) {
    let mut seen = 0;
    loop {
        let query = {
            let mut round = rendezvous.round.lock();
            while round.generation == seen && !round.shutdown {
                rendezvous.start.wait(&mut round);
            }
            if round.shutdown {
                return;
            }
            seen = round.generation;
            round.query.clone()
        };

        let outcome = match query {
            Some(query) => panic::catch_unwind(AssertUnwindSafe(|| {
                scorer(snapshot, &query, range.clone(), cancel)
            })),
            None => Ok(Outcome::Complete(Vec::new())),
        };

        let mut round = rendezvous.round.lock();
        match outcome {
            Ok(Outcome::Complete(hits)) => round.partials[id] = hits,
            Ok(Outcome::Cancelled) => {}
            Err(_) => {
                warn!(worker = id, "search worker panicked");
                round.failures += 1;
            }
        }
        round.pending -= 1;
        if round.pending == 0 {
            rendezvous.done.notify_all();
        }
    }
}

fn master_loop(
    shared: &Shared,
    rendezvous: &Rendezvous,
    snapshot: &Arc<DictionarySnapshot>,
    config: &SearchConfig,
    cancel: &CancelToken,
) {
    if config.warmup {
        let started = Instant::now();
        let warmup = SearchQuery::with_min_relevance(WARMUP_QUERY, config.min_relevance);
        let _ = rendezvous.run_round(Arc::new(warmup));
        debug!(elapsed_us = started.elapsed().as_micros() as u64, "search warmup finished");
    }

    while let Some(request) = shared.next_request() {
        let started = Instant::now();
        let query = SearchQuery::with_min_relevance(&request.text, config.min_relevance);
        let parsed = started.elapsed();
        let round = if query.is_empty() {
            Ok(Vec::new())
        } else {
            rendezvous.run_round(Arc::new(query))
        };
        let scored = started.elapsed();

        if cancel.is_cancelled() {
            shared.finish(request.id, SessionState::Cancelled);
            break;
        }
        let mut hits = match round {
            Ok(hits) => hits,
            Err(failures) => {
                warn!(request = request.id, failures, "search round failed");
                shared.finish(request.id, SessionState::Failed);
                continue;
            }
        };
        let matched = hits.len();
        rank_hits(snapshot, &mut hits, config.max_results);
        debug!(
            request = request.id,
            matched,
            delivered = hits.len(),
            parse_us = parsed.as_micros() as u64,
            score_us = (scored - parsed).as_micros() as u64,
            rank_us = (started.elapsed() - scored).as_micros() as u64,
            "search round finished"
        );

        let results = SearchResults {
            request: request.id,
            query: request.text,
            hits,
            snapshot: Arc::clone(snapshot),
            elapsed: started.elapsed(),
        };
        shared.deliver(request.callback, results);
    }
    rendezvous.shutdown();
}

struct Pool {
    cancel: CancelToken,
    rendezvous: Arc<Rendezvous>,
    master: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    snapshot: Arc<DictionarySnapshot>,
}

/// Last-query-wins search over the dictionary current at [`start`](Self::start).
/// A reload only takes effect after [`restart`](Self::restart).
pub struct SearchService {
    dictionary: SharedDictionary,
    config: SearchConfig,
    shared: Arc<Shared>,
    scorer: Scorer,
    pool: Option<Pool>,
}

impl SearchService {
    pub fn new(dictionary: SharedDictionary, config: SearchConfig) -> Self {
        Self {
            dictionary,
            config,
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    pending: VecDeque::new(),
                    stopping: false,
                    latest: 0,
                    state: SessionState::Idle,
                }),
                wake: Condvar::new(),
                slot: Arc::new(ResultSlot::default()),
            }),
            scorer: Arc::new(score_range),
            pool: None,
        }
    }

    #[cfg(test)]
    fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Snapshot the running pool searches.
    pub fn snapshot(&self) -> Option<Arc<DictionarySnapshot>> {
        self.pool.as_ref().map(|pool| Arc::clone(&pool.snapshot))
    }

    pub fn results(&self) -> Arc<ResultSlot> {
        Arc::clone(&self.shared.slot)
    }

    pub fn status(&self) -> SessionState {
        self.shared.queue.lock().state
    }

    /// Pins the current dictionary and spawns the pool. Queries submitted
    /// while stopped are served once it runs.
    pub fn start(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let snapshot = self.dictionary.require()?;
        let workers = self.config.worker_count.max(1);
        let rendezvous = Arc::new(Rendezvous::new(workers));
        let cancel = CancelToken::new();
        self.shared.queue.lock().stopping = false;

        let mut handles = Vec::with_capacity(workers);
        for (id, range) in partition(snapshot.len(), workers).into_iter().enumerate() {
            let snapshot = Arc::clone(&snapshot);
            let rendezvous_ref = Arc::clone(&rendezvous);
            let scorer = Arc::clone(&self.scorer);
            let cancel = cancel.clone();
            let spawned = thread::Builder::new()
                .name(format!("search-worker-{id}"))
                .spawn(move || worker_loop(id, range, &snapshot, &rendezvous_ref, &scorer, &cancel));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    abort_workers(&rendezvous, handles);
                    return Err(err.into());
                }
            }
        }

        let master = {
            let shared = Arc::clone(&self.shared);
            let rendezvous = Arc::clone(&rendezvous);
            let snapshot = Arc::clone(&snapshot);
            let config = self.config.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("search-master".to_string())
                .spawn(move || master_loop(&shared, &rendezvous, &snapshot, &config, &cancel))
        };
        let master = match master {
            Ok(handle) => handle,
            Err(err) => {
                abort_workers(&rendezvous, handles);
                return Err(err.into());
            }
        };

        info!(workers, records = snapshot.len(), "started search service");
        self.pool = Some(Pool {
            cancel,
            rendezvous,
            master,
            workers: handles,
            snapshot,
        });
        Ok(())
    }

    /// Cancels the running round, drops waiting queries and joins the pool.
    pub fn stop(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };
        let started = Instant::now();
        pool.cancel.cancel();
        {
            let mut queue = self.shared.queue.lock();
            queue.stopping = true;
            queue.pending.clear();
            if matches!(queue.state, SessionState::Queued | SessionState::Running) {
                queue.state = SessionState::Cancelled;
            }
        }
        self.shared.wake.notify_all();
        if pool.master.join().is_err() {
            warn!("search master panicked");
        }
        abort_workers(&pool.rendezvous, pool.workers);
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "stopped search service");
    }

    /// Restarts the pool on whatever dictionary is current now.
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.start()
    }

    pub fn submit(&self, text: &str) -> u64 {
        self.enqueue(text, None)
    }

    /// Like [`submit`](Self::submit); `callback` runs on the search thread
    /// when this query's results are delivered.
    pub fn submit_with(&self, text: &str, callback: impl FnOnce(&SearchResults) + Send + 'static) -> u64 {
        self.enqueue(text, Some(Box::new(callback)))
    }

    /// Submits `text` and blocks until its results are delivered.
    pub fn search(&self, text: &str, timeout: Duration) -> Result<SearchResults> {
        if !self.is_running() {
            return Err(DictError::ServiceState("stopped"));
        }
        let id = self.submit(text);
        match self.shared.slot.wait_for(id, timeout) {
            SlotWait::Ready(results) => Ok(results),
            SlotWait::Superseded(newer) => {
                debug!(request = id, newer, "blocking search was superseded");
                Err(DictError::ServiceState("serving a newer query"))
            }
            SlotWait::TimedOut => Err(DictError::ServiceState("not responding")),
        }
    }

    fn enqueue(&self, text: &str, callback: Option<SearchCallback>) -> u64 {
        let id = {
            let mut queue = self.shared.queue.lock();
            let dropped = queue.pending.len();
            queue.pending.clear();
            queue.latest += 1;
            queue.state = SessionState::Queued;
            let id = queue.latest;
            queue.pending.push_back(Request {
                id,
                text: text.to_string(),
                callback,
            });
            self.shared.slot.clear();
            debug!(request = id, dropped, "queued search");
            id
        };
        self.shared.wake.notify_one();
        id
    }
}

impl Drop for SearchService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn abort_workers(rendezvous: &Rendezvous, workers: Vec<JoinHandle<()>>) {
    rendezvous.shutdown();
    for worker in workers {
        if worker.join().is_err() {
            warn!("search worker exited with a panic");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::arena::{DictionaryBuilder, MeaningDraft, WordDraft};

    const WAIT: Duration = Duration::from_secs(10);

    fn dictionary() -> DictionarySnapshot {
        let words: [(&str, &str, &str); 6] = [
            ("吃", "chī", "to eat"),
            ("食", "shí", "to eat"),
            ("饭", "fàn", "cooked rice"),
            ("中国", "zhōng guó", "China"),
            ("喝", "hē", "to drink"),
            ("上海", "shàng hǎi", "Shanghai"),
        ];
        let mut builder = DictionaryBuilder::new();
        for (headword, pinyin, translation) in words {
            let draft = WordDraft {
                headword: headword.to_string(),
                meanings: vec![MeaningDraft {
                    pronunciations: vec![pinyin.to_string()],
                    translations: vec![translation.to_string()],
                }],
                ..WordDraft::default()
            };
            builder.add_word(&draft, true).unwrap();
        }
        DictionarySnapshot::from_builder(builder.sort().unwrap(), None)
    }

    fn config(workers: usize) -> SearchConfig {
        SearchConfig {
            worker_count: workers,
            ..SearchConfig::default()
        }
    }

    fn started(workers: usize) -> SearchService {
        let shared = SharedDictionary::with_snapshot(dictionary());
        let mut service = SearchService::new(shared, config(workers));
        service.start().unwrap();
        service
    }

    fn headwords(results: &SearchResults) -> Vec<&str> {
        results.words().map(|(_, word)| word.headword()).collect()
    }

    #[test]
    fn partition_covers_every_record() {
        assert_eq!(partition(10, 4), vec![0..3, 3..6, 6..9, 9..10]);
        assert_eq!(partition(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
        assert_eq!(partition(0, 3), vec![0..0, 0..0, 0..0]);
    }

    #[test]
    fn ties_rank_by_headword() {
        let snapshot = dictionary();
        let eat: Vec<_> = search_snapshot(&snapshot, "eat", &SearchConfig::default())
            .into_iter()
            .map(|hit| snapshot.word(hit.index).unwrap().headword())
            .collect();
        assert_eq!(eat, vec!["吃", "食"]);
    }

    #[test]
    fn ranking_is_truncated() {
        let snapshot = dictionary();
        let mut hits: Vec<_> = (0..snapshot.len())
            .map(|index| SearchHit {
                relevance: index as f32,
                index,
            })
            .collect();
        rank_hits(&snapshot, &mut hits, 2);
        assert_eq!(hits.iter().map(|hit| hit.index).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn service_delivers_ranked_results() {
        let service = started(3);
        let id = service.submit("zhongguo");
        let results = service.results().wait(WAIT).expect("results delivered");
        assert_eq!(results.request, id);
        assert_eq!(headwords(&results), vec!["中国"]);
        assert_eq!(service.status(), SessionState::Delivered);
    }

    #[test]
    fn only_the_latest_query_is_delivered() {
        let service = started(4);
        for query in ["eat", "china", "drink", "rice"] {
            service.submit(query);
        }
        let last = service.submit("shanghai");
        let results = service.results().wait(WAIT).expect("results delivered");
        assert_eq!(results.request, last);
        assert_eq!(headwords(&results), vec!["上海"]);
        assert!(service.results().take().is_none());
    }

    #[test]
    fn punctuation_only_query_delivers_nothing() {
        let service = started(2);
        service.submit(" ,. ");
        let results = service.results().wait(WAIT).expect("results delivered");
        assert!(results.is_empty());
    }

    #[test]
    fn callback_receives_results() {
        let service = started(2);
        let (sender, receiver) = mpsc::channel();
        service.submit_with("drink", move |results| {
            let _ = sender.send(results.hits.len());
        });
        assert_eq!(receiver.recv_timeout(WAIT).unwrap(), 1);
    }

    #[test]
    fn queries_submitted_while_stopped_run_on_start() {
        let shared = SharedDictionary::with_snapshot(dictionary());
        let mut service = SearchService::new(shared, config(2));
        assert_eq!(service.status(), SessionState::Idle);
        service.submit("rice");
        assert_eq!(service.status(), SessionState::Queued);
        service.start().unwrap();
        let results = service.results().wait(WAIT).expect("results delivered");
        assert_eq!(headwords(&results), vec!["饭"]);

        service.stop();
        assert!(!service.is_running());
        assert!(service.snapshot().is_none());
    }

    #[test]
    fn start_requires_a_dictionary() {
        let mut service = SearchService::new(SharedDictionary::new(), config(2));
        assert!(matches!(service.start(), Err(DictError::NoDictionary)));
        assert!(matches!(
            service.search("eat", WAIT),
            Err(DictError::ServiceState("stopped"))
        ));
    }

    #[test]
    fn blocking_search_returns_its_own_results() {
        let service = started(4);
        let results = service.search("eat", WAIT).unwrap();
        assert_eq!(headwords(&results), vec!["吃", "食"]);
    }

    fn started_with(workers: usize, scorer: Scorer) -> SearchService {
        let config = SearchConfig {
            warmup: false,
            ..config(workers)
        };
        let shared = SharedDictionary::with_snapshot(dictionary());
        let mut service = SearchService::new(shared, config).with_scorer(scorer);
        service.start().unwrap();
        service
    }

    fn wait_for_state(service: &SearchService, state: SessionState) {
        let deadline = Instant::now() + WAIT;
        while service.status() != state {
            assert!(Instant::now() < deadline, "still {:?}", service.status());
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn results_for(request: u64) -> SearchResults {
        SearchResults {
            request,
            query: String::new(),
            hits: Vec::new(),
            snapshot: Arc::new(DictionarySnapshot::default()),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn worker_panic_fails_the_round_and_the_pool_recovers() {
        let scorer: Scorer = Arc::new(
            |snapshot: &DictionarySnapshot, query: &SearchQuery, range: Range<usize>, cancel: &CancelToken| {
                if query.text() == "boom" && range.start == 0 {
                    panic!("scoring failed on purpose");
                }
                score_range(snapshot, query, range, cancel)
            },
        );
        let service = started_with(2, scorer);
        let (sender, receiver) = mpsc::channel();
        let failed = service.submit_with("boom", move |results| {
            let _ = sender.send(results.request);
        });
        wait_for_state(&service, SessionState::Failed);
        assert!(service.results().take().is_none());

        let results = service.search("eat", WAIT).unwrap();
        assert!(results.request > failed);
        assert_eq!(headwords(&results), vec!["吃", "食"]);
        assert_eq!(service.status(), SessionState::Delivered);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn stop_cancels_a_running_round() {
        let (started, round_started) = mpsc::channel();
        let scorer: Scorer = Arc::new(
            move |_: &DictionarySnapshot, _: &SearchQuery, _: Range<usize>, cancel: &CancelToken| {
                let _ = started.send(());
                while !cancel.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                Outcome::<Vec<SearchHit>>::Cancelled
            },
        );
        let mut service = started_with(1, scorer);
        let slot = service.results();
        let (sender, receiver) = mpsc::channel();
        service.submit_with("eat", move |results| {
            let _ = sender.send(results.request);
        });
        round_started.recv_timeout(WAIT).expect("round started");
        assert_eq!(service.status(), SessionState::Running);

        service.stop();
        assert!(!service.is_running());
        assert_eq!(service.status(), SessionState::Cancelled);
        assert!(slot.take().is_none());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn waiting_for_an_older_request_leaves_newer_results() {
        let slot = ResultSlot::default();
        slot.put(results_for(7));
        assert!(matches!(slot.wait_for(5, Duration::ZERO), SlotWait::Superseded(7)));
        assert!(matches!(
            slot.wait_for(7, Duration::ZERO),
            SlotWait::Ready(ref results) if results.request == 7
        ));
        assert!(matches!(slot.wait_for(8, Duration::from_millis(10)), SlotWait::TimedOut));
    }

    #[test]
    fn superseded_blocking_search_keeps_the_newer_delivery() {
        let (started, round_started) = mpsc::channel();
        let (release, released) = mpsc::channel::<()>();
        let released = Mutex::new(released);
        let scorer: Scorer = Arc::new(
            move |snapshot: &DictionarySnapshot, query: &SearchQuery, range: Range<usize>, cancel: &CancelToken| {
                if query.text() == "eat" {
                    let _ = started.send(());
                    let _ = released.lock().recv_timeout(WAIT);
                }
                score_range(snapshot, query, range, cancel)
            },
        );
        let service = started_with(1, scorer);

        thread::scope(|scope| {
            let blocked = scope.spawn(|| service.search("eat", WAIT));
            round_started.recv_timeout(WAIT).expect("round started");
            let newer = service.submit("shanghai");
            release.send(()).unwrap();

            assert!(matches!(
                blocked.join().unwrap(),
                Err(DictError::ServiceState("serving a newer query"))
            ));
            let results = service.results().wait(WAIT).expect("newer results kept");
            assert_eq!(results.request, newer);
            assert_eq!(headwords(&results), vec!["上海"]);
        });
    }

    #[test]
    fn restart_picks_up_a_new_dictionary() {
        let shared = SharedDictionary::with_snapshot(dictionary());
        let mut service = SearchService::new(shared.clone(), config(2));
        service.start().unwrap();
        let before = service.snapshot().unwrap();

        shared.install(Arc::new(DictionarySnapshot::default()));
        assert!(Arc::ptr_eq(&service.snapshot().unwrap(), &before));

        service.restart().unwrap();
        assert!(service.snapshot().unwrap().is_empty());
        service.submit("eat");
        let results = service.results().wait(WAIT).expect("results delivered");
        assert!(results.is_empty());
    }
}
