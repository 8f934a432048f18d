use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of query-processing profiling metrics.
///
/// Profiling is enabled via the `JPQL_PROFILE` environment variable and tracks
/// time spent in each phase of the pipeline: parsing, building the resolver
/// context, validation, and refactoring.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct QueryProfileSnapshot {
    /// Total nanoseconds spent parsing.
    pub parse_ns: u64,
    /// Number of parses.
    pub parse_count: u64,
    /// Total nanoseconds spent building query contexts.
    pub context_ns: u64,
    /// Number of query contexts built.
    pub context_count: u64,
    /// Total nanoseconds spent in the grammar validator.
    pub grammar_validation_ns: u64,
    /// Number of grammar validations.
    pub grammar_validation_count: u64,
    /// Total nanoseconds spent in the semantic validator.
    pub semantic_validation_ns: u64,
    /// Number of semantic validations.
    pub semantic_validation_count: u64,
    /// Total nanoseconds spent applying renames.
    pub refactor_ns: u64,
    /// Number of rename operations.
    pub refactor_count: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    parse_ns: AtomicU64,
    parse_count: AtomicU64,
    context_ns: AtomicU64,
    context_count: AtomicU64,
    grammar_validation_ns: AtomicU64,
    grammar_validation_count: AtomicU64,
    semantic_validation_ns: AtomicU64,
    semantic_validation_count: AtomicU64,
    refactor_ns: AtomicU64,
    refactor_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("JPQL_PROFILE").is_some())
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum QueryProfileKind {
    /// Text to syntax tree.
    Parse,
    /// Declarations and resolvers.
    Context,
    /// Grammar validator pass.
    GrammarValidation,
    /// Semantic validator pass.
    SemanticValidation,
    /// One rename operation.
    Refactor,
}

pub(crate) fn record_profile_timer(kind: QueryProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        QueryProfileKind::Parse => (&counters.parse_ns, &counters.parse_count),
        QueryProfileKind::Context => (&counters.context_ns, &counters.context_count),
        QueryProfileKind::GrammarValidation => (
            &counters.grammar_validation_ns,
            &counters.grammar_validation_count,
        ),
        QueryProfileKind::SemanticValidation => (
            &counters.semantic_validation_ns,
            &counters.semantic_validation_count,
        ),
        QueryProfileKind::Refactor => (&counters.refactor_ns, &counters.refactor_count),
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of current profiling metrics.
///
/// Returns `None` when profiling is disabled. With `reset` set, counters are
/// zeroed after being read.
///
/// ```no_run
/// use jpql::query::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(false) {
///     println!("parse time: {}ns over {} parses", snapshot.parse_ns, snapshot.parse_count);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(QueryProfileSnapshot {
        parse_ns: load(&counters.parse_ns),
        parse_count: load(&counters.parse_count),
        context_ns: load(&counters.context_ns),
        context_count: load(&counters.context_count),
        grammar_validation_ns: load(&counters.grammar_validation_ns),
        grammar_validation_count: load(&counters.grammar_validation_count),
        semantic_validation_ns: load(&counters.semantic_validation_ns),
        semantic_validation_count: load(&counters.semantic_validation_count),
        refactor_ns: load(&counters.refactor_ns),
        refactor_count: load(&counters.refactor_count),
    })
}
