use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::catalog::CatalogClient;
use crate::config::ResolvedConfig;
use crate::domain::{
    AuthorDetail, JOIN_SEPARATOR, NOT_AVAILABLE, Row, WorkDetail, WorkSummary,
};
use crate::error::DashError;

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub subject: String,
    pub limit: usize,
    pub max_in_flight: usize,
}

impl From<&ResolvedConfig> for AggregateOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            subject: config.subject.clone(),
            limit: config.limit,
            max_in_flight: config.max_in_flight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    WorkDetail,
    AuthorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub stage: FetchStage,
    pub work: String,
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub subject: String,
    pub rows: Vec<Row>,
    pub failures: Vec<FetchFailure>,
    pub fetched_at: String,
    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
    pub failure: Option<FetchStage>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
            failure: None,
        }
    }

    pub fn failure(stage: FetchStage, message: impl Into<String>) -> Self {
        Self {
            failure: Some(stage),
            ..Self::new(message)
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

struct WorkOutcome {
    row: Row,
    failures: Vec<FetchFailure>,
}

#[derive(Clone)]
pub struct App<C: CatalogClient> {
    catalog: C,
    options: AggregateOptions,
}

impl<C: CatalogClient> App<C> {
    pub fn new(catalog: C, options: AggregateOptions) -> Self {
        Self { catalog, options }
    }

    // Only a failed works list is an error; rows always follow the listing.
    pub fn aggregate(&self, sink: &dyn ProgressSink) -> Result<AggregateResult, DashError> {
        let started = Instant::now();
        let subject = self.options.subject.clone();

        sink.event(ProgressEvent::new(format!(
            "phase=Resolve; listing works for subject {subject}"
        )));
        sink.event(ProgressEvent::new("catalog.request"));
        let works = match self.catalog.fetch_works(&subject, self.options.limit) {
            Ok(works) => works,
            Err(err) => {
                tracing::error!(%subject, error = %err, "works list fetch failed");
                sink.event(ProgressEvent::new(format!(
                    "phase=Resolve; works list unavailable: {err}"
                )));
                return Err(DashError::WorksListUnavailable {
                    subject,
                    reason: err.to_string(),
                });
            }
        };
        let latency = started.elapsed().as_millis();
        sink.event(ProgressEvent::new(format!(
            "catalog.response latency_ms={latency}"
        )));

        sink.event(ProgressEvent::new(format!(
            "phase=Fetch; resolving {} works",
            works.len()
        )));
        let outcomes = self.fan_out(&works, sink);

        sink.event(ProgressEvent::new("phase=Merge; building rows"));
        let mut rows = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            rows.push(outcome.row);
            failures.extend(outcome.failures);
        }

        let elapsed = started.elapsed();
        tracing::info!(
            %subject,
            rows = rows.len(),
            failures = failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "aggregation finished"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Merge; {} rows ready ({} partial failures)",
                rows.len(),
                failures.len()
            ),
            elapsed: Some(elapsed),
            failure: None,
        });

        Ok(AggregateResult {
            subject,
            rows,
            failures,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            elapsed,
        })
    }

    fn fan_out(&self, works: &[WorkSummary], sink: &dyn ProgressSink) -> Vec<WorkOutcome> {
        if works.is_empty() {
            return Vec::new();
        }
        let workers = self.options.max_in_flight.clamp(1, works.len());
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(work) = works.get(index) else {
                            break;
                        };
                        let outcome = self.resolve_work(work, sink);
                        if tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<WorkOutcome>> = works.iter().map(|_| None).collect();
        for (index, outcome) in rx {
            slots[index] = Some(outcome);
        }
        slots
            .into_iter()
            .zip(works)
            .map(|(slot, work)| {
                slot.unwrap_or_else(|| WorkOutcome {
                    row: Row::placeholder(work.key.clone(), work.title.clone()),
                    failures: Vec::new(),
                })
            })
            .collect()
    }

    fn resolve_work(&self, work: &WorkSummary, sink: &dyn ProgressSink) -> WorkOutcome {
        let (detail, authors) = thread::scope(|scope| {
            let handles: Vec<_> = work
                .authors
                .iter()
                .map(|author| {
                    scope.spawn(move || match &author.key {
                        Some(key) => self.catalog.fetch_author_detail(key),
                        None => Err(DashError::InvalidAuthorKey(author.name.clone())),
                    })
                })
                .collect();
            let detail = if work.key.is_listed() {
                self.catalog.fetch_work_detail(&work.key)
            } else {
                Err(DashError::InvalidWorkKey(work.title.clone()))
            };
            let authors: Vec<Result<AuthorDetail, DashError>> = handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(DashError::CatalogHttp(
                            "author request thread panicked".to_string(),
                        ))
                    })
                })
                .collect();
            (detail, authors)
        });

        let mut failures = Vec::new();
        let detail = detail.unwrap_or_else(|err| {
            tracing::warn!(work = %work.key, error = %err, "work detail unavailable");
            sink.event(ProgressEvent::failure(
                FetchStage::WorkDetail,
                format!("work detail failed for {}: {err}", work.key),
            ));
            failures.push(FetchFailure {
                stage: FetchStage::WorkDetail,
                work: work.key.to_string(),
                key: work.key.to_string(),
                message: err.to_string(),
            });
            WorkDetail::default()
        });

        let authors: Vec<AuthorDetail> = authors
            .into_iter()
            .zip(&work.authors)
            .map(|(result, author)| {
                result.unwrap_or_else(|err| {
                    let key = author
                        .key
                        .as_ref()
                        .map(|key| key.to_string())
                        .unwrap_or_default();
                    tracing::warn!(
                        work = %work.key,
                        author = %key,
                        name = %author.name,
                        error = %err,
                        "author detail unavailable"
                    );
                    sink.event(ProgressEvent::failure(
                        FetchStage::AuthorDetail,
                        format!("author detail failed for {} ({key}): {err}", author.name),
                    ));
                    failures.push(FetchFailure {
                        stage: FetchStage::AuthorDetail,
                        work: work.key.to_string(),
                        key,
                        message: err.to_string(),
                    });
                    AuthorDetail::default()
                })
            })
            .collect();

        WorkOutcome {
            row: build_row(work, &detail, &authors),
            failures,
        }
    }
}

pub fn build_row(work: &WorkSummary, detail: &WorkDetail, authors: &[AuthorDetail]) -> Row {
    let ratings_average = detail
        .ratings_average
        .filter(|value| value.is_finite() && *value != 0.0)
        .map(|value| value.to_string())
        .unwrap_or_else(not_available);
    let first_publish_year = detail
        .first_publish_year
        .filter(|year| *year != 0)
        .map(|year| year.to_string())
        .unwrap_or_else(not_available);
    let subject = match &detail.subjects {
        Some(subjects) if !subjects.is_empty() => subjects.join(JOIN_SEPARATOR),
        _ => not_available(),
    };

    Row {
        key: work.key.clone(),
        title: work.title.clone(),
        author_name: join_authors(authors, |author| author.name.as_deref()),
        ratings_average,
        first_publish_year,
        subject,
        author_birth_date: join_authors(authors, |author| author.birth_date.as_deref()),
        author_top_work: join_authors(authors, |author| author.top_work.as_deref()),
    }
}

fn join_authors<F>(authors: &[AuthorDetail], pick: F) -> String
where
    F: Fn(&AuthorDetail) -> Option<&str>,
{
    if authors.is_empty() {
        return not_available();
    }
    authors
        .iter()
        .map(|author| {
            pick(author)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(NOT_AVAILABLE)
        })
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR)
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}
