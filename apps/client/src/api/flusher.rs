//! Fire-and-forget delivery of timer flushes.
//!
//! Every flush is written to the local retry queue before it is sent and
//! removed once the backend accepts it, so a flush interrupted by shutdown
//! is resent by the next `retry_pending`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ApiClient, ClientError, FlushRequest};
use crate::db::date_utils::activity_day;
use crate::db::{PendingFlush, RetryQueueRepository};
use crate::state::SharedRepository;

/// Destination for timer flushes.
pub trait ActivitySink: Send + Sync {
    /// Hand off a flush without waiting for delivery.
    fn submit(&self, flush: FlushRequest);
}

/// Outcome of one retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub delivered: usize,
    /// Rejected by validation or recorded on an earlier day.
    pub dropped: usize,
    pub remaining: usize,
}

/// The backend will never accept this flush, however often it is resent.
fn is_permanent(error: &ClientError) -> bool {
    matches!(error, ClientError::Backend { status: 400 | 422, .. })
}

struct HttpSinkInner {
    api: ApiClient,
    repository: SharedRepository,
    runtime: Handle,
    max_pending: usize,
    /// Queue rows whose first delivery attempt has not finished.
    in_flight: Mutex<HashSet<i64>>,
}

/// Sink that posts flushes to the ingestion endpoint.
#[derive(Clone)]
pub struct HttpSink {
    inner: Arc<HttpSinkInner>,
}

impl HttpSink {
    pub fn new(
        api: ApiClient,
        repository: SharedRepository,
        runtime: Handle,
        max_pending: usize,
    ) -> Self {
        Self {
            inner: Arc::new(HttpSinkInner {
                api,
                repository,
                runtime,
                max_pending,
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue one flush and post it, leaving it queued on failure.
    pub async fn deliver(&self, flush: FlushRequest) {
        let id = self.enqueue(&flush);
        self.send_queued(id, flush).await;
    }

    /// Write `flush` to the retry queue and mark the row in flight.
    fn enqueue(&self, flush: &FlushRequest) -> Option<i64> {
        let pending = PendingFlush {
            id: 0,
            owner_id: flush.owner_id,
            activity_type: flush.activity_type,
            duration_seconds: flush.duration_seconds,
            content_id: flush.content_id.clone(),
            pathname: flush.pathname.clone(),
            timestamp: flush.timestamp,
        };
        let max_pending = self.inner.max_pending;
        match self
            .inner
            .repository
            .with(|repo| repo.enqueue_flush(&pending, max_pending))
        {
            Ok(id) => {
                self.in_flight().insert(id);
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "could not queue flush, sending without a retry copy");
                None
            }
        }
    }

    async fn send_queued(&self, id: Option<i64>, flush: FlushRequest) {
        let settled = match self.inner.api.track(&flush).await {
            Ok(event_id) => {
                debug!(
                    %event_id,
                    activity_type = %flush.activity_type,
                    duration_seconds = flush.duration_seconds,
                    "flush delivered"
                );
                true
            }
            Err(e) if is_permanent(&e) => {
                warn!(error = %e, activity_type = %flush.activity_type, "dropping rejected flush");
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    activity_type = %flush.activity_type,
                    duration_seconds = flush.duration_seconds,
                    "flush failed, kept for retry"
                );
                false
            }
        };

        let Some(id) = id else {
            return;
        };
        if settled {
            if let Err(e) = self.inner.repository.with(|repo| repo.remove_flushes(&[id])) {
                warn!(error = %e, id, "could not remove delivered flush from queue");
            }
        }
        self.in_flight().remove(&id);
    }

    /// Resend queued flushes for `owner_id` in order.
    ///
    /// Flushes recorded on a day other than `now`'s are dropped, since the
    /// backend credits events to the day they arrive. Stops at the first
    /// failure that may succeed later so the rest keep their place.
    pub async fn retry_pending(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RetryReport, ClientError> {
        let in_flight = self.in_flight().clone();
        let pending: Vec<PendingFlush> = self
            .inner
            .repository
            .with(|repo| repo.get_pending_flushes(owner_id))?
            .into_iter()
            .filter(|flush| !in_flight.contains(&flush.id))
            .collect();
        if pending.is_empty() {
            return Ok(RetryReport::default());
        }

        let today = activity_day(now);
        let mut report = RetryReport::default();
        let mut settled = Vec::new();
        for flush in &pending {
            if activity_day(flush.timestamp) != today {
                info!(
                    id = flush.id,
                    recorded = %flush.timestamp,
                    "dropping queued flush from an earlier day"
                );
                settled.push(flush.id);
                report.dropped += 1;
                continue;
            }

            let request = FlushRequest {
                owner_id: flush.owner_id,
                activity_type: flush.activity_type,
                content_id: flush.content_id.clone(),
                duration_seconds: flush.duration_seconds,
                pathname: flush.pathname.clone(),
                timestamp: flush.timestamp,
            };
            match self.inner.api.track(&request).await {
                Ok(_) => {
                    settled.push(flush.id);
                    report.delivered += 1;
                }
                Err(e) if is_permanent(&e) => {
                    warn!(error = %e, id = flush.id, "dropping rejected flush");
                    settled.push(flush.id);
                    report.dropped += 1;
                }
                Err(e) => {
                    debug!(error = %e, "retry pass interrupted");
                    break;
                }
            }
        }

        self.inner
            .repository
            .with(|repo| repo.remove_flushes(&settled))?;

        report.remaining = pending.len() - settled.len();
        info!(
            delivered = report.delivered,
            dropped = report.dropped,
            remaining = report.remaining,
            "retried pending flushes"
        );
        Ok(report)
    }
}

impl ActivitySink for HttpSink {
    fn submit(&self, flush: FlushRequest) {
        let id = self.enqueue(&flush);
        let sink = self.clone();
        self.inner.runtime.spawn(async move {
            sink.send_queued(id, flush).await;
        });
    }
}
