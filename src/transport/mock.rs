//! Scripted in-memory transport for unit tests

use super::{
    AccessReport, IssueRecord, IssueTransport, ListOptions, NewItem, RecordAuthor, RecordLabel,
    Result, TransportError,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Build a record with the fields tests usually care about
pub(crate) fn record(
    id: u64,
    author: &str,
    created_at: DateTime<Utc>,
    comments: u32,
    labels: &[&str],
) -> IssueRecord {
    IssueRecord {
        id,
        title: format!("message {}", id),
        body: Some(format!("body of {}", id)),
        author: RecordAuthor {
            name: author.to_string(),
            avatar_ref: format!("https://avatars/{}", author),
        },
        created_at,
        updated_at: created_at,
        comment_count: comments,
        labels: labels
            .iter()
            .map(|name| RecordLabel {
                name: name.to_string(),
                color: "ededed".to_string(),
                description: None,
            })
            .collect(),
    }
}

/// Fixed point in time used as a base for test timestamps
pub(crate) fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

#[derive(Default)]
pub(crate) struct MockTransport {
    pub records: Mutex<Vec<IssueRecord>>,
    pub list_failures: Mutex<VecDeque<TransportError>>,
    pub access_reports: Mutex<VecDeque<(AccessReport, Option<Duration>)>>,
    pub fail_create: Mutex<Option<TransportError>>,
    pub created: Mutex<Vec<NewItem>>,
    pub api_key: Mutex<Option<String>>,
    pub list_delay: Mutex<Option<Duration>>,
    pub next_list_delays: Mutex<VecDeque<Duration>>,
    pub list_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    next_id: AtomicU64,
}

impl MockTransport {
    pub fn with_records(records: Vec<IssueRecord>) -> Self {
        let mock = Self::default();
        *mock.records.lock().unwrap() = records;
        mock.next_id.store(10_000, Ordering::SeqCst);
        mock
    }

    pub fn set_records(&self, records: Vec<IssueRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn fail_next_list(&self, error: TransportError) {
        self.list_failures.lock().unwrap().push_back(error);
    }

    pub fn queue_access(&self, report: AccessReport) {
        self.access_reports.lock().unwrap().push_back((report, None));
    }

    /// Queue a report that is only returned after `delay`
    pub fn queue_access_after(&self, report: AccessReport, delay: Duration) {
        self.access_reports
            .lock()
            .unwrap()
            .push_back((report, Some(delay)));
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    /// Delay only the next listing, ahead of any persistent delay
    pub fn delay_next_list(&self, delay: Duration) {
        self.next_list_delays.lock().unwrap().push_back(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueTransport for MockTransport {
    async fn list_items(
        &self,
        _owner: &str,
        _repo: &str,
        _options: &ListOptions,
    ) -> Result<Vec<IssueRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // The response reflects the remote state when the request was made.
        let records = self.records.lock().unwrap().clone();
        let failure = self.list_failures.lock().unwrap().pop_front();

        let delay = self
            .next_list_delays
            .lock()
            .unwrap()
            .pop_front()
            .or(*self.list_delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(e) => Err(e),
            None => Ok(records),
        }
    }

    async fn create_item(&self, owner: &str, _repo: &str, item: &NewItem) -> Result<IssueRecord> {
        if let Some(e) = self.fail_create.lock().unwrap().take() {
            return Err(e);
        }
        self.created.lock().unwrap().push(item.clone());

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        Ok(IssueRecord {
            id,
            title: item.title.clone(),
            body: Some(item.body.clone()),
            author: RecordAuthor {
                name: owner.to_string(),
                avatar_ref: String::new(),
            },
            created_at: now,
            updated_at: now,
            comment_count: 0,
            labels: item
                .labels
                .iter()
                .map(|name| RecordLabel {
                    name: name.clone(),
                    color: String::new(),
                    description: None,
                })
                .collect(),
        })
    }

    async fn validate_access(&self, _owner: &str, _repo: &str) -> AccessReport {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.access_reports.lock().unwrap().pop_front();
        let (report, delay) = queued.unwrap_or((
            AccessReport {
                accessible: true,
                can_read: true,
                can_write: true,
                error: None,
            },
            None,
        ));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        report
    }

    fn set_api_key(&self, api_key: Option<String>) {
        *self.api_key.lock().unwrap() = api_key;
    }
}
