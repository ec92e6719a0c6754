//! Attendance queries: scrape, report, and work-end alerts.
//!
//! The scraper itself lives in [`scraper`]; this module owns what happens
//! around it — turning a scrape outcome into one of three user-facing
//! messages, installing the day's work-end alert schedule, and the single
//! worker task that serializes scrapes so two triggers never race a browser
//! session.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;
use tokio::sync::mpsc;

use crate::channels::MessageSink;
use crate::clock::{Clock, format_timestamp};
use crate::config::{Recipient, Role};
use crate::state::BotState;

pub mod parser;
pub mod scraper;

pub use parser::AttendanceRecord;
pub use scraper::PortalScraper;

/// Minute marks before the estimated leave time at which an alert fires.
const ALERT_OFFSETS_MIN: &[i64] = &[60, 30, 10, 5];

/// Anything that can produce today's attendance rows. The portal scraper in
/// production, a canned stub in tests.
#[async_trait]
pub trait AttendanceSource: Send + Sync {
    /// All rows of today's report, or `None` when the scrape failed.
    async fn fetch_today(&self) -> Option<Vec<AttendanceRecord>>;
}

#[async_trait]
impl AttendanceSource for PortalScraper {
    async fn fetch_today(&self) -> Option<Vec<AttendanceRecord>> {
        self.scrape_today().await
    }
}

/// Runs scrapes and delivers their outcome.
pub struct AttendanceService {
    source: Arc<dyn AttendanceSource>,
    sink: Arc<dyn MessageSink>,
    state: Arc<BotState>,
    clock: Arc<dyn Clock>,
    /// Portal account id matched against report rows.
    employee_id: String,
    recipients: Vec<Recipient>,
}

impl AttendanceService {
    pub fn new(
        source: Arc<dyn AttendanceSource>,
        sink: Arc<dyn MessageSink>,
        state: Arc<BotState>,
        clock: Arc<dyn Clock>,
        employee_id: String,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self { source, sink, state, clock, employee_id, recipients }
    }

    /// Run one scrape and push the outcome message. Also installs the
    /// work-end alert schedule when the scrape produced our own row.
    pub async fn run_query(&self) {
        tracing::info!("running attendance query");
        let outcome = self.source.fetch_today().await;
        let message = self.compose_outcome(&outcome);

        if let Some(records) = &outcome
            && let Some(own) = records.iter().find(|r| r.employee_id == self.employee_id)
        {
            self.install_work_end(own);
        }

        self.push_to_primary(&message).await;
    }

    fn compose_outcome(&self, outcome: &Option<Vec<AttendanceRecord>>) -> String {
        let stamp = format_timestamp(self.clock.now());
        match outcome {
            Some(records) => {
                match records.iter().find(|r| r.employee_id == self.employee_id) {
                    Some(own) => format!(
                        "📋 今日出勤查詢結果\n\n\
                         👤 員工：{} ({})\n\
                         📅 日期：{}\n\
                         🕐 刷卡記錄：{}\n\
                         🌅 上班時間：{}\n\
                         🌇 預計下班：{}\n\n\
                         查詢時間：{stamp}",
                        own.name,
                        own.employee_id,
                        own.date,
                        own.times.join("、"),
                        own.work_start,
                        own.work_end,
                    ),
                    None => format!(
                        "📋 今日出勤查詢結果\n\n\
                         查無今日的出勤資料，可能尚未刷卡或系統還沒更新～\n\n\
                         查詢時間：{stamp}"
                    ),
                }
            }
            None => format!(
                "❌ 出勤查詢失敗\n\n\
                 系統可能暫時無法連線，請稍後輸入「出勤」重新查詢。\n\n\
                 查詢時間：{stamp}"
            ),
        }
    }

    fn install_work_end(&self, record: &AttendanceRecord) {
        match NaiveTime::parse_from_str(&record.work_end, "%H:%M") {
            Ok(end) => {
                self.state.set_work_end(self.clock.today(), end);
                tracing::info!(work_end = %record.work_end, "work-end alerts scheduled");
            }
            Err(err) => {
                tracing::warn!(work_end = %record.work_end, error = %err, "unusable work-end time");
            }
        }
    }

    /// Per-minute sweep for work-end alerts.
    ///
    /// Fires the closest due offset and silently retires any larger ones,
    /// so a restart at T-4 minutes sends one alert rather than four.
    pub async fn sweep_work_end_alerts(&self) {
        let now = self.clock.now();
        let today = self.clock.today();
        let Some(end) = self.state.work_end_for(today) else {
            return;
        };

        let minutes_until = (end - now.time()).num_minutes();
        if minutes_until < 0 {
            return;
        }

        let due: Vec<i64> = ALERT_OFFSETS_MIN
            .iter()
            .copied()
            .filter(|offset| minutes_until <= *offset)
            .collect();
        let Some(current) = due.iter().copied().min() else {
            return;
        };

        for offset in due {
            if offset == current {
                if self.state.try_mark_work_end_offset(today, offset) {
                    let text = format!(
                        "⏰ 下班提醒\n\n還有 {minutes_until} 分鐘就到預計下班時間 {} 囉！\n記得打卡再走～",
                        end.format("%H:%M"),
                    );
                    self.push_to_primary(&text).await;
                }
            } else {
                // Missed while the process was down; retire without sending.
                let _ = self.state.try_mark_work_end_offset(today, offset);
            }
        }
    }

    async fn push_to_primary(&self, text: &str) {
        for recipient in self.recipients.iter().filter(|r| r.role == Role::Primary) {
            if let Err(err) = self.sink.push(&recipient.id, text).await {
                tracing::error!(to = %recipient.id, error = %err, "attendance push failed");
            }
        }
    }
}

/// Handle for requesting a scrape from the worker task.
#[derive(Clone)]
pub struct ScrapeHandle {
    tx: mpsc::Sender<()>,
}

/// Outcome of asking the worker for a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeRequest {
    Queued,
    /// One is already in flight; the pending slot is taken.
    Busy,
    /// The worker task is gone; no scrape will ever run.
    Unavailable,
}

impl ScrapeHandle {
    /// Handle wired to a bare channel, for tests that only care about
    /// queue/busy behavior.
    #[cfg(test)]
    pub fn disconnected() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Try to queue a scrape. Non-blocking; at most one request waits while
    /// another runs.
    pub fn request(&self) -> ScrapeRequest {
        match self.tx.try_send(()) {
            Ok(()) => ScrapeRequest::Queued,
            Err(mpsc::error::TrySendError::Full(())) => ScrapeRequest::Busy,
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::error!("attendance worker is gone");
                ScrapeRequest::Unavailable
            }
        }
    }
}

/// Spawn the worker that owns all scraping. Requests are serialized; the
/// channel holds at most one pending request so triggers pile up into a
/// single follow-up run at worst.
pub fn spawn_worker(service: Arc<AttendanceService>) -> ScrapeHandle {
    let (tx, mut rx) = mpsc::channel(1);
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            service.run_query().await;
        }
        tracing::debug!("attendance worker shutting down");
    });
    ScrapeHandle { tx }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::channels::testing::RecordingSink;
    use crate::clock::FixedClock;

    struct StubSource(Option<Vec<AttendanceRecord>>);

    #[async_trait]
    impl AttendanceSource for StubSource {
        async fn fetch_today(&self) -> Option<Vec<AttendanceRecord>> {
            self.0.clone()
        }
    }

    fn record(employee_id: &str) -> AttendanceRecord {
        AttendanceRecord {
            employee_id: employee_id.into(),
            name: "灰鵝".into(),
            date: "2025/9/16".into(),
            times: vec!["08:02".into(), "12:00".into(), "13:00".into(), "18:00".into()],
            work_start: "08:02".into(),
            work_end: "17:02".into(),
        }
    }

    fn recipients() -> Vec<Recipient> {
        vec![
            Recipient { id: "U-primary".into(), role: Role::Primary },
            Recipient { id: "U-partner".into(), role: Role::Partner },
        ]
    }

    fn service(
        outcome: Option<Vec<AttendanceRecord>>,
        sink: Arc<RecordingSink>,
        state: Arc<BotState>,
        clock: Arc<FixedClock>,
    ) -> AttendanceService {
        AttendanceService::new(
            Arc::new(StubSource(outcome)),
            sink,
            state,
            clock,
            "2993".into(),
            recipients(),
        )
    }

    #[tokio::test]
    async fn own_row_produces_report_and_alert_schedule() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 9, 16, 12, 0, 0));
        let svc = service(Some(vec![record("2993")]), sink.clone(), state.clone(), clock.clone());

        svc.run_query().await;

        let pushes = sink.pushes_to("U-primary");
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].contains("08:02、12:00、13:00、18:00"));
        assert!(pushes[0].contains("預計下班：17:02"));
        assert!(sink.pushes_to("U-partner").is_empty(), "reports go to the primary only");

        let end = state.work_end_for(clock.today()).expect("schedule installed");
        assert_eq!(end, NaiveTime::from_hms_opt(17, 2, 0).unwrap());
    }

    #[tokio::test]
    async fn foreign_rows_only_report_no_data() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 9, 16, 12, 0, 0));
        let svc = service(Some(vec![record("9999")]), sink.clone(), state.clone(), clock.clone());

        svc.run_query().await;

        assert!(sink.pushes_to("U-primary")[0].contains("查無今日的出勤資料"));
        assert!(state.work_end_for(clock.today()).is_none());
    }

    #[tokio::test]
    async fn failed_scrape_reports_failure_text() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 9, 16, 12, 0, 0));
        let svc = service(None, sink.clone(), state, clock);

        svc.run_query().await;

        assert!(sink.pushes_to("U-primary")[0].contains("出勤查詢失敗"));
    }

    #[tokio::test]
    async fn work_end_alert_fires_once_per_offset() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 9, 16, 16, 2, 0));
        state.set_work_end(clock.today(), NaiveTime::from_hms_opt(17, 2, 0).unwrap());
        let svc = service(None, sink.clone(), state, clock.clone());

        svc.sweep_work_end_alerts().await;
        svc.sweep_work_end_alerts().await;
        assert_eq!(sink.push_count(), 1, "same offset never fires twice");
        assert!(sink.pushes_to("U-primary")[0].contains("60 分鐘"));

        clock.set(2025, 9, 16, 16, 32, 0);
        svc.sweep_work_end_alerts().await;
        assert_eq!(sink.push_count(), 2);
        assert!(sink.pushes_to("U-primary")[1].contains("30 分鐘"));
    }

    #[tokio::test]
    async fn late_start_retires_missed_offsets_silently() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        // First sweep 4 minutes before the end: only the 5-minute alert.
        let clock = Arc::new(FixedClock::at(2025, 9, 16, 16, 58, 0));
        state.set_work_end(clock.today(), NaiveTime::from_hms_opt(17, 2, 0).unwrap());
        let svc = service(None, sink.clone(), state, clock);

        svc.sweep_work_end_alerts().await;
        assert_eq!(sink.push_count(), 1);
        assert!(sink.pushes_to("U-primary")[0].contains("4 分鐘"));
    }

    #[tokio::test]
    async fn no_alerts_after_the_work_end_passed() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 9, 16, 17, 3, 0));
        state.set_work_end(clock.today(), NaiveTime::from_hms_opt(17, 2, 0).unwrap());
        let svc = service(None, sink.clone(), state, clock);

        svc.sweep_work_end_alerts().await;
        assert_eq!(sink.push_count(), 0);
    }

    #[tokio::test]
    async fn handle_reports_busy_while_pending_and_unavailable_when_dead() {
        let (handle, rx) = ScrapeHandle::disconnected();
        assert_eq!(handle.request(), ScrapeRequest::Queued);
        assert_eq!(handle.request(), ScrapeRequest::Busy);

        drop(rx);
        assert_eq!(handle.request(), ScrapeRequest::Unavailable);
    }
}
