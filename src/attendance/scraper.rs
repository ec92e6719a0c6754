//! WebDriver automation against the HR portal.
//!
//! The portal offers no API, no semantic markup, and no reliable "results
//! loaded" signal, so this module drives a throwaway headless-Chrome session
//! through login → report screen → date filter → submit, then proves the
//! result actually reflects the requested date before trusting it. Data
//! that fails verification is thrown away rather than surfaced.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use fantoccini::{Client, ClientBuilder, Locator};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::attendance::parser::{AttendanceRecord, parse_attendance_html};
use crate::clock::{Clock, portal_date};
use crate::config::PortalConfig;
use crate::error::ScrapeError;
use secrecy::ExposeSecret;

/// Whole filter-submit-verify cycles before giving up.
const MAX_ATTEMPTS: usize = 3;
/// How long to poll for the result fingerprint to change after a click.
const REFRESH_WINDOW: Duration = Duration::from_secs(15);
/// Flat settle delay after login/navigation; the site exposes no readiness
/// signal for these steps.
const NAV_SETTLE: Duration = Duration::from_secs(3);
/// Trailing delay after a detected refresh, for async rendering stragglers.
const RENDER_SETTLE: Duration = Duration::from_secs(2);
/// Backoff between failed submit attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// One-shot scraper for the configured portal account.
pub struct PortalScraper {
    config: PortalConfig,
    clock: Arc<dyn Clock>,
}

impl PortalScraper {
    pub fn new(config: PortalConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Scrape today's punch report.
    ///
    /// Never lets an error escape: every failure is logged and collapsed to
    /// `None` so callers can always produce a status message. The browser
    /// session is torn down on every path.
    pub async fn scrape_today(&self) -> Option<Vec<AttendanceRecord>> {
        match self.run().await {
            Ok(records) => Some(records),
            Err(err) => {
                tracing::error!(error = %err, "attendance scrape failed");
                None
            }
        }
    }

    async fn run(&self) -> Result<Vec<AttendanceRecord>, ScrapeError> {
        let client = self.connect().await?;
        let session = client.clone();

        let result = self.drive(client).await;

        // Teardown happens regardless of how drive() went.
        if let Err(err) = session.close().await {
            tracing::warn!(error = %err, "failed to close browser session");
        }
        result
    }

    /// Start an isolated headless session sized for a constrained host.
    async fn connect(&self) -> Result<Client, ScrapeError> {
        let mut capabilities = serde_json::map::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({
                "args": [
                    "--headless=new",
                    "--no-sandbox",
                    "--disable-dev-shm-usage",
                    "--disable-gpu",
                    "--window-size=1920,1080",
                    "--disable-extensions",
                    "--blink-settings=imagesEnabled=false",
                    "--disable-background-timer-throttling",
                ],
            }),
        );

        ClientBuilder::rustls()
            .map_err(|e| ScrapeError::Session(e.to_string()))?
            .capabilities(capabilities)
            .connect(&self.config.webdriver_url)
            .await
            .map_err(|e| ScrapeError::Session(e.to_string()))
    }

    async fn drive(&self, client: Client) -> Result<Vec<AttendanceRecord>, ScrapeError> {
        let today = self.clock.today();
        let filter_date = portal_date(today);

        self.login(&client).await?;

        tracing::info!(url = %self.config.report_url, "navigating to attendance report");
        client.goto(&self.config.report_url).await?;
        tokio::time::sleep(NAV_SETTLE).await;

        // The report lives inside an iframe; switch the session context in
        // and back out around the form interaction.
        let frame = client
            .wait()
            .at_most(Duration::from_secs(10))
            .for_element(Locator::Css("iframe"))
            .await?;
        frame.enter_frame().await?;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let cycle = SessionCycle { scraper: self, client: &client, filter_date: &filter_date };
        let html = verified_query(&cycle, today, &filter_date).await?;

        // Back to the top-level document before the session ends.
        client.enter_parent_frame().await?;

        parse_attendance_html(&html)
    }

    async fn login(&self, client: &Client) -> Result<(), ScrapeError> {
        tracing::info!(url = %self.config.login_url, "logging in to portal");
        client.goto(&self.config.login_url).await?;

        let account = client
            .wait()
            .at_most(Duration::from_secs(10))
            .for_element(Locator::Id("Account"))
            .await?;
        account.send_keys(&self.config.username).await?;

        let password = client.find(Locator::Id("Pwd")).await?;
        password.send_keys(self.config.password.expose_secret()).await?;

        client.form(Locator::Css("form")).await?.submit().await?;

        // No login-succeeded signal exists; a flat sleep stands in for it.
        tokio::time::sleep(NAV_SETTLE).await;
        Ok(())
    }

    /// Set both filter inputs by script injection and dispatch a bubbling
    /// `change` so attached client-side validation notices. Falls back to
    /// stripping `readonly` and typing the value when injection does not
    /// stick.
    async fn set_date_filters(&self, client: &Client, filter_date: &str) -> Result<(), ScrapeError> {
        for field in ["FindDate", "FindEDate"] {
            client
                .execute(
                    "const el = document.getElementById(arguments[0]);\
                     el.value = arguments[1];\
                     el.dispatchEvent(new Event('change', { bubbles: true }));",
                    vec![serde_json::json!(field), serde_json::json!(filter_date)],
                )
                .await?;

            let value = self.read_filter(client, field).await?;
            if value != filter_date {
                tracing::warn!(field, value, "script injection did not stick, typing instead");
                client
                    .execute(
                        "document.getElementById(arguments[0]).removeAttribute('readonly');",
                        vec![serde_json::json!(field)],
                    )
                    .await?;
                let element = client.find(Locator::Id(field)).await?;
                element.clear().await?;
                element.send_keys(filter_date).await?;
            }
        }
        Ok(())
    }

    /// Read the filters back and refuse to submit against the wrong date.
    async fn assert_date_filters(&self, client: &Client, filter_date: &str) -> Result<(), ScrapeError> {
        for field in ["FindDate", "FindEDate"] {
            let value = self.read_filter(client, field).await?;
            if value != filter_date {
                return Err(ScrapeError::FilterMismatch {
                    expected: filter_date.to_string(),
                    actual: value,
                });
            }
        }
        Ok(())
    }

    async fn read_filter(&self, client: &Client, field: &str) -> Result<String, ScrapeError> {
        let value = client
            .execute(
                "return document.getElementById(arguments[0]).value;",
                vec![serde_json::json!(field)],
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Click the query control, trying a plain click, then a script click,
    /// then a synthetic Enter keypress.
    async fn click_query(&self, client: &Client) -> Result<(), ScrapeError> {
        let locator = Locator::XPath("//input[@name='Submit' and @value='查詢']");
        let button = client.find(locator).await?;

        if let Err(click_err) = button.click().await {
            tracing::warn!(error = %click_err, "plain click failed, trying script click");
            let script = client
                .execute(
                    "document.querySelector(\"input[name='Submit'][value='查詢']\").click();",
                    vec![],
                )
                .await;
            if let Err(script_err) = script {
                tracing::warn!(error = %script_err, "script click failed, trying Enter key");
                let enter: char = fantoccini::key::Key::Enter.into();
                button.send_keys(&enter.to_string()).await?;
            }
        }
        Ok(())
    }

    /// Poll the page fingerprint once per second until it moves away from
    /// its pre-click value. The site does not reliably signal completion,
    /// so an unchanged page after the window is a warning, not an error.
    async fn wait_for_refresh(&self, client: &Client, before: &str) -> Result<(), ScrapeError> {
        let deadline = tokio::time::Instant::now() + REFRESH_WINDOW;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let current = page_fingerprint(&client.source().await?);
            if current != before {
                tracing::debug!("result page content changed");
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    window_secs = REFRESH_WINDOW.as_secs(),
                    "page content never changed after query click"
                );
                break;
            }
        }

        // Some revisions of the portal show a spinner; wait it out when
        // present, tolerate its absence.
        if let Ok(spinner) = client.find(Locator::Css("#loading")).await {
            let spinner_deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            while spinner.is_displayed().await.unwrap_or(false) {
                if tokio::time::Instant::now() >= spinner_deadline {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
        Ok(())
    }
}

/// One full submit attempt, abstracted so the retry loop can be exercised
/// without a live session.
trait QueryCycle {
    /// Re-assert the filter, submit, wait for refresh evidence, and capture
    /// the rendered page.
    async fn submit_and_capture(&self) -> Result<String, ScrapeError>;
}

/// Production cycle driving the live browser session.
struct SessionCycle<'a> {
    scraper: &'a PortalScraper,
    client: &'a Client,
    filter_date: &'a str,
}

impl QueryCycle for SessionCycle<'_> {
    async fn submit_and_capture(&self) -> Result<String, ScrapeError> {
        let Self { scraper, client, filter_date } = self;

        // A previous failed attempt may have left the fields stale.
        scraper.set_date_filters(client, filter_date).await?;
        scraper.assert_date_filters(client, filter_date).await?;

        let before = page_fingerprint(&client.source().await?);
        scraper.click_query(client).await?;
        scraper.wait_for_refresh(client, &before).await?;
        tokio::time::sleep(RENDER_SETTLE).await;

        Ok(client.source().await?)
    }
}

/// The crux: run submit cycles until the captured page provably shows the
/// requested date, up to [`MAX_ATTEMPTS`]. Unverified pages are never
/// returned.
async fn verified_query<C: QueryCycle>(
    cycle: &C,
    today: NaiveDate,
    filter_date: &str,
) -> Result<String, ScrapeError> {
    for attempt in 1..=MAX_ATTEMPTS {
        tracing::info!(attempt, filter_date, "submitting attendance query");

        match cycle.submit_and_capture().await {
            Ok(html) if verify_query_result(&html, today) => return Ok(html),
            Ok(html) => {
                // Helps diagnose a filter that silently reverted.
                let strays = find_date_like(&html);
                tracing::warn!(
                    attempt,
                    expected = filter_date,
                    found = ?strays,
                    "result page does not show the requested date"
                );
            }
            Err(err) => {
                tracing::warn!(attempt, error = %err, "query attempt failed");
            }
        }

        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }

    Err(ScrapeError::VerificationFailed {
        date: filter_date.to_string(),
        attempts: MAX_ATTEMPTS,
    })
}

/// SHA-256 of the rendered page, hex-encoded. Cheap change detector.
fn page_fingerprint(html: &str) -> String {
    let digest = Sha256::digest(html.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Accepted textual renderings of the requested date.
pub(crate) fn expected_date_strings(date: NaiveDate) -> [String; 3] {
    let (y, m, d) = (date.year(), date.month(), date.day());
    [
        format!("{y}/{m}/{d}"),
        format!("{y}/{m:02}/{d:02}"),
        format!("{y}-{m:02}-{d:02}"),
    ]
}

/// Does the rendered page show the requested date in any recognized format?
///
/// Conservative on purpose: a page showing correct data in an unrecognized
/// format still fails and triggers a retry.
pub(crate) fn verify_query_result(html: &str, date: NaiveDate) -> bool {
    expected_date_strings(date).iter().any(|needle| html.contains(needle.as_str()))
}

/// Every date-shaped substring in the page, for mismatch diagnostics.
pub(crate) fn find_date_like(html: &str) -> Vec<String> {
    // Static pattern; compilation cannot fail.
    let Ok(pattern) = Regex::new(r"\d{4}[/-]\d{1,2}[/-]\d{1,2}") else {
        return Vec::new();
    };
    let mut found: Vec<String> = pattern.find_iter(html).map(|m| m.as_str().to_string()).collect();
    found.dedup();
    found.truncate(10);
    found
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn accepts_any_recognized_date_format() {
        let date = day(2025, 9, 6);
        assert!(verify_query_result("<td>2025/9/6</td>", date));
        assert!(verify_query_result("<td>2025/09/06</td>", date));
        assert!(verify_query_result("<td>2025-09-06</td>", date));
    }

    #[test]
    fn rejects_a_page_showing_only_yesterday() {
        // The filter silently reverting to the previous day must read as
        // failure, not success.
        let html = "<table><td>2025/9/15</td><td>08:02</td></table>";
        assert!(!verify_query_result(html, day(2025, 9, 16)));
    }

    #[test]
    fn rejects_unrecognized_formats_by_design() {
        assert!(!verify_query_result("<td>Sep 16, 2025</td>", day(2025, 9, 16)));
        assert!(!verify_query_result("<td>2025.09.16</td>", day(2025, 9, 16)));
    }

    #[test]
    fn date_diagnostics_surface_what_the_page_shows() {
        let html = "<td>2025/9/15</td><td>2024-01-02</td><td>08:02</td>";
        assert_eq!(find_date_like(html), vec!["2025/9/15", "2024-01-02"]);
    }

    #[test]
    fn fingerprint_moves_with_content() {
        let a = page_fingerprint("<html>a</html>");
        let b = page_fingerprint("<html>b</html>");
        assert_ne!(a, b);
        assert_eq!(a, page_fingerprint("<html>a</html>"));
    }

    /// Cycle returning a fixed sequence of pages, then the last one forever.
    struct ScriptedCycle {
        pages: std::sync::Mutex<Vec<String>>,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedCycle {
        fn new(pages: &[&str]) -> Self {
            let mut pages: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
            pages.reverse();
            Self {
                pages: std::sync::Mutex::new(pages),
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl QueryCycle for ScriptedCycle {
        async fn submit_and_capture(&self) -> Result<String, ScrapeError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut pages = self.pages.lock().unwrap();
            let page = if pages.len() > 1 {
                pages.pop().unwrap_or_default()
            } else {
                pages.last().cloned().unwrap_or_default()
            };
            Ok(page)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_persistently_wrong_page_exhausts_the_attempt_bound() {
        // The filter keeps reverting to yesterday; every cycle fails
        // verification and the loop gives up after the bound.
        let cycle = ScriptedCycle::new(&["<table><td>2025/9/15</td><td>08:02</td></table>"]);
        let err = verified_query(&cycle, day(2025, 9, 16), "2025/9/16")
            .await
            .expect_err("never verified");

        match err {
            ScrapeError::VerificationFailed { date, attempts } => {
                assert_eq!(date, "2025/9/16");
                assert_eq!(attempts, MAX_ATTEMPTS);
            }
            other => panic!("expected VerificationFailed, got {other:?}"),
        }
        assert_eq!(cycle.call_count(), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn a_late_correct_page_stops_the_retrying() {
        let cycle = ScriptedCycle::new(&[
            "<table><td>2025/9/15</td></table>",
            "<table><td>2025/9/16</td><td>08:02</td></table>",
        ]);
        let html = verified_query(&cycle, day(2025, 9, 16), "2025/9/16")
            .await
            .expect("second attempt verifies");

        assert!(html.contains("2025/9/16"));
        assert_eq!(cycle.call_count(), 2);
    }

    #[test]
    fn expected_formats_cover_unpadded_and_padded() {
        assert_eq!(
            expected_date_strings(day(2025, 9, 6)),
            ["2025/9/6".to_string(), "2025/09/06".into(), "2025-09-06".into()]
        );
    }
}
