//! Partner care: the daily welcome and the silence check-in.
//!
//! Both sides key off [`BotState`]: every inbound message stamps a
//! last-contact time, the welcome fires on the partner's first message of
//! the Taipei day, and the check-in fires once per day after more than 24
//! hours without hearing from her.

use std::sync::Arc;

use rand::Rng;

use crate::channels::MessageSink;
use crate::clock::{Clock, format_timestamp};
use crate::config::{Recipient, Role};
use crate::persona::{CARE_POOL, WELCOME_POOL};
use crate::state::BotState;

/// Silence longer than this triggers the daily check-in.
const SILENCE_HOURS: i64 = 24;

pub struct CareService {
    sink: Arc<dyn MessageSink>,
    state: Arc<BotState>,
    clock: Arc<dyn Clock>,
    recipients: Vec<Recipient>,
}

impl CareService {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        state: Arc<BotState>,
        clock: Arc<dyn Clock>,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self { sink, state, clock, recipients }
    }

    fn partner(&self) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.role == Role::Partner)
    }

    /// Record an inbound message and, when it is the partner's first of the
    /// day, push her welcome.
    pub async fn on_contact(&self, user_id: &str) {
        let now = self.clock.now();
        self.state.note_contact(user_id, now);

        let Some(partner) = self.partner() else {
            return;
        };
        if partner.id != user_id {
            return;
        }
        if !self.state.try_mark_welcome(self.clock.today()) {
            return;
        }

        let template = pick(WELCOME_POOL);
        let text = template.replace("{time}", &format_timestamp(now));
        if let Err(err) = self.sink.push(&partner.id, &text).await {
            tracing::error!(to = %partner.id, error = %err, "welcome push failed");
        } else {
            tracing::info!("daily welcome sent");
        }
    }

    /// Scheduled tick: push one check-in when the partner has been silent
    /// for over 24 hours. At most once per day; never fires before the
    /// partner has written at all.
    pub async fn run_inactivity_check(&self) {
        let Some(partner) = self.partner() else {
            return;
        };
        let Some(last) = self.state.last_contact(&partner.id) else {
            return;
        };

        let now = self.clock.now();
        let silent_for = now - last;
        if silent_for < chrono::Duration::hours(SILENCE_HOURS) {
            return;
        }
        if !self.state.try_mark_care(self.clock.today()) {
            return;
        }

        tracing::info!(silent_hours = silent_for.num_hours(), "sending inactivity check-in");
        let text = pick(CARE_POOL);
        if let Err(err) = self.sink.push(&partner.id, text).await {
            tracing::error!(to = %partner.id, error = %err, "check-in push failed");
        }
    }
}

fn pick<'a>(pool: &[&'a str]) -> &'a str {
    let index = rand::thread_rng().gen_range(0..pool.len());
    pool[index]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::channels::testing::RecordingSink;
    use crate::clock::FixedClock;

    fn service(sink: Arc<RecordingSink>, state: Arc<BotState>, clock: Arc<FixedClock>) -> CareService {
        let recipients = vec![
            Recipient { id: "U-primary".into(), role: Role::Primary },
            Recipient { id: "U-partner".into(), role: Role::Partner },
        ];
        CareService::new(sink, state, clock, recipients)
    }

    #[tokio::test]
    async fn first_partner_message_of_the_day_gets_a_welcome() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 6, 1, 8, 30, 0));
        let care = service(sink.clone(), state, clock.clone());

        care.on_contact("U-partner").await;
        care.on_contact("U-partner").await;
        let welcomes = sink.pushes_to("U-partner");
        assert_eq!(welcomes.len(), 1, "second message of the day is not welcomed");
        assert!(welcomes[0].contains("2025-06-01 08:30:00"), "timestamp slot filled");

        // The next day starts fresh.
        clock.set(2025, 6, 2, 7, 0, 0);
        care.on_contact("U-partner").await;
        assert_eq!(sink.pushes_to("U-partner").len(), 2);
    }

    #[tokio::test]
    async fn primary_messages_never_trigger_a_welcome() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 6, 1, 8, 30, 0));
        let care = service(sink.clone(), state.clone(), clock);

        care.on_contact("U-primary").await;
        assert_eq!(sink.push_count(), 0);
        assert!(state.last_contact("U-primary").is_some(), "contact still recorded");
    }

    #[tokio::test]
    async fn check_in_fires_after_24h_silence_once_per_day() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 6, 1, 9, 0, 0));
        let care = service(sink.clone(), state.clone(), clock.clone());

        care.on_contact("U-partner").await;
        let welcome_count = sink.pushes_to("U-partner").len();

        // 23 hours of silence is not enough.
        clock.set(2025, 6, 2, 8, 0, 0);
        care.run_inactivity_check().await;
        assert_eq!(sink.pushes_to("U-partner").len(), welcome_count);

        // Past 24 hours it fires, but only once that day.
        clock.set(2025, 6, 2, 9, 30, 0);
        care.run_inactivity_check().await;
        care.run_inactivity_check().await;
        assert_eq!(sink.pushes_to("U-partner").len(), welcome_count + 1);
    }

    #[tokio::test]
    async fn no_check_in_before_any_contact_exists() {
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(BotState::new());
        let clock = Arc::new(FixedClock::at(2025, 6, 1, 9, 0, 0));
        let care = service(sink.clone(), state, clock);

        care.run_inactivity_check().await;
        assert_eq!(sink.push_count(), 0);
    }
}
