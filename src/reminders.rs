//! Holiday reminder engine.
//!
//! Walks the static holiday table on every check tick and pushes a countdown
//! message when a holiday sits exactly on one of the alert thresholds. The
//! (label, threshold, day) mark in [`BotState`] makes each reminder
//! at-most-once per day no matter how many ticks land.

use std::sync::Arc;

use crate::channels::MessageSink;
use crate::clock::Clock;
use crate::config::{Recipient, Role};
use crate::holidays::{HOLIDAYS, days_until};
use crate::state::{BotState, ReminderKey};

/// Days-before marks that trigger a reminder. Zero is the day itself.
const THRESHOLDS: &[i64] = &[7, 5, 3, 1, 0];

pub struct ReminderEngine {
    sink: Arc<dyn MessageSink>,
    state: Arc<BotState>,
    clock: Arc<dyn Clock>,
    recipients: Vec<Recipient>,
}

impl ReminderEngine {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        state: Arc<BotState>,
        clock: Arc<dyn Clock>,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self { sink, state, clock, recipients }
    }

    /// Check every holiday once and push any newly due reminders.
    /// Returns how many were sent.
    pub async fn run_check(&self) -> usize {
        let today = self.clock.today();
        let mut sent = 0;

        for (label, date_str) in HOLIDAYS {
            let (days, target) = match days_until(label, date_str, today) {
                Ok(resolved) => resolved,
                Err(err) => {
                    // One bad table entry never stops the rest.
                    tracing::warn!(label, date = date_str, error = %err, "skipping malformed holiday date");
                    continue;
                }
            };

            if !THRESHOLDS.contains(&days) {
                continue;
            }

            let key = ReminderKey { label: label.to_string(), threshold: days, day: today };
            if !self.state.try_mark_reminder(key) {
                continue;
            }

            let text = if days == 0 {
                format!("🎉 今天就是「{label}」！\n別忘了好好慶祝一下～ 🥳")
            } else {
                format!(
                    "⏰ 節日提醒\n\n再過 {days} 天就是「{label}」囉！\n日期：{}\n記得提前準備～ 🎁",
                    target.format("%Y年%m月%d日"),
                )
            };

            self.push_to_primary(&text).await;
            sent += 1;
        }

        tracing::info!(sent, "holiday check finished");
        sent
    }

    async fn push_to_primary(&self, text: &str) {
        for recipient in self.recipients.iter().filter(|r| r.role == Role::Primary) {
            if let Err(err) = self.sink.push(&recipient.id, text).await {
                tracing::error!(to = %recipient.id, error = %err, "reminder push failed");
            }
        }
    }
}
