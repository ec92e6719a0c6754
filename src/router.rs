//! Inbound text routing.
//!
//! Keyword groups are checked in a fixed order; anything that matches none
//! of them goes to the text generator with the sender's persona prompt. The
//! router always produces a reply string, falling back to a canned
//! capabilities summary when generation is unavailable or fails.

use std::sync::Arc;

use crate::attendance::{ScrapeHandle, ScrapeRequest};
use crate::clock::{Clock, format_timestamp};
use crate::config::{Recipient, Role};
use crate::holidays::list_holidays;
use crate::llm::{TextGenerator, truncate_reply};
use crate::persona::{
    ATTENDANCE_ACK, ATTENDANCE_BUSY, ATTENDANCE_UNAVAILABLE, FALLBACK_GENERAL, FALLBACK_PARTNER,
    GENERAL_PROMPT, HELP_GENERAL, HELP_PARTNER, PARTNER_PROMPT,
};
use crate::reminders::ReminderEngine;

const HELP_KEYWORDS: &[&str] = &["說明", "幫助", "功能", "使用說明"];
const HOLIDAY_KEYWORDS: &[&str] = &["節日", "查看節日", "重要節日", "紀念日", "生日"];
const ATTENDANCE_KEYWORDS: &[&str] = &["出勤", "查詢出勤", "刷卡", "上班時間", "下班時間"];

pub struct Router {
    generator: Option<Arc<dyn TextGenerator>>,
    reminders: Arc<ReminderEngine>,
    scrape: ScrapeHandle,
    clock: Arc<dyn Clock>,
    recipients: Vec<Recipient>,
}

impl Router {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        reminders: Arc<ReminderEngine>,
        scrape: ScrapeHandle,
        clock: Arc<dyn Clock>,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self { generator, reminders, scrape, clock, recipients }
    }

    fn role_of(&self, user_id: &str) -> Role {
        self.recipients
            .iter()
            .find(|r| r.id == user_id)
            .map(|r| r.role)
            .unwrap_or(Role::Primary)
    }

    /// Produce the reply for one inbound text message.
    pub async fn respond(&self, user_id: &str, text: &str) -> String {
        let text = text.trim();
        let role = self.role_of(user_id);

        if text == "測試" {
            return format!(
                "✅ 機器人運作正常！\n台灣時間：{}",
                format_timestamp(self.clock.now())
            );
        }

        if HELP_KEYWORDS.contains(&text) {
            return match role {
                Role::Partner => HELP_PARTNER.to_string(),
                Role::Primary => HELP_GENERAL.to_string(),
            };
        }

        if HOLIDAY_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return list_holidays(self.clock.as_ref());
        }

        if text == "手動檢查" {
            let sent = self.reminders.run_check().await;
            return format!("🔍 手動檢查完成！\n本次共發送 {sent} 則節日提醒");
        }

        if text == "時間" {
            return format!("🕐 現在台灣時間：{}", format_timestamp(self.clock.now()));
        }

        if ATTENDANCE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return match self.scrape.request() {
                ScrapeRequest::Queued => ATTENDANCE_ACK.to_string(),
                ScrapeRequest::Busy => ATTENDANCE_BUSY.to_string(),
                ScrapeRequest::Unavailable => ATTENDANCE_UNAVAILABLE.to_string(),
            };
        }

        self.generate(role, text).await
    }

    async fn generate(&self, role: Role, text: &str) -> String {
        let (prompt, fallback) = match role {
            Role::Partner => (PARTNER_PROMPT, FALLBACK_PARTNER),
            Role::Primary => (GENERAL_PROMPT, FALLBACK_GENERAL),
        };

        let Some(generator) = &self.generator else {
            return fallback.to_string();
        };

        match generator.generate(prompt, text).await {
            Ok(reply) => truncate_reply(&reply),
            Err(err) => {
                tracing::warn!(error = %err, "text generation failed, sending fallback");
                fallback.to_string()
            }
        }
    }
}
