use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{optimized_output, post_json, Notifier, NotifierError, NotifierKind};
use crate::report::Report;

pub const API_URL: &str = "https://api.telegram.org";

const CHECKMARK: &str = "\u{2705}";
const FAIL: &str = "\u{274C}";
const WARNING: &str = "\u{26A0}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token
    pub token: String,
    pub chat_id: String,
}

/// Sends a plain-text status message through the Telegram bot API
pub struct Telegram {
    id: String,
    config: TelegramConfig,
    client: Client,
    report: Report,
}

impl Telegram {
    pub fn new(id: impl Into<String>, config: TelegramConfig) -> Self {
        Self {
            id: id.into(),
            config,
            client: Client::new(),
            report: Report::new(),
        }
    }

    /// Message body
    pub fn text(&self) -> String {
        let mut text = String::from("Blackbox Backup Status:\n");

        for database in &self.report.databases {
            text.push_str(&format!("{}: \n", database.database_id));
            for storage in &database.storages {
                let emoji = if storage.success { CHECKMARK } else { FAIL };
                text.push_str(&format!("{} {}\n", emoji, storage.storage_id));
            }
        }

        if !self.report.success() {
            let output = optimized_output(&self.report, self.kind().max_output_chars());
            if !output.is_empty() {
                text.push_str(&format!("\n{} Output:\n{}\n", WARNING, output));
            }
        }

        text
    }
}

#[async_trait]
impl Notifier for Telegram {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Telegram
    }

    fn report(&self) -> &Report {
        &self.report
    }

    fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    fn payload(&self) -> Value {
        json!({ "chat_id": self.config.chat_id, "text": self.text() })
    }

    async fn notify(&self) -> Result<(), NotifierError> {
        let url = format!("{}/bot{}/sendMessage", API_URL, self.config.token);
        post_json(&self.client, &url, &self.payload()).await
    }
}
