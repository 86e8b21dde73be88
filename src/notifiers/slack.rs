use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::discord::AVATAR_URL;
use super::{optimized_output, post_json, storage_lines, Notifier, NotifierError, NotifierKind};
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook: String,
    /// Send Block Kit blocks instead of a classic attachment
    #[serde(default)]
    pub use_block_kit: bool,
}

pub struct Slack {
    id: String,
    config: SlackConfig,
    client: Client,
    report: Report,
}

impl Slack {
    pub fn new(id: impl Into<String>, config: SlackConfig) -> Self {
        Self {
            id: id.into(),
            config,
            client: Client::new(),
            report: Report::new(),
        }
    }

    fn output(&self) -> String {
        optimized_output(&self.report, self.kind().max_output_chars())
    }

    fn classic_payload(&self) -> Value {
        let success = self.report.success();

        let mut fields: Vec<Value> = self
            .report
            .databases
            .iter()
            .map(|database| {
                let lines = storage_lines(database, ":white_check_mark:", ":x:");
                let value = if lines.is_empty() {
                    ":x:".to_string()
                } else {
                    lines.join("\n")
                };
                json!({ "title": database.database_id, "short": true, "value": value })
            })
            .collect();

        if !success {
            fields.push(json!({ "title": "Output", "value": self.output() }));
        }

        json!({
            "attachments": [{
                "mrkdwn_in": ["fields"],
                "title": "Backup",
                "author_name": "blackbox",
                "author_icon": AVATAR_URL,
                "color": if success { "#0FA031" } else { "#CC2020" },
                "fields": fields,
            }]
        })
    }

    fn block_kit_payload(&self) -> Value {
        let mut blocks = vec![json!({
            "type": "header",
            "text": { "type": "plain_text", "text": "Backup" },
        })];

        // Two databases per section
        for pair in self.report.databases.chunks(2) {
            let fields: Vec<Value> = pair
                .iter()
                .map(|database| {
                    let mut text = format!("*{}*", database.database_id);
                    for storage in &database.storages {
                        let emoji = if storage.success { ":white_check_mark:" } else { ":x:" };
                        text.push_str(&format!("\n{} {}", emoji, storage.storage_id));
                    }
                    if database.storages.is_empty() {
                        text.push_str("\n:x:");
                    }
                    json!({ "type": "mrkdwn", "text": text })
                })
                .collect();
            blocks.push(json!({ "type": "section", "fields": fields }));
        }

        if !self.report.success() {
            blocks.push(json!({ "type": "divider" }));
            blocks.push(json!({
                "type": "header",
                "text": { "type": "plain_text", "text": "Output" },
            }));
            blocks.push(json!({
                "type": "section",
                "text": { "type": "plain_text", "text": self.output() },
            }));
        }

        blocks.push(json!({
            "type": "context",
            "elements": [
                { "type": "image", "image_url": AVATAR_URL, "alt_text": "blackbox" },
                { "type": "plain_text", "text": "blackbox", "emoji": true },
            ],
        }));

        json!({ "blocks": blocks })
    }
}

#[async_trait]
impl Notifier for Slack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Slack
    }

    fn report(&self) -> &Report {
        &self.report
    }

    fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    fn payload(&self) -> Value {
        if self.config.use_block_kit {
            self.block_kit_payload()
        } else {
            self.classic_payload()
        }
    }

    async fn notify(&self) -> Result<(), NotifierError> {
        post_json(&self.client, &self.config.webhook, &self.payload()).await
    }
}
