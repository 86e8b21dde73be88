use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{optimized_output, post_json, storage_lines, Notifier, NotifierError, NotifierKind};
use crate::report::Report;

pub const AVATAR_URL: &str = "https://raw.githubusercontent.com/lemonsaurus/blackbox/main/img/blackbox_avatar.png";

const SUCCESS_COLOR: u32 = 1_024_049;
const FAILURE_COLOR: u32 = 13_377_568;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook: String,
}

/// Posts an embed to a Discord webhook
pub struct Discord {
    id: String,
    config: DiscordConfig,
    client: Client,
    report: Report,
}

impl Discord {
    pub fn new(id: impl Into<String>, config: DiscordConfig) -> Self {
        Self {
            id: id.into(),
            config,
            client: Client::new(),
            report: Report::new(),
        }
    }
}

#[async_trait]
impl Notifier for Discord {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Discord
    }

    fn report(&self) -> &Report {
        &self.report
    }

    fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    fn payload(&self) -> Value {
        let success = self.report.success();

        let mut fields: Vec<Value> = self
            .report
            .databases
            .iter()
            .map(|database| {
                let lines = storage_lines(database, ":white_check_mark:", ":x:");
                // Discord rejects empty field values
                let value = if lines.is_empty() {
                    ":x:".to_string()
                } else {
                    lines.join("\n")
                };
                json!({
                    "name": format!("**{}**", database.database_id),
                    "inline": true,
                    "value": value,
                })
            })
            .collect();

        if !success {
            fields.push(json!({
                "name": "Output",
                "value": optimized_output(&self.report, self.kind().max_output_chars()),
            }));
        }

        json!({
            "content": null,
            "embeds": [{
                "title": "Backup",
                "color": if success { SUCCESS_COLOR } else { FAILURE_COLOR },
                "fields": fields,
            }],
            "username": "blackbox",
            "avatar_url": AVATAR_URL,
        })
    }

    async fn notify(&self) -> Result<(), NotifierError> {
        post_json(&self.client, &self.config.webhook, &self.payload()).await
    }
}
