//! Notifiers that report the outcome of a run.
//!
//! Chat services cap message sizes, so failure output is trimmed with
//! [`optimized_output`] before it is sent: only failed databases are
//! included, each reduced to the tail of its log.

pub mod discord;
pub mod json;
pub mod slack;
pub mod telegram;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::Report;

pub use discord::{Discord, DiscordConfig};
pub use json::{JsonConfig, JsonWebhook};
pub use slack::{Slack, SlackConfig};
pub use telegram::{Telegram, TelegramConfig};

/// Lines of output kept per failed database
pub const TAIL_LINES: usize = 10;

const SEPARATOR: &str = "\n\n";

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> NotifierKind;

    fn report(&self) -> &Report;

    fn report_mut(&mut self) -> &mut Report;

    /// Request body sent to the service
    fn payload(&self) -> serde_json::Value;

    async fn notify(&self) -> Result<(), NotifierError>;
}

/// Notifier kinds accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Discord,
    Slack,
    Telegram,
    Json,
}

impl NotifierKind {
    pub const ALL: [NotifierKind; 4] = [Self::Discord, Self::Slack, Self::Telegram, Self::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Slack => "slack",
            Self::Telegram => "telegram",
            Self::Json => "json",
        }
    }

    /// Character budget for failure output; `None` is unlimited
    pub fn max_output_chars(&self) -> Option<usize> {
        match self {
            Self::Discord => Some(1024),
            Self::Slack => Some(2000),
            Self::Telegram => Some(4096),
            Self::Json => None,
        }
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown notifier kind: {}", s))
    }
}

/// Last `count` characters of `text`
fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if count >= total {
        return text;
    }
    match text.char_indices().nth(total - count) {
        Some((index, _)) => &text[index..],
        None => "",
    }
}

/// Last [`TAIL_LINES`] lines of a trimmed output
fn tail_lines(output: &str) -> String {
    let lines: Vec<&str> = output.trim().split('\n').collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

/// Failure output for a report, trimmed to `limit` characters.
///
/// A single failed database keeps the last `limit` characters of its tail.
/// Several failures share the budget: shortest outputs are placed first and
/// each gets an equal share of what is left, formatted as `"{id}: {tail}"`
/// and joined by blank lines.
pub fn optimized_output(report: &Report, limit: Option<usize>) -> String {
    let outputs: Vec<(&str, String)> = report
        .failed()
        .map(|db| (db.database_id.as_str(), tail_lines(&db.output)))
        .collect();

    match (outputs.len(), limit) {
        (0, _) => String::new(),
        (1, Some(limit)) => tail_chars(&outputs[0].1, limit).to_string(),
        (1, None) => outputs[0].1.clone(),
        (_, None) => outputs
            .iter()
            .map(|(id, output)| format!("{}: {}", id, output))
            .collect::<Vec<_>>()
            .join(SEPARATOR),
        (_, Some(limit)) => allocate_characters(outputs, limit),
    }
}

fn allocate_characters(mut outputs: Vec<(&str, String)>, limit: usize) -> String {
    outputs.sort_by_key(|(_, output)| output.chars().count());

    let mut total_budget = limit as i64;
    let mut remaining = outputs.len() as i64;
    let mut allocated: Vec<String> = Vec::with_capacity(outputs.len());

    for (id, output) in &outputs {
        if remaining == 0 || total_budget <= 0 {
            break;
        }
        let budget = total_budget / remaining;
        let separator = if allocated.is_empty() { 0 } else { SEPARATOR.len() as i64 };
        let prefix = format!("{}: ", id);
        let prefix_len = prefix.chars().count() as i64;
        let output_len = output.chars().count() as i64;

        if output_len + prefix_len + separator <= budget {
            allocated.push(format!("{}{}", prefix, output));
            total_budget -= output_len + prefix_len + separator;
        } else {
            let available = budget - prefix_len - separator;
            if available <= 0 {
                break;
            }
            allocated.push(format!("{}{}", prefix, tail_chars(output, available as usize)));
            total_budget -= budget;
        }

        remaining -= 1;
    }

    allocated.join(SEPARATOR)
}

/// POST a JSON body, treating non-2xx responses as errors
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    payload: &serde_json::Value,
) -> Result<(), NotifierError> {
    let response = client.post(url).json(payload).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(NotifierError::Rejected(format!("{}: {}", status, body)));
    }
    Ok(())
}

/// Status lines for a database's storages, `"{emoji}  {storage_id}"`
pub(crate) fn storage_lines(report: &crate::report::DatabaseReport, ok: &str, failed: &str) -> Vec<String> {
    report
        .storages
        .iter()
        .map(|storage| {
            let emoji = if storage.success { ok } else { failed };
            format!("{}  {}", emoji, storage.storage_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::DatabaseReport;

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn test_tail_lines() {
        let output = (1..=15).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        assert_eq!(tail_lines(&output), "6\n7\n8\n9\n10\n11\n12\n13\n14\n15");
    }

    #[test]
    fn test_no_failures_means_no_output() {
        let mut report = Report::new();
        report.add_database(DatabaseReport::new("ok", true, "fine"));
        assert_eq!(optimized_output(&report, Some(100)), "");
    }
}
