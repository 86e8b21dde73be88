use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{post_json, Notifier, NotifierError, NotifierKind};
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonConfig {
    pub url: String,
}

/// Posts the raw report to an arbitrary HTTP endpoint
pub struct JsonWebhook {
    id: String,
    config: JsonConfig,
    client: Client,
    report: Report,
}

impl JsonWebhook {
    pub fn new(id: impl Into<String>, config: JsonConfig) -> Self {
        Self {
            id: id.into(),
            config,
            client: Client::new(),
            report: Report::new(),
        }
    }
}

#[async_trait]
impl Notifier for JsonWebhook {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Json
    }

    fn report(&self) -> &Report {
        &self.report
    }

    fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    fn payload(&self) -> Value {
        let databases: Vec<Value> = self
            .report
            .databases
            .iter()
            .map(|database| {
                let backup: Vec<Value> = database
                    .storages
                    .iter()
                    .map(|storage| json!({ "name": storage.storage_id, "success": storage.success }))
                    .collect();
                json!({
                    "source": database.database_id,
                    "success": database.success,
                    "output": (!database.output.is_empty()).then_some(&database.output),
                    "backup": backup,
                })
            })
            .collect();

        json!({ "backup-data": databases })
    }

    async fn notify(&self) -> Result<(), NotifierError> {
        post_json(&self.client, &self.config.url, &self.payload()).await
    }
}
