//! Shift registration through the generative and warehouse collaborators.
//!
//! The generated statement is executed exactly as returned. Nothing here
//! validates or sandboxes it; whoever enables recording must scope the
//! warehouse credentials accordingly.
//!
//! Both calls share the event's reply deadline. The warehouse attempts of one
//! registration share a request id, so a retry never inserts twice.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::{CallPolicy, GenerativeService, QueryResult, Warehouse};
use crate::errors::ShiftlineResult;

/// One shift registration taken from a date-picker postback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftRequest {
    pub user_id: Option<String>,
    pub item_id: Option<String>,
    pub selected: String,
}

impl ShiftRequest {
    /// Natural-language request handed to the generative model.
    pub fn describe(&self) -> String {
        format!(
            "ユーザーID {} が項目 {} のシフトを {} に登録します。",
            self.user_id.as_deref().unwrap_or("unknown"),
            self.item_id.as_deref().unwrap_or("none"),
            self.selected
        )
    }
}

pub struct ShiftRecorder {
    generative: Arc<dyn GenerativeService>,
    warehouse: Arc<dyn Warehouse>,
    table: String,
    policy: CallPolicy,
}

impl ShiftRecorder {
    pub fn new(
        generative: Arc<dyn GenerativeService>,
        warehouse: Arc<dyn Warehouse>,
        table: impl Into<String>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            generative,
            warehouse,
            table: table.into(),
            policy,
        }
    }

    pub fn prompt_context(&self) -> String {
        format!(
            "あなたは BigQuery の標準 SQL を書くアシスタントです。\
             テーブル `{}` の列は user_id STRING, item_id STRING, shift_start DATETIME, \
             registered_at TIMESTAMP です。\
             依頼された登録を行う INSERT 文を 1 つだけ出力してください。\
             registered_at には CURRENT_TIMESTAMP() を使い、説明は付けないでください。",
            self.table
        )
    }

    pub async fn record(
        &self,
        request: &ShiftRequest,
        deadline: Instant,
    ) -> ShiftlineResult<QueryResult> {
        let context = self.prompt_context();
        let input = request.describe();
        let statement = self
            .policy
            .run("generative", deadline, || {
                self.generative.generate(&context, &input)
            })
            .await?;

        // Executed verbatim: see module docs.
        let request_id = Uuid::new_v4().to_string();
        warn!(
            "executing generated statement unreviewed ({} chars, request {})",
            statement.len(),
            request_id
        );
        let result = self
            .policy
            .run("warehouse", deadline, || {
                self.warehouse.execute(&statement, &request_id)
            })
            .await?;
        if result.pending {
            info!(
                "shift record pending for item={}: job {} still running",
                request.item_id.as_deref().unwrap_or("-"),
                result.job_id.as_deref().unwrap_or("-")
            );
        } else {
            info!(
                "shift recorded for item={} affected={:?}",
                request.item_id.as_deref().unwrap_or("-"),
                result.affected_rows
            );
        }
        Ok(result)
    }
}
