//! 消息处理：JSON 负载 -> 字段映射 -> 当前状态合并

use async_trait::async_trait;
use domain::RawMessage;
use iot2alexa_ingest::{IngestError, RawMessageHandler};
use iot2alexa_normalize::FieldMapper;
use iot2alexa_storage::CurrentStateStore;
use iot2alexa_telemetry::{
    record_extraction_failures, record_payload_parse_failure, record_values_merged,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 将每条消息映射后整批合并进当前状态。
pub struct MappingHandler {
    mapper: FieldMapper,
    store: Arc<CurrentStateStore>,
}

impl MappingHandler {
    pub fn new(mapper: FieldMapper, store: Arc<CurrentStateStore>) -> Self {
        Self { mapper, store }
    }

    pub fn store(&self) -> &Arc<CurrentStateStore> {
        &self.store
    }
}

#[async_trait]
impl RawMessageHandler for MappingHandler {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError> {
        // 无法解析的负载按空负载处理，每条规则各自报错
        let payload = match serde_json::from_slice::<Value>(&message.payload) {
            Ok(payload) => payload,
            Err(err) => {
                record_payload_parse_failure();
                warn!(
                    target: "iot2alexa.backend",
                    topic = %message.topic,
                    payload_size = message.payload.len(),
                    error = %err,
                    "payload_parse_failed"
                );
                Value::Null
            }
        };

        let outcome = self.mapper.map(&payload);
        for err in &outcome.errors {
            warn!(
                target: "iot2alexa.backend",
                topic = %message.topic,
                key = err.key().unwrap_or_default(),
                error = %err,
                "field_extraction_failed"
            );
        }
        record_extraction_failures(outcome.errors.len() as u64);

        if outcome.values.is_empty() {
            return Ok(());
        }
        let result = self.store.merge(outcome.values);
        record_values_merged(result.applied as u64);
        if !result.rejected.is_empty() {
            warn!(
                target: "iot2alexa.backend",
                rejected = ?result.rejected,
                "state_keys_rejected"
            );
        }
        debug!(
            target: "iot2alexa.backend",
            topic = %message.topic,
            applied = result.applied,
            version = result.version,
            received_at_ms = message.received_at_ms,
            "state_merged"
        );
        Ok(())
    }
}
