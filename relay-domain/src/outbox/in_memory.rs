//! 内存版发件箱（InMemoryOutboxStore）
//!
//! 以 `Vec` 保持插入顺序，锁从不跨越 await 持有。典型用途：测试环境、示例与本地开发。
//!
use super::{NewOutboxRecord, OutboxQuery, OutboxRecord, OutboxStore};
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// 死信记录
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub record: OutboxRecord,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    records: Mutex<Vec<OutboxRecord>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前死信区快照
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        match self.dead_letters.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn records(&self) -> RelayResult<MutexGuard<'_, Vec<OutboxRecord>>> {
        self.records
            .lock()
            .map_err(|_| RelayError::outbox("outbox lock poisoned"))
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn create(&self, record: NewOutboxRecord) -> RelayResult<OutboxRecord> {
        record.validate()?;
        let stored = record.into_record(Uuid::new_v4().to_string(), Utc::now());
        self.records()?.push(stored.clone());
        Ok(stored)
    }

    async fn find(&self, query: &OutboxQuery) -> RelayResult<Vec<OutboxRecord>> {
        let records = self.records()?;
        let matching = records.iter().filter(|r| query.matches(r)).cloned();
        Ok(match query.limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn delete(&self, id: &str) -> RelayResult<bool> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        Ok(records.len() != before)
    }

    async fn dead_letter(&self, id: &str, reason: &str) -> RelayResult<bool> {
        let removed = {
            let mut records = self.records()?;
            match records.iter().position(|r| r.id() == id) {
                Some(idx) => records.remove(idx),
                None => return Ok(false),
            }
        };

        self.dead_letters
            .lock()
            .map_err(|_| RelayError::outbox("dead letter lock poisoned"))?
            .push(DeadLetter {
                record: removed,
                reason: reason.to_string(),
                dead_lettered_at: Utc::now(),
            });
        Ok(true)
    }

    async fn count(&self) -> RelayResult<usize> {
        Ok(self.records()?.len())
    }
}
