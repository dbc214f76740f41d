//! In-process store with the same semantics as the PostgreSQL repositories
//!
//! Backs `serve --in-memory` and the test suites.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::DbError;
use super::repository::{ConversationRepository, TicketRepository};
use crate::model::{
    AuditLogEntry, Decision, HistoricalTicket, Message, Role, Thread, TurnCommit,
};

#[derive(Default)]
struct MemoryState {
    tickets: Vec<HistoricalTicket>,
    threads: HashMap<String, Thread>,
    messages: HashMap<String, Vec<Message>>,
    decisions: HashMap<String, Decision>,
    audit_log: Vec<AuditLogEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a historical corpus
    pub fn with_tickets(tickets: Vec<HistoricalTicket>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                tickets,
                ..MemoryState::default()
            }),
        }
    }

    #[cfg(test)]
    pub async fn decision_count(&self) -> usize {
        self.state.read().await.decisions.len()
    }

    #[cfg(test)]
    pub async fn audit_count(&self) -> usize {
        self.state.read().await.audit_log.len()
    }
}

#[async_trait]
impl TicketRepository for MemoryStore {
    async fn load_all_historical_tickets(&self) -> Result<Vec<HistoricalTicket>, DbError> {
        Ok(self.state.read().await.tickets.clone())
    }

    async fn get_one_ticket_by_type(
        &self,
        request_type: &str,
    ) -> Result<Option<HistoricalTicket>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .tickets
            .iter()
            .find(|t| t.request_type == request_type)
            .cloned())
    }

    async fn distinct_request_types(&self) -> Result<Vec<String>, DbError> {
        let state = self.state.read().await;
        let types: BTreeSet<&str> = state
            .tickets
            .iter()
            .map(|t| t.request_type.as_str())
            .collect();
        Ok(types.into_iter().map(str::to_string).collect())
    }

    async fn insert_tickets(&self, tickets: &[HistoricalTicket]) -> Result<usize, DbError> {
        let mut state = self.state.write().await;
        if let Some(dup) = tickets
            .iter()
            .find(|t| state.tickets.iter().any(|s| s.ticket_id == t.ticket_id))
        {
            return Err(DbError::Serialization(format!(
                "Duplicate ticket id: {}",
                dup.ticket_id
            )));
        }
        state.tickets.extend_from_slice(tickets);
        Ok(tickets.len())
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn create_thread(&self, thread_id: &str) -> Result<Thread, DbError> {
        let mut state = self.state.write().await;
        if state.threads.contains_key(thread_id) {
            return Err(DbError::Serialization(format!(
                "Thread already exists: {}",
                thread_id
            )));
        }
        let thread = Thread::new(thread_id, Utc::now());
        state.threads.insert(thread_id.to_string(), thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, DbError> {
        Ok(self.state.read().await.threads.get(thread_id).cloned())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        role: Option<Role>,
    ) -> Result<Vec<Message>, DbError> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .get(thread_id)
            .map(|m| {
                m.iter()
                    .filter(|msg| role.is_none_or(|r| msg.role == r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // stable: equal timestamps keep insertion order
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn get_decision(&self, thread_id: &str) -> Result<Option<Decision>, DbError> {
        Ok(self.state.read().await.decisions.get(thread_id).cloned())
    }

    async fn list_decisions_since(&self, since: DateTime<Utc>) -> Result<Vec<Decision>, DbError> {
        let state = self.state.read().await;
        let mut decisions: Vec<Decision> = state
            .decisions
            .values()
            .filter(|d| d.created_at >= since)
            .cloned()
            .collect();
        decisions.sort_by_key(|d| d.created_at);
        Ok(decisions)
    }

    async fn list_audit_log(&self, thread_id: &str) -> Result<Vec<AuditLogEntry>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .audit_log
            .iter()
            .filter(|e| e.thread_id == thread_id)
            .cloned()
            .collect())
    }

    async fn commit_turn(&self, commit: TurnCommit) -> Result<Decision, DbError> {
        // single write guard: readers never observe a partial turn
        let mut state = self.state.write().await;

        let thread = state
            .threads
            .entry(commit.thread_id.clone())
            .or_insert_with(|| Thread::new(commit.thread_id.clone(), commit.committed_at));
        thread.status = commit.status;
        thread.updated_at = commit.committed_at;

        state
            .messages
            .entry(commit.thread_id.clone())
            .or_default()
            .extend(commit.messages);

        let existing = state.decisions.remove(&commit.thread_id);
        let decision = Decision::apply_update(
            &commit.thread_id,
            existing,
            commit.decision,
            commit.committed_at,
        );
        state
            .decisions
            .insert(commit.thread_id.clone(), decision.clone());

        state.audit_log.push(commit.audit);

        Ok(decision)
    }
}
