//! Deterministic capability fakes shared by the service test suites

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::model::{HistoricalTicket, TicketMetadata};
use crate::service::llm::{CapabilityError, CompletionCapability, EmbeddingCapability};

pub fn ticket(id: &str, request_type: &str, embedding: Vec<f64>) -> HistoricalTicket {
    ticket_with(id, request_type, &["Justification"], "Approved", 20, embedding)
}

pub fn ticket_with(
    id: &str,
    request_type: &str,
    mandatory_fields: &[&str],
    outcome: &str,
    risk: i32,
    embedding: Vec<f64>,
) -> HistoricalTicket {
    HistoricalTicket {
        ticket_id: id.to_string(),
        request_type: request_type.to_string(),
        request_summary: format!("{} request {}", request_type, id),
        details: String::new(),
        mandatory_fields: mandatory_fields.iter().map(|f| f.to_string()).collect(),
        fields_provided: mandatory_fields.iter().map(|f| f.to_string()).collect(),
        outcome: outcome.to_string(),
        security_risk_score: risk,
        embedding,
        metadata: TicketMetadata {
            department: Some("Engineering".to_string()),
            title: None,
            created_at: None,
        },
    }
}

/// Embeds text as a bag-of-keywords indicator vector
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    calls: AtomicUsize,
    fail: bool,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing(keywords: &[&str]) -> Self {
        Self {
            fail: true,
            ..Self::new(keywords)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f64> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| if lower.contains(k.as_str()) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingCapability for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::Embedding("embedding backend down".to_string()));
        }
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::Embedding("embedding backend down".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Structured(serde_json::Value),
    Fail,
}

/// A recorded completion request
#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub preamble: String,
    pub prompt: String,
}

/// Completion fake scripted per preamble
///
/// Replies registered for one preamble are served in order; the last one
/// repeats once the queue is down to it.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<HashMap<String, Vec<Reply>>>,
    calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(self, preamble: &str, reply: &str) -> Self {
        self.push(preamble, Reply::Text(reply.to_string()))
    }

    pub fn structured(self, preamble: &str, reply: serde_json::Value) -> Self {
        self.push(preamble, Reply::Structured(reply))
    }

    pub fn failing(self, preamble: &str) -> Self {
        self.push(preamble, Reply::Fail)
    }

    fn push(self, preamble: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(preamble.to_string())
            .or_default()
            .push(reply);
        self
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, preamble: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.preamble == preamble)
            .count()
    }

    pub fn last_prompt_for(&self, preamble: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.preamble == preamble)
            .map(|c| c.prompt.clone())
    }

    fn next(&self, preamble: &str, prompt: &str) -> Result<Reply, CapabilityError> {
        self.calls.lock().unwrap().push(CompletionCall {
            preamble: preamble.to_string(),
            prompt: prompt.to_string(),
        });

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(preamble)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| CapabilityError::Completion("no scripted reply".to_string()))?;
        let reply = if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        };
        match reply {
            Reply::Fail => Err(CapabilityError::Completion("completion backend down".to_string())),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl CompletionCapability for ScriptedCompletion {
    async fn complete_text(&self, preamble: &str, prompt: &str) -> Result<String, CapabilityError> {
        match self.next(preamble, prompt)? {
            Reply::Text(text) => Ok(text),
            Reply::Structured(value) => Ok(value.to_string()),
            Reply::Fail => unreachable!(),
        }
    }

    async fn complete_structured(
        &self,
        preamble: &str,
        prompt: &str,
        _schema_hint: &serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError> {
        match self.next(preamble, prompt)? {
            Reply::Structured(value) => Ok(value),
            Reply::Text(text) => serde_json::from_str(&text)
                .map_err(|e| CapabilityError::MalformedOutput(e.to_string())),
            Reply::Fail => unreachable!(),
        }
    }
}
