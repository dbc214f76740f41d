//! Mandatory-field schema per request type, derived from the corpus

use std::collections::HashMap;

use crate::model::{HistoricalTicket, SchemaPolicy};

/// Distinct field lists seen for one request type, in first-seen order
#[derive(Default)]
struct Variants {
    lists: Vec<(Vec<String>, usize)>,
}

impl Variants {
    fn observe(&mut self, fields: &[String]) {
        match self.lists.iter_mut().find(|(list, _)| list.as_slice() == fields) {
            Some((_, count)) => *count += 1,
            None => self.lists.push((fields.to_vec(), 1)),
        }
    }

    fn resolve(self, policy: SchemaPolicy) -> Vec<String> {
        match policy {
            SchemaPolicy::FirstSeen => self
                .lists
                .into_iter()
                .next()
                .map(|(list, _)| list)
                .unwrap_or_default(),
            SchemaPolicy::MostCommon => {
                let mut best: Option<(Vec<String>, usize)> = None;
                for (list, count) in self.lists {
                    // strictly greater: ties keep the earlier list
                    if best.as_ref().is_none_or(|(_, c)| count > *c) {
                        best = Some((list, count));
                    }
                }
                best.map(|(list, _)| list).unwrap_or_default()
            }
            SchemaPolicy::Union => {
                let mut merged: Vec<String> = Vec::new();
                for field in self.lists.into_iter().flat_map(|(list, _)| list) {
                    if !merged.contains(&field) {
                        merged.push(field);
                    }
                }
                merged
            }
        }
    }
}

/// Immutable map from exact request type to its mandatory fields
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Vec<String>>,
    policy: SchemaPolicy,
}

impl SchemaRegistry {
    pub fn build(tickets: &[HistoricalTicket], policy: SchemaPolicy) -> Self {
        let mut order: Vec<&str> = Vec::new();
        let mut variants: HashMap<&str, Variants> = HashMap::new();

        for ticket in tickets {
            let entry = variants
                .entry(ticket.request_type.as_str())
                .or_insert_with(|| {
                    order.push(ticket.request_type.as_str());
                    Variants::default()
                });
            entry.observe(&ticket.mandatory_fields);
        }

        let mut schemas = HashMap::with_capacity(order.len());
        for request_type in order {
            let Some(v) = variants.remove(request_type) else {
                continue;
            };
            if v.lists.len() > 1 {
                tracing::warn!(
                    request_type = %request_type,
                    variants = v.lists.len(),
                    policy = ?policy,
                    "Historical tickets disagree on mandatory fields"
                );
            }
            schemas.insert(request_type.to_string(), v.resolve(policy));
        }

        tracing::info!(
            request_types = schemas.len(),
            policy = ?policy,
            "Schema registry built"
        );

        Self { schemas, policy }
    }

    pub fn schema_for(&self, request_type: &str) -> Option<&[String]> {
        self.schemas.get(request_type).map(Vec::as_slice)
    }

    pub fn policy(&self) -> SchemaPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
