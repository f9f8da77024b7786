//! Dashboard aggregations over stored conversations.
//!
//! Everything here is computed in process from a snapshot returned by
//! [`ConversationStore::all_conversations`](crate::session::ConversationStore::all_conversations).

use crate::knowledge::{KnowledgeBase, KnowledgeStats};
use crate::session::{Conversation, Role};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_TOP_QUERIES: usize = 10;
pub const MAX_TOP_QUERIES: usize = 100;
const RECENT_ACTIVITY_DAYS: i64 = 7;

/// One group of a grouped count. Serialized as `{ "_id": key, "count": n }`,
/// the shape the dashboard charts read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket<K> {
    #[serde(rename = "_id")]
    pub key: K,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub total_conversations: u64,
    pub total_messages: u64,
    pub user_messages: u64,
    pub assistant_messages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTotals {
    pub ai_calls: u64,
    pub kb_hits: u64,
    /// Percentage of counted replies that needed the AI, one decimal.
    pub ai_fallback_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub overview: OverviewTotals,
    pub sources: SourceTotals,
    pub recent_activity: Vec<Bucket<String>>,
    pub knowledge_base: KnowledgeStats,
}

fn fallback_rate(ai_calls: u64, kb_hits: u64) -> f64 {
    let answered = ai_calls + kb_hits;
    if answered == 0 {
        return 0.0;
    }
    let rate = ai_calls as f64 / answered as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

pub fn overview(
    conversations: &[Conversation],
    knowledge: &KnowledgeBase,
    now: DateTime<Utc>,
) -> Overview {
    let messages = conversations.iter().flat_map(|c| &c.messages);
    let mut totals = OverviewTotals {
        total_conversations: conversations.len() as u64,
        total_messages: 0,
        user_messages: 0,
        assistant_messages: 0,
    };
    for message in messages {
        totals.total_messages += 1;
        match message.role {
            Role::User => totals.user_messages += 1,
            Role::Assistant => totals.assistant_messages += 1,
            Role::System => {}
        }
    }

    let ai_calls = conversations.iter().map(|c| c.counters.ai_calls_count).sum();
    let kb_hits = conversations.iter().map(|c| c.counters.kb_hits_count).sum();

    Overview {
        overview: totals,
        sources: SourceTotals {
            ai_calls,
            kb_hits,
            ai_fallback_rate: fallback_rate(ai_calls, kb_hits),
        },
        recent_activity: recent_activity(conversations, now),
        knowledge_base: knowledge.stats(),
    }
}

/// Conversations created within the last week, per UTC day, oldest first.
pub fn recent_activity(conversations: &[Conversation], now: DateTime<Utc>) -> Vec<Bucket<String>> {
    let since = now - Duration::days(RECENT_ACTIVITY_DAYS);
    let mut per_day: BTreeMap<String, u64> = BTreeMap::new();
    for conversation in conversations.iter().filter(|c| c.created_at >= since) {
        *per_day
            .entry(conversation.created_at.format("%Y-%m-%d").to_string())
            .or_default() += 1;
    }
    into_buckets(per_day)
}

/// Message counts by role.
pub fn message_stats(conversations: &[Conversation]) -> Vec<Bucket<String>> {
    let mut per_role: BTreeMap<String, u64> = BTreeMap::new();
    for message in conversations.iter().flat_map(|c| &c.messages) {
        *per_role.entry(message.role.to_string()).or_default() += 1;
    }
    into_buckets(per_role)
}

/// Assistant message counts by source tag.
pub fn source_stats(conversations: &[Conversation]) -> Vec<Bucket<String>> {
    let mut per_source: BTreeMap<String, u64> = BTreeMap::new();
    for message in conversations
        .iter()
        .flat_map(|c| &c.messages)
        .filter(|m| m.role == Role::Assistant)
    {
        *per_source.entry(message.source.to_string()).or_default() += 1;
    }
    into_buckets(per_source)
}

/// Most frequent user messages, compared lowercase. Ties break on text.
pub fn top_queries(conversations: &[Conversation], limit: usize) -> Vec<Bucket<String>> {
    let limit = limit.clamp(1, MAX_TOP_QUERIES);
    let mut counts: HashMap<String, u64> = HashMap::new();
    for message in conversations
        .iter()
        .flat_map(|c| &c.messages)
        .filter(|m| m.role == Role::User)
    {
        *counts.entry(message.content.to_lowercase()).or_default() += 1;
    }

    let mut ranked: Vec<Bucket<String>> = counts
        .into_iter()
        .map(|(key, count)| Bucket { key, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked.truncate(limit);
    ranked
}

/// Message counts by UTC hour of day, ascending.
pub fn hourly_activity(conversations: &[Conversation]) -> Vec<Bucket<u32>> {
    let mut per_hour: BTreeMap<u32, u64> = BTreeMap::new();
    for message in conversations.iter().flat_map(|c| &c.messages) {
        *per_hour.entry(message.timestamp.hour()).or_default() += 1;
    }
    into_buckets(per_hour)
}

fn into_buckets<K>(counts: BTreeMap<K, u64>) -> Vec<Bucket<K>> {
    counts
        .into_iter()
        .map(|(key, count)| Bucket { key, count })
        .collect()
}
