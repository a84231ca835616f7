//! Selection options turned into statements for [`crate::store::Log::query_messages`].

use std::collections::HashSet;

use crate::descriptor::Descriptor;
use crate::qualified_time::{Qualifier, QualifiedTimeRange};
use crate::sql::SqlStatement;

/// Decides which messages a query retrieves.
///
/// Generated statements must be *resumable* so a [`crate::batch::Batch`] can
/// fetch them in chunks: they select the five standard columns
/// (`messages.id, messages.time_recv, topics.name, message_types.name,
/// messages.message`), lead with three keyset-cursor placeholders
/// `(time, time, id)` ahead of their own parameters, and trail with a
/// `LIMIT` placeholder. Use [`standard_message_query`] to build a
/// conforming statement.
pub trait QueryOptions {
    fn generate_statements(&self, descriptor: &Descriptor) -> Vec<SqlStatement>;
}

/// Builds a resumable message query over an optional topic-id selection and
/// a time range.
pub fn standard_message_query(
    topic_ids: Option<&[i64]>,
    range: &QualifiedTimeRange,
) -> SqlStatement {
    let mut statement = SqlStatement::new(
        "SELECT messages.id, messages.time_recv, topics.name, \
         message_types.name, messages.message FROM messages \
         JOIN topics ON topics.id = messages.topic_id \
         JOIN message_types ON message_types.id = topics.message_type_id \
         WHERE (messages.time_recv > ? OR \
         (messages.time_recv = ? AND messages.id > ?))",
    );

    if let Some(ids) = topic_ids {
        statement.append_text(" AND topics.id IN (?");
        for _ in 1..ids.len() {
            statement.append_text(", ?");
        }
        statement.append_text(")");
        for id in ids {
            statement.push_parameter(*id);
        }
    }

    if let Some(begin) = range.beginning().time() {
        match range.beginning().qualifier() {
            Some(Qualifier::Exclusive) => statement.append_text(" AND messages.time_recv > ?"),
            _ => statement.append_text(" AND messages.time_recv >= ?"),
        }
        statement.push_parameter(begin);
    }

    if let Some(end) = range.ending().time() {
        match range.ending().qualifier() {
            Some(Qualifier::Exclusive) => statement.append_text(" AND messages.time_recv < ?"),
            _ => statement.append_text(" AND messages.time_recv <= ?"),
        }
        statement.push_parameter(end);
    }

    statement.append_text(" ORDER BY messages.time_recv, messages.id LIMIT ?;");
    statement
}

/// Selects every message belonging to an explicit set of topic names.
#[derive(Debug, Clone, Default)]
pub struct TopicList {
    topics: HashSet<String>,
    range: QualifiedTimeRange,
}

impl TopicList {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scoped(topics, QualifiedTimeRange::all_time())
    }

    pub fn scoped<I, S>(topics: I, range: QualifiedTimeRange) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            range,
        }
    }

    pub fn topics(&self) -> &HashSet<String> {
        &self.topics
    }
}

impl QueryOptions for TopicList {
    fn generate_statements(&self, descriptor: &Descriptor) -> Vec<SqlStatement> {
        let mut topic_ids = Vec::new();
        for topic in &self.topics {
            if let Some(types) = descriptor.msg_types_of_topic(topic) {
                topic_ids.extend(types.values().copied());
            }
        }
        if topic_ids.is_empty() {
            return Vec::new();
        }
        topic_ids.sort_unstable();
        vec![standard_message_query(Some(&topic_ids), &self.range)]
    }
}

/// Selects every message in the log, optionally bounded in time.
#[derive(Debug, Clone, Default)]
pub struct AllTopics {
    range: QualifiedTimeRange,
}

impl AllTopics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scoped(range: QualifiedTimeRange) -> Self {
        Self { range }
    }
}

impl QueryOptions for AllTopics {
    fn generate_statements(&self, _descriptor: &Descriptor) -> Vec<SqlStatement> {
        vec![standard_message_query(None, &self.range)]
    }
}
