//! The log's immutable catalog of known topics and their message types.

use std::collections::HashMap;

/// Maps `topic name -> { message type name -> topics-table id }`.
///
/// Built by the store from the `topics` and `message_types` tables, and
/// rebuilt whenever an insert introduces a new pairing.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    topics_to_msg_types: HashMap<String, HashMap<String, i64>>,
}

impl Descriptor {
    pub(crate) fn from_rows(rows: impl IntoIterator<Item = (i64, String, String)>) -> Self {
        let mut topics_to_msg_types: HashMap<String, HashMap<String, i64>> = HashMap::new();
        for (id, topic, msg_type) in rows {
            topics_to_msg_types
                .entry(topic)
                .or_default()
                .insert(msg_type, id);
        }
        Self {
            topics_to_msg_types,
        }
    }

    /// The full catalog.
    pub fn topics_to_msg_types(&self) -> &HashMap<String, HashMap<String, i64>> {
        &self.topics_to_msg_types
    }

    /// The message types recorded under a topic, if the topic is known.
    pub fn msg_types_of_topic(&self, topic: &str) -> Option<&HashMap<String, i64>> {
        self.topics_to_msg_types.get(topic)
    }

    /// The id of a `(topic, type)` pairing, if recorded.
    pub fn topic_id(&self, topic: &str, msg_type: &str) -> Option<i64> {
        self.topics_to_msg_types
            .get(topic)
            .and_then(|types| types.get(msg_type))
            .copied()
    }
}
