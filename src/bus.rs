//! In-process broadcast transport.
//!
//! Nodes are grouped into named partitions; a publisher's messages reach
//! every subscriber of the same topic within the partition. Delivery is
//! fire-and-forget: subscribers receive whatever is published while they
//! are registered, and a failed or missing subscriber never blocks the
//! publishing side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver};
use lazy_static::lazy_static;
use log::debug;

use crate::error::{Error, Result};

/// Transport configuration for a [`Node`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOptions {
    /// Nodes only discover peers in the same partition. The default
    /// partition is the empty string.
    pub partition: String,
}

impl NodeOptions {
    pub fn with_partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
        }
    }
}

/// A message as it travels over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub msg_type: String,
    pub data: Vec<u8>,
}

type Handler = Arc<dyn Fn(&RawMessage) + Send + Sync>;

struct Subscription {
    node_id: u64,
    handler: Handler,
}

struct Advertisement {
    publisher_id: u64,
    msg_type: String,
}

#[derive(Default)]
struct TopicEndpoints {
    advertisements: Vec<Advertisement>,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
struct Partition {
    topics: HashMap<String, TopicEndpoints>,
}

lazy_static! {
    static ref BUS: Mutex<HashMap<String, Partition>> = Mutex::new(HashMap::new());
}

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Whether a topic name is acceptable to the transport: `/`-rooted, no
/// empty segments, no whitespace.
pub fn valid_topic(topic: &str) -> bool {
    if topic.len() < 2 || !topic.starts_with('/') {
        return false;
    }
    if topic.chars().any(char::is_whitespace) {
        return false;
    }
    topic[1..].split('/').all(|segment| !segment.is_empty())
}

/// An endpoint on the bus that can advertise publishers and subscribe to
/// topics within its partition.
pub struct Node {
    id: u64,
    options: NodeOptions,
}

impl Node {
    pub fn new(options: &NodeOptions) -> Self {
        Self {
            id: NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed),
            options: options.clone(),
        }
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    /// Advertises a publisher for `(topic, msg_type)`. A topic may carry
    /// several distinct message types, each with its own publisher.
    pub fn advertise(&self, topic: &str, msg_type: &str) -> Result<Publisher> {
        if !valid_topic(topic) {
            return Err(Error::InvalidTopic(topic.to_owned()));
        }
        let publisher_id = NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed);
        let mut bus = BUS.lock().expect("bus registry lock poisoned");
        bus.entry(self.options.partition.clone())
            .or_default()
            .topics
            .entry(topic.to_owned())
            .or_default()
            .advertisements
            .push(Advertisement {
                publisher_id,
                msg_type: msg_type.to_owned(),
            });
        debug!("advertised [{topic}] [{msg_type}]");
        Ok(Publisher {
            id: publisher_id,
            partition: self.options.partition.clone(),
            topic: topic.to_owned(),
            msg_type: msg_type.to_owned(),
        })
    }

    /// Subscribes with an inline callback, invoked on the publisher's
    /// thread for every message on `topic`.
    pub fn subscribe_raw(
        &self,
        topic: &str,
        handler: impl Fn(&RawMessage) + Send + Sync + 'static,
    ) -> Result<()> {
        if !valid_topic(topic) {
            return Err(Error::InvalidTopic(topic.to_owned()));
        }
        let mut bus = BUS.lock().expect("bus registry lock poisoned");
        bus.entry(self.options.partition.clone())
            .or_default()
            .topics
            .entry(topic.to_owned())
            .or_default()
            .subscriptions
            .push(Subscription {
                node_id: self.id,
                handler: Arc::new(handler),
            });
        debug!("subscribed to [{topic}]");
        Ok(())
    }

    /// Subscribes and returns a channel of incoming messages.
    pub fn subscribe(&self, topic: &str) -> Result<Receiver<RawMessage>> {
        let (tx, rx) = unbounded();
        self.subscribe_raw(topic, move |message: &RawMessage| {
            let _ = tx.send(message.clone());
        })?;
        Ok(rx)
    }

    /// The topics currently advertised in this node's partition.
    pub fn topic_list(&self) -> Vec<String> {
        let bus = BUS.lock().expect("bus registry lock poisoned");
        let mut topics: Vec<String> = bus
            .get(&self.options.partition)
            .map(|partition| {
                partition
                    .topics
                    .iter()
                    .filter(|(_, endpoints)| !endpoints.advertisements.is_empty())
                    .map(|(topic, _)| topic.clone())
                    .collect()
            })
            .unwrap_or_default();
        topics.sort();
        topics
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut bus = BUS.lock().expect("bus registry lock poisoned");
        if let Some(partition) = bus.get_mut(&self.options.partition) {
            for endpoints in partition.topics.values_mut() {
                endpoints
                    .subscriptions
                    .retain(|subscription| subscription.node_id != self.id);
            }
        }
    }
}

/// A handle for emitting raw payloads on one advertised `(topic, type)`.
pub struct Publisher {
    id: u64,
    partition: String,
    topic: String,
    msg_type: String,
}

impl Publisher {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Hands `data` to every current subscriber of the topic. Non-blocking;
    /// delivery is best-effort.
    pub fn publish_raw(&self, data: &[u8], msg_type: &str) -> Result<()> {
        let handlers: Vec<Handler> = {
            let bus = BUS.lock().expect("bus registry lock poisoned");
            bus.get(&self.partition)
                .and_then(|partition| partition.topics.get(&self.topic))
                .map(|endpoints| {
                    endpoints
                        .subscriptions
                        .iter()
                        .map(|subscription| Arc::clone(&subscription.handler))
                        .collect()
                })
                .unwrap_or_default()
        };

        let message = RawMessage {
            topic: self.topic.clone(),
            msg_type: msg_type.to_owned(),
            data: data.to_vec(),
        };
        // Handlers run outside the registry lock so they may freely use the
        // bus themselves.
        for handler in handlers {
            handler(&message);
        }
        Ok(())
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        let mut bus = BUS.lock().expect("bus registry lock poisoned");
        if let Some(partition) = bus.get_mut(&self.partition) {
            if let Some(endpoints) = partition.topics.get_mut(&self.topic) {
                endpoints
                    .advertisements
                    .retain(|advertisement| advertisement.publisher_id != self.id);
            }
        }
    }
}
