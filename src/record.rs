//! Capture of live bus traffic into a message log.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use regex::Regex;

use crate::bus::{Node, NodeOptions, RawMessage};
use crate::error::{Error, Result};
use crate::selector::anchored;
use crate::store::{Log, OpenMode};

struct RecorderShared {
    log: Log,
    /// Wall clock at construction; receive stamps are this anchor plus the
    /// monotonic time elapsed since, so they never run backwards.
    anchor_wall_ns: i64,
    anchor: Instant,
}

impl RecorderShared {
    fn on_message(&self, message: &RawMessage) {
        let time_ns = self.anchor_wall_ns + self.anchor.elapsed().as_nanos() as i64;
        debug!("rx [{}] [{}]", message.topic, message.msg_type);
        match self
            .log
            .insert_message(time_ns, &message.topic, &message.msg_type, &message.data)
        {
            Ok(()) => {}
            // Subscriptions outlive recording sessions; messages that
            // arrive while no log is open are dropped.
            Err(Error::LogInvalid) => {}
            Err(err) => warn!("failed to insert message into log file: {err}"),
        }
    }
}

/// Subscribes to topics and appends everything received to a log file.
///
/// Subscriptions persist across [`Recorder::stop`]; a later
/// [`Recorder::start`] resumes recording the same topics into a new (or the
/// same) file.
pub struct Recorder {
    shared: Arc<RecorderShared>,
    node: Node,
}

impl Recorder {
    pub fn new(options: NodeOptions) -> Self {
        let anchor_wall_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_nanos() as i64;
        Self {
            shared: Arc::new(RecorderShared {
                log: Log::new(),
                anchor_wall_ns,
                anchor: Instant::now(),
            }),
            node: Node::new(&options),
        }
    }

    /// Begins recording into `file` (created if missing; `:memory:` is
    /// accepted). Fails with [`Error::AlreadyRecording`] while a session is
    /// in progress.
    pub fn start(&self, file: &str) -> Result<()> {
        match self.shared.log.open(file, OpenMode::ReadWriteCreate) {
            Ok(()) => {
                info!("started recording to [{file}]");
                Ok(())
            }
            Err(Error::AlreadyOpen) => {
                warn!("recording is already in progress");
                Err(Error::AlreadyRecording)
            }
            Err(err) => {
                error!("failed to open or create file [{file}]: {err}");
                Err(err)
            }
        }
    }

    /// Ends the recording session, committing and closing the log file.
    pub fn stop(&self) {
        self.shared.log.close();
    }

    /// Subscribes to one topic, whether or not it is currently advertised.
    pub fn add_topic(&self, topic: &str) -> Result<()> {
        debug!("recording [{topic}]");
        let shared = Arc::clone(&self.shared);
        self.node
            .subscribe_raw(topic, move |message| shared.on_message(message))
            .map_err(|err| {
                error!("failed to subscribe to [{topic}]: {err}");
                Error::FailedToSubscribe(topic.to_owned())
            })
    }

    /// Subscribes to every currently advertised topic whose full name
    /// matches the pattern. Returns the number of subscriptions made.
    pub fn add_topics_matching(&self, pattern: &Regex) -> Result<usize> {
        let pattern = anchored(pattern);
        let mut subscriptions = 0;
        for topic in self.node.topic_list() {
            if !pattern.is_match(&topic) {
                debug!("not recording [{topic}]");
                continue;
            }
            self.add_topic(&topic)?;
            subscriptions += 1;
        }
        Ok(subscriptions)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}
