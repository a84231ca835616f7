//! Timed re-emission of a recorded log onto the live bus.
//!
//! [`Playback`] owns an opened log and a topic selection. [`Playback::start`]
//! freezes the selection into a snapshot and hands it to a
//! [`PlaybackHandle`], which advertises one publisher per `(topic, type)`
//! pair, queries the log for an ordered batch, and pumps the batch from a
//! worker thread with the original inter-arrival spacing. The handle stops
//! cooperatively: a flag plus a condition broadcast interrupts the timed
//! wait between messages, and dropping the handle stops and joins the
//! worker.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use regex::Regex;

use crate::batch::Batch;
use crate::bus::{Node, NodeOptions, Publisher};
use crate::error::{Error, Result};
use crate::query::TopicList;
use crate::selector::TopicSelection;
use crate::store::{Log, OpenMode};

/// Factory for replay sessions over one opened log.
pub struct Playback {
    log: Log,
    selection: TopicSelection,
    node_options: NodeOptions,
    /// Only consulted when the store is single-threaded, to enforce one
    /// live handle at a time.
    last_handle: Mutex<Weak<PlaybackHandle>>,
    store_threadsafe: bool,
}

impl Playback {
    /// Opens `file` read-only. An unreadable file leaves the factory inert
    /// (`valid() == false`); every later operation then fails with
    /// [`Error::LogInvalid`].
    pub fn new(file: &str, options: NodeOptions) -> Self {
        let log = Log::new();
        match log.open(file, OpenMode::ReadOnly) {
            Ok(()) => debug!("playback opened file [{file}]"),
            Err(err) => error!("could not open file [{file}]: {err}"),
        }
        Self::from_log(log, options)
    }

    /// Adopts an already-opened log, e.g. an in-memory store that was just
    /// recorded into.
    pub fn from_log(log: Log, options: NodeOptions) -> Self {
        Self {
            log,
            selection: TopicSelection::new(),
            node_options: options,
            last_handle: Mutex::new(Weak::new()),
            store_threadsafe: Log::threadsafe(),
        }
    }

    pub fn valid(&self) -> bool {
        self.log.valid()
    }

    /// Selects one topic by name. Returns whether the topic exists in the
    /// log; either way the selection switches to explicit mode.
    pub fn add_topic(&mut self, topic: &str) -> Result<bool> {
        // The caller has expressed the intent to pick topics explicitly,
        // whether or not the call succeeds.
        self.selection.set_explicit();
        let descriptor = self.log.descriptor()?;
        Ok(self.selection.add(&descriptor, topic))
    }

    /// Selects every logged topic whose full name matches the pattern.
    /// Returns the match count.
    pub fn add_topics_matching(&mut self, pattern: &Regex) -> Result<usize> {
        self.selection.set_explicit();
        let descriptor = self.log.descriptor()?;
        Ok(self.selection.add_matching(&descriptor, pattern))
    }

    /// Deselects one topic. On an untouched selection this first
    /// materializes "all topics", so the result is everything except
    /// `topic`.
    pub fn remove_topic(&mut self, topic: &str) -> Result<bool> {
        let descriptor = self.log.descriptor()?;
        Ok(self.selection.remove(&descriptor, topic))
    }

    /// Deselects every topic whose full name matches. Returns the removal
    /// count.
    pub fn remove_topics_matching(&mut self, pattern: &Regex) -> Result<usize> {
        let descriptor = self.log.descriptor()?;
        Ok(self.selection.remove_matching(&descriptor, pattern))
    }

    /// Starts a replay session over a frozen snapshot of the current
    /// selection. Later selector edits do not affect the returned handle.
    ///
    /// `wait_after_advertising` is slept between advertising the publishers
    /// and the first emission, giving subscribers time to discover them.
    pub fn start(&self, wait_after_advertising: Duration) -> Result<Arc<PlaybackHandle>> {
        if !self.log.valid() {
            error!("could not start: failed to open log file");
            return Err(Error::LogInvalid);
        }

        if !self.store_threadsafe {
            let last = self
                .last_handle
                .lock()
                .expect("last handle lock poisoned")
                .upgrade();
            if let Some(last) = last {
                if !last.finished() {
                    warn!(
                        "the store is single-threaded; only one playback handle \
                         may run at a time"
                    );
                    return Err(Error::AlreadyPlaying);
                }
            }
        }

        let descriptor = self.log.descriptor()?;
        if !self.selection.is_explicit() {
            debug!("no topics added, defaulting to all topics");
        }
        let topics = self.selection.snapshot(&descriptor);

        let handle = Arc::new(PlaybackHandle::new(
            self.log.clone(),
            topics,
            wait_after_advertising,
            &self.node_options,
        )?);

        if !self.store_threadsafe {
            *self
                .last_handle
                .lock()
                .expect("last handle lock poisoned") = Arc::downgrade(&handle);
        }
        Ok(handle)
    }
}

struct HandleShared {
    // Publishers are declared before the node so they drop first.
    publishers: HashMap<String, HashMap<String, Publisher>>,
    _node: Node,
    stop: AtomicBool,
    finished: AtomicBool,
    wait_lock: Mutex<()>,
    wait_cv: Condvar,
    stop_lock: Mutex<()>,
    stop_cv: Condvar,
}

/// A running replay session.
///
/// The worker emits messages in non-decreasing `time_received` order with
/// deadlines computed against the first message on a monotonic clock, so
/// per-message processing latency does not accumulate.
pub struct PlaybackHandle {
    log: Log,
    shared: Arc<HandleShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackHandle {
    fn new(
        log: Log,
        topics: HashSet<String>,
        wait_after_advertising: Duration,
        options: &NodeOptions,
    ) -> Result<Self> {
        let node = Node::new(options);
        let descriptor = log.descriptor()?;

        let mut publishers: HashMap<String, HashMap<String, Publisher>> = HashMap::new();
        for topic in &topics {
            let Some(types) = descriptor.msg_types_of_topic(topic) else {
                continue;
            };
            for msg_type in types.keys() {
                debug!("playing back [{topic}] [{msg_type}]");
                match node.advertise(topic, msg_type) {
                    Ok(publisher) => {
                        publishers
                            .entry(topic.clone())
                            .or_default()
                            .insert(msg_type.clone(), publisher);
                    }
                    Err(err) => warn!("failed to advertise [{topic}] [{msg_type}]: {err}"),
                }
            }
        }

        thread::sleep(wait_after_advertising);

        let mut batch = log.query_messages(&TopicList::new(topics));
        match batch.is_empty() {
            Ok(true) => warn!("there are no messages to play"),
            Ok(false) => {}
            Err(err) => error!("failed to read from log file: {err}"),
        }

        let shared = Arc::new(HandleShared {
            publishers,
            _node: node,
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            wait_lock: Mutex::new(()),
            wait_cv: Condvar::new(),
            stop_lock: Mutex::new(()),
            stop_cv: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || run_playback(worker_shared, batch));

        Ok(Self {
            log,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Requests a cooperative stop and joins the worker. Idempotent and safe
    /// from any thread; after this returns, [`Self::finished`] is `true`.
    pub fn stop(&self) {
        if !self.log.valid() {
            return;
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        // Taking the lock orders the flag ahead of any wait-or-not decision
        // in the worker, so the broadcast cannot be lost.
        drop(self.shared.stop_lock.lock().expect("stop lock poisoned"));
        self.shared.stop_cv.notify_all();

        let mut worker = self.worker.lock().expect("worker handle lock poisoned");
        if let Some(worker) = worker.take() {
            if worker.join().is_err() {
                error!("playback worker panicked");
            }
        }
    }

    /// Blocks until the worker has exited. Safe to call from several
    /// threads at once.
    pub fn wait_until_finished(&self) {
        if self.log.valid() && !self.shared.stop.load(Ordering::SeqCst) {
            let mut guard = self.shared.wait_lock.lock().expect("wait lock poisoned");
            while !self.shared.finished.load(Ordering::SeqCst) {
                guard = self.shared.wait_cv.wait(guard).expect("wait lock poisoned");
            }
        }
    }

    /// Whether the worker has exited. Non-blocking.
    pub fn finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_playback(shared: Arc<HandleShared>, mut batch: Batch) {
    let start_time = Instant::now();
    let mut first_msg_time: Option<i64> = None;

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        let message = match batch.next_message() {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(err) => {
                error!("failed to read message from log file: {err}");
                break;
            }
        };

        match first_msg_time {
            // The first message goes out right away; all others are held
            // until their offset from the first has elapsed on the replay
            // clock.
            None => first_msg_time = Some(message.time_received),
            Some(first) => {
                let target =
                    Duration::from_nanos(message.time_received.saturating_sub(first).max(0) as u64);
                let now = start_time.elapsed();
                if target > now {
                    let guard = shared.stop_lock.lock().expect("stop lock poisoned");
                    // The predicate guards against spurious wakeups: keep
                    // waiting until the deadline passes or a stop arrives.
                    let _ = shared
                        .stop_cv
                        .wait_timeout_while(guard, target - now, |_| {
                            start_time.elapsed() < target
                                && !shared.stop.load(Ordering::SeqCst)
                        })
                        .expect("stop lock poisoned");
                }
                if shared.stop.load(Ordering::SeqCst) {
                    break;
                }
            }
        }

        debug!("publishing [{}] [{}]", message.topic, message.msg_type);
        match shared
            .publishers
            .get(&message.topic)
            .and_then(|types| types.get(&message.msg_type))
        {
            Some(publisher) => {
                if let Err(err) = publisher.publish_raw(&message.data, &message.msg_type) {
                    warn!("failed to publish on [{}]: {err}", message.topic);
                }
            }
            None => warn!(
                "no publisher for [{}] [{}]",
                message.topic, message.msg_type
            ),
        }
    }

    {
        let _guard = shared.wait_lock.lock().expect("wait lock poisoned");
        shared.finished.store(true, Ordering::SeqCst);
        shared.stop.store(true, Ordering::SeqCst);
    }
    shared.wait_cv.notify_all();
}
