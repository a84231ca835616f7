//! Lazy, ordered, single-pass message sequences yielded by log queries.

use std::collections::VecDeque;

use crate::error::Result;
use crate::sql::SqlStatement;
use crate::store::Log;

/// Rows fetched from the store per round trip.
const CHUNK_ROWS: usize = 256;

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub msg_type: String,
    /// Nanoseconds at which the message was originally received.
    pub time_received: i64,
    pub data: Vec<u8>,
}

/// A forward-only sequence of messages in non-decreasing `time_received`
/// order, with ties broken by insertion order.
///
/// The batch retains a handle to the store and fetches rows in chunks,
/// resuming each statement from a `(time_received, row id)` cursor. It can
/// be iterated at most once.
pub struct Batch {
    log: Option<Log>,
    statements: VecDeque<SqlStatement>,
    current: Option<SqlStatement>,
    cursor: (i64, i64),
    buffered: VecDeque<Message>,
}

impl Batch {
    pub(crate) fn new(log: Log, statements: Vec<SqlStatement>) -> Self {
        Self {
            log: Some(log),
            statements: statements.into(),
            current: None,
            cursor: (i64::MIN, 0),
            buffered: VecDeque::new(),
        }
    }

    /// A batch that yields nothing.
    pub(crate) fn empty() -> Self {
        Self {
            log: None,
            statements: VecDeque::new(),
            current: None,
            cursor: (i64::MIN, 0),
            buffered: VecDeque::new(),
        }
    }

    /// The next message, or `None` once the batch is exhausted.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Ok(Some(message));
            }

            if self.current.is_none() {
                match self.statements.pop_front() {
                    Some(statement) => {
                        self.current = Some(statement);
                        self.cursor = (i64::MIN, 0);
                    }
                    None => return Ok(None),
                }
            }

            let Some(log) = self.log.clone() else {
                return Ok(None);
            };
            let statement = self
                .current
                .as_ref()
                .expect("current statement was just installed");
            let rows = log.fetch_chunk(statement, self.cursor, CHUNK_ROWS)?;
            match rows.last() {
                Some((id, message)) => self.cursor = (message.time_received, *id),
                None => {
                    self.current = None;
                    continue;
                }
            }
            self.buffered
                .extend(rows.into_iter().map(|(_, message)| message));
        }
    }

    /// Whether the batch has nothing left to yield. Buffers one chunk ahead;
    /// messages seen here are still returned by [`Self::next_message`].
    pub fn is_empty(&mut self) -> Result<bool> {
        if !self.buffered.is_empty() {
            return Ok(false);
        }
        match self.next_message()? {
            Some(message) => {
                self.buffered.push_front(message);
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

impl Iterator for Batch {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}
