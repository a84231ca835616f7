//! Mutable topic selection with a default-to-all rule.

use std::collections::HashSet;

use log::warn;
use regex::Regex;

use crate::descriptor::Descriptor;

/// Recompiles `pattern` so it only matches entire topic names.
///
/// Wrapping a valid pattern in a non-capturing group cannot make it
/// invalid, so the recompilation is infallible.
pub(crate) fn anchored(pattern: &Regex) -> Regex {
    Regex::new(&format!("^(?:{})$", pattern.as_str())).expect("anchored pattern is valid")
}

/// A set of selected topic names.
///
/// Until the first add, the selection is implicitly "every topic in the
/// catalog". The first add narrows it to exactly what was added; a remove
/// on the implicit state first materializes the full catalog so that
/// "remove X" means "everything except X".
#[derive(Debug, Clone, Default)]
pub struct TopicSelection {
    topics: HashSet<String>,
    explicit: bool,
}

impl TopicSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an add has switched the selection to explicit mode.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Switches to explicit mode without adding anything.
    pub(crate) fn set_explicit(&mut self) {
        self.explicit = true;
    }

    /// Adds one topic by name. Unknown names warn and return `false`, but
    /// still switch the selection to explicit mode.
    pub fn add(&mut self, descriptor: &Descriptor, topic: &str) -> bool {
        self.explicit = true;
        if descriptor.msg_types_of_topic(topic).is_none() {
            warn!("topic [{topic}] is not in the log");
            return false;
        }
        self.topics.insert(topic.to_owned());
        true
    }

    /// Adds every catalog topic whose full name matches. Returns the match
    /// count.
    pub fn add_matching(&mut self, descriptor: &Descriptor, pattern: &Regex) -> usize {
        self.explicit = true;
        let pattern = anchored(pattern);
        let mut matches = 0;
        for topic in descriptor.topics_to_msg_types().keys() {
            if pattern.is_match(topic) {
                self.topics.insert(topic.clone());
                matches += 1;
            }
        }
        matches
    }

    /// Removes one topic by name. Returns whether anything was removed.
    pub fn remove(&mut self, descriptor: &Descriptor, topic: &str) -> bool {
        self.materialize(descriptor);
        self.topics.remove(topic)
    }

    /// Removes every selected topic whose full name matches. Returns the
    /// removal count.
    pub fn remove_matching(&mut self, descriptor: &Descriptor, pattern: &Regex) -> usize {
        self.materialize(descriptor);
        let pattern = anchored(pattern);
        let before = self.topics.len();
        self.topics.retain(|topic| !pattern.is_match(topic));
        before - self.topics.len()
    }

    /// The effective selection: the whole catalog while implicit, the
    /// explicit set otherwise.
    pub fn snapshot(&self, descriptor: &Descriptor) -> HashSet<String> {
        if self.explicit {
            self.topics.clone()
        } else {
            descriptor.topics_to_msg_types().keys().cloned().collect()
        }
    }

    fn materialize(&mut self, descriptor: &Descriptor) {
        if !self.explicit {
            self.topics
                .extend(descriptor.topics_to_msg_types().keys().cloned());
            self.explicit = true;
        }
    }
}
