//! Optionally-indeterminate instants and the ranges built from them.
//!
//! A [`QualifiedTime`] either names an instant (signed nanoseconds from an
//! unspecified epoch) with a [`Qualifier`], or it is *indeterminate*. An
//! indeterminate endpoint in a [`QualifiedTimeRange`] means "unbounded on
//! that side", which is how queries express "from the start of the log" or
//! "until the end of the log".

/// Endpoint semantics for a determined instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qualifier {
    /// The instant itself is part of the selection.
    #[default]
    Inclusive,
    /// The selection begins or ends strictly beyond the instant.
    Exclusive,
}

/// An instant that may be indeterminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualifiedTime {
    state: Option<(i64, Qualifier)>,
}

impl QualifiedTime {
    /// An indeterminate time.
    pub fn indeterminate() -> Self {
        Self::default()
    }

    /// A determined time with the default [`Qualifier::Inclusive`].
    pub fn new(time_ns: i64) -> Self {
        Self::with_qualifier(time_ns, Qualifier::Inclusive)
    }

    pub fn with_qualifier(time_ns: i64, qualifier: Qualifier) -> Self {
        Self {
            state: Some((time_ns, qualifier)),
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.state.is_none()
    }

    /// The instant in nanoseconds, unless indeterminate.
    pub fn time(&self) -> Option<i64> {
        self.state.map(|(time_ns, _)| time_ns)
    }

    /// The qualifier, unless indeterminate.
    pub fn qualifier(&self) -> Option<Qualifier> {
        self.state.map(|(_, qualifier)| qualifier)
    }

    pub fn set_time(&mut self, time_ns: i64, qualifier: Qualifier) {
        self.state = Some((time_ns, qualifier));
    }

    /// Return to the indeterminate state.
    pub fn clear(&mut self) {
        self.state = None;
    }
}

/// A pair of qualified times bounding a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualifiedTimeRange {
    beginning: QualifiedTime,
    ending: QualifiedTime,
}

impl QualifiedTimeRange {
    pub fn new(beginning: QualifiedTime, ending: QualifiedTime) -> Self {
        Self { beginning, ending }
    }

    /// A range with no beginning and no end.
    pub fn all_time() -> Self {
        Self::default()
    }

    /// A range that begins at `beginning` and never ends.
    pub fn since(beginning: QualifiedTime) -> Self {
        Self::new(beginning, QualifiedTime::indeterminate())
    }

    /// A range that ends at `ending` and has no beginning.
    pub fn until(ending: QualifiedTime) -> Self {
        Self::new(QualifiedTime::indeterminate(), ending)
    }

    pub fn beginning(&self) -> &QualifiedTime {
        &self.beginning
    }

    pub fn ending(&self) -> &QualifiedTime {
        &self.ending
    }

    /// Replace the beginning. Returns whether the range is still valid; the
    /// new endpoint is kept either way.
    pub fn set_beginning(&mut self, beginning: QualifiedTime) -> bool {
        self.beginning = beginning;
        self.valid()
    }

    /// Replace the ending. Returns whether the range is still valid; the new
    /// endpoint is kept either way.
    pub fn set_ending(&mut self, ending: QualifiedTime) -> bool {
        self.ending = ending;
        self.valid()
    }

    pub fn set_range(&mut self, beginning: QualifiedTime, ending: QualifiedTime) -> bool {
        self.beginning = beginning;
        self.ending = ending;
        self.valid()
    }

    /// A range is valid when either endpoint is indeterminate, or the
    /// beginning does not come after the ending.
    pub fn valid(&self) -> bool {
        match (self.beginning.time(), self.ending.time()) {
            (Some(begin), Some(end)) => begin <= end,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_indeterminate() {
        let qt = QualifiedTime::default();
        assert!(qt.is_indeterminate());
        assert_eq!(qt.time(), None);
        assert_eq!(qt.qualifier(), None);
    }

    #[test]
    fn time_only_constructor_defaults_inclusive() {
        let qt = QualifiedTime::new(24_000);
        assert!(!qt.is_indeterminate());
        assert_eq!(qt.time(), Some(24_000));
        assert_eq!(qt.qualifier(), Some(Qualifier::Inclusive));
    }

    #[test]
    fn equality() {
        let qt1 = QualifiedTime::with_qualifier(24, Qualifier::Exclusive);
        let qt2 = QualifiedTime::with_qualifier(24, Qualifier::Exclusive);
        let qt3 = QualifiedTime::with_qualifier(48, Qualifier::Exclusive);
        let qt4 = QualifiedTime::with_qualifier(24, Qualifier::Inclusive);
        let qt5 = QualifiedTime::indeterminate();

        assert_eq!(qt1, qt2);
        assert_ne!(qt1, qt3);
        assert_ne!(qt1, qt4);
        assert_ne!(qt1, qt5);
        assert_eq!(qt5, QualifiedTime::default());
    }

    #[test]
    fn set_and_clear() {
        let mut qt = QualifiedTime::indeterminate();
        qt.set_time(100, Qualifier::Exclusive);
        assert_eq!(qt.time(), Some(100));
        assert_eq!(qt.qualifier(), Some(Qualifier::Exclusive));
        qt.clear();
        assert!(qt.is_indeterminate());
    }

    #[test]
    fn range_validity() {
        assert!(QualifiedTimeRange::all_time().valid());
        assert!(QualifiedTimeRange::since(QualifiedTime::new(500)).valid());
        assert!(QualifiedTimeRange::until(QualifiedTime::new(500)).valid());

        let forward =
            QualifiedTimeRange::new(QualifiedTime::new(100), QualifiedTime::new(200));
        assert!(forward.valid());

        let equal = QualifiedTimeRange::new(QualifiedTime::new(100), QualifiedTime::new(100));
        assert!(equal.valid());

        let backward =
            QualifiedTimeRange::new(QualifiedTime::new(200), QualifiedTime::new(100));
        assert!(!backward.valid());
    }

    #[test]
    fn invalid_endpoint_is_kept() {
        let mut range = QualifiedTimeRange::since(QualifiedTime::new(200));
        assert!(!range.set_ending(QualifiedTime::new(100)));
        assert_eq!(range.ending().time(), Some(100));
        assert!(range.set_ending(QualifiedTime::new(300)));
    }
}
