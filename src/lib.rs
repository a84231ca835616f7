pub mod batch;
pub mod bus;
pub mod cli;
pub mod descriptor;
pub mod error;
pub mod playback;
pub mod qualified_time;
pub mod query;
pub mod record;
pub mod selector;
pub mod sql;
pub mod store;

pub use batch::{Batch, Message};
pub use bus::{Node, NodeOptions, Publisher, RawMessage};
pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use playback::{Playback, PlaybackHandle};
pub use qualified_time::{QualifiedTime, QualifiedTimeRange, Qualifier};
pub use query::{AllTopics, QueryOptions, TopicList};
pub use record::Recorder;
pub use selector::TopicSelection;
pub use sql::{SqlKind, SqlParameter, SqlStatement};
pub use store::{Log, OpenMode};
