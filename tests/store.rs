use buslog::{
    Error, Log, OpenMode, QualifiedTime, QualifiedTimeRange, Qualifier, TopicList,
};
use tempfile::tempdir;

#[test]
fn open_memory_database() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");
    assert!(log.valid());
    assert_eq!(log.version().expect("version"), "0.1.0");
}

#[test]
fn open_impossible_file_name() {
    let log = Log::new();
    assert!(matches!(
        log.open("///////////", OpenMode::ReadWriteCreate),
        Err(Error::FailedToOpen(_))
    ));
    assert!(!log.valid());
}

#[test]
fn read_only_open_of_missing_file_fails() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("missing.tlog");
    let log = Log::new();
    assert!(log.open(path.to_str().unwrap(), OpenMode::ReadOnly).is_err());
    assert!(!log.valid());
}

#[test]
fn reopen_is_rejected_until_closed() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");
    assert!(matches!(
        log.open(":memory:", OpenMode::ReadWriteCreate),
        Err(Error::AlreadyOpen)
    ));
    assert!(log.valid());

    log.close();
    assert!(!log.valid());
    log.open(":memory:", OpenMode::ReadWriteCreate)
        .expect("reopen after close");
}

#[test]
fn operations_on_a_closed_log_fail() {
    let log = Log::new();
    assert!(matches!(log.version(), Err(Error::LogInvalid)));
    assert!(matches!(log.descriptor(), Err(Error::LogInvalid)));
    assert!(matches!(
        log.insert_message(0, "/foo", "example.Int", b"x"),
        Err(Error::LogInvalid)
    ));
}

#[test]
fn insert_builds_the_descriptor() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");

    log.insert_message(10, "/foo", "example.Int", b"a").expect("insert");
    log.insert_message(20, "/foo", "example.Str", b"b").expect("insert");
    log.insert_message(30, "/bar", "example.Int", b"c").expect("insert");

    let descriptor = log.descriptor().expect("descriptor");
    assert_eq!(descriptor.topics_to_msg_types().len(), 2);
    assert_eq!(
        descriptor.msg_types_of_topic("/foo").map(|types| types.len()),
        Some(2)
    );
    assert!(descriptor.topic_id("/foo", "example.Int").is_some());
    assert!(descriptor.topic_id("/bar", "example.Str").is_none());
}

#[test]
fn all_messages_come_back_in_time_order() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");

    // Inserted out of order on purpose.
    log.insert_message(300, "/foo", "example.Int", b"third").expect("insert");
    log.insert_message(100, "/bar", "example.Int", b"first").expect("insert");
    log.insert_message(200, "/foo", "example.Int", b"second").expect("insert");

    let times: Vec<i64> = log
        .all_messages()
        .map(|message| message.expect("message").time_received)
        .collect();
    assert_eq!(times, vec![100, 200, 300]);
}

#[test]
fn equal_timestamps_keep_insertion_order() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");

    log.insert_message(100, "/foo", "example.Int", b"a").expect("insert");
    log.insert_message(100, "/foo", "example.Int", b"b").expect("insert");
    log.insert_message(100, "/foo", "example.Int", b"c").expect("insert");

    let payloads: Vec<Vec<u8>> = log
        .all_messages()
        .map(|message| message.expect("message").data)
        .collect();
    assert_eq!(payloads, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn topic_list_query_filters_topics() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");

    log.insert_message(1, "/foo", "example.Int", b"keep").expect("insert");
    log.insert_message(2, "/bar", "example.Int", b"drop").expect("insert");
    log.insert_message(3, "/foo", "example.Str", b"keep2").expect("insert");

    let mut batch = log.query_messages(&TopicList::new(["/foo"]));
    let mut topics = Vec::new();
    while let Some(message) = batch.next_message().expect("message") {
        topics.push(message.topic);
    }
    assert_eq!(topics, vec!["/foo", "/foo"]);
}

#[test]
fn unknown_selection_yields_an_empty_batch() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");
    log.insert_message(1, "/foo", "example.Int", b"x").expect("insert");

    let mut batch = log.query_messages(&TopicList::new(["/nothing"]));
    assert!(batch.next_message().expect("message").is_none());
}

#[test]
fn time_range_bounds_respect_qualifiers() {
    let log = Log::new();
    log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");
    for time in [100i64, 200, 300] {
        log.insert_message(time, "/foo", "example.Int", b"x").expect("insert");
    }

    let collect = |range: QualifiedTimeRange| -> Vec<i64> {
        log.query_messages(&TopicList::scoped(["/foo"], range))
            .map(|message| message.expect("message").time_received)
            .collect()
    };

    assert_eq!(
        collect(QualifiedTimeRange::since(QualifiedTime::new(200))),
        vec![200, 300]
    );
    assert_eq!(
        collect(QualifiedTimeRange::since(QualifiedTime::with_qualifier(
            200,
            Qualifier::Exclusive
        ))),
        vec![300]
    );
    assert_eq!(
        collect(QualifiedTimeRange::until(QualifiedTime::new(200))),
        vec![100, 200]
    );
    assert_eq!(
        collect(QualifiedTimeRange::until(QualifiedTime::with_qualifier(
            200,
            Qualifier::Exclusive
        ))),
        vec![100]
    );
}

#[test]
fn file_backed_log_round_trips_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("round_trip.tlog");
    let path = path.to_str().unwrap();

    {
        let log = Log::new();
        log.open(path, OpenMode::ReadWriteCreate).expect("open");
        log.insert_message(42, "/foo", "example.Int", b"payload").expect("insert");
    }

    let log = Log::new();
    log.open(path, OpenMode::ReadOnly).expect("reopen");
    let mut batch = log.all_messages();
    let message = batch.next_message().expect("read").expect("one message");
    assert_eq!(message.topic, "/foo");
    assert_eq!(message.msg_type, "example.Int");
    assert_eq!(message.time_received, 42);
    assert_eq!(message.data, b"payload");
    assert!(batch.next_message().expect("read").is_none());
}
