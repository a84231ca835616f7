use std::time::Duration;

use buslog::{Error, Node, NodeOptions, Playback, Recorder};
use regex::Regex;
use tempfile::tempdir;

#[test]
fn double_start_is_rejected_until_stopped() {
    let recorder = Recorder::new(NodeOptions::with_partition("rec_double_start"));
    recorder.start(":memory:").expect("first start");
    assert!(matches!(
        recorder.start(":memory:"),
        Err(Error::AlreadyRecording)
    ));

    recorder.stop();
    recorder.start(":memory:").expect("start after stop");
}

#[test]
fn unwritable_path_fails_to_open() {
    let recorder = Recorder::new(NodeOptions::with_partition("rec_bad_path"));
    assert!(matches!(
        recorder.start("///////////"),
        Err(Error::FailedToOpen(_))
    ));
    // The recorder stays usable.
    recorder.start(":memory:").expect("start after failure");
}

#[test]
fn malformed_topic_cannot_be_recorded() {
    let recorder = Recorder::new(NodeOptions::with_partition("rec_bad_topic"));
    assert!(matches!(
        recorder.add_topic("/////"),
        Err(Error::FailedToSubscribe(_))
    ));
}

#[test]
fn pattern_subscribes_to_advertised_topics_only() {
    let options = NodeOptions::with_partition("rec_pattern");
    let publisher_node = Node::new(&options);
    let _chatter = publisher_node.advertise("/chatter", "example.Str").unwrap();
    let _status = publisher_node.advertise("/status", "example.Int").unwrap();

    let recorder = Recorder::new(options);
    let subscribed = recorder
        .add_topics_matching(&Regex::new("/chat.*").unwrap())
        .expect("subscribe");
    assert_eq!(subscribed, 1);
}

#[test]
fn recorded_traffic_replays_in_order() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("session.tlog");
    let path = path.to_str().unwrap();

    let options = NodeOptions::with_partition("rec_round_trip");

    let recorder = Recorder::new(options.clone());
    recorder.add_topic("/chirp").expect("subscribe");
    recorder.start(path).expect("start recording");

    {
        let publisher_node = Node::new(&options);
        let publisher = publisher_node.advertise("/chirp", "example.Str").unwrap();
        for payload in [b"one".as_slice(), b"two", b"three"] {
            publisher.publish_raw(payload, "example.Str").expect("publish");
            std::thread::sleep(Duration::from_millis(20));
        }
    }
    recorder.stop();

    // Messages published while no session is active are dropped.
    {
        let publisher_node = Node::new(&options);
        let publisher = publisher_node.advertise("/chirp", "example.Str").unwrap();
        publisher.publish_raw(b"late", "example.Str").expect("publish");
    }

    let replay_options = NodeOptions::with_partition("rec_round_trip_replay");
    let subscriber = Node::new(&replay_options);
    let rx = subscriber.subscribe("/chirp").expect("subscribe");

    let playback = Playback::new(path, replay_options);
    assert!(playback.valid());
    let handle = playback.start(Duration::ZERO).expect("start playback");
    handle.wait_until_finished();

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received.len(), 3);
    assert_eq!(received[0].data, b"one");
    assert_eq!(received[1].data, b"two");
    assert_eq!(received[2].data, b"three");
    assert!(received
        .iter()
        .all(|message| message.msg_type == "example.Str"));
}
