//! Profiles and their events, read from and written back to a scripted host.

use chrono::NaiveDate;
use serde_json::json;
use strata_codec::{JsonDoc, Value};
use strata_log::LogConfig;
use strata_testkit::ScriptedHost;
use strata_worker::{
    Event, Profile, Worker, WorkerConfig, WorkerError, WorkerResult, EXPIRES_FIELD, PARTS_FIELD,
    PROFILE_DONE,
};

fn map(pairs: Vec<(&str, Value)>) -> Value {
    Value::map(pairs.into_iter().map(|(k, v)| (Value::bytes(k), v)).collect())
}

fn profile_entry(uid: &str, fields: Vec<(&str, Value)>) -> (Value, Value) {
    (
        Value::bytes(uid),
        Value::List(vec![Value::bytes(uid), map(fields)]),
    )
}

fn event_entry(uid: &str, id: &str) -> (Value, Value) {
    let event = Event {
        uid: uid.to_string(),
        ip: "1.2.3.4".to_string(),
        object: Value::Json(JsonDoc::Parsed(json!({ "id": id }))),
        id: id.to_string(),
        timestamp: "2013-01-01T00:00:00Z".to_string(),
        groupkey: "g".to_string(),
    };
    (Value::bytes(uid), event.to_value())
}

fn done_entry(uid: &str) -> (Value, Value) {
    (Value::bytes(uid), Value::bytes(PROFILE_DONE))
}

fn host() -> ScriptedHost {
    ScriptedHost::new()
        .with_params(&map(vec![("group", Value::bytes("2013-01-01T00"))]))
        .with_batch(vec![
            profile_entry("u1", vec![("visits", Value::Integer(1))]),
            event_entry("u1", "e1"),
            event_entry("u1", "e2"),
            done_entry("u1"),
        ])
        .with_batch(vec![
            profile_entry("u2", vec![]),
            event_entry("u2", "e3"),
            done_entry("u2"),
        ])
}

/// Record the first event of each profile in its `events` log and stamp an
/// expiry.
fn record_first_event(worker: &Worker) -> WorkerResult<usize> {
    worker.profile_events(|profile, events| {
        let mut log = profile.open_log("events", LogConfig::default())?;
        if let Some(event) = events.next().transpose()? {
            log.push([event.to_value()])?;
        }
        profile.store_log("events", log);
        worker.set_expire(profile, 30)
    })
}

fn logged_ids(profile: &Profile) -> Vec<String> {
    let log = profile.open_log("events", LogConfig::default()).unwrap();
    log.iter()
        .map(|item| Event::from_value(item.unwrap()).unwrap().id)
        .collect()
}

#[test]
fn profiles_iterates_every_entry() {
    let host = ScriptedHost::new().with_batch(vec![
        profile_entry("u1", vec![("visits", Value::Integer(1))]),
        profile_entry("u2", vec![]),
    ]);
    let config = WorkerConfig::new().with_testing(true);
    let worker = Worker::connect(host.reader(), host.writer(), config).unwrap();

    let profiles: Vec<Profile> = worker.profiles().collect::<Result<_, _>>().unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].uid_text(), Some("u1"));
    assert_eq!(profiles[0].get("visits"), Some(&Value::Integer(1)));
    assert!(profiles[1].is_empty());
}

#[test]
fn each_profile_is_written_back_after_its_events() {
    let host = host();
    let config = WorkerConfig::new().with_testing(true);
    let worker = Worker::connect(host.reader(), host.writer(), config).unwrap();

    assert_eq!(record_first_event(&worker).unwrap(), 2);

    let written: Vec<Profile> = host
        .outputs()
        .into_iter()
        .map(|entry| Profile::from_entry(entry).unwrap())
        .collect();
    assert_eq!(written.len(), 2);

    assert_eq!(written[0].uid_text(), Some("u1"));
    assert_eq!(written[0].get("visits"), Some(&Value::Integer(1)));
    assert_eq!(logged_ids(&written[0]), vec!["e1"]);
    assert_eq!(written[0].expires(), NaiveDate::from_ymd_opt(2013, 1, 31));

    assert_eq!(written[1].uid_text(), Some("u2"));
    assert_eq!(logged_ids(&written[1]), vec!["e3"]);
    assert_eq!(written[1].get(EXPIRES_FIELD), Some(&Value::bytes("2013-01-31")));

    // One `out` per profile, and no `done` outside a mode run.
    assert_eq!(host.bodies("out").len(), 2);
    assert!(!host.commands().contains(&"done".to_string()));
}

#[test]
fn large_logs_are_written_in_parts() {
    let host = host();
    let config = WorkerConfig::new().with_testing(true).with_part_size(16);
    let worker = Worker::connect(host.reader(), host.writer(), config).unwrap();
    record_first_event(&worker).unwrap();

    let outputs = host.outputs();
    let fields = &outputs[0].as_list().unwrap()[1];
    let stored = fields.get("events").unwrap().as_map().unwrap();
    assert_eq!(stored[0].0.as_text(), Some(PARTS_FIELD));
    let parts = stored[0].1.as_list().unwrap();
    assert!(parts.len() > 1);

    let profile = Profile::from_entry(outputs[0].clone()).unwrap();
    assert_eq!(logged_ids(&profile), vec!["e1"]);
}

#[test]
fn expiry_needs_a_group() {
    let host = ScriptedHost::new().with_batch(vec![
        profile_entry("u1", vec![]),
        done_entry("u1"),
    ]);
    let config = WorkerConfig::new().with_testing(true);
    let worker = Worker::connect(host.reader(), host.writer(), config).unwrap();

    let result = worker.profile_events(|profile, _| worker.set_expire(profile, 1));
    assert!(matches!(result, Err(WorkerError::Config { .. })));
    assert!(host.outputs().is_empty());
}

#[test]
fn malformed_events_are_reported() {
    let host = ScriptedHost::new().with_batch(vec![
        profile_entry("u1", vec![]),
        (Value::bytes("u1"), Value::List(vec![Value::bytes("u1")])),
        done_entry("u1"),
    ]);
    let config = WorkerConfig::new().with_testing(true);
    let worker = Worker::connect(host.reader(), host.writer(), config).unwrap();

    let result = worker.profile_events(|_, _| Ok(()));
    assert!(matches!(result, Err(WorkerError::Entry { .. })));
}
