//! Mode dispatch against a scripted host.

use bytes::Bytes;
use serde_json::json;
use strata_codec::{JsonDoc, Value};
use strata_pipeline::{Chain, PipelineError, PipelineResult};
use strata_protocol::ProtocolError;
use strata_segment::{Index, MemoryIndex};
use strata_testkit::{temp_input, ScriptedHost};
use strata_worker::{Profile, Strategies, Worker, WorkerConfig, WorkerError};

fn testing() -> WorkerConfig {
    WorkerConfig::new().with_testing(true)
}

fn params(pairs: Vec<(&str, Value)>) -> Value {
    Value::map(pairs.into_iter().map(|(k, v)| (Value::bytes(k), v)).collect())
}

fn job(mode: &str) -> Value {
    params(vec![("type", Value::bytes(mode))])
}

fn profile_entry(uid: &str, fields: Vec<(&str, Value)>) -> (Value, Value) {
    (
        Value::bytes(uid),
        Value::List(vec![Value::bytes(uid), params(fields)]),
    )
}

fn two_profiles() -> Vec<(Value, Value)> {
    vec![
        profile_entry(
            "u1",
            vec![("clicks", Value::Integer(3)), ("views", Value::Integer(1))],
        ),
        profile_entry("u2", vec![("views", Value::Integer(7))]),
    ]
}

#[test]
fn connect_exchanges_greeting_then_params() {
    let host = ScriptedHost::new()
        .with_greeting()
        .with_params(&job("model"));
    let worker = Worker::connect(host.reader(), host.writer(), WorkerConfig::new()).unwrap();

    assert_eq!(host.commands(), vec!["ping", "params"]);
    assert_eq!(worker.param_text("type"), Some("model"));
}

#[test]
fn connect_rejects_a_bad_greeting() {
    let host = ScriptedHost::new().with_raw_greeting(b"2:no");
    let result = Worker::connect(host.reader(), host.writer(), WorkerConfig::new());
    assert!(matches!(
        result,
        Err(WorkerError::Protocol(ProtocolError::Handshake { .. }))
    ));
}

#[test]
fn empty_params_have_no_mode() {
    let host = ScriptedHost::new();
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();
    assert_eq!(worker.params(), &Value::Map(Vec::new()));
    assert!(matches!(worker.run(Strategies::new()), Err(WorkerError::Config { .. })));
}

#[test]
fn unknown_mode_is_an_error() {
    let host = ScriptedHost::new().with_params(&job("view"));
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    let err = worker.run(Strategies::new()).unwrap_err();
    assert_eq!(err.to_string(), "unknown type: view");
    assert!(!host.commands().contains(&"done".to_string()));
}

#[test]
fn missing_strategy_is_an_error() {
    let host = ScriptedHost::new().with_params(&job("chain"));
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();
    let strategies = Strategies::new().model(|_| Ok(Vec::new()));
    assert!(matches!(worker.run(strategies), Err(WorkerError::Config { .. })));
}

#[test]
fn model_mode_writes_the_index() {
    let host = ScriptedHost::new()
        .with_params(&job("model"))
        .with_batch(two_profiles());
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    worker
        .run(Strategies::new().model(|profile| {
            let uid = Bytes::copy_from_slice(profile.uid().as_bytes().unwrap_or_default());
            Ok(profile
                .fields()
                .map(|(name, _)| (Bytes::copy_from_slice(name.as_bytes()), uid.clone()))
                .collect())
        }))
        .unwrap();

    let outputs = host.outputs();
    assert_eq!(outputs.len(), 1);
    let index = MemoryIndex::from_value(&outputs[0]).unwrap();
    let views: Vec<Bytes> = index.lookup(b"views").collect();
    assert_eq!(views, vec![Bytes::from_static(b"u1"), Bytes::from_static(b"u2")]);
    let clicks: Vec<Bytes> = index.lookup(b"clicks").collect();
    assert_eq!(clicks, vec![Bytes::from_static(b"u1")]);

    let size = i64::try_from(index.encode().unwrap().len()).unwrap();
    assert_eq!(host.sysmsgs(), vec![("size".to_string(), Value::Integer(size))]);
    assert_eq!(host.commands().last().map(String::as_str), Some("done"));
}

#[test]
fn run_mode_leaves_done_to_the_caller() {
    let host = ScriptedHost::new()
        .with_params(&job("model"))
        .with_batch(two_profiles());
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    worker
        .run_mode(Strategies::new().model(|_| Ok(Vec::new())))
        .unwrap();
    assert_eq!(host.commands().last().map(String::as_str), Some("sysmsg"));

    worker.done().unwrap();
    assert_eq!(host.commands().last().map(String::as_str), Some("done"));
}

#[test]
fn insight_mode_merges_inputs_and_narrows_to_segments() {
    let first = MemoryIndex::from_pairs([("clicks", "u1"), ("clicks", "u2")]);
    let second = MemoryIndex::from_pairs([("views", "u2"), ("views", "u3")]);
    let (_first_dir, first_path) = temp_input("first", &first.encode().unwrap()).unwrap();
    let (_second_dir, second_path) = temp_input("second", &second.encode().unwrap()).unwrap();

    let segments = Value::List(vec![Value::List(vec![
        Value::bytes("u2"),
        Value::bytes("u3"),
    ])]);
    let host = ScriptedHost::new()
        .with_params(&params(vec![
            ("type", Value::bytes("insight")),
            ("segments", segments),
            ("segment_labels", Value::List(vec![Value::bytes("returning")])),
        ]))
        .with_inputs(&[first_path, second_path]);
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    worker
        .run(Strategies::new().insight(|model, params| {
            Ok(vec![json!({
                "type": params.get("type").and_then(Value::as_text),
                "clicks": model.count(b"clicks")?,
                "views": model.count(b"views")?,
                "labels": model.labels(),
                "segmented": model.is_segmented(),
            })])
        }))
        .unwrap();

    assert_eq!(
        host.outputs(),
        vec![Value::Json(JsonDoc::Parsed(json!({
            "type": "insight",
            "clicks": 1,
            "views": 2,
            "labels": ["returning"],
            "segmented": true,
        })))]
    );
    assert_eq!(host.commands().last().map(String::as_str), Some("done"));
}

#[test]
fn insight_mode_without_segments_sees_the_whole_model() {
    let index = MemoryIndex::from_pairs([("clicks", "u1"), ("clicks", "u2")]);
    let (_dir, path) = temp_input("model", &index.encode().unwrap()).unwrap();
    let host = ScriptedHost::new()
        .with_params(&job("insight"))
        .with_inputs(&[path]);
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    worker
        .run(Strategies::new().insight(|model, _| {
            Ok(vec![json!({
                "clicks": model.count(b"clicks")?,
                "segmented": model.is_segmented(),
            })])
        }))
        .unwrap();

    assert_eq!(
        host.outputs(),
        vec![Value::Json(JsonDoc::Parsed(
            json!({"clicks": 2, "segmented": false})
        ))]
    );
}

#[test]
fn chain_mode_emits_pipeline_outputs_in_order() {
    let host = ScriptedHost::new()
        .with_params(&job("chain"))
        .with_batch(two_profiles());
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    worker
        .run(Strategies::new().chain(|_| {
            Ok(vec![
                Chain::<Profile>::new("uids")
                    .map(|p: Profile| Ok(p.uid().clone()))
                    .build(),
                Chain::<Profile>::new("count")
                    .list()
                    .map(|all: Vec<Profile>| Ok(Value::Integer(all.len() as i64)))
                    .build(),
            ])
        }))
        .unwrap();

    assert_eq!(
        host.outputs(),
        vec![Value::bytes("u1"), Value::bytes("u2"), Value::Integer(2)]
    );
    assert_eq!(host.commands().last().map(String::as_str), Some("done"));
}

#[test]
fn chain_mode_reports_failed_pipelines() {
    let host = ScriptedHost::new()
        .with_params(&job("chain"))
        .with_batch(two_profiles());
    let worker = Worker::connect(host.reader(), host.writer(), testing()).unwrap();

    let err = worker
        .run(Strategies::new().chain(|_| {
            Ok(vec![
                Chain::<Profile>::new("uids")
                    .map(|p: Profile| Ok(p.uid().clone()))
                    .build(),
                Chain::<Profile>::new("broken")
                    .map(|_: Profile| -> PipelineResult<Value> {
                        Err(PipelineError::failed("no"))
                    })
                    .build(),
            ])
        }))
        .unwrap_err();

    match err {
        WorkerError::PipelinesFailed { failed } => assert_eq!(failed, vec!["broken"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(host.outputs(), vec![Value::bytes("u1"), Value::bytes("u2")]);
    assert!(!host.commands().contains(&"done".to_string()));
}
