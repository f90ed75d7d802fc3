//! Fault isolation and ordering across pipelines.

use std::sync::Arc;

use parking_lot::Mutex;
use strata_pipeline::{
    run, Chain, DispatchConfig, Dispatcher, Feed, Pipeline, PipelineError, PipelineResult, Stream,
};

type Seen = Arc<Mutex<Vec<(&'static str, u32)>>>;

fn recorder(name: &'static str, seen: Seen) -> Pipeline<u32, u32> {
    Chain::<u32>::new(name)
        .map(move |n| {
            seen.lock().push((name, n));
            Ok(n)
        })
        .build()
}

fn failing_at(name: &'static str, at: u32, seen: Seen) -> Pipeline<u32, u32> {
    Chain::<u32>::new(name)
        .map(move |n| {
            seen.lock().push((name, n));
            if n == at {
                Err(PipelineError::failed(format!("rejected {n}")))
            } else {
                Ok(n)
            }
        })
        .build()
}

#[test]
fn failure_is_isolated_to_its_pipeline() {
    let seen = Seen::default();
    let pipelines = vec![
        recorder("first", Arc::clone(&seen)),
        failing_at("middle", 3, Arc::clone(&seen)),
        recorder("last", Arc::clone(&seen)),
    ];

    let report = run(0..8u32, pipelines, DispatchConfig::default());

    assert!(!report.is_success());
    assert!(!report.aborted);
    assert_eq!(report.pipelines[0].result, Ok((0..8).collect()));
    assert_eq!(
        report.pipelines[1].result,
        Err(PipelineError::failed("rejected 3"))
    );
    assert_eq!(report.pipelines[2].result, Ok((0..8).collect()));

    let middle: Vec<u32> = seen
        .lock()
        .iter()
        .filter(|(name, _)| *name == "middle")
        .map(|(_, n)| *n)
        .collect();
    assert_eq!(middle, vec![0, 1, 2, 3]);

    let failures: Vec<&str> = report.failures().map(|(name, _)| name).collect();
    assert_eq!(failures, vec!["middle"]);
}

#[test]
fn panic_is_isolated_to_its_pipeline() {
    let panicking: Pipeline<u32, u32> = Chain::<u32>::new("panicking")
        .map(|n| {
            if n == 1 {
                panic!("stage blew up");
            }
            Ok(n)
        })
        .build();
    let healthy = Chain::<u32>::new("healthy").build();

    let report = run(0..4u32, vec![panicking, healthy], DispatchConfig::default());

    assert_eq!(
        report.pipelines[0].result,
        Err(PipelineError::Panicked {
            message: "stage blew up".into()
        })
    );
    assert_eq!(report.pipelines[1].result, Ok(vec![0, 1, 2, 3]));
}

#[test]
fn stop_on_error_aborts_the_scan() {
    let seen = Seen::default();
    let pipelines = vec![
        failing_at("failing", 2, Arc::clone(&seen)),
        recorder("healthy", Arc::clone(&seen)),
    ];

    let config = DispatchConfig::new().with_stop_on_error(true);
    let report = run(0..10u32, pipelines, config);

    assert!(report.aborted);
    assert!(!report.is_success());
    // Aborted pipelines discard what they produced.
    assert_eq!(report.pipelines[1].result, Ok(Vec::new()));

    let healthy: Vec<u32> = seen
        .lock()
        .iter()
        .filter(|(name, _)| *name == "healthy")
        .map(|(_, n)| *n)
        .collect();
    assert_eq!(healthy, vec![0, 1]);
}

#[test]
fn dispatch_reports_when_nothing_is_left() {
    let seen = Seen::default();
    let pipelines = vec![failing_at("only", 0, Arc::clone(&seen))];
    let mut dispatcher = Dispatcher::start(pipelines, DispatchConfig::default()).unwrap();

    assert!(!dispatcher.dispatch(&0));
    assert!(!dispatcher.dispatch(&1));

    let report = dispatcher.close();
    assert_eq!(
        report.pipelines[0].result,
        Err(PipelineError::failed("rejected 0"))
    );
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn feed_observes_abort_flag() {
    let observed = Arc::new(Mutex::new(None));
    let flag = Arc::clone(&observed);
    let watcher: Pipeline<u32, u32> = Pipeline::new("watcher", move |feed: Feed<u32>| {
        let stream = std::iter::once_with(move || -> PipelineResult<u32> {
            let mut feed = feed;
            let count = feed.by_ref().count() as u32;
            *flag.lock() = Some(feed.aborted());
            Ok(count)
        });
        Ok(Box::new(stream) as Stream<u32>)
    });
    let seen = Seen::default();
    let failing = failing_at("failing", 1, seen);

    let config = DispatchConfig::new().with_stop_on_error(true);
    let report = run(0..5u32, vec![watcher, failing], config);

    assert!(report.aborted);
    assert_eq!(*observed.lock(), Some(true));
    assert_eq!(report.pipelines[0].result, Ok(Vec::new()));
}

#[test]
fn chains_of_different_shapes_share_one_source() {
    let words = vec!["kiwi", "fig", "banana", "plum", "apple"];

    let lengths = Chain::<&str>::new("lengths")
        .map(|w| Ok(w.len()))
        .filter(|n| *n > 3)
        .build();
    let long = Chain::<&str>::new("long-count")
        .filter(|w| w.len() > 4)
        .map(|w| Ok(w.len()))
        .list()
        .map(|all| Ok(all.len()))
        .build();

    let report = run(words, vec![lengths, long], DispatchConfig::default());
    assert_eq!(report.pipelines[0].result, Ok(vec![4, 6, 4, 5]));
    assert_eq!(report.pipelines[1].result, Ok(vec![2]));
}
