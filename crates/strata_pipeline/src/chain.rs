//! Pipeline builder.
//!
//! A [`Chain`] starts from the item feed and stacks stages on top of it:
//!
//! ```
//! use strata_pipeline::{run, Chain, Classes, DispatchConfig};
//!
//! let evens = Chain::<u32>::new("evens")
//!     .filter(|n| n % 2 == 0)
//!     .map(|n| Ok(n * 10))
//!     .list()
//!     .build();
//! let report = run(0..6u32, vec![evens], DispatchConfig::default());
//! assert_eq!(report.into_outputs(), vec![vec![0, 20, 40]]);
//!
//! let sizes = Chain::<u32>::new("sizes")
//!     .classify(
//!         Classes::new()
//!             .class("small", |n: &u32| *n < 2)
//!             .class("large", |n: &u32| *n > 6),
//!     )
//!     .build();
//! let report = run(0..10u32, vec![sizes], DispatchConfig::default());
//! let counts = &report.into_outputs()[0];
//! assert_eq!(counts["small"], 2);
//! assert_eq!(counts["large"], 3);
//! ```

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::iter;

use crate::dispatcher::{Pipeline, Stream};
use crate::error::{PipelineError, PipelineResult};
use crate::feed::Feed;

/// Per-class counts produced by [`Chain::classify`].
pub type Counts = BTreeMap<String, u64>;

type Stages<T, O> = Box<dyn FnOnce(Feed<T>) -> Stream<O> + Send>;

type Predicate<O> = Box<dyn Fn(&O) -> bool + Send>;

/// Named predicates for [`Chain::classify`].
pub struct Classes<O> {
    classes: Vec<(String, Predicate<O>)>,
}

impl<O> Classes<O> {
    /// No classes.
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
        }
    }

    /// Add a class.
    pub fn class<F>(mut self, name: impl Into<String>, pred: F) -> Self
    where
        F: Fn(&O) -> bool + Send + 'static,
    {
        self.classes.push((name.into(), Box::new(pred)));
        self
    }
}

impl<O> Default for Classes<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipeline under construction, fed `T` items and producing `O`.
pub struct Chain<T, O = T> {
    name: String,
    stages: Stages<T, O>,
}

impl<T: 'static> Chain<T, T> {
    /// Start a chain that passes every item through.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Box::new(|feed: Feed<T>| -> Stream<T> {
                Box::new(feed.map(Ok::<T, PipelineError>))
            }),
        }
    }
}

impl<T: 'static, O: 'static> Chain<T, O> {
    fn stage<P, F>(self, stage: F) -> Chain<T, P>
    where
        F: FnOnce(Stream<O>) -> Stream<P> + Send + 'static,
    {
        let prev = self.stages;
        Chain {
            name: self.name,
            stages: Box::new(move |feed: Feed<T>| stage(prev(feed))),
        }
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform each item. An error fails the pipeline.
    pub fn map<P, F>(self, mut f: F) -> Chain<T, P>
    where
        P: 'static,
        F: FnMut(O) -> PipelineResult<P> + Send + 'static,
    {
        self.stage(move |stream| Box::new(stream.map(move |item| item.and_then(&mut f))))
    }

    /// Replace the whole stream, for stages that drop, expand or aggregate
    /// items in ways a per-item function cannot.
    pub fn map_stream<P, F, S>(self, f: F) -> Chain<T, P>
    where
        P: 'static,
        S: Iterator<Item = PipelineResult<P>> + 'static,
        F: FnOnce(Stream<O>) -> S + Send + 'static,
    {
        self.stage(move |stream| Box::new(f(stream)))
    }

    /// Keep the items matching `pred`.
    pub fn filter<F>(self, mut pred: F) -> Chain<T, O>
    where
        F: FnMut(&O) -> bool + Send + 'static,
    {
        self.stage(move |stream| {
            Box::new(stream.filter(move |item| item.as_ref().map_or(true, &mut pred)))
        })
    }

    /// Log each item and pass it on.
    pub fn log(self) -> Chain<T, O>
    where
        O: Debug,
    {
        let name = self.name.clone();
        self.stage(move |stream| {
            Box::new(stream.inspect(move |item| {
                if let Ok(item) = item {
                    tracing::info!(pipeline = %name, "{item:?}");
                }
            }))
        })
    }

    /// Collect every item into one list, emitted when the feed ends.
    pub fn list(self) -> Chain<T, Vec<O>> {
        self.stage(|stream| {
            Box::new(iter::once_with(move || -> PipelineResult<Vec<O>> {
                stream.collect()
            }))
        })
    }

    /// Count items per class, emitted when the feed ends.
    ///
    /// An item counts towards every class whose predicate it matches. Every
    /// class appears in the counts, matched or not.
    pub fn classify(self, classes: Classes<O>) -> Chain<T, Counts> {
        let classes = classes.classes;
        self.stage(move |stream| {
            Box::new(iter::once_with(move || -> PipelineResult<Counts> {
                let mut counts: Counts = classes.iter().map(|(name, _)| (name.clone(), 0)).collect();
                for item in stream {
                    let item = item?;
                    for (name, pred) in &classes {
                        if pred(&item) {
                            *counts.entry(name.clone()).or_insert(0) += 1;
                        }
                    }
                }
                Ok(counts)
            }))
        })
    }

    /// Count items per class, with the classes of each item computed by
    /// `f`. Only classes that occur appear in the counts.
    pub fn classify_with<F>(self, mut f: F) -> Chain<T, Counts>
    where
        F: FnMut(&O) -> Vec<String> + Send + 'static,
    {
        self.stage(move |stream| {
            Box::new(iter::once_with(move || -> PipelineResult<Counts> {
                let mut counts = Counts::new();
                for item in stream {
                    for class in f(&item?) {
                        *counts.entry(class).or_insert(0) += 1;
                    }
                }
                Ok(counts)
            }))
        })
    }

    /// Finish the chain.
    pub fn build(self) -> Pipeline<T, O> {
        let stages = self.stages;
        Pipeline::new(self.name, move |feed| Ok(stages(feed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{run, DispatchConfig};

    #[test]
    fn map_and_filter() {
        let chain = Chain::<i64>::new("squares")
            .filter(|n| n % 2 == 1)
            .map(|n| Ok(n * n))
            .build();
        let report = run(1..=5i64, vec![chain], DispatchConfig::default());
        assert_eq!(report.pipelines[0].result, Ok(vec![1, 9, 25]));
    }

    #[test]
    fn map_stream_can_drop_items() {
        let chain = Chain::<u32>::new("above")
            .map_stream(|stream| stream.filter(|n| matches!(n, Ok(n) if *n > 7)))
            .build();
        let report = run(0..10u32, vec![chain], DispatchConfig::default());
        assert_eq!(report.pipelines[0].result, Ok(vec![8, 9]));
    }

    #[test]
    fn classify_counts_every_class() {
        let chain = Chain::<u32>::new("classes")
            .map_stream(|stream| stream.filter(|n| matches!(n, Ok(n) if *n > 7)))
            .classify(
                Classes::new()
                    .class("small", |n: &u32| *n < 2)
                    .class("large", |n: &u32| *n > 6),
            )
            .build();
        let report = run(0..10u32, vec![chain], DispatchConfig::default());

        let expected: Counts = [("large".to_string(), 2), ("small".to_string(), 0)]
            .into_iter()
            .collect();
        assert_eq!(report.pipelines[0].result, Ok(vec![expected]));
    }

    #[test]
    fn classify_with_dynamic_classes() {
        let chain = Chain::<&'static str>::new("initials")
            .classify_with(|word| vec![word[..1].to_string()])
            .build();
        let report = run(vec!["apple", "avocado", "banana"], vec![chain], DispatchConfig::default());
        let counts = &report.pipelines[0].result.as_ref().unwrap()[0];
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn stage_error_fails_pipeline() {
        let failing = Chain::<u32>::new("failing")
            .map(|n| {
                if n == 2 {
                    Err(PipelineError::failed("two"))
                } else {
                    Ok(n)
                }
            })
            .build();
        let healthy = Chain::<u32>::new("healthy").build();

        let report = run(0..5u32, vec![failing, healthy], DispatchConfig::default());
        assert!(!report.is_success());
        assert_eq!(report.pipelines[0].result, Err(PipelineError::failed("two")));
        assert_eq!(report.pipelines[1].result, Ok(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn log_passes_items_through() {
        let chain = Chain::<u32>::new("logged").log().list().build();
        let report = run(0..3u32, vec![chain], DispatchConfig::default());
        assert_eq!(report.into_outputs(), vec![vec![0, 1, 2]]);
    }
}
