//! Aggregate results of a run.

use crate::error::{PipelineError, PipelineResult};

/// What one pipeline produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport<O> {
    /// Pipeline name.
    pub name: String,
    /// Collected outputs, or the error the pipeline ended with.
    pub result: PipelineResult<Vec<O>>,
}

/// Results of every pipeline in a run, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport<O> {
    /// Per-pipeline outcomes.
    pub pipelines: Vec<PipelineReport<O>>,
    /// Whether the scan stopped before the source was exhausted.
    pub aborted: bool,
}

impl<O> RunReport<O> {
    /// True if no pipeline failed.
    pub fn is_success(&self) -> bool {
        self.pipelines.iter().all(|p| p.result.is_ok())
    }

    /// Failed pipelines with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.pipelines
            .iter()
            .filter_map(|p| p.result.as_ref().err().map(|e| (p.name.as_str(), e)))
    }

    /// Outputs of the pipelines that succeeded, in pipeline order.
    pub fn into_outputs(self) -> Vec<O> {
        self.pipelines
            .into_iter()
            .filter_map(|p| p.result.ok())
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_and_outputs() {
        let report = RunReport {
            pipelines: vec![
                PipelineReport {
                    name: "a".into(),
                    result: Ok(vec![1, 2]),
                },
                PipelineReport {
                    name: "b".into(),
                    result: Err(PipelineError::failed("bad")),
                },
                PipelineReport {
                    name: "c".into(),
                    result: Ok(vec![3]),
                },
            ],
            aborted: false,
        };

        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["b"]);
        assert_eq!(report.into_outputs(), vec![1, 2, 3]);
    }
}
