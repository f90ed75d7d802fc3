//! Configuration for the dispatcher.

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchConfig {
    /// Stop scanning the source at the first pipeline failure.
    ///
    /// When unset, a failed pipeline is dropped from the rotation and the
    /// remaining pipelines see the whole source.
    pub stop_on_error: bool,
}

impl DispatchConfig {
    /// Creates the default configuration.
    pub const fn new() -> Self {
        Self {
            stop_on_error: false,
        }
    }

    /// Sets whether the first failure stops the scan.
    pub const fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }
}
