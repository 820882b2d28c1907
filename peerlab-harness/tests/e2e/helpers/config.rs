//! Test configuration builder for E2E tests.
//!
//! Provides [`TestConfigBuilder`] for creating `HarnessConfig` instances
//! rooted in a temp directory, with short timeouts where a test needs them.

use std::path::Path;

use peerlab_core::config::HarnessConfig;

/// Builder for constructing test-friendly `HarnessConfig` instances.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new(temp.path())
///     .connection_deadline_secs(3)
///     .build();
/// ```
#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: HarnessConfig,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    /// Defaults with `temp_dir` pointing at `temp`.
    pub fn new(temp: &Path) -> Self {
        let mut config = HarnessConfig::default();
        config.paths.temp_dir = temp.display().to_string();
        Self { config }
    }

    pub fn start_attempts(mut self, attempts: u32) -> Self {
        self.config.timeouts.start_attempts = attempts;
        self
    }

    pub fn connection_deadline_secs(mut self, secs: u64) -> Self {
        self.config.timeouts.connection_deadline_secs = secs;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.poll_interval_ms = ms;
        self
    }

    pub fn port_range(mut self, start: u16, end: u16) -> Self {
        self.config.ports.range_start = start;
        self.config.ports.range_end = end;
        self
    }

    /// Build the final config, asserting that it validates.
    pub fn build(self) -> HarnessConfig {
        self.config
            .validate()
            .expect("test config should validate");
        self.config
    }
}
