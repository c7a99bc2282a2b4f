//! Test fixtures and platform helpers.

use crate::mock::MockPlatform;
use apsdk_core::{ClientConfig, Environment, Platform};
use std::sync::Arc;

/// API key used by test configurations.
pub const TEST_API_KEY: &str = "test-api-key";

/// A sandbox configuration with the test key.
pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_API_KEY, Environment::Sandbox)
}

/// A platform over a fresh simulator. The simulator is returned for
/// inspection.
pub fn mock_platform() -> (Arc<MockPlatform>, Platform) {
    platform_over(MockPlatform::new())
}

/// A platform over the given simulator.
pub fn platform_over(mock: MockPlatform) -> (Arc<MockPlatform>, Platform) {
    platform_with_config(mock, test_config())
}

/// A platform over the given simulator and configuration.
pub fn platform_with_config(
    mock: MockPlatform,
    config: ClientConfig,
) -> (Arc<MockPlatform>, Platform) {
    let mock = Arc::new(mock);
    let platform = Platform::new(config, mock.clone());
    (mock, platform)
}
