//! Helpers shared by the integration tests.

/// Route engine logs through the test harness. Only the first call
/// installs the logger.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
