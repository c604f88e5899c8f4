use tracing::Level;

/// Install a fmt subscriber at the given level.
///
/// Returns `false` when a global subscriber was already set, which is the
/// normal case when several tests call this.
pub fn init_tracing(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Same as [`init_tracing`] but writes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}
