pub mod config_test;
pub mod fallback_test;

/// Install a test subscriber once; honours `RUST_LOG`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
