use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise tracing on stderr.
///
/// `RUST_LOG` takes precedence. Otherwise only warnings are shown, or debug
/// output from the northbase crates when `debug` is set. Stdout is left to
/// command output, so `northbase get` stays byte-exact.
pub fn init_tracing(debug: bool) {
    let default = if debug {
        "warn,northbase=debug,northbase_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(debug))
        .try_init();
}
