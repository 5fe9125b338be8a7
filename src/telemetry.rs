use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

const DEFAULT_FILTER: &str = "info,profile_qr=debug,tower_http=info";

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber. Later calls are no-ops, so tests may call it freely.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // scanner transitions are instrumented; report how long each one took
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        let _ = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(env_filter)
            .try_init();
    });
}
