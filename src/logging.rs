//! Tracing subscriber setup for binaries and embedding applications.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the application. With the `chrome-trace` feature and `SCENE_GPU_TRACE=1`
//! a Chrome trace is written to `trace.json` while the returned guard lives.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps optional trace writers alive. Drop it at exit to flush.
#[must_use = "dropping the guard stops trace output"]
pub struct LoggingGuard {
    #[cfg(feature = "chrome-trace")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless; the
/// second subscriber is ignored.
pub fn init(default_filter: &str) -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    #[cfg(feature = "chrome-trace")]
    {
        let (chrome, guard) = if std::env::var("SCENE_GPU_TRACE").ok().as_deref() == Some("1") {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };
        let _ = tracing_subscriber::registry()
            .with(chrome)
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init();
        LoggingGuard { _chrome: guard }
    }

    #[cfg(not(feature = "chrome-trace"))]
    {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init();
        LoggingGuard {}
    }
}
