//! Panic capture and process-wide logging setup
//!
//! [`catch_panic`] and [`panic_message`] are what robust delivery uses to turn
//! a panicking receiver into an ordinary failure. With the `diagnostics`
//! feature (on by default) this module also offers [`init_diagnostics`], a
//! one-call subscriber and panic hook setup for applications that do not
//! bring their own.

use std::any::Any;
use std::panic::{self, UnwindSafe};

/// Executes a closure and catches any panics that occur, returning a Result.
///
/// # Example
/// ```
/// use herald_core::diagnostics::catch_panic;
///
/// let ok = catch_panic(|| 42);
/// assert_eq!(ok.unwrap(), 42);
///
/// let err = catch_panic(|| panic!("fail!"));
/// assert!(err.is_err());
/// ```
pub fn catch_panic<T, F>(f: F) -> Result<T, Box<dyn Any + Send + 'static>>
where
    F: FnOnce() -> T + UnwindSafe,
{
    panic::catch_unwind(f)
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<unknown>".to_string()
    }
}

#[cfg(feature = "diagnostics")]
pub use setup::{DiagnosticsConfig, DiagnosticsGuard, init_diagnostics};

#[cfg(feature = "diagnostics")]
mod setup {
    use std::io::{self, Write};
    use std::panic;
    use std::path::PathBuf;
    use std::sync::Once;

    use serde::{Deserialize, Serialize};
    use tracing::{error, info, warn};
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    #[cfg(debug_assertions)]
    use better_panic::{Settings, Verbosity};

    #[cfg(not(debug_assertions))]
    use human_panic::setup_panic;

    use super::panic_message;

    static INIT: Once = Once::new();

    /// Logging settings for [`init_diagnostics`]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct DiagnosticsConfig {
        /// Filter used when `RUST_LOG` is not set
        pub level: String,
        /// Directory for daily rotated JSON logs; none means stderr only
        pub log_dir: Option<PathBuf>,
        pub file_prefix: String,
    }

    impl Default for DiagnosticsConfig {
        fn default() -> Self {
            Self {
                level: "info".to_string(),
                log_dir: None,
                file_prefix: "herald.log".to_string(),
            }
        }
    }

    /// Keeps the file writer flushing; hold it for the life of the process
    #[must_use = "dropping the guard stops file logging"]
    #[derive(Debug, Default)]
    pub struct DiagnosticsGuard {
        file: Option<WorkerGuard>,
    }

    impl DiagnosticsGuard {
        /// Whether this guard owns the file writer
        pub fn writes_file(&self) -> bool {
            self.file.is_some()
        }
    }

    /// Install the tracing subscriber and the panic hook
    ///
    /// Only the first call has an effect. If another subscriber is already
    /// installed it is left in place and a warning is logged through it.
    pub fn init_diagnostics(config: &DiagnosticsConfig) -> DiagnosticsGuard {
        let mut guard = DiagnosticsGuard::default();
        INIT.call_once(|| {
            guard.file = install_subscriber(config);
            install_panic_hook();
        });
        guard
    }

    fn install_subscriber(config: &DiagnosticsConfig) -> Option<WorkerGuard> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
        let console_layer = fmt::layer().with_writer(io::stderr);

        let (file_layer, file_guard) = match &config.log_dir {
            Some(dir) => {
                let file_appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
                let (writer, guard) = tracing_appender::non_blocking(file_appender);
                (Some(fmt::layer().with_writer(writer).json()), Some(guard))
            }
            None => (None, None),
        };

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init();
        if let Err(err) = installed {
            warn!(error = %err, "tracing subscriber already installed, keeping it");
        }
        file_guard
    }

    fn install_panic_hook() {
        #[cfg(debug_assertions)]
        {
            Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .verbosity(Verbosity::Full)
                .install();
            info!("panic handler configured for debug builds (better_panic)");
        }

        #[cfg(not(debug_assertions))]
        {
            setup_panic!();
            info!("panic handler configured for release builds (human_panic)");
        }

        // Log through tracing first, then hand over to the handler installed above
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            error!(
                target: "herald::panic",
                location = %panic_info
                    .location()
                    .map_or("unknown".to_string(), |l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
                payload = %panic_message(panic_info.payload()),
                "panicked"
            );
            original_hook(panic_info);
            let _ = io::stderr().flush();
        }));
    }
}
