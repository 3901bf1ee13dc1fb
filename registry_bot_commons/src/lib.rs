//! Boilerplate shared by my bots, so the bot crates themselves can get
//! straight to the point.

use std::future::Future;

/// Extension traits for teloxide types.
pub mod useful_methods;

/// Evaluate a teloxide request expression, retrying it for as long as
/// Telegram responds with rate limiting, waiting out each limit.
/// Evaluates to the first non-rate-limited result.
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        let mut result;
        loop {
            result = $request;
            if let Err(teloxide::RequestError::RetryAfter(time)) = &result {
                log::warn!("Rate limited for {} seconds...", time.seconds());
                tokio::time::sleep(time.duration()).await;
                continue;
            }
            break;
        }
        result
    }};
}

/// Initialize logging and run `closure` to completion on a fresh async
/// runtime. Logging is enabled by default on level `info` unless
/// overridden by environment variable `RUST_LOG`. This uses the crate
/// [pretty_env_logger][] internally, see its documentation for more details.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .unwrap_or_else(|| std::ffi::OsString::from("info"))
        .into_string()
        .unwrap_or_else(|_| String::from("info"));

    // The journal timestamps lines by itself.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(closure);
}
