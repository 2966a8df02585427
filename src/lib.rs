pub mod audio;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod journal;
pub mod link;
mod lock;
mod logging;
pub mod protocol;
pub mod station;
mod telemetry;
pub mod voice;

pub(crate) use lock::lock_or_recover;
pub use logging::{
    crash_log_path, error_chain, init_logging, install_panic_hook, log_debug, log_debug_content,
    log_file_path,
};
pub use telemetry::{init_tracing, tracing_log_path};
