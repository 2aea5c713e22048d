// AgenType - core app runtime

mod cli;
pub mod constants;
pub mod errors;
pub mod history;
pub mod hotkeys;
pub mod i18n;
pub mod openai;
mod paths;
pub mod pipeline;
pub mod platform;
pub mod prompt;
pub mod settings;
pub mod status;

use tracing::info;

pub use cli::run;
pub use errors::{AppError, ErrorKind};
pub use history::{Candidate, HistoryEntry, InputSource};
pub use openai::{CompletionApi, CompletionRequest, OpenAiClient};
pub use pipeline::{App, GenerationInput};
pub use platform::{Capabilities, Platform};
pub use prompt::{PromptConfig, PromptSource};
pub use settings::{OcrMode, Settings, Slot, UiLanguage};
pub use status::{Status, StatusSink, StatusState};

/// Console plus rolling file logging. The returned guard flushes the file
/// writer on drop; hold it for the life of the process.
pub fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = tracing_appender::rolling::daily(paths::logs_dir(), "agentype.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(file_writer.and(std::io::stderr))
        .init();

    info!("AgenType starting up");
    guard
}
