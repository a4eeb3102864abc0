//! Stock reporters.

mod console;
mod recording;

pub use console::ConsoleReporter;
pub use recording::{Event, EventLog, RecordingReporter};

use crate::errors::EngineError;
use crate::reporter::Reporter;

/// Builds the reporter registered under `name`.
pub fn create(name: &str) -> Result<Box<dyn Reporter>, EngineError> {
    match name {
        "console" => Ok(Box::new(ConsoleReporter::stdout())),
        _ => Err(EngineError::UnknownReporter {
            name: name.to_string(),
        }),
    }
}
