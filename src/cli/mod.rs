pub mod commands;
pub mod progress;
pub mod ui;
pub mod util;

pub use progress::{ProgressEvent, ProgressOptions, ProgressReporter};
pub use util::CommandContext;
