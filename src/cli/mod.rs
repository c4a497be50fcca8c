pub mod args;
pub mod history;

pub use args::{Cli, CliCommand, HistoryCliArgs, ShowCliArgs};
pub use history::{handle_history_command, handle_show_command};
