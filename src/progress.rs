use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};

/// A spinner for the image-loading stage.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.dim} {msg}")
                .unwrap(),
        );
        bar.set_message(message.into());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    /// Clear the spinner and print a `✔ message` line to stderr.
    pub fn finish(self, message: impl Into<String>) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", "✔".green(), message.into());
    }

    /// Clear the spinner and print a `✖ message` line to stderr.
    pub fn fail(self, message: impl Into<String>) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", "✖".red(), message.into());
    }
}
