/// Where user-visible messages go (a status bar, the window title, a log).
pub trait StatusSink {
    fn set_message(&mut self, message: String);
}

impl<F: FnMut(String)> StatusSink for F {
    fn set_message(&mut self, message: String) {
        self(message)
    }
}

/// Sends status messages to the log at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn set_message(&mut self, message: String) {
        log::warn!("{}", message);
    }
}
