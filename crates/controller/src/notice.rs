use core_types::View;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A user-facing outcome of an operation, with an optional view to go to next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub redirect: Option<View>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            redirect: None,
        }
    }

    pub fn with_redirect(mut self, redirect: Option<View>) -> Self {
        self.redirect = redirect;
        self
    }

    /// Records the notice in the log. The console already shows it, so this
    /// stays at debug and only reaches the log file or a raised `RUST_LOG`.
    pub fn log(&self) {
        let redirect = self.redirect.map(|v| v.path());
        tracing::debug!(level = ?self.level, ?redirect, "{}", self.message);
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged_at(max_level: tracing::Level, notice: &Notice) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(max_level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || notice.log());
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn notices_stay_off_the_default_console_log() {
        for notice in [Notice::success("Deployed"), Notice::info("Not signed in"), Notice::error("Failed to stop")] {
            assert_eq!(logged_at(tracing::Level::INFO, &notice), "");
        }
    }

    #[test]
    fn notices_reach_a_debug_log() {
        let notice = Notice::error("Failed to stop").with_redirect(Some(View::Dashboard));
        let line = logged_at(tracing::Level::DEBUG, &notice);
        assert!(line.contains("Failed to stop"));
        assert!(line.contains("Error"));
    }
}
