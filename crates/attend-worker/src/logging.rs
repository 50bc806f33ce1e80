//! Session lifecycle logging.

use attend_models::{SessionDate, SessionStatus};
use tracing::{error, info, Span};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Lifecycle events for one attendance session, tagged with its date.
#[derive(Debug, Clone, Copy)]
pub struct SessionLogger {
    session_date: SessionDate,
}

impl SessionLogger {
    pub fn new(session_date: SessionDate) -> Self {
        Self { session_date }
    }

    /// Span wrapping the capture worker.
    pub fn span(&self) -> Span {
        tracing::info_span!("session", session_date = %self.session_date)
    }

    pub fn started(&self, config: &EngineConfig) {
        info!(
            session_date = %self.session_date,
            votes_required = config.vote_required,
            detect_every = config.detect_every,
            max_secs = config.max_duration.as_secs(),
            "Session started"
        );
    }

    /// Final summary, from the status snapshot taken as the worker exits.
    pub fn finished(&self, status: &SessionStatus, result: &EngineResult<()>) {
        let confirmed = status.confirmed.len();
        let frames = status.frame_count;
        match result {
            Ok(()) => info!(
                session_date = %self.session_date,
                confirmed,
                frames,
                present = ?status.confirmed,
                "Session completed"
            ),
            Err(e) => error!(
                session_date = %self.session_date,
                confirmed,
                frames,
                present = ?status.confirmed,
                error = %e,
                "Session failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use attend_models::IdentityId;

    use super::*;
    use crate::error::EngineError;

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

    fn capture(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn status() -> SessionStatus {
        SessionStatus {
            confirmed: vec![IdentityId::from("24CS001"), IdentityId::from("24CS002")],
            frame_count: 42,
            ..SessionStatus::default()
        }
    }

    #[test]
    fn test_completion_carries_counts() {
        let logger = SessionLogger::new(SessionDate::parse("2026-02-20").unwrap());
        let out = capture(|| logger.finished(&status(), &Ok(())));

        assert!(out.contains("Session completed"), "{}", out);
        assert!(out.contains("session_date=2026-02-20"));
        assert!(out.contains("confirmed=2"));
        assert!(out.contains("frames=42"));
    }

    #[test]
    fn test_failure_carries_error() {
        let logger = SessionLogger::new(SessionDate::parse("2026-02-20").unwrap());
        let result = Err(EngineError::acquisition_failure("no device"));
        let out = capture(|| logger.finished(&status(), &result));

        assert!(out.contains("ERROR"), "{}", out);
        assert!(out.contains("Session failed"));
        assert!(out.contains("no device"));
        assert!(out.contains("confirmed=2"));
    }

    #[test]
    fn test_started_carries_config() {
        let logger = SessionLogger::new(SessionDate::parse("2026-02-21").unwrap());
        let config = EngineConfig {
            vote_required: 4,
            ..EngineConfig::default()
        };
        let out = capture(|| logger.started(&config));

        assert!(out.contains("votes_required=4"), "{}", out);
        assert!(out.contains("max_secs=600"));
    }
}
