use chromiumoxide::error::CdpError;
use course_watch::SessionError;

const CONNECTION_LOST_MARKERS: [&str; 6] = [
    "alreadyclosed",
    "connectionclosed",
    "connection closed",
    "closed connection",
    "channel closed",
    "receiver is gone",
];

/// Map a protocol error raised while doing `context` onto a [`SessionError`].
pub fn session_error(context: &str, err: CdpError) -> SessionError {
    classify(context, &err.to_string())
}

/// Classify a protocol failure message. A dead browser connection is
/// reported as [`SessionError::ConnectionLost`] so recovery skips the refresh.
pub fn classify(context: &str, message: &str) -> SessionError {
    let lowered = message.to_lowercase();
    let detail = format!("{}: {}", context, message);

    if CONNECTION_LOST_MARKERS.iter().any(|m| lowered.contains(m)) {
        SessionError::ConnectionLost(detail)
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        SessionError::Timeout(detail)
    } else {
        SessionError::Browser(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_connection_is_connection_lost() {
        let err = classify("reload", "WebSocket protocol error: Connection closed normally");
        assert!(err.is_connection_lost());

        let err = classify("goto", "Ws(AlreadyClosed)");
        assert!(matches!(err, SessionError::ConnectionLost(_)));
    }

    #[test]
    fn test_timeout_and_other_failures() {
        assert!(matches!(
            classify("evaluate", "Request timed out."),
            SessionError::Timeout(_)
        ));

        let err = classify("evaluate", "Uncaught TypeError: row is null");
        assert!(matches!(err, SessionError::Browser(_)));
        assert!(err.to_string().contains("evaluate: Uncaught TypeError"));
    }
}
