//! The canonical sign-in message.
//!
//! The message is never stored. Verification rebuilds it from the stored
//! nonce and issuance time, so both sides must go through
//! [`sign_in_message`].

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::SIGN_IN_STATEMENT;

/// RFC 3339 in UTC at whole seconds, e.g. `2026-03-01T12:00:00Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Message a wallet signs to prove control of its address.
pub fn sign_in_message(nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "{}\n\nNonce: {}\nTimestamp: {}",
        SIGN_IN_STATEMENT,
        nonce,
        format_timestamp(issued_at)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn message_layout() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(
            sign_in_message("ab12cd34", at),
            "Sign in to OracleNet\n\nNonce: ab12cd34\nTimestamp: 2026-03-01T12:00:05Z"
        );
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let at = Utc::now();
        assert_eq!(sign_in_message("00", at), sign_in_message("00", at));
    }
}
