use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

pub mod version;

/// Current UTC time as an RFC 3339 string, e.g. `2026-10-18T21:04:05.123Z`.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

pub fn new_session_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_rfc3339() {
        let now = now_rfc3339();
        assert!(OffsetDateTime::parse(&now, &Rfc3339).is_ok(), "{now}");
    }

    #[test]
    fn session_ids_are_unique_and_prefixed() {
        let a = new_session_id("ws");
        let b = new_session_id("ws");
        assert!(a.starts_with("ws-"));
        assert_ne!(a, b);
    }
}
