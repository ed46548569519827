use time::OffsetDateTime;
use uuid::Uuid;

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// An opaque token handed out for self-registration (e.g. behind a QR code).
pub fn generate_token() -> String {
    Uuid::new_v4().to_simple().to_string()
}
