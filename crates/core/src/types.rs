/// Database primary keys (PostgreSQL BIGSERIAL).
pub type DbId = i64;

/// Opaque user identity supplied by the identity service.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
