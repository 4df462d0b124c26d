//! Well-known role name constants carried in the `role` claim.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
