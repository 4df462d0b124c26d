pub mod ar;
pub mod measurements;
pub mod upload;
