use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Where a pose backend comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoseSource {
    /// HTTP inference service returning normalized keypoints.
    Remote(String),
    /// Local ONNX model file (requires the `onnx` feature).
    Model(PathBuf),
}

/// Pose estimation settings.
#[derive(Debug, Clone)]
pub struct PoseConfig {
    /// Primary backend. The service is not ready without one.
    pub primary: Option<PoseSource>,
    /// Optional secondary backend used for enhancement.
    pub secondary: Option<PoseSource>,
    /// Minimum keypoint confidence used by measurement and rendering.
    pub min_confidence: f32,
    /// Per-request timeout for remote backends, in seconds.
    pub timeout_secs: u64,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// PostgreSQL URL. The in-memory store is used when absent.
    pub database_url: Option<String>,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    pub pose: PoseConfig,
    /// Frames wider than this are downscaled before detection (default: `640`).
    pub max_frame_width: u32,
    /// JPEG quality of rendered frames (default: `85`).
    pub jpeg_quality: u8,
    /// Whether frames that do not say otherwise request enhancement.
    pub enhance_by_default: bool,
    /// Seconds without inbound messages before a session is pinged (default: `30`).
    pub session_idle_timeout_secs: u64,
    /// Seconds between protocol-level pings to every session (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// Optional JSON file overriding the measurement policy.
    pub measurement_policy_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                                       |
    /// |-------------------------------|-----------------------------------------------|
    /// | `HOST`                        | `0.0.0.0`                                     |
    /// | `PORT`                        | `8000`                                        |
    /// | `CORS_ORIGINS`                | `http://localhost:5173,http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                                          |
    /// | `DATABASE_URL`                | unset (in-memory store)                       |
    /// | `POSE_PRIMARY_URL`            | unset                                         |
    /// | `POSE_PRIMARY_MODEL`          | unset                                         |
    /// | `POSE_SECONDARY_URL`          | unset                                         |
    /// | `POSE_SECONDARY_MODEL`        | unset                                         |
    /// | `POSE_MIN_CONFIDENCE`         | `0.5`                                         |
    /// | `POSE_TIMEOUT_SECS`           | `5`                                           |
    /// | `MAX_FRAME_WIDTH`             | `640`                                         |
    /// | `JPEG_QUALITY`                | `85`                                          |
    /// | `ENHANCE_BY_DEFAULT`          | `false`                                       |
    /// | `SESSION_IDLE_TIMEOUT_SECS`   | `30`                                          |
    /// | `HEARTBEAT_INTERVAL_SECS`     | `30`                                          |
    /// | `JWT_SECRET`                  | required                                      |
    /// | `MEASUREMENT_POLICY_PATH`     | unset                                         |
    ///
    /// A `*_URL` setting takes precedence over the matching `*_MODEL` one.
    /// `JWT_SECRET` is required; the idle timeout and heartbeat interval
    /// must be positive.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173,http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let pose = PoseConfig {
            primary: pose_source(&var, "POSE_PRIMARY_URL", "POSE_PRIMARY_MODEL"),
            secondary: pose_source(&var, "POSE_SECONDARY_URL", "POSE_SECONDARY_MODEL"),
            min_confidence: parse_var(&var, "POSE_MIN_CONFIDENCE", 0.5)?,
            timeout_secs: positive_secs(&var, "POSE_TIMEOUT_SECS", 5)?,
        };
        if !(0.0..=1.0).contains(&pose.min_confidence) {
            return Err(ConfigError::Invalid {
                name: "POSE_MIN_CONFIDENCE",
                reason: "must be between 0 and 1".into(),
            });
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&var, "PORT", 8000)?,
            cors_origins,
            request_timeout_secs: positive_secs(&var, "REQUEST_TIMEOUT_SECS", 30)?,
            database_url: var("DATABASE_URL"),
            jwt: JwtConfig { secret },
            pose,
            max_frame_width: parse_var(&var, "MAX_FRAME_WIDTH", 640)?,
            jpeg_quality: parse_var(&var, "JPEG_QUALITY", 85)?,
            enhance_by_default: parse_var(&var, "ENHANCE_BY_DEFAULT", false)?,
            session_idle_timeout_secs: positive_secs(&var, "SESSION_IDLE_TIMEOUT_SECS", 30)?,
            heartbeat_interval_secs: positive_secs(&var, "HEARTBEAT_INTERVAL_SECS", 30)?,
            measurement_policy_path: var("MEASUREMENT_POLICY_PATH").map(PathBuf::from),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn parse_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("is not valid ({raw:?}: {e})"),
        }),
    }
}

fn positive_secs(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match parse_var(var, name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".into(),
        }),
        secs => Ok(secs),
    }
}

fn pose_source(
    var: &impl Fn(&str) -> Option<String>,
    url_var: &str,
    model_var: &str,
) -> Option<PoseSource> {
    var(url_var)
        .map(PoseSource::Remote)
        .or_else(|| var(model_var).map(|p| PoseSource::Model(PathBuf::from(p))))
}
