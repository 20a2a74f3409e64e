//! Galaxy API types

use serde::{Deserialize, Serialize};

/// Version reported by `GET /api/version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalaxyVersion {
    /// Major version, e.g. `24.1`
    pub version_major: String,
    /// Minor version
    pub version_minor: String,
}
