use serde::{Deserialize, Serialize};

use crate::message::PROTOCOL_VERSION;

/// HTTP endpoint paths for the Cellar protocol, in axum route syntax.
pub mod endpoints {
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
    pub const NAMESPACES: &str = "/v1/namespaces";
    /// `POST` appends a version.
    pub const CELL: &str = "/v1/namespaces/:namespace/cells/:row_key/:column_key";
    pub const CELL_LATEST: &str = "/v1/namespaces/:namespace/cells/:row_key/:column_key/latest";
    pub const CELL_VERSION: &str =
        "/v1/namespaces/:namespace/cells/:row_key/:column_key/versions/:ref_key";

    /// Concrete path of a cell, for clients. Each key is percent-encoded
    /// as a single path segment.
    pub fn cell(namespace: &str, row_key: &str, column_key: &str) -> String {
        use urlencoding::encode;
        format!(
            "/v1/namespaces/{}/cells/{}/{}",
            encode(namespace),
            encode(row_key),
            encode(column_key)
        )
    }

    pub fn cell_latest(namespace: &str, row_key: &str, column_key: &str) -> String {
        format!("{}/latest", cell(namespace, row_key, column_key))
    }

    pub fn cell_version(namespace: &str, row_key: &str, column_key: &str, ref_key: i64) -> String {
        format!("{}/versions/{ref_key}", cell(namespace, row_key, column_key))
    }
}

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Server identification returned by `GET /v1/info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub protocol_version: u32,
    pub storage_backend: String,
}

/// Provisioned namespaces, sorted by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacesResponse {
    pub namespaces: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert_eq!(h.status, "ok");
        assert_eq!(h.protocol_version, 1);
    }

    #[test]
    fn concrete_paths_match_routes() {
        assert_eq!(
            endpoints::cell_latest("users", "R1", "BASIC_INFO"),
            "/v1/namespaces/users/cells/R1/BASIC_INFO/latest"
        );
        assert_eq!(
            endpoints::cell_version("users", "R1", "BASIC_INFO", 2),
            "/v1/namespaces/users/cells/R1/BASIC_INFO/versions/2"
        );
        assert!(endpoints::CELL_VERSION.ends_with("/versions/:ref_key"));
    }

    #[test]
    fn keys_are_encoded_as_single_segments() {
        assert_eq!(
            endpoints::cell("users", "a/b", "profile/avatar url"),
            "/v1/namespaces/users/cells/a%2Fb/profile%2Favatar%20url"
        );
        assert_eq!(
            endpoints::cell_latest("users", "R1", "50%"),
            "/v1/namespaces/users/cells/R1/50%25/latest"
        );
    }
}
