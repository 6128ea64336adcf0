//! Server and backend identity records.

use serde::Deserialize;

/// Identity announced by the server in its `coolserver` greeting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerIdentity {
    /// Server instance identifier.
    pub id: String,
    /// Product version string.
    pub version: String,
    /// Source revision of the server build.
    pub hash: String,
    /// Wire protocol version spoken by the server.
    pub protocol: String,
    /// Free-form build options.
    pub options: String,
    /// Time zone of the server host.
    #[serde(alias = "Timezone")]
    pub time_zone: String,
}

impl ServerIdentity {
    /// Whether a server has been identified.
    #[must_use]
    pub fn is_known(&self) -> bool { !self.id.is_empty() }

    /// Whether `other` names a different server instance or build.
    #[must_use]
    pub fn differs_from(&self, other: &ServerIdentity) -> bool {
        self.id != other.id || self.version != other.version || self.hash != other.hash
    }
}

/// Version details of the document backend (`lokitversion`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendVersion {
    /// Product name of the backend.
    #[serde(rename = "ProductName")]
    pub product_name: String,
    /// Product version.
    #[serde(rename = "ProductVersion")]
    pub product_version: String,
    /// Version suffix such as `.0.alpha`.
    #[serde(rename = "ProductExtension")]
    pub product_extension: String,
    /// Backend build identifier.
    #[serde(rename = "BuildId")]
    pub build_id: String,
    /// Size of the dialog image cache negotiated by the server.
    pub tunnelled_dialog_image_cache_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_time_zone_spellings() {
        let a: ServerIdentity =
            serde_json::from_str(r#"{"Id":"a","Timezone":"UTC"}"#).expect("json");
        let b: ServerIdentity =
            serde_json::from_str(r#"{"Id":"a","TimeZone":"UTC"}"#).expect("json");
        assert_eq!(a, b);
        assert_eq!(a.time_zone, "UTC");
    }

    #[test]
    fn identity_change_is_detected() {
        let first: ServerIdentity = serde_json::from_str(r#"{"Id":"srv1"}"#).expect("json");
        let second: ServerIdentity = serde_json::from_str(r#"{"Id":"srv2"}"#).expect("json");
        assert!(first.differs_from(&second));
        assert!(!first.differs_from(&first.clone()));
    }

    #[test]
    fn backend_version_reads_cache_size() {
        let v: BackendVersion = serde_json::from_str(
            r#"{"ProductName":"Office","ProductVersion":"24.04","BuildId":"abc","tunnelled_dialog_image_cache_size":100}"#,
        )
        .expect("json");
        assert_eq!(v.product_name, "Office");
        assert_eq!(v.tunnelled_dialog_image_cache_size, 100);
    }
}
