//! Client identity and limits for the OPC UA binding.

use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub application_name: String,
    pub application_uri: String,
    /// Where the client keeps its (self-signed) certificate.
    pub pki_dir: PathBuf,
    /// Bound for connect and for every read/write/resolve.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_name: "opcgate".into(),
            application_uri: "urn:opcgate".into(),
            pki_dir: PathBuf::from("./pki"),
            request_timeout: Duration::from_secs(5),
        }
    }
}
