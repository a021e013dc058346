//! Automation server settings (`[opcua]`).

use std::{path::PathBuf, time::Duration};

use opcgate_opcua::{ClientSettings, NodeAddress};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_distinct_nodes"))]
pub struct OpcUaConfig {
    /// Server endpoint, `opc.tcp://host:port[/path]`.
    #[validate(custom(function = "validate_endpoint"))]
    pub endpoint: String,

    /// Boolean node, read only from the gateway.
    pub flag_node: NodeAddress,

    /// Signed integer node, read and written.
    pub counter_node: NodeAddress,

    #[validate(length(min = 1, max = 128))]
    pub application_name: String,

    #[validate(length(min = 1, max = 256))]
    pub application_uri: String,

    pub pki_dir: PathBuf,

    /// Bound for connecting and for each read/write, in milliseconds.
    #[validate(range(min = 100, max = 60_000))]
    pub request_timeout_ms: u64,
}

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    let host = endpoint.strip_prefix("opc.tcp://").unwrap_or_default();
    if host.is_empty() {
        let mut err = ValidationError::new("invalid_endpoint");
        err.message =
            Some(format!("Endpoint must look like opc.tcp://host:port, got '{endpoint}'").into());
        return Err(err);
    }
    Ok(())
}

fn validate_distinct_nodes(config: &OpcUaConfig) -> Result<(), ValidationError> {
    if config.flag_node == config.counter_node {
        let mut err = ValidationError::new("same_node");
        err.message = Some("flag_node and counter_node must differ".into());
        return Err(err);
    }
    Ok(())
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            endpoint: "opc.tcp://localhost:4840".into(),
            flag_node: NodeAddress::numeric(1, 1000),
            counter_node: NodeAddress::numeric(1, 1001),
            application_name: "opcgate".into(),
            application_uri: "urn:opcgate".into(),
            pki_dir: PathBuf::from("./pki"),
            request_timeout_ms: 5_000,
        }
    }
}

impl OpcUaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            application_name: self.application_name.clone(),
            application_uri: self.application_uri.clone(),
            pki_dir: self.pki_dir.clone(),
            request_timeout: self.request_timeout(),
        }
    }
}
