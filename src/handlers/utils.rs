use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::api::ClusterSpec;

/// Parses an API model document.
///
/// Accepts either the bare cluster properties or the versioned envelope
/// `{"apiVersion": ..., "location": ..., "properties": {...}}`. An envelope
/// location is used when the properties carry none.
pub fn parse_api_model(text: &str) -> crate::Result<ClusterSpec> {
    let mut document: Value = serde_json::from_str(text)?;
    if let Some(properties) = document.get_mut("properties").map(Value::take) {
        let location = document.get("location").cloned();
        let mut spec: ClusterSpec = serde_json::from_value(properties)?;
        if spec.location.is_empty() {
            if let Some(Value::String(location)) = location {
                spec.location = location;
            }
        }
        return Ok(spec);
    }
    Ok(serde_json::from_value(document)?)
}

/// Reads and parses the API model at `path`.
pub fn load_api_model(path: &Path) -> crate::Result<ClusterSpec> {
    log::info!("loading api model {}", path.display());
    let text = fs::read_to_string(path)?;
    parse_api_model(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_location_fills_properties() {
        let spec = parse_api_model(
            r#"{
                "apiVersion": "vlabs",
                "location": "eastus",
                "properties": {
                    "masterProfile": { "count": 3, "dnsPrefix": "demo" }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(spec.location, "eastus");
        assert_eq!(spec.master_profile.unwrap().count, 3);
    }

    #[test]
    fn test_bare_properties() {
        let spec = parse_api_model(r#"{ "location": "westus2", "agentPoolProfiles": [] }"#).unwrap();
        assert_eq!(spec.location, "westus2");
        assert!(spec.master_profile.is_none());
    }

    #[test]
    fn test_invalid_model() {
        assert!(matches!(
            parse_api_model("{ not json"),
            Err(crate::ArmgenError::ApiModel(_))
        ));
    }
}
