use serde_json::json;

use crate::engine::armtype::{ArmResource, CONTENT_VERSION, DEPLOYMENT_TEMPLATE_SCHEMA, ResourceBody};

/// Deployment id reported by Azure Stack for new clusters.
pub const AZURE_STACK_DEPLOY_TELEMETRY_PID: &str = "pid-1bda96ec-adf4-4eea-bb9a-8462de5475c0";

/// Empty nested deployment whose name carries the telemetry id.
pub fn create_azure_stack_telemetry(pid: &str) -> ArmResource<ResourceBody> {
    let mut body = ResourceBody::new(pid, "Microsoft.Resources/deployments").properties(json!({
        "mode": "Incremental",
        "template": {
            "$schema": DEPLOYMENT_TEMPLATE_SCHEMA,
            "contentVersion": CONTENT_VERSION,
            "resources": [],
        },
    }));
    body.location = None;
    ArmResource::new("2015-01-01", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_deployment_is_empty() {
        let value = create_azure_stack_telemetry(AZURE_STACK_DEPLOY_TELEMETRY_PID)
            .to_value()
            .unwrap();
        assert_eq!(value["name"], AZURE_STACK_DEPLOY_TELEMETRY_PID);
        assert_eq!(value["apiVersion"], "2015-01-01");
        assert!(value.get("location").is_none());
        assert_eq!(value["properties"]["template"]["resources"], json!([]));
    }
}
