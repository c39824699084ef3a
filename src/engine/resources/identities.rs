use crate::engine::armtype::{ArmResource, ResourceBody};

/// User-assigned identity created when the api model names one.
pub fn create_user_assigned_identities() -> ArmResource<ResourceBody> {
    ArmResource::new(
        "[variables('apiVersionManagedIdentity')]",
        ResourceBody::new(
            "[variables('userAssignedID')]",
            "Microsoft.ManagedIdentity/userAssignedIdentities",
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_shape() {
        let value = create_user_assigned_identities().to_value().unwrap();
        assert_eq!(value["type"], "Microsoft.ManagedIdentity/userAssignedIdentities");
        assert_eq!(value["location"], "[variables('location')]");
        assert!(value.get("properties").is_none());
    }
}
