//! Key vault holding the etcd encryption key when external KMS is enabled.

use serde_json::{Value, json};

use crate::api::ClusterSpec;
use crate::engine::armtype::{ArmResource, ResourceBody};

const KEY_PERMISSIONS: [&str; 5] = ["create", "encrypt", "decrypt", "get", "list"];

fn access_policy(object_id: String) -> Value {
    json!({
        "objectId": object_id,
        "permissions": { "keys": KEY_PERMISSIONS },
        "tenantId": "[variables('tenantID')]",
    })
}

/// Cluster key vault. Access goes to the user-assigned identity, each
/// master's system identity, or the service principal, in that order.
pub fn create_key_vault(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let k8s = spec.kubernetes_config();
    let master_count = spec.master_profile.as_ref().map_or(1, |m| m.count);

    let mut deps = Vec::new();
    let policies = if k8s.use_managed_identity && k8s.user_assigned_id_enabled() {
        deps.push("[variables('userAssignedIDReference')]".to_string());
        vec![access_policy(
            "[reference(variables('userAssignedIDReference'), variables('apiVersionManagedIdentity')).principalId]".to_string(),
        )]
    } else if k8s.use_managed_identity {
        (0..master_count)
            .map(|i| {
                deps.push(format!(
                    "[concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), '{i}')]"
                ));
                deps.push(format!(
                    "[concat('Microsoft.Authorization/roleAssignments/', guid(concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), '{i}', 'vmidentity')))]"
                ));
                access_policy(format!(
                    "[reference(concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), '{i}'), '2017-03-30', 'Full').identity.principalId]"
                ))
            })
            .collect()
    } else {
        vec![access_policy("[parameters('servicePrincipalObjectId')]".to_string())]
    };

    let body = ResourceBody::new("[variables('clusterKeyVaultName')]", "Microsoft.KeyVault/vaults").properties(json!({
        "accessPolicies": policies,
        "enabledForDeployment": false,
        "enabledForDiskEncryption": false,
        "enabledForTemplateDeployment": false,
        "sku": { "family": "A", "name": "[parameters('clusterKeyVaultSku')]" },
        "tenantId": "[variables('tenantID')]",
    }));
    ArmResource::new("[variables('apiVersionKeyVault')]", body).with_depends_on(deps)
}
