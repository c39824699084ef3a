//! Role assignments for managed identities.
//!
//! MSI assignments grant the user-assigned identity a role on the resource
//! group; system assignments grant each VM's system identity a role.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;

use crate::api::{AgentPoolProfile, ClusterSpec, MasterProfile};
use crate::engine::armtype::{
    ArmResource, CONTENT_VERSION, CopyLoop, DEPLOYMENT_TEMPLATE_SCHEMA, ResourceBody,
};

const ROLE_ASSIGNMENT_TYPE: &str = "Microsoft.Authorization/roleAssignments";
const USER_ASSIGNED_ID_DEPENDENCY: &str =
    "[concat('Microsoft.ManagedIdentity/userAssignedIdentities/', variables('userAssignedID'))]";
const USER_ASSIGNED_ID_PRINCIPAL: &str =
    "[reference(concat('Microsoft.ManagedIdentity/userAssignedIdentities/', variables('userAssignedID'))).principalId]";
const APP_GW_DEPENDENCIES: [&str; 2] = [
    "[concat('Microsoft.Network/applicationgateways/', variables('appGwName'))]",
    "[concat('Microsoft.ManagedIdentity/userAssignedIdentities/', variables('appGwICIdentityName'))]",
];
const APP_GW_IDENTITY_PRINCIPAL: &str =
    "[reference(variables('appGwICIdentityId'), variables('apiVersionManagedIdentity')).principalId]";

/// Built-in role granted to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRole {
    Contributor,
    Reader,
    ManagedIdentityOperator,
}

impl IdentityRole {
    pub fn definition_id(&self) -> &'static str {
        match self {
            Self::Contributor => "[variables('contributorRoleDefinitionId')]",
            Self::Reader => "[variables('readerRoleDefinitionId')]",
            Self::ManagedIdentityOperator => "[variables('managedIdentityOperatorRoleDefinitionId')]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: RoleAssignmentProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentProperties {
    pub role_definition_id: String,
    pub principal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn assignment(
    name: String,
    resource_type: &str,
    role: IdentityRole,
    principal_id: String,
    scope: Option<&str>,
    service_principal: bool,
) -> RoleAssignment {
    RoleAssignment {
        name,
        resource_type: resource_type.to_string(),
        properties: RoleAssignmentProperties {
            role_definition_id: role.definition_id().to_string(),
            principal_id,
            principal_type: service_principal.then(|| "ServicePrincipal".to_string()),
            scope: scope.map(str::to_string),
        },
    }
}

pub fn create_msi_role_assignment(role: IdentityRole) -> ArmResource<RoleAssignment> {
    ArmResource::new(
        "[variables('apiVersionAuthorizationUser')]",
        assignment(
            "[guid(concat(variables('userAssignedID'), 'roleAssignment', resourceGroup().id))]".to_string(),
            ROLE_ASSIGNMENT_TYPE,
            role,
            USER_ASSIGNED_ID_PRINCIPAL.to_string(),
            Some("[resourceGroup().id]"),
            true,
        ),
    )
    .depends_on(USER_ASSIGNED_ID_DEPENDENCY)
}

/// Contributor role for each availability-set master's system identity.
pub fn create_vmas_role_assignment() -> ArmResource<RoleAssignment> {
    let vm = "concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')))";
    ArmResource::new(
        "[variables('apiVersionAuthorizationSystem')]",
        assignment(
            "[guid(concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')), 'vmidentity'))]".to_string(),
            ROLE_ASSIGNMENT_TYPE,
            IdentityRole::Contributor,
            format!("[reference({}, '2017-03-30', 'Full').identity.principalId]", vm),
            None,
            true,
        ),
    )
    .with_copy(CopyLoop::masters("vmLoopNode"))
    .depends_on(format!("[{}]", vm))
}

pub fn create_agent_vmas_sys_role_assignment(profile: &AgentPoolProfile) -> ArmResource<RoleAssignment> {
    let pool = &profile.name;
    let vm = format!(
        "concat('Microsoft.Compute/virtualMachines/', variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')))"
    );
    ArmResource::new(
        "[variables('apiVersionAuthorizationSystem')]",
        assignment(
            format!("[guid(concat('Microsoft.Compute/virtualMachines/', variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')), 'vmidentity'))]"),
            ROLE_ASSIGNMENT_TYPE,
            IdentityRole::Reader,
            format!("[reference({vm}, '2017-03-30', 'Full').identity.principalId]"),
            None,
            true,
        ),
    )
    .with_copy(CopyLoop::pool(pool, "vmLoopNode"))
    .depends_on(format!("[{vm}]"))
}

pub fn create_agent_vmss_sys_role_assignment(profile: &AgentPoolProfile) -> ArmResource<RoleAssignment> {
    let pool = &profile.name;
    ArmResource::new(
        "[variables('apiVersionAuthorizationSystem')]",
        assignment(
            format!("[guid(concat('Microsoft.Compute/virtualMachineScaleSets/', variables('{pool}VMNamePrefix'), 'vmidentity'))]"),
            ROLE_ASSIGNMENT_TYPE,
            IdentityRole::Reader,
            format!("[reference(concat('Microsoft.Compute/virtualMachineScaleSets/', variables('{pool}VMNamePrefix')), '2017-03-30', 'Full').identity.principalId]"),
            None,
            true,
        ),
    )
    .depends_on(format!("[concat('Microsoft.Compute/virtualMachineScaleSets/', variables('{pool}VMNamePrefix'))]"))
}

/// Operator access on the ingress controller identity for the cluster identity.
pub fn create_app_gw_identity_operator_role_assignment(spec: &ClusterSpec) -> ArmResource<RoleAssignment> {
    let principal = if spec.kubernetes_config().use_managed_identity {
        USER_ASSIGNED_ID_PRINCIPAL.to_string()
    } else {
        spec.service_principal_profile
            .as_ref()
            .map(|sp| sp.object_id.clone())
            .unwrap_or_default()
    };
    ArmResource::new(
        "[variables('apiVersionAuthorizationSystem')]",
        assignment(
            "[concat(variables('appGwICIdentityName'), '/Microsoft.Authorization/', guid(resourceGroup().id, 'aksidentityaccess'))]".to_string(),
            "Microsoft.ManagedIdentity/userAssignedIdentities/providers/roleAssignments",
            IdentityRole::ManagedIdentityOperator,
            principal,
            Some("[variables('appGwICIdentityId')]"),
            true,
        ),
    )
    .with_depends_on(APP_GW_DEPENDENCIES.iter().map(|d| d.to_string()).collect())
}

pub fn create_app_gw_identity_resource_group_read_role_assignment() -> ArmResource<RoleAssignment> {
    ArmResource::new(
        "[variables('apiVersionAuthorizationSystem')]",
        assignment(
            "[guid(resourceGroup().id, 'identityrgaccess')]".to_string(),
            ROLE_ASSIGNMENT_TYPE,
            IdentityRole::Reader,
            APP_GW_IDENTITY_PRINCIPAL.to_string(),
            Some("[resourceGroup().id]"),
            false,
        ),
    )
    .with_depends_on(APP_GW_DEPENDENCIES.iter().map(|d| d.to_string()).collect())
}

pub fn create_app_gw_identity_gateway_write_role_assignment() -> ArmResource<RoleAssignment> {
    ArmResource::new(
        "[variables('apiVersionAuthorizationSystem')]",
        assignment(
            "[concat(variables('appGwName'), '/Microsoft.Authorization/', guid(resourceGroup().id, 'identityappgwaccess'))]".to_string(),
            "Microsoft.Network/applicationgateways/providers/roleAssignments",
            IdentityRole::Contributor,
            APP_GW_IDENTITY_PRINCIPAL.to_string(),
            Some("[variables('appGwId')]"),
            false,
        ),
    )
    .with_depends_on(APP_GW_DEPENDENCIES.iter().map(|d| d.to_string()).collect())
}

/// Nested deployments granting every master's system identity network
/// contributor on each distinct custom agent vnet. Pools whose subnet id is
/// not a full resource path are skipped.
pub fn create_master_role_assignments_for_agent_pools(
    master: &MasterProfile,
    pools: &[AgentPoolProfile],
) -> Vec<ArmResource<ResourceBody>> {
    let master_deps: Vec<String> = (0..master.count)
        .map(|i| format!("[concat(variables('masterVMNamePrefix'), {})]", i))
        .collect();

    let mut seen = BTreeSet::new();
    let mut deployments = Vec::new();
    for pool in pools {
        let elements: Vec<&str> = pool.vnet_subnet_id.split('/').collect();
        if elements.len() < 9 {
            continue;
        }
        if !seen.insert(elements[..9].join("/")) {
            continue;
        }

        let assignments: Vec<Value> = (0..master.count)
            .map(|i| {
                let reference = format!(
                    "reference(resourceId(resourceGroup().name, 'Microsoft.Compute/virtualMachines', concat(variables('masterVMNamePrefix'), {})), '2017-03-30', 'Full').identity.principalId",
                    i
                );
                json!({
                    "apiVersion": "[variables('apiVersionAuthorizationSystem')]",
                    "name": format!("[concat(variables('{}Vnet'), '/Microsoft.Authorization/', guid(uniqueString({})))]", pool.name, reference),
                    "type": "Microsoft.Network/virtualNetworks/providers/roleAssignments",
                    "properties": {
                        "roleDefinitionId": "[variables('networkContributorRoleDefinitionId')]",
                        "principalId": format!("[{}]", reference),
                    },
                })
            })
            .collect();

        let mut body = ResourceBody::new(
            format!("[concat('masterMsiRoleAssignment-', variables('{}VMNamePrefix'))]", pool.name),
            "Microsoft.Resources/deployments",
        )
        .properties(json!({
            "mode": "Incremental",
            "template": {
                "$schema": DEPLOYMENT_TEMPLATE_SCHEMA,
                "contentVersion": CONTENT_VERSION,
                "resources": assignments,
            },
        }));
        body.location = None;
        body.resource_group = Some(format!("[variables('{}SubnetResourceGroup')]", pool.name));
        deployments.push(ArmResource::new("2017-05-10", body).with_depends_on(master_deps.clone()));
    }
    deployments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vmas_role_assignment_loops_over_masters() {
        let res = create_vmas_role_assignment();
        assert_eq!(res.copy.as_ref().unwrap().name, "vmLoopNode");
        assert_eq!(
            res.body.properties.role_definition_id,
            "[variables('contributorRoleDefinitionId')]"
        );
        assert_eq!(
            res.body.name,
            "[guid(concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')), 'vmidentity'))]"
        );
    }

    #[test]
    fn test_agent_vmss_role_is_reader() {
        let profile = AgentPoolProfile {
            name: "pool1".to_string(),
            ..Default::default()
        };
        let res = create_agent_vmss_sys_role_assignment(&profile);
        assert!(res.copy.is_none());
        assert_eq!(res.body.properties.role_definition_id, IdentityRole::Reader.definition_id());
    }

    #[test]
    fn test_master_role_assignments_dedupe_vnets() {
        let subnet = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/agents";
        let pools = vec![
            AgentPoolProfile {
                name: "pool1".to_string(),
                vnet_subnet_id: subnet.to_string(),
                ..Default::default()
            },
            AgentPoolProfile {
                name: "pool2".to_string(),
                vnet_subnet_id: subnet.to_string(),
                ..Default::default()
            },
            AgentPoolProfile {
                name: "pool3".to_string(),
                vnet_subnet_id: "bogus".to_string(),
                ..Default::default()
            },
        ];
        let master = MasterProfile {
            count: 3,
            ..Default::default()
        };
        let deployments = create_master_role_assignments_for_agent_pools(&master, &pools);
        assert_eq!(deployments.len(), 1);
        let deployment = &deployments[0];
        assert_eq!(deployment.depends_on.len(), 3);
        let resources = &deployment.body.properties.as_ref().unwrap()["template"]["resources"];
        assert_eq!(resources.as_array().unwrap().len(), 3);
    }
}
