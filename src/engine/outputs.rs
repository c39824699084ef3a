//! `outputs` section of the deployment template.

use serde_json::{Map, Value, json};

use crate::api::addons::APP_GATEWAY_INGRESS_ADDON;
use crate::api::{ClusterSpec, is_addon_enabled};

pub type OutputsMap = Map<String, Value>;

fn add_output(outputs: &mut OutputsMap, name: impl Into<String>, output_type: &str, value: impl Into<Value>) {
    outputs.insert(
        name.into(),
        json!({
            "type": output_type,
            "value": value.into(),
        }),
    );
}

/// Builds the template outputs for the cluster.
pub fn get_template_outputs(spec: &ClusterSpec) -> OutputsMap {
    let mut outputs = OutputsMap::new();

    for (name, variable) in [
        ("resourceGroup", "resourceGroup"),
        ("vnetResourceGroup", "virtualNetworkResourceGroupName"),
        ("subnetName", "subnetName"),
        ("securityGroupName", "nsgName"),
        ("virtualNetworkName", "virtualNetworkName"),
        ("routeTableName", "routeTableName"),
        ("primaryAvailabilitySetName", "primaryAvailabilitySetName"),
        ("primaryScaleSetName", "primaryScaleSetName"),
    ] {
        add_output(&mut outputs, name, "string", format!("[variables('{}')]", variable));
    }

    if !spec.is_hosted_master() {
        let fqdn = if spec.is_private_cluster() {
            String::new()
        } else {
            "[reference(concat('Microsoft.Network/publicIPAddresses/', variables('masterPublicIPAddressName'))).dnsSettings.fqdn]".to_string()
        };
        add_output(&mut outputs, "masterFQDN", "string", fqdn);

        if spec.has_vmas_storage_account_pools() {
            add_output(
                &mut outputs,
                "agentStorageAccountSuffix",
                "string",
                "[variables('storageAccountBaseName')]",
            );
            add_output(
                &mut outputs,
                "agentStorageAccountPrefixes",
                "array",
                "[variables('storageAccountPrefixes')]",
            );
        }
    }

    for profile in spec
        .agent_pool_profiles
        .iter()
        .filter(|p| p.is_availability_sets() && p.is_storage_account())
    {
        let name = &profile.name;
        add_output(
            &mut outputs,
            format!("{}StorageAccountOffset", name),
            "int",
            format!("[variables('{}StorageAccountOffset')]", name),
        );
        add_output(
            &mut outputs,
            format!("{}StorageAccountCount", name),
            "int",
            format!("[variables('{}StorageAccountsCount')]", name),
        );
        add_output(
            &mut outputs,
            format!("{}SubnetName", name),
            "string",
            format!("[variables('{}SubnetName')]", name),
        );
    }

    if is_addon_enabled(spec, APP_GATEWAY_INGRESS_ADDON) {
        add_output(&mut outputs, "applicationGatewayName", "string", "[variables('appGwName')]");
        add_output(
            &mut outputs,
            "appGwIdentityResourceId",
            "string",
            "[variables('appGwICIdentityId')]",
        );
        add_output(
            &mut outputs,
            "appGwIdentityClientId",
            "string",
            "[reference(variables('appGwICIdentityId'), variables('apiVersionManagedIdentity')).clientId]",
        );
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AgentPoolProfile, AvailabilityProfile, HostedMasterProfile, MasterProfile, PrivateCluster,
        StorageProfile,
    };

    fn spec() -> ClusterSpec {
        ClusterSpec {
            master_profile: Some(MasterProfile::default()),
            agent_pool_profiles: vec![AgentPoolProfile {
                name: "agentpool1".to_string(),
                availability_profile: AvailabilityProfile::AvailabilitySet,
                storage_profile: StorageProfile::StorageAccount,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_storage_account_pool_outputs() {
        let outputs = get_template_outputs(&spec());
        assert_eq!(outputs["agentpool1StorageAccountOffset"]["type"], "int");
        assert_eq!(
            outputs["agentpool1StorageAccountCount"]["value"],
            "[variables('agentpool1StorageAccountsCount')]"
        );
        assert_eq!(outputs["agentStorageAccountPrefixes"]["type"], "array");
        assert!(outputs["masterFQDN"]["value"].as_str().unwrap().contains("dnsSettings.fqdn"));
    }

    #[test]
    fn test_private_cluster_fqdn_is_empty() {
        let mut spec = spec();
        spec.orchestrator_profile.kubernetes_config.private_cluster = Some(PrivateCluster {
            enabled: true,
            jumpbox_profile: None,
        });
        let outputs = get_template_outputs(&spec);
        assert_eq!(outputs["masterFQDN"]["value"], "");
    }

    #[test]
    fn test_hosted_master_has_no_fqdn() {
        let mut spec = spec();
        spec.master_profile = None;
        spec.hosted_master_profile = Some(HostedMasterProfile::default());
        let outputs = get_template_outputs(&spec);
        assert!(!outputs.contains_key("masterFQDN"));
        assert!(!outputs.contains_key("agentStorageAccountSuffix"));
        // per-pool outputs do not depend on the master kind
        assert!(outputs.contains_key("agentpool1SubnetName"));
        assert_eq!(outputs["securityGroupName"]["value"], "[variables('nsgName')]");
    }
}
