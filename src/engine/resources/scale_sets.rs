//! Virtual machine scale sets for masters and agent pools.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use super::virtual_machines::{linux_ssh_keys, vm_identity, windows_image_reference};
use super::vm_extensions::{
    agent_cse_command, billing_extension_type, master_cse_command, outbound_connectivity_check,
    windows_cse_command,
};
use crate::api::{AgentPoolProfile, ClusterSpec};
use crate::engine::armtype::{ArmResource, ResourceBody};

const VMSS_TYPE: &str = "Microsoft.Compute/virtualMachineScaleSets";

fn vmss_extension(name: &str, publisher: &str, kind: &str, version: &str, command: Option<&str>) -> Value {
    let mut properties = json!({
        "autoUpgradeMinorVersion": true,
        "publisher": publisher,
        "settings": {},
        "type": kind,
        "typeHandlerVersion": version,
    });
    if let Some(command) = command {
        properties["protectedSettings"] = json!({ "commandToExecute": command });
    }
    json!({ "name": name, "properties": properties })
}

fn base_properties(single_placement_group: Option<bool>) -> Value {
    let mut properties = json!({
        "overprovision": false,
        "upgradePolicy": { "mode": "Manual" },
    });
    if let Some(spg) = single_placement_group {
        properties["singlePlacementGroup"] = json!(spg);
    }
    properties
}

/// Master scale set, one instance per master behind NAT pools.
pub fn create_master_vmss(spec: &ClusterSpec, custom_data: &str) -> ArmResource<ResourceBody> {
    let master = spec.master_profile.clone().unwrap_or_default();
    let k8s = spec.kubernetes_config();

    let mut deps = vec![if master.is_custom_vnet() {
        "[variables('nsgID')]".to_string()
    } else {
        "[variables('vnetID')]".to_string()
    }];
    if master.has_multiple_nodes() {
        deps.push("[variables('masterInternalLbName')]".to_string());
    }
    if master.cosmos_etcd {
        deps.push("[resourceId('Microsoft.DocumentDB/databaseAccounts/', variables('cosmosAccountName'))]".to_string());
    }
    deps.push("[variables('masterLbID')]".to_string());

    let ip_configurations: Vec<Value> = (1..=master.count.max(1))
        .map(|i| {
            let mut props = json!({ "subnet": { "id": "[variables('vnetSubnetIDMaster')]" } });
            if i == 1 {
                let mut pools = vec![json!({
                    "id": "[concat(variables('masterLbID'), '/backendAddressPools/', variables('masterLbBackendPoolName'))]",
                })];
                if master.has_multiple_nodes() {
                    pools.push(json!({
                        "id": "[concat(variables('masterInternalLbID'), '/backendAddressPools/', variables('masterLbBackendPoolName'))]",
                    }));
                }
                props["primary"] = json!(true);
                props["loadBalancerBackendAddressPools"] = Value::Array(pools);
                props["loadBalancerInboundNatPools"] = json!([{
                    "id": "[concat(variables('masterLbID'),'/inboundNatPools/SSH-', variables('masterVMNamePrefix'), 'natpools')]",
                }]);
            } else {
                props["primary"] = json!(false);
            }
            json!({ "name": format!("ipconfig{}", i), "properties": props })
        })
        .collect();

    let mut nic_props = json!({ "primary": true, "ipConfigurations": ip_configurations });
    if master.is_custom_vnet() {
        nic_props["networkSecurityGroup"] = json!({ "id": "[variables('nsgID')]" });
    }
    if spec.linux_profile.as_ref().is_some_and(|l| l.has_custom_nodes_dns()) {
        nic_props["dnsSettings"] = json!({ "dnsServers": ["[parameters('dnsServer')]"] });
    }
    if spec.orchestrator_profile.is_azure_cni() {
        nic_props["enableIPForwarding"] = json!(true);
    }

    let custom_image = master
        .image_ref
        .as_ref()
        .is_some_and(|r| !r.name.is_empty() && !r.resource_group.is_empty());
    let mut storage = Map::new();
    if custom_image {
        storage.insert(
            "imageReference".to_string(),
            json!({ "id": "[resourceId(parameters('osImageResourceGroup'), 'Microsoft.Compute/images', parameters('osImageName'))]" }),
        );
    } else {
        let etcd_size: u32 = k8s.etcd_disk_size_gb.parse().unwrap_or_default();
        storage.insert(
            "dataDisks".to_string(),
            json!([{ "createOption": "Empty", "diskSizeGB": etcd_size, "lun": 0 }]),
        );
        storage.insert(
            "imageReference".to_string(),
            json!({
                "offer": "[parameters('osImageOffer')]",
                "publisher": "[parameters('osImagePublisher')]",
                "sku": "[parameters('osImageSku')]",
                "version": "[parameters('osImageVersion')]",
            }),
        );
    }
    let mut os_disk = json!({ "caching": "ReadWrite", "createOption": "FromImage" });
    if master.os_disk_size_gb > 0 {
        os_disk["diskSizeGB"] = json!(master.os_disk_size_gb);
    }
    storage.insert("osDisk".to_string(), os_disk);

    let mut extensions = Vec::new();
    if k8s.use_managed_identity {
        let mut ext = vmss_extension(
            "[concat(variables('masterVMNamePrefix'), 'vmss-ManagedIdentityExtension')]",
            "Microsoft.ManagedIdentity",
            "ManagedIdentityExtensionForLinux",
            "1.0",
            None,
        );
        ext["properties"]["settings"] = json!({ "port": 50343 });
        ext["properties"]["protectedSettings"] = json!({});
        extensions.push(ext);
    }
    let command = master_cse_command(&outbound_connectivity_check(spec, master.is_coreos()));
    extensions.push(vmss_extension(
        "[concat(variables('masterVMNamePrefix'), 'vmssCSE')]",
        "Microsoft.Azure.Extensions",
        "CustomScript",
        "2.0",
        Some(&command),
    ));
    if spec.is_aks_billing_enabled() {
        extensions.push(vmss_extension(
            "[concat(variables('masterVMNamePrefix'), 'vmss-computeAksLinuxBilling')]",
            "Microsoft.AKS",
            "Compute.AKS-Engine.Linux.Billing",
            "1.0",
            None,
        ));
    }

    let mut properties = base_properties(None);
    properties["virtualMachineProfile"] = json!({
        "extensionProfile": { "extensions": extensions },
        "networkProfile": {
            "networkInterfaceConfigurations": [{
                "name": "[concat(variables('masterVMNamePrefix'), 'netintconfig')]",
                "properties": nic_props,
            }],
        },
        "osProfile": {
            "adminUsername": "[parameters('linuxAdminUsername')]",
            "computerNamePrefix": "[concat(variables('masterVMNamePrefix'), 'vmss')]",
            "customData": custom_data,
            "linuxConfiguration": {
                "disablePasswordAuthentication": true,
                "ssh": { "publicKeys": linux_ssh_keys(spec) },
            },
        },
        "storageProfile": Value::Object(storage),
    });

    let mut body = ResourceBody::new("[concat(variables('masterVMNamePrefix'), 'vmss')]", VMSS_TYPE)
        .properties(properties);
    body.sku = Some(json!({
        "capacity": master.count,
        "name": "[parameters('masterVMSize')]",
        "tier": "Standard",
    }));
    body.tags = BTreeMap::from([
        (
            "creationSource".to_string(),
            "[concat(parameters('generatorCode'), '-', variables('masterVMNamePrefix'), 'vmss')]".to_string(),
        ),
        ("resourceNameSuffix".to_string(), "[parameters('nameSuffix')]".to_string()),
        ("orchestrator".to_string(), "[variables('orchestratorNameVersionTag')]".to_string()),
        ("aksEngineVersion".to_string(), "[parameters('aksEngineVersion')]".to_string()),
        ("poolName".to_string(), "master".to_string()),
    ]);
    if master.has_availability_zones() {
        body.zones = Some(vec!["[parameters('availabilityZones')]".to_string()]);
    }
    if k8s.user_assigned_id_enabled() {
        body.identity = Some(vm_identity(true));
    }

    ArmResource::new("[variables('apiVersionCompute')]", body).with_depends_on(deps)
}

fn vmss_data_disks(profile: &AgentPoolProfile) -> Vec<Value> {
    profile
        .disk_sizes_gb
        .iter()
        .enumerate()
        .map(|(i, size)| {
            let mut disk = json!({
                "caching": "ReadOnly",
                "createOption": "Empty",
                "diskSizeGB": size,
                "lun": i,
            });
            if profile.is_storage_account() {
                disk["name"] = json!(format!(
                    "[concat(variables('{}VMNamePrefix'), copyIndex(),'-datadisk{}')]",
                    profile.name, i
                ));
            }
            disk
        })
        .collect()
}

/// Agent pool scale set.
pub fn create_agent_vmss(
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
    custom_data: &str,
) -> ArmResource<ResourceBody> {
    let k8s = spec.kubernetes_config();
    let pool = &profile.name;
    let prefix = format!("[variables('{pool}VMNamePrefix')]");

    let dep = if profile.is_custom_vnet() {
        "[variables('nsgID')]"
    } else {
        "[variables('vnetID')]"
    };

    let ip_configurations: Vec<Value> = (1..=profile.ip_address_count.max(1))
        .map(|i| {
            let mut props = json!({ "subnet": { "id": format!("[variables('{pool}VnetSubnetID')]") } });
            if i == 1 {
                props["primary"] = json!(true);
            }
            json!({ "name": format!("ipconfig{}", i), "properties": props })
        })
        .collect();
    let mut nic_props = json!({ "primary": true, "ipConfigurations": ip_configurations });
    if profile.is_custom_vnet() {
        nic_props["networkSecurityGroup"] = json!({ "id": "[variables('nsgID')]" });
    }
    if !profile.is_windows() && spec.linux_profile.as_ref().is_some_and(|l| l.has_custom_nodes_dns()) {
        nic_props["dnsSettings"] = json!({ "dnsServers": ["[parameters('dnsServer')]"] });
    }
    if !spec.orchestrator_profile.is_azure_cni() {
        nic_props["enableIPForwarding"] = json!(true);
    }

    let (os_profile, storage, cse) = if profile.is_windows() {
        let os_profile = json!({
            "adminPassword": "[parameters('windowsAdminPassword')]",
            "adminUsername": "[parameters('windowsAdminUsername')]",
            "customData": custom_data,
            "windowsConfiguration": { "enableAutomaticUpdates": false },
        });
        let storage = json!({
            "dataDisks": vmss_data_disks(profile),
            "imageReference": windows_image_reference(),
        });
        let cse = vmss_extension(
            "vmssCSE",
            "Microsoft.Compute",
            "CustomScriptExtension",
            "1.8",
            Some(windows_cse_command()),
        );
        (os_profile, storage, cse)
    } else {
        let os_profile = json!({
            "adminUsername": "[parameters('linuxAdminUsername')]",
            "computerNamePrefix": prefix,
            "customData": custom_data,
            "linuxConfiguration": {
                "disablePasswordAuthentication": true,
                "ssh": { "publicKeys": linux_ssh_keys(spec) },
            },
        });
        let storage = json!({
            "dataDisks": vmss_data_disks(profile),
            "imageReference": {
                "offer": format!("[variables('{pool}osImageOffer')]"),
                "publisher": format!("[variables('{pool}osImagePublisher')]"),
                "sku": format!("[variables('{pool}osImageSKU')]"),
                "version": format!("[variables('{pool}osImageVersion')]"),
            },
        });
        let outbound = outbound_connectivity_check(spec, profile.is_coreos());
        let command = agent_cse_command(spec, profile, &outbound);
        let cse = vmss_extension(
            "vmssCSE",
            "Microsoft.Azure.Extensions",
            "CustomScript",
            "2.0",
            Some(&command),
        );
        (os_profile, storage, cse)
    };
    let mut storage = storage;
    let mut os_disk = json!({ "caching": "ReadWrite", "createOption": "FromImage" });
    if profile.os_disk_size_gb > 0 {
        os_disk["diskSizeGB"] = json!(profile.os_disk_size_gb);
    }
    storage["osDisk"] = os_disk;

    let mut extensions = vec![cse];
    if spec.is_aks_billing_enabled() {
        extensions.push(vmss_extension(
            &format!("[concat(variables('{pool}VMNamePrefix'), '-computeAksLinuxBilling')]"),
            "Microsoft.AKS",
            billing_extension_type(spec, profile.is_windows()),
            "1.0",
            None,
        ));
    }

    let mut properties = base_properties(profile.single_placement_group);
    properties["virtualMachineProfile"] = json!({
        "extensionProfile": { "extensions": extensions },
        "networkProfile": {
            "networkInterfaceConfigurations": [{ "name": prefix, "properties": nic_props }],
        },
        "osProfile": os_profile,
        "storageProfile": storage,
    });

    let mut body = ResourceBody::new(prefix.clone(), VMSS_TYPE).properties(properties);
    body.sku = Some(json!({
        "capacity": profile.count,
        "name": format!("[variables('{pool}VMSize')]"),
        "tier": "Standard",
    }));
    let name_suffix = if profile.is_windows() {
        "[variables('winResourceNamePrefix')]"
    } else {
        "[parameters('nameSuffix')]"
    };
    body.tags = BTreeMap::from([
        (
            "creationSource".to_string(),
            format!("[concat(parameters('generatorCode'), '-', variables('{pool}VMNamePrefix'))]"),
        ),
        ("orchestrator".to_string(), "[variables('orchestratorNameVersionTag')]".to_string()),
        ("aksEngineVersion".to_string(), "[parameters('aksEngineVersion')]".to_string()),
        ("poolName".to_string(), pool.clone()),
        ("resourceNameSuffix".to_string(), name_suffix.to_string()),
    ]);
    if profile.has_availability_zones() {
        body.zones = Some(vec![format!("[parameters('{pool}AvailabilityZones')]")]);
    }
    if k8s.use_managed_identity {
        body.identity = Some(vm_identity(!k8s.user_assigned_id.is_empty()));
    }

    ArmResource::new("[variables('apiVersionCompute')]", body).depends_on(dep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AvailabilityProfile, KubernetesConfig, MasterProfile, OrchestratorProfile, OsType};

    #[test]
    fn test_master_vmss_ip_configs_per_master() {
        let spec = ClusterSpec {
            master_profile: Some(MasterProfile {
                count: 3,
                availability_profile: AvailabilityProfile::VirtualMachineScaleSets,
                ..Default::default()
            }),
            ..Default::default()
        };
        let vmss = create_master_vmss(&spec, "");
        assert_eq!(vmss.body.sku.as_ref().unwrap()["capacity"], 3);
        let props = vmss.body.properties.unwrap();
        let nic = &props["virtualMachineProfile"]["networkProfile"]["networkInterfaceConfigurations"][0];
        let configs = nic["properties"]["ipConfigurations"].as_array().unwrap();
        assert_eq!(configs.len(), 3);
        assert_eq!(
            configs[0]["properties"]["loadBalancerBackendAddressPools"].as_array().unwrap().len(),
            2
        );
        assert!(configs[1]["properties"].get("loadBalancerInboundNatPools").is_none());
        assert!(vmss.depends_on.contains(&"[variables('masterInternalLbName')]".to_string()));
    }

    #[test]
    fn test_master_vmss_managed_identity_extension() {
        let spec = ClusterSpec {
            master_profile: Some(MasterProfile::default()),
            orchestrator_profile: OrchestratorProfile {
                kubernetes_config: KubernetesConfig {
                    use_managed_identity: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let vmss = create_master_vmss(&spec, "");
        assert!(vmss.body.identity.is_none());
        let props = vmss.body.properties.unwrap();
        let extensions = props["virtualMachineProfile"]["extensionProfile"]["extensions"]
            .as_array()
            .unwrap();
        assert_eq!(extensions.len(), 3);
        assert_eq!(extensions[0]["properties"]["settings"]["port"], 50343);
    }

    #[test]
    fn test_agent_vmss_linux() {
        let profile = AgentPoolProfile {
            name: "pool1".to_string(),
            count: 4,
            ip_address_count: 2,
            ..Default::default()
        };
        let spec = ClusterSpec {
            agent_pool_profiles: vec![profile.clone()],
            ..Default::default()
        };
        let vmss = create_agent_vmss(&spec, &profile, "data");
        assert_eq!(vmss.body.name, "[variables('pool1VMNamePrefix')]");
        assert_eq!(vmss.depends_on, vec!["[variables('vnetID')]".to_string()]);
        let props = vmss.body.properties.unwrap();
        let nic = &props["virtualMachineProfile"]["networkProfile"]["networkInterfaceConfigurations"][0];
        assert_eq!(nic["properties"]["ipConfigurations"].as_array().unwrap().len(), 2);
        assert_eq!(nic["properties"]["enableIPForwarding"], true);
        assert_eq!(props["virtualMachineProfile"]["osProfile"]["customData"], "data");
    }

    #[test]
    fn test_agent_vmss_windows() {
        let profile = AgentPoolProfile {
            name: "win".to_string(),
            os_type: OsType::Windows,
            ..Default::default()
        };
        let spec = ClusterSpec::default();
        let vmss = create_agent_vmss(&spec, &profile, "");
        let props = vmss.body.properties.unwrap();
        let extensions = props["virtualMachineProfile"]["extensionProfile"]["extensions"]
            .as_array()
            .unwrap();
        assert_eq!(extensions[0]["properties"]["type"], "CustomScriptExtension");
        assert_eq!(extensions[1]["properties"]["type"], "Compute.AKS-Engine.Windows.Billing");
    }
}
