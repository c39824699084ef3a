//! Virtual machines for availability-set masters, agents and the jumpbox.
//!
//! Cloud-init custom data is rendered elsewhere and handed in as an ARM
//! expression string.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::api::addons::CONTAINER_MONITORING_ADDON;
use crate::api::{AgentPoolProfile, ClusterSpec, ImageReference, StorageProfile, is_addon_enabled};
use crate::engine::armtype::{ArmResource, CopyLoop, ResourceBody};

const VM_TYPE: &str = "Microsoft.Compute/virtualMachines";
const MASTER_VM_NAME: &str =
    "[concat(variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')))]";
const MASTER_ZONE: &str = "[string(parameters('availabilityZones')[mod(copyIndex(variables('masterOffset')), length(parameters('availabilityZones')))])]";
const MASTER_STORAGE_BLOB: &str = "reference(concat('Microsoft.Storage/storageAccounts/',variables('masterStorageAccountName')),variables('apiVersionStorage')).primaryEndpoints.blob";

/// Identity block shared by masters and Linux agents.
pub(crate) fn vm_identity(user_assigned: bool) -> Value {
    if user_assigned {
        json!({
            "type": "UserAssigned",
            "userAssignedIdentities": { "[variables('userAssignedIDReference')]": {} },
        })
    } else {
        json!({ "type": "SystemAssigned" })
    }
}

/// Custom tags never override the generated ones.
fn merge_custom_tags(tags: &mut BTreeMap<String, String>, custom: &BTreeMap<String, String>) {
    for (key, value) in custom {
        tags.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// SSH public keys; a single key comes from the `sshRSAPublicKey` parameter.
pub(crate) fn linux_ssh_keys(spec: &ClusterSpec) -> Value {
    let keys = spec
        .linux_profile
        .as_ref()
        .map(|l| l.ssh.public_keys.as_slice())
        .unwrap_or_default();
    if keys.len() > 1 {
        Value::Array(
            keys.iter()
                .map(|k| json!({ "keyData": k.key_data.trim(), "path": "[variables('sshKeyPath')]" }))
                .collect(),
        )
    } else {
        json!([{ "keyData": "[parameters('sshRSAPublicKey')]", "path": "[variables('sshKeyPath')]" }])
    }
}

/// Master image: a custom image, a shared gallery image, or the marketplace parameters.
fn master_image_reference(image_ref: Option<&ImageReference>) -> Value {
    match image_ref {
        Some(r) if !r.name.is_empty() && !r.gallery.is_empty() => json!({
            "id": format!(
                "[concat('/subscriptions/', '{}', '/resourceGroups/', parameters('osImageResourceGroup'), '/providers/Microsoft.Compute/galleries/', '{}', '/images/', parameters('osImageName'), '/versions/', '{}')]",
                r.subscription_id, r.gallery, r.version
            ),
        }),
        Some(r) if !r.name.is_empty() => json!({
            "id": "[resourceId(parameters('osImageResourceGroup'), 'Microsoft.Compute/images', parameters('osImageName'))]",
        }),
        _ => json!({
            "offer": "[parameters('osImageOffer')]",
            "publisher": "[parameters('osImagePublisher')]",
            "sku": "[parameters('osImageSku')]",
            "version": "[parameters('osImageVersion')]",
        }),
    }
}

/// Availability-set master VM.
pub fn create_virtual_machine(spec: &ClusterSpec, custom_data: &str) -> ArmResource<ResourceBody> {
    let master = spec.master_profile.clone().unwrap_or_default();
    let k8s = spec.kubernetes_config();
    let is_storage_account = master.is_storage_account();

    let mut deps = vec![
        "[concat('Microsoft.Network/networkInterfaces/', variables('masterVMNamePrefix'), 'nic-', copyIndex(variables('masterOffset')))]".to_string(),
    ];
    if !master.has_availability_zones() {
        deps.push("[concat('Microsoft.Compute/availabilitySets/',variables('masterAvailabilitySet'))]".to_string());
    }
    if is_storage_account {
        deps.push("[variables('masterStorageAccountName')]".to_string());
    }

    let mut tags = BTreeMap::from([
        (
            "creationSource".to_string(),
            "[concat(parameters('generatorCode'), '-', variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')))]".to_string(),
        ),
        ("resourceNameSuffix".to_string(), "[parameters('nameSuffix')]".to_string()),
        ("orchestrator".to_string(), "[variables('orchestratorNameVersionTag')]".to_string()),
        ("aksEngineVersion".to_string(), "[parameters('aksEngineVersion')]".to_string()),
        ("poolName".to_string(), "master".to_string()),
    ]);
    if is_addon_enabled(spec, CONTAINER_MONITORING_ADDON) {
        let workspace = k8s
            .addon(CONTAINER_MONITORING_ADDON)
            .and_then(|a| a.config.get("logAnalyticsWorkspaceResourceId"));
        if let Some(workspace) = workspace {
            tags.insert("logAnalyticsWorkspaceResourceId".to_string(), workspace.clone());
        }
        tags.insert("clusterName".to_string(), spec.dns_prefix());
    }
    merge_custom_tags(&mut tags, &master.custom_vm_tags);

    let mut properties = json!({
        "hardwareProfile": { "vmSize": master.vm_size },
        "networkProfile": {
            "networkInterfaces": [{
                "id": "[resourceId('Microsoft.Network/networkInterfaces',concat(variables('masterVMNamePrefix'),'nic-', copyIndex(variables('masterOffset'))))]",
            }],
        },
        "osProfile": {
            "adminUsername": "[parameters('linuxAdminUsername')]",
            "computerName": MASTER_VM_NAME,
            "customData": custom_data,
            "linuxConfiguration": {
                "disablePasswordAuthentication": true,
                "ssh": { "publicKeys": linux_ssh_keys(spec) },
            },
        },
    });
    if !master.has_availability_zones() {
        properties["availabilitySet"] =
            json!({ "id": "[resourceId('Microsoft.Compute/availabilitySets',variables('masterAvailabilitySet'))]" });
    }

    let mut storage = Map::new();
    if !master.cosmos_etcd {
        let etcd_size: u32 = k8s.etcd_disk_size_gb.parse().unwrap_or_default();
        let mut disk = json!({
            "createOption": "Empty",
            "diskSizeGB": etcd_size,
            "lun": 0,
            "name": "[concat(variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')),'-etcddisk')]",
        });
        if is_storage_account {
            disk["vhd"] = json!({
                "uri": format!("[concat({},'vhds/', variables('masterVMNamePrefix'),copyIndex(variables('masterOffset')),'-etcddisk.vhd')]", MASTER_STORAGE_BLOB),
            });
        }
        storage.insert("dataDisks".to_string(), json!([disk]));
    }
    storage.insert(
        "imageReference".to_string(),
        master_image_reference(master.image_ref.as_ref()),
    );
    let mut os_disk = json!({
        "caching": master.os_disk_caching_type,
        "createOption": "FromImage",
    });
    if is_storage_account {
        os_disk["name"] = json!("[concat(variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')),'-osdisk')]");
        os_disk["vhd"] = json!({
            "uri": format!("[concat({},'vhds/',variables('masterVMNamePrefix'),copyIndex(variables('masterOffset')),'-osdisk.vhd')]", MASTER_STORAGE_BLOB),
        });
    }
    if master.os_disk_size_gb > 0 {
        os_disk["diskSizeGB"] = json!(master.os_disk_size_gb);
    }
    storage.insert("osDisk".to_string(), os_disk);
    properties["storageProfile"] = Value::Object(storage);
    if master.ultra_ssd_enabled {
        properties["additionalCapabilities"] = json!({ "ultraSSDEnabled": true });
    }

    let mut body = ResourceBody::new(MASTER_VM_NAME, VM_TYPE).properties(properties);
    body.tags = tags;
    if master.has_availability_zones() {
        body.zones = Some(vec![MASTER_ZONE.to_string()]);
    }
    if k8s.use_managed_identity {
        body.identity = Some(vm_identity(k8s.user_assigned_id_enabled()));
    }

    ArmResource::new("[variables('apiVersionCompute')]", body)
        .with_copy(CopyLoop::masters("vmLoopNode"))
        .with_depends_on(deps)
}

/// Jumpbox VM of a private cluster.
pub fn create_jumpbox_virtual_machine(spec: &ClusterSpec, custom_data: &str) -> ArmResource<ResourceBody> {
    let jumpbox = spec
        .kubernetes_config()
        .private_cluster
        .as_ref()
        .and_then(|p| p.jumpbox_profile.clone())
        .unwrap_or_default();

    let os_disk = if jumpbox.storage_profile == StorageProfile::ManagedDisks {
        json!({
            "createOption": "FromImage",
            "diskSizeGB": jumpbox.os_disk_size_gb,
            "managedDisk": {
                "storageAccountType": "[variables('vmSizesMap')[parameters('jumpboxVMSize')].storageAccountType]",
            },
        })
    } else {
        json!({
            "createOption": "FromImage",
            "name": "[variables('jumpboxOSDiskName')]",
            "vhd": {
                "uri": "[concat(reference(concat('Microsoft.Storage/storageAccounts/',variables('jumpboxStorageAccountName')),variables('apiVersionStorage')).primaryEndpoints.blob,'vhds/',parameters('jumpboxVMName'),'jumpboxdisk.vhd')]",
            },
        })
    };

    let body = ResourceBody::new("[parameters('jumpboxVMName')]", VM_TYPE).properties(json!({
        "hardwareProfile": { "vmSize": "[parameters('jumpboxVMSize')]" },
        "networkProfile": {
            "networkInterfaces": [{
                "id": "[resourceId('Microsoft.Network/networkInterfaces', variables('jumpboxNetworkInterfaceName'))]",
            }],
        },
        "osProfile": {
            "adminUsername": "[parameters('jumpboxUsername')]",
            "computerName": "[parameters('jumpboxVMName')]",
            "customData": custom_data,
            "linuxConfiguration": {
                "disablePasswordAuthentication": true,
                "ssh": {
                    "publicKeys": [{
                        "keyData": "[parameters('jumpboxPublicKey')]",
                        "path": "[concat('/home/', parameters('jumpboxUsername'), '/.ssh/authorized_keys')]",
                    }],
                },
            },
        },
        "storageProfile": {
            "dataDisks": [],
            "imageReference": {
                "offer": "UbuntuServer",
                "publisher": "Canonical",
                "sku": "16.04-LTS",
                "version": "latest",
            },
            "osDisk": os_disk,
        },
    }));

    ArmResource::new("[variables('apiVersionCompute')]", body)
        .depends_on("[concat('Microsoft.Network/networkInterfaces/', variables('jumpboxNetworkInterfaceName'))]")
}

/// Storage account expression of an agent VM, by copy index.
fn agent_storage_account_expr(pool: &str, data: bool) -> String {
    let (seed, account) = if data {
        ("add(", format!("variables('{}DataAccountName')", pool))
    } else {
        ("", format!("variables('{}AccountName')", pool))
    };
    let seed_close = if data { ",variables('dataStorageAccountPrefixSeed'))" } else { "" };
    let index = format!(
        "{seed}add(div(copyIndex(variables('{pool}Offset')),variables('maxVMsPerStorageAccount')),variables('{pool}StorageAccountOffset')){seed_close}"
    );
    format!(
        "concat('Microsoft.Storage/storageAccounts/',variables('storageAccountPrefixes')[mod({index},variables('storageAccountPrefixesCount'))],variables('storageAccountPrefixes')[div({index},variables('storageAccountPrefixesCount'))],{account})"
    )
}

/// Empty data disks of an agent pool, one lun per configured size.
pub fn arm_data_disks(profile: &AgentPoolProfile, caching: &str) -> Vec<Value> {
    let pool = &profile.name;
    profile
        .disk_sizes_gb
        .iter()
        .enumerate()
        .map(|(i, size)| {
            let mut disk = json!({
                "caching": caching,
                "createOption": "Empty",
                "diskSizeGB": size,
                "lun": i,
            });
            if profile.is_storage_account() {
                disk["name"] = json!(format!("[concat(variables('{pool}VMNamePrefix'), copyIndex(),'-datadisk{i}')]"));
                disk["vhd"] = json!({
                    "uri": format!(
                        "[concat('http://',variables('storageAccountPrefixes')[mod(add(add(div(copyIndex(),variables('maxVMsPerStorageAccount')),variables('{pool}StorageAccountOffset')),variables('dataStorageAccountPrefixSeed')),variables('storageAccountPrefixesCount'))],variables('storageAccountPrefixes')[div(add(add(div(copyIndex(),variables('maxVMsPerStorageAccount')),variables('{pool}StorageAccountOffset')),variables('dataStorageAccountPrefixSeed')),variables('storageAccountPrefixesCount'))],variables('{pool}DataAccountName'),'.blob.core.windows.net/vhds/',variables('{pool}VMNamePrefix'),copyIndex(), '--datadisk{i}.vhd')]"
                    ),
                });
            }
            disk
        })
        .collect()
}

/// Windows marketplace image from the Windows profile parameters.
pub(crate) fn windows_image_reference() -> Value {
    json!({
        "offer": "[parameters('agentWindowsOffer')]",
        "publisher": "[parameters('agentWindowsPublisher')]",
        "sku": "[parameters('agentWindowsSku')]",
        "version": "[parameters('agentWindowsVersion')]",
    })
}

/// Agent VM of an availability-set pool.
pub fn create_agent_availability_sets_vm(
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
    custom_data: &str,
) -> ArmResource<ResourceBody> {
    let k8s = spec.kubernetes_config();
    let pool = &profile.name;

    let mut deps = Vec::new();
    if profile.is_storage_account() {
        deps.push(format!("[{}]", agent_storage_account_expr(pool, false)));
        if profile.has_disks() {
            deps.push(format!("[{}]", agent_storage_account_expr(pool, true)));
        }
    }
    deps.push(format!(
        "[concat('Microsoft.Network/networkInterfaces/', variables('{pool}VMNamePrefix'), 'nic-', copyIndex(variables('{pool}Offset')))]"
    ));
    deps.push(format!(
        "[concat('Microsoft.Compute/availabilitySets/', variables('{pool}AvailabilitySet'))]"
    ));

    let name_suffix = if profile.is_windows() {
        "[variables('winResourceNamePrefix')]"
    } else {
        "[parameters('nameSuffix')]"
    };
    let mut tags = BTreeMap::from([
        (
            "creationSource".to_string(),
            format!("[concat(parameters('generatorCode'), '-', variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')))]"),
        ),
        ("resourceNameSuffix".to_string(), name_suffix.to_string()),
        ("orchestrator".to_string(), "[variables('orchestratorNameVersionTag')]".to_string()),
        ("aksEngineVersion".to_string(), "[parameters('aksEngineVersion')]".to_string()),
        ("poolName".to_string(), pool.clone()),
    ]);
    merge_custom_tags(&mut tags, &profile.custom_vm_tags);

    let computer_name = format!("[concat(variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')))]");
    let os_profile = if profile.is_windows() {
        json!({
            "adminPassword": "[parameters('windowsAdminPassword')]",
            "adminUsername": "[parameters('windowsAdminUsername')]",
            "computerName": computer_name,
            "customData": custom_data,
            "windowsConfiguration": { "enableAutomaticUpdates": false },
        })
    } else {
        json!({
            "adminUsername": "[parameters('linuxAdminUsername')]",
            "computerName": computer_name,
            "customData": custom_data,
            "linuxConfiguration": {
                "disablePasswordAuthentication": true,
                "ssh": { "publicKeys": linux_ssh_keys(spec) },
            },
        })
    };

    let mut storage = Map::new();
    if profile.is_windows() {
        storage.insert("imageReference".to_string(), windows_image_reference());
        if profile.has_disks() {
            storage.insert("dataDisks".to_string(), Value::Array(arm_data_disks(profile, "ReadOnly")));
        }
    } else {
        storage.insert(
            "imageReference".to_string(),
            json!({
                "offer": format!("[variables('{pool}osImageOffer')]"),
                "publisher": format!("[variables('{pool}osImagePublisher')]"),
                "sku": format!("[variables('{pool}osImageSKU')]"),
                "version": format!("[variables('{pool}osImageVersion')]"),
            }),
        );
        storage.insert("dataDisks".to_string(), Value::Array(arm_data_disks(profile, "ReadOnly")));
    }
    let mut os_disk = json!({ "caching": "ReadWrite", "createOption": "FromImage" });
    if profile.is_storage_account() {
        os_disk["name"] = json!(format!(
            "[concat(variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')),'-osdisk')]"
        ));
        os_disk["vhd"] = json!({
            "uri": format!(
                "[concat(reference({},variables('apiVersionStorage')).primaryEndpoints.blob,'osdisk/', variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')), '-osdisk.vhd')]",
                agent_storage_account_expr(pool, false)
            ),
        });
    }
    if profile.storage_profile == StorageProfile::Ephemeral {
        os_disk["diffDiskSettings"] = json!({ "option": "Local" });
    }
    if profile.os_disk_size_gb > 0 {
        os_disk["diskSizeGB"] = json!(profile.os_disk_size_gb);
    }
    storage.insert("osDisk".to_string(), os_disk);

    let properties = json!({
        "availabilitySet": {
            "id": format!("[resourceId('Microsoft.Compute/availabilitySets',variables('{pool}AvailabilitySet'))]"),
        },
        "hardwareProfile": { "vmSize": format!("[variables('{pool}VMSize')]") },
        "networkProfile": {
            "networkInterfaces": [{
                "id": format!("[resourceId('Microsoft.Network/networkInterfaces',concat(variables('{pool}VMNamePrefix'), 'nic-', copyIndex(variables('{pool}Offset'))))]"),
            }],
        },
        "osProfile": os_profile,
        "storageProfile": Value::Object(storage),
    });

    let mut body = ResourceBody::new(computer_name.clone(), VM_TYPE).properties(properties);
    body.tags = tags;
    if k8s.use_managed_identity {
        body.identity = Some(vm_identity(k8s.user_assigned_id_enabled() && !profile.is_windows()));
    }

    ArmResource::new("[variables('apiVersionCompute')]", body)
        .with_copy(CopyLoop::pool(pool, "vmLoopNode"))
        .with_depends_on(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AvailabilityProfile, JumpboxProfile, KubernetesConfig, LinuxProfile, MasterProfile,
        OrchestratorProfile, OsType, PrivateCluster, PublicKey, SshConfig,
    };

    fn spec_with_master(master: MasterProfile) -> ClusterSpec {
        ClusterSpec {
            master_profile: Some(master),
            ..Default::default()
        }
    }

    #[test]
    fn test_master_vm_defaults() {
        let spec = spec_with_master(MasterProfile::default());
        let vm = create_virtual_machine(&spec, "[base64('x')]");
        let value = vm.to_value().unwrap();

        assert_eq!(value["copy"]["name"], "vmLoopNode");
        assert_eq!(value["properties"]["osProfile"]["customData"], "[base64('x')]");
        assert_eq!(
            value["properties"]["storageProfile"]["dataDisks"][0]["diskSizeGB"],
            256
        );
        assert_eq!(
            value["properties"]["storageProfile"]["imageReference"]["offer"],
            "[parameters('osImageOffer')]"
        );
        assert!(value.get("identity").is_none());
        assert!(value.get("zones").is_none());
        assert_eq!(vm.depends_on.len(), 2);
    }

    #[test]
    fn test_master_vm_with_zones_skips_avset() {
        let spec = spec_with_master(MasterProfile {
            availability_zones: vec!["1".to_string(), "2".to_string()],
            ..Default::default()
        });
        let vm = create_virtual_machine(&spec, "");
        assert_eq!(vm.body.zones, Some(vec![MASTER_ZONE.to_string()]));
        let props = vm.body.properties.unwrap();
        assert!(props.get("availabilitySet").is_none());
        assert_eq!(vm.depends_on.len(), 1);
    }

    #[test]
    fn test_master_vm_cosmos_has_no_etcd_disk() {
        let spec = spec_with_master(MasterProfile {
            cosmos_etcd: true,
            ..Default::default()
        });
        let vm = create_virtual_machine(&spec, "");
        let props = vm.body.properties.unwrap();
        assert!(props["storageProfile"].get("dataDisks").is_none());
    }

    #[test]
    fn test_master_vm_user_assigned_identity() {
        let spec = ClusterSpec {
            master_profile: Some(MasterProfile::default()),
            orchestrator_profile: OrchestratorProfile {
                kubernetes_config: KubernetesConfig {
                    use_managed_identity: true,
                    user_assigned_id: "myid".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let vm = create_virtual_machine(&spec, "");
        assert_eq!(vm.body.identity.unwrap()["type"], "UserAssigned");
    }

    #[test]
    fn test_multiple_ssh_keys_are_listed() {
        let spec = ClusterSpec {
            linux_profile: Some(LinuxProfile {
                ssh: SshConfig {
                    public_keys: vec![
                        PublicKey { key_data: " ssh-rsa AAA ".to_string() },
                        PublicKey { key_data: "ssh-rsa BBB".to_string() },
                    ],
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        let keys = linux_ssh_keys(&spec);
        assert_eq!(keys.as_array().unwrap().len(), 2);
        assert_eq!(keys[0]["keyData"], "ssh-rsa AAA");
    }

    #[test]
    fn test_jumpbox_managed_disk() {
        let spec = ClusterSpec {
            orchestrator_profile: OrchestratorProfile {
                kubernetes_config: KubernetesConfig {
                    private_cluster: Some(PrivateCluster {
                        enabled: true,
                        jumpbox_profile: Some(JumpboxProfile {
                            os_disk_size_gb: 30,
                            ..Default::default()
                        }),
                    }),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let vm = create_jumpbox_virtual_machine(&spec, "");
        let props = vm.body.properties.unwrap();
        assert_eq!(props["storageProfile"]["osDisk"]["diskSizeGB"], 30);
        assert!(props["storageProfile"]["osDisk"].get("vhd").is_none());
    }

    #[test]
    fn test_agent_vm_storage_account_with_disks() {
        let profile = AgentPoolProfile {
            name: "agentpool1".to_string(),
            availability_profile: AvailabilityProfile::AvailabilitySet,
            storage_profile: StorageProfile::StorageAccount,
            disk_sizes_gb: vec![128, 256],
            ..Default::default()
        };
        let spec = ClusterSpec {
            agent_pool_profiles: vec![profile.clone()],
            ..Default::default()
        };
        let vm = create_agent_availability_sets_vm(&spec, &profile, "");
        // storage account, data account, nic, availability set
        assert_eq!(vm.depends_on.len(), 4);
        let props = vm.body.properties.unwrap();
        let disks = props["storageProfile"]["dataDisks"].as_array().unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[1]["lun"], 1);
        assert_eq!(
            disks[1]["name"],
            "[concat(variables('agentpool1VMNamePrefix'), copyIndex(),'-datadisk1')]"
        );
    }

    #[test]
    fn test_windows_agent_vm() {
        let profile = AgentPoolProfile {
            name: "win".to_string(),
            os_type: OsType::Windows,
            availability_profile: AvailabilityProfile::AvailabilitySet,
            ..Default::default()
        };
        let spec = ClusterSpec::default();
        let vm = create_agent_availability_sets_vm(&spec, &profile, "");
        assert_eq!(vm.body.tags["resourceNameSuffix"], "[variables('winResourceNamePrefix')]");
        let props = vm.body.properties.unwrap();
        assert_eq!(props["osProfile"]["adminUsername"], "[parameters('windowsAdminUsername')]");
        assert!(props["storageProfile"].get("dataDisks").is_none());
    }
}
