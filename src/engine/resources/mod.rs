//! ARM resource builders and the resource-array assembly.
//!
//! Each submodule owns one Azure resource kind. Builders are pure: they read
//! the [`ClusterSpec`] and return an [`ArmResource`](crate::engine::armtype::ArmResource).
//! [`generate_arm_resources`] decides which builders run for a given cluster
//! and in which order.

pub mod app_gateway;
pub mod availability_sets;
pub mod cosmos_db;
pub mod deployments;
pub mod identities;
pub mod inbound_nat_rules;
pub mod key_vaults;
pub mod load_balancers;
pub mod network_interfaces;
pub mod public_ips;
pub mod role_assignments;
pub mod route_tables;
pub mod scale_sets;
pub mod security_groups;
pub mod storage_accounts;
pub mod virtual_machines;
pub mod virtual_networks;
pub mod vm_extensions;

use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::addons::APP_GATEWAY_INGRESS_ADDON;
use crate::api::{AgentPoolProfile, ClusterSpec, LoadBalancerSku, StorageProfile, is_addon_enabled};
use crate::engine::armtype::{ArmResource, AvailabilitySet, AvailabilitySetProperties};
use crate::error::GeneratorError;

use role_assignments::IdentityRole;

/// Cloud-init payloads handed to the VM and scale set builders, each an ARM
/// expression string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData {
    pub master: String,
    pub jumpbox: String,
    /// Keyed by agent pool name.
    pub agents: BTreeMap<String, String>,
}

impl CustomData {
    pub fn agent(&self, pool: &str) -> &str {
        self.agents.get(pool).map(String::as_str).unwrap_or_default()
    }
}

/// Accumulates serialized resources in order.
#[derive(Default)]
struct ResourceList(Vec<Value>);

impl ResourceList {
    fn push<T: serde::Serialize>(&mut self, resource: ArmResource<T>) -> Result<(), GeneratorError> {
        self.0.push(resource.to_value()?);
        Ok(())
    }
}

/// Builds the `resources` array of the deployment template.
pub fn generate_arm_resources(
    spec: &ClusterSpec,
    custom_data: &CustomData,
) -> Result<Vec<Value>, GeneratorError> {
    let mut out = ResourceList::default();
    let k8s = spec.kubernetes_config();
    let is_hosted_master = spec.is_hosted_master();

    if spec.feature_flags.enable_telemetry && spec.is_azure_stack_cloud() {
        out.push(deployments::create_azure_stack_telemetry(
            deployments::AZURE_STACK_DEPLOY_TELEMETRY_PID,
        ))?;
    }

    if k8s.user_assigned_id_enabled() {
        if k8s.should_create_user_assigned_identity() {
            out.push(identities::create_user_assigned_identities())?;
        }
        let role = if is_hosted_master {
            IdentityRole::Reader
        } else {
            IdentityRole::Contributor
        };
        out.push(role_assignments::create_msi_role_assignment(role))?;
    }

    if k8s.load_balancer_sku == LoadBalancerSku::Standard && !is_hosted_master {
        out.push(public_ips::create_public_ip_address(false, false))?;
        out.push(load_balancers::create_standard_load_balancer_for_node_pools(spec))?;
    } else if spec.feature_flags.enable_ipv6_dual_stack && !is_hosted_master {
        out.push(public_ips::create_cluster_public_ip_address())?;
        out.push(load_balancers::create_cluster_load_balancer_for_ipv6())?;
    }

    let system_identity = k8s.use_managed_identity && !k8s.user_assigned_id_enabled();
    for profile in &spec.agent_pool_profiles {
        debug!("adding resources for agent pool {}", profile.name);
        if profile.is_vmss() {
            if system_identity {
                out.push(role_assignments::create_agent_vmss_sys_role_assignment(profile))?;
            }
            out.push(scale_sets::create_agent_vmss(
                spec,
                profile,
                custom_data.agent(&profile.name),
            ))?;
        } else {
            push_agent_vmas_resources(&mut out, spec, profile, custom_data.agent(&profile.name))?;
        }
    }

    if is_hosted_master {
        let custom_vnet = spec.agent_pool_profiles.iter().any(|p| p.is_custom_vnet());
        if !custom_vnet {
            out.push(virtual_networks::create_hosted_master_virtual_network(spec))?;
        }
        if spec.requires_route_table() {
            out.push(route_tables::create_route_table())?;
        }
        out.push(security_groups::create_hosted_master_nsg())?;
    } else if spec.is_vmss_master() {
        push_master_vmss_resources(&mut out, spec, custom_data)?;
    } else {
        push_master_vmas_resources(&mut out, spec, custom_data)?;
    }

    if is_addon_enabled(spec, APP_GATEWAY_INGRESS_ADDON) {
        out.push(public_ips::create_app_gw_public_ip_address())?;
        out.push(app_gateway::create_app_gw_user_assigned_identity())?;
        out.push(app_gateway::create_application_gateway(spec))?;
        out.push(role_assignments::create_app_gw_identity_gateway_write_role_assignment())?;
        out.push(role_assignments::create_app_gw_identity_operator_role_assignment(spec))?;
        out.push(role_assignments::create_app_gw_identity_resource_group_read_role_assignment())?;
    }

    debug!("generated {} resources", out.0.len());
    Ok(out.0)
}

fn push_agent_vmas_resources(
    out: &mut ResourceList,
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
    custom_data: &str,
) -> Result<(), GeneratorError> {
    let k8s = spec.kubernetes_config();
    out.push(network_interfaces::create_agent_vmas_network_interface(spec, profile))?;

    match profile.storage_profile {
        StorageProfile::StorageAccount => {
            out.push(storage_accounts::create_agent_vmas_storage_account(spec, profile, false))?;
            if profile.has_disks() {
                out.push(storage_accounts::create_agent_vmas_storage_account(spec, profile, true))?;
            }
            out.push(storage_account_pool_availability_set(profile))?;
        }
        _ => out.push(availability_sets::create_agent_availability_set(profile))?,
    }

    out.push(virtual_machines::create_agent_availability_sets_vm(spec, profile, custom_data))?;
    if k8s.use_managed_identity && !k8s.user_assigned_id_enabled() {
        out.push(role_assignments::create_agent_vmas_sys_role_assignment(profile))?;
    }
    out.push(vm_extensions::create_agent_vmas_custom_script_extension(spec, profile))?;
    if spec.is_aks_billing_enabled() {
        out.push(vm_extensions::create_agent_vmas_aks_billing_extension(spec, profile))?;
    }
    Ok(())
}

/// Storage-account pools get a bare availability set with no domain counts.
fn storage_account_pool_availability_set(profile: &AgentPoolProfile) -> ArmResource<AvailabilitySet> {
    ArmResource::new(
        "[variables('apiVersionCompute')]",
        AvailabilitySet {
            name: format!("[variables('{}AvailabilitySet')]", profile.name),
            location: "[variables('location')]".to_string(),
            resource_type: "Microsoft.Compute/availabilitySets".to_string(),
            sku: None,
            properties: Some(AvailabilitySetProperties::default()),
        },
    )
}

fn push_master_vmas_resources(
    out: &mut ResourceList,
    spec: &ClusterSpec,
    custom_data: &CustomData,
) -> Result<(), GeneratorError> {
    let master = spec
        .master_profile
        .as_ref()
        .ok_or(GeneratorError::MissingMasterProfile)?;
    let k8s = spec.kubernetes_config();

    if master.is_storage_account() {
        out.push(availability_sets::create_availability_set(spec, false))?;
        out.push(storage_accounts::create_storage_account(spec))?;
    } else if !master.has_availability_zones() {
        out.push(availability_sets::create_availability_set(spec, true))?;
    }

    if !master.is_custom_vnet() {
        out.push(virtual_networks::create_virtual_network(spec))?;
    }
    out.push(security_groups::create_network_security_group(spec))?;
    if spec.requires_route_table() {
        out.push(route_tables::create_route_table())?;
    }

    if !k8s.is_private_cluster() {
        out.push(public_ips::create_public_ip_address(true, true))?;
        out.push(load_balancers::create_master_load_balancer(spec, false))?;
        out.push(network_interfaces::create_master_vm_network_interfaces(spec))?;
    } else {
        out.push(network_interfaces::create_private_cluster_master_vm_network_interface(spec))?;
        if k8s.private_jumpbox_provision() {
            let jumpbox_managed_disks = k8s
                .private_cluster
                .as_ref()
                .and_then(|p| p.jumpbox_profile.as_ref())
                .is_some_and(|j| j.storage_profile == StorageProfile::ManagedDisks);
            out.push(virtual_machines::create_jumpbox_virtual_machine(spec, &custom_data.jumpbox))?;
            if !jumpbox_managed_disks {
                out.push(storage_accounts::create_jumpbox_storage_account())?;
            }
            out.push(security_groups::create_jumpbox_nsg())?;
            out.push(public_ips::create_jumpbox_public_ip_address())?;
            out.push(network_interfaces::create_jumpbox_network_interface(spec))?;
        }
    }

    if master.has_multiple_nodes() {
        out.push(load_balancers::create_master_internal_load_balancer(spec))?;
    }

    if k8s.enable_encryption_with_external_kms {
        out.push(storage_accounts::create_key_vault_storage_account())?;
        out.push(key_vaults::create_key_vault(spec))?;
    }

    if master.cosmos_etcd {
        out.push(cosmos_db::create_cosmos_db_account())?;
    }

    out.push(virtual_machines::create_virtual_machine(spec, &custom_data.master))?;
    if k8s.use_managed_identity && !k8s.user_assigned_id_enabled() {
        out.push(role_assignments::create_vmas_role_assignment())?;
        for deployment in
            role_assignments::create_master_role_assignments_for_agent_pools(master, &spec.agent_pool_profiles)
        {
            out.push(deployment)?;
        }
    }
    out.push(vm_extensions::create_custom_script_extension(spec))?;
    if spec.is_aks_billing_enabled() {
        out.push(vm_extensions::create_aks_billing_extension())?;
    }
    Ok(())
}

fn push_master_vmss_resources(
    out: &mut ResourceList,
    spec: &ClusterSpec,
    custom_data: &CustomData,
) -> Result<(), GeneratorError> {
    let master = spec
        .master_profile
        .as_ref()
        .ok_or(GeneratorError::MissingMasterProfile)?;
    let k8s = spec.kubernetes_config();

    out.push(security_groups::create_network_security_group(spec))?;
    if spec.requires_route_table() {
        out.push(route_tables::create_route_table())?;
    }
    if !master.is_custom_vnet() {
        out.push(virtual_networks::create_virtual_network_vmss(spec))?;
    }
    if master.has_multiple_nodes() {
        out.push(load_balancers::create_master_internal_load_balancer(spec))?;
    }
    out.push(public_ips::create_public_ip_address(true, true))?;
    out.push(load_balancers::create_master_load_balancer(spec, true))?;

    if k8s.enable_encryption_with_external_kms {
        out.push(storage_accounts::create_key_vault_storage_account())?;
        out.push(key_vaults::create_key_vault(spec))?;
    }

    out.push(scale_sets::create_master_vmss(spec, &custom_data.master))?;
    Ok(())
}

/// Resource type of an already serialized resource.
pub fn resource_type(resource: &Value) -> &str {
    resource["type"].as_str().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AvailabilityProfile, HostedMasterProfile, KubernetesAddon, MasterProfile, PrivateCluster,
    };

    fn types(resources: &[Value]) -> Vec<&str> {
        resources.iter().map(resource_type).collect()
    }

    fn vmas_spec() -> ClusterSpec {
        let mut spec = ClusterSpec {
            location: "westus2".to_string(),
            master_profile: Some(MasterProfile {
                count: 1,
                dns_prefix: "mycluster".to_string(),
                ..Default::default()
            }),
            agent_pool_profiles: vec![AgentPoolProfile {
                name: "agentpool1".to_string(),
                count: 2,
                availability_profile: AvailabilityProfile::AvailabilitySet,
                ..Default::default()
            }],
            ..Default::default()
        };
        spec.orchestrator_profile.orchestrator_version = "1.15.7".to_string();
        spec
    }

    #[test]
    fn test_vmas_cluster_resource_order() {
        let resources = generate_arm_resources(&vmas_spec(), &CustomData::default()).unwrap();
        assert_eq!(
            types(&resources),
            vec![
                "Microsoft.Network/networkInterfaces",
                "Microsoft.Compute/availabilitySets",
                "Microsoft.Compute/virtualMachines",
                "Microsoft.Compute/virtualMachines/extensions",
                "Microsoft.Compute/virtualMachines/extensions",
                "Microsoft.Compute/availabilitySets",
                "Microsoft.Network/virtualNetworks",
                "Microsoft.Network/networkSecurityGroups",
                "Microsoft.Network/routeTables",
                "Microsoft.Network/publicIPAddresses",
                "Microsoft.Network/loadBalancers",
                "Microsoft.Network/networkInterfaces",
                "Microsoft.Compute/virtualMachines",
                "Microsoft.Compute/virtualMachines/extensions",
                "Microsoft.Compute/virtualMachines/extensions",
            ]
        );
    }

    #[test]
    fn test_private_cluster_skips_public_ip() {
        let mut spec = vmas_spec();
        spec.orchestrator_profile.kubernetes_config.private_cluster = Some(PrivateCluster {
            enabled: true,
            jumpbox_profile: None,
        });
        let resources = generate_arm_resources(&spec, &CustomData::default()).unwrap();
        assert!(!types(&resources).contains(&"Microsoft.Network/publicIPAddresses"));
        assert!(!types(&resources).contains(&"Microsoft.Network/loadBalancers"));
    }

    #[test]
    fn test_standard_sku_adds_agent_load_balancer_first() {
        let mut spec = vmas_spec();
        spec.orchestrator_profile.kubernetes_config.load_balancer_sku = LoadBalancerSku::Standard;
        let resources = generate_arm_resources(&spec, &CustomData::default()).unwrap();
        assert_eq!(resources[0]["name"], "[variables('agentPublicIPAddressName')]");
        assert_eq!(resources[1]["name"], "[variables('agentLbName')]");
    }

    #[test]
    fn test_user_assigned_identity_comes_first() {
        let mut spec = vmas_spec();
        let k8s = &mut spec.orchestrator_profile.kubernetes_config;
        k8s.use_managed_identity = true;
        k8s.user_assigned_id = "my-identity".to_string();
        let resources = generate_arm_resources(&spec, &CustomData::default()).unwrap();
        assert_eq!(resource_type(&resources[0]), "Microsoft.ManagedIdentity/userAssignedIdentities");
        assert_eq!(resource_type(&resources[1]), "Microsoft.Authorization/roleAssignments");
    }

    #[test]
    fn test_hosted_master_has_no_master_vms() {
        let mut spec = vmas_spec();
        spec.master_profile = None;
        spec.hosted_master_profile = Some(HostedMasterProfile {
            fqdn: "hosted.example.com".to_string(),
            dns_prefix: "hosted".to_string(),
            subnet: "10.240.0.0/16".to_string(),
        });
        let resources = generate_arm_resources(&spec, &CustomData::default()).unwrap();
        let vms = resources
            .iter()
            .filter(|r| resource_type(r) == "Microsoft.Compute/virtualMachines")
            .count();
        assert_eq!(vms, 1);
        assert_eq!(
            resource_type(resources.last().unwrap()),
            "Microsoft.Network/networkSecurityGroups"
        );
    }

    #[test]
    fn test_vmss_master_ends_with_scale_set() {
        let mut spec = vmas_spec();
        if let Some(master) = spec.master_profile.as_mut() {
            master.availability_profile = AvailabilityProfile::VirtualMachineScaleSets;
        }
        let resources = generate_arm_resources(&spec, &CustomData::default()).unwrap();
        assert_eq!(
            resource_type(resources.last().unwrap()),
            "Microsoft.Compute/virtualMachineScaleSets"
        );
    }

    #[test]
    fn test_app_gateway_resources_appended() {
        let mut spec = vmas_spec();
        spec.orchestrator_profile.kubernetes_config.addons.push(KubernetesAddon {
            name: APP_GATEWAY_INGRESS_ADDON.to_string(),
            enabled: Some(true),
            ..Default::default()
        });
        let resources = generate_arm_resources(&spec, &CustomData::default()).unwrap();
        let tail: Vec<&str> = types(&resources).into_iter().rev().take(6).collect();
        assert_eq!(tail.last(), Some(&"Microsoft.Network/publicIPAddresses"));
        assert!(tail.contains(&"Microsoft.Network/applicationGateways"));
    }

    #[test]
    fn test_missing_master_profile_is_an_error() {
        let mut spec = vmas_spec();
        spec.master_profile = None;
        let err = generate_arm_resources(&spec, &CustomData::default()).unwrap_err();
        assert!(matches!(err, GeneratorError::MissingMasterProfile));
    }
}
