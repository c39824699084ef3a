//! Network interfaces for masters, the jumpbox and availability-set agents.

use serde_json::{Value, json};

use crate::api::{AgentPoolProfile, ClusterSpec, LoadBalancerSku};
use crate::engine::armtype::{ArmResource, CopyLoop, ResourceBody};

const NIC_TYPE: &str = "Microsoft.Network/networkInterfaces";
const MASTER_NIC_NAME: &str = "[concat(variables('masterVMNamePrefix'), 'nic-', copyIndex(variables('masterOffset')))]";
const MASTER_PRIVATE_IP: &str = "[variables('masterPrivateIpAddrs')[copyIndex(variables('masterOffset'))]]";
const MASTER_LB_POOL: &str =
    "[concat(variables('masterLbID'), '/backendAddressPools/', variables('masterLbBackendPoolName'))]";
const MASTER_INTERNAL_LB_POOL: &str = "[concat(variables('masterInternalLbID'), '/backendAddressPools/', variables('masterLbBackendPoolName'))]";

/// Secondary dynamic IP configurations used by Azure CNI for pod addresses.
fn secondary_ip_configs(count: u32, subnet: &str) -> Vec<Value> {
    (2..=count)
        .map(|i| {
            json!({
                "name": format!("ipconfig{}", i),
                "properties": {
                    "primary": false,
                    "privateIPAllocationMethod": "Dynamic",
                    "subnet": { "id": subnet },
                },
            })
        })
        .collect()
}

fn ipv6_config(subnet: &str) -> Value {
    json!({
        "name": "ipconfigv6",
        "properties": {
            "privateIPAddressVersion": "IPv6",
            "primary": false,
            "subnet": { "id": subnet },
        },
    })
}

fn ids(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| json!({ "id": id })).collect())
}

/// Properties shared by both master NIC flavours.
fn master_nic_properties(spec: &ClusterSpec, ip_configurations: Vec<Value>) -> Value {
    let mut properties = json!({ "ipConfigurations": ip_configurations });
    if !spec.orchestrator_profile.is_azure_cni() && !spec.is_azure_stack_cloud() {
        properties["enableIPForwarding"] = json!(true);
    }
    if spec.linux_profile.as_ref().is_some_and(|l| l.has_custom_nodes_dns()) {
        properties["dnsSettings"] = json!({ "dnsServers": ["[parameters('dnsServer')]"] });
    }
    if spec.master_profile.as_ref().is_some_and(|m| m.is_custom_vnet()) {
        properties["networkSecurityGroup"] = json!({ "id": "[variables('nsgID')]" });
    }
    properties
}

fn vnet_dependency(spec: &ClusterSpec) -> String {
    if spec.master_profile.as_ref().is_some_and(|m| m.is_custom_vnet()) {
        "[variables('nsgID')]".to_string()
    } else {
        "[variables('vnetID')]".to_string()
    }
}

/// Master NIC behind the public load balancer, with the per-master SSH NAT rule.
pub fn create_master_vm_network_interfaces(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let master = spec.master_profile.clone().unwrap_or_default();
    let mut deps = vec![vnet_dependency(spec)];
    if master.has_multiple_nodes() {
        deps.push("[variables('masterInternalLbName')]".to_string());
    }
    if master.cosmos_etcd {
        deps.push("[resourceId('Microsoft.DocumentDB/databaseAccounts/', variables('cosmosAccountName'))]".to_string());
    }
    deps.push("[variables('masterLbName')]".to_string());

    let mut pools = vec![MASTER_LB_POOL];
    if master.has_multiple_nodes() {
        pools.push(MASTER_INTERNAL_LB_POOL);
    }

    let mut ip_configurations = vec![json!({
        "name": "ipconfig1",
        "properties": {
            "loadBalancerBackendAddressPools": ids(&pools),
            "loadBalancerInboundNatRules": [{
                "id": "[concat(variables('masterLbID'),'/inboundNatRules/SSH-',variables('masterVMNamePrefix'),copyIndex(variables('masterOffset')))]",
            }],
            "privateIPAddress": MASTER_PRIVATE_IP,
            "primary": true,
            "privateIPAllocationMethod": "Static",
            "subnet": { "id": "[variables('vnetSubnetID')]" },
        },
    })];
    if spec.orchestrator_profile.is_azure_cni() {
        ip_configurations.extend(secondary_ip_configs(master.ip_address_count, "[variables('vnetSubnetID')]"));
    }
    if spec.feature_flags.enable_ipv6_dual_stack {
        ip_configurations.push(ipv6_config("[variables('vnetSubnetID')]"));
    }

    let body = ResourceBody::new(MASTER_NIC_NAME, NIC_TYPE)
        .properties(master_nic_properties(spec, ip_configurations));
    ArmResource::new("[variables('apiVersionNetwork')]", body)
        .with_copy(CopyLoop::masters("nicLoopNode"))
        .with_depends_on(deps)
}

/// Master NIC for private clusters: no public NAT rules, internal LB pool only
/// (plus the public pool with a Standard SKU) when there are several masters.
pub fn create_private_cluster_master_vm_network_interface(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let master = spec.master_profile.clone().unwrap_or_default();
    let mut deps = vec![vnet_dependency(spec)];

    let mut ip_config = json!({
        "name": "ipconfig1",
        "properties": {
            "privateIPAddress": MASTER_PRIVATE_IP,
            "primary": true,
            "privateIPAllocationMethod": "Static",
            "subnet": { "id": "[variables('vnetSubnetID')]" },
        },
    });
    if master.has_multiple_nodes() {
        deps.push("[variables('masterInternalLbName')]".to_string());
        let mut pools = vec![MASTER_INTERNAL_LB_POOL];
        if spec.kubernetes_config().load_balancer_sku == LoadBalancerSku::Standard {
            deps.push("[variables('masterLbName')]".to_string());
            pools.push(MASTER_LB_POOL);
        }
        ip_config["properties"]["loadBalancerBackendAddressPools"] = ids(&pools);
        ip_config["properties"]["loadBalancerInboundNatRules"] = json!([]);
    }

    let mut ip_configurations = vec![ip_config];
    if spec.orchestrator_profile.is_azure_cni() {
        ip_configurations.extend(secondary_ip_configs(master.ip_address_count, "[variables('vnetSubnetID')]"));
    }

    let body = ResourceBody::new(MASTER_NIC_NAME, NIC_TYPE)
        .properties(master_nic_properties(spec, ip_configurations));
    ArmResource::new("[variables('apiVersionNetwork')]", body)
        .with_copy(CopyLoop::masters("nicLoopNode"))
        .with_depends_on(deps)
}

pub fn create_jumpbox_network_interface(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let mut deps = vec![
        "[concat('Microsoft.Network/publicIpAddresses/', variables('jumpboxPublicIpAddressName'))]".to_string(),
        "[concat('Microsoft.Network/networkSecurityGroups/', variables('jumpboxNetworkSecurityGroupName'))]".to_string(),
    ];
    if !spec.master_profile.as_ref().is_some_and(|m| m.is_custom_vnet()) {
        deps.push("[variables('vnetID')]".to_string());
    }

    let body = ResourceBody::new("[variables('jumpboxNetworkInterfaceName')]", NIC_TYPE).properties(json!({
        "ipConfigurations": [{
            "name": "ipconfig1",
            "properties": {
                "subnet": { "id": "[variables('vnetSubnetID')]" },
                "primary": true,
                "privateIPAllocationMethod": "Dynamic",
                "publicIPAddress": {
                    "id": "[resourceId('Microsoft.Network/publicIpAddresses', variables('jumpboxPublicIpAddressName'))]",
                },
            },
        }],
        "networkSecurityGroup": {
            "id": "[resourceId('Microsoft.Network/networkSecurityGroups', variables('jumpboxNetworkSecurityGroupName'))]",
        },
    }));
    ArmResource::new("[variables('apiVersionNetwork')]", body).with_depends_on(deps)
}

/// NICs of an availability-set agent pool, one per VM in the copy loop.
pub fn create_agent_vmas_network_interface(
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
) -> ArmResource<ResourceBody> {
    let pool = &profile.name;
    let standard_lb = spec.kubernetes_config().load_balancer_sku == LoadBalancerSku::Standard
        && !spec.is_hosted_master();
    let dual_stack = spec.feature_flags.enable_ipv6_dual_stack;
    let subnet = format!("[variables('{}VnetSubnetID')]", pool);

    let mut deps = vec![if profile.is_custom_vnet() {
        "[variables('nsgID')]".to_string()
    } else {
        "[variables('vnetID')]".to_string()
    }];
    if standard_lb {
        deps.push("[variables('agentLbID')]".to_string());
    }

    let mut ip_configurations = Vec::new();
    for i in 1..=profile.ip_address_count.max(1) {
        let mut properties = json!({
            "privateIPAllocationMethod": "Dynamic",
            "subnet": { "id": subnet },
        });
        let mut pools = Vec::new();
        if i == 1 {
            properties["primary"] = json!(true);
            if standard_lb {
                pools.push(json!({
                    "id": "[concat(variables('agentLbID'), '/backendAddressPools/', variables('agentLbBackendPoolName'))]",
                }));
            }
        }
        if dual_stack && spec.kubernetes_config().load_balancer_sku != LoadBalancerSku::Standard {
            pools.push(json!({
                "id": "[concat(resourceId('Microsoft.Network/loadBalancers',parameters('masterEndpointDNSNamePrefix')), '/backendAddressPools/', parameters('masterEndpointDNSNamePrefix'))]",
            }));
        }
        if i == 1 || !pools.is_empty() {
            properties["loadBalancerBackendAddressPools"] = Value::Array(pools);
        }
        ip_configurations.push(json!({ "name": format!("ipconfig{}", i), "properties": properties }));
    }
    if dual_stack {
        ip_configurations.push(ipv6_config(&subnet));
    }

    let mut properties = json!({ "ipConfigurations": ip_configurations });
    if profile.is_custom_vnet() {
        properties["networkSecurityGroup"] = json!({ "id": "[variables('nsgID')]" });
    }
    if !spec.orchestrator_profile.is_azure_cni() && !spec.is_azure_stack_cloud() {
        properties["enableIPForwarding"] = json!(true);
    }

    let body = ResourceBody::new(
        format!("[concat(variables('{0}VMNamePrefix'), 'nic-', copyIndex(variables('{0}Offset')))]", pool),
        NIC_TYPE,
    )
    .properties(properties);
    ArmResource::new("[variables('apiVersionNetwork')]", body)
        .with_copy(CopyLoop::pool(pool, "loop"))
        .with_depends_on(deps)
}
