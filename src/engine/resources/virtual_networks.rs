//! Cluster virtual network for availability-set, scale-set and hosted masters.

use serde_json::{Value, json};

use crate::api::addons::APP_GATEWAY_INGRESS_ADDON;
use crate::api::{ClusterSpec, is_addon_enabled};
use crate::engine::armtype::{ArmResource, ResourceBody};

const VNET_TYPE: &str = "Microsoft.Network/virtualNetworks";
const NSG_DEPENDENCY: &str = "[concat('Microsoft.Network/networkSecurityGroups/', variables('nsgName'))]";
const ROUTE_TABLE_DEPENDENCY: &str = "[concat('Microsoft.Network/routeTables/', variables('routeTableName'))]";

fn dependencies(spec: &ClusterSpec) -> Vec<String> {
    let mut deps = vec![NSG_DEPENDENCY.to_string()];
    if spec.requires_route_table() {
        deps.push(ROUTE_TABLE_DEPENDENCY.to_string());
    }
    deps
}

fn subnet(spec: &ClusterSpec, name: &str, prefix_param: &str, dual_stack: bool) -> Value {
    let mut properties = json!({ "networkSecurityGroup": { "id": "[variables('nsgID')]" } });
    if dual_stack {
        properties["addressPrefixes"] = json!([
            format!("[parameters('{}')]", prefix_param),
            "[parameters('masterSubnetIPv6')]",
        ]);
    } else {
        properties["addressPrefix"] = json!(format!("[parameters('{}')]", prefix_param));
    }
    if spec.requires_route_table() {
        properties["routeTable"] = json!({ "id": "[variables('routeTableID')]" });
    }
    json!({ "name": name, "properties": properties })
}

fn virtual_network(spec: &ClusterSpec, mut subnets: Vec<Value>, with_app_gw: bool) -> ArmResource<ResourceBody> {
    let mut prefixes = vec!["[parameters('vnetCidr')]"];
    if spec.feature_flags.enable_ipv6_dual_stack {
        prefixes.push("[parameters('vnetCidrIPv6')]");
    }
    if with_app_gw && is_addon_enabled(spec, APP_GATEWAY_INGRESS_ADDON) {
        subnets.push(json!({
            "name": "[variables('appGwSubnetName')]",
            "properties": { "addressPrefix": "[parameters('appGwSubnet')]" },
        }));
    }
    let body = ResourceBody::new("[variables('virtualNetworkName')]", VNET_TYPE).properties(json!({
        "addressSpace": { "addressPrefixes": prefixes },
        "subnets": subnets,
    }));
    ArmResource::new("[variables('apiVersionNetwork')]", body).with_depends_on(dependencies(spec))
}

pub fn create_virtual_network(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let dual_stack = spec.feature_flags.enable_ipv6_dual_stack;
    let master = subnet(spec, "[variables('subnetName')]", "masterSubnet", dual_stack);
    virtual_network(spec, vec![master], true)
}

/// Scale-set masters get separate master and agent subnets.
pub fn create_virtual_network_vmss(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let dual_stack = spec.feature_flags.enable_ipv6_dual_stack;
    let master = subnet(spec, "subnetmaster", "masterSubnet", dual_stack);
    let agent = subnet(spec, "subnetagent", "agentSubnet", false);
    virtual_network(spec, vec![master, agent], true)
}

pub fn create_hosted_master_virtual_network(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let dual_stack = spec.feature_flags.enable_ipv6_dual_stack;
    let master = subnet(spec, "[variables('subnetName')]", "masterSubnet", dual_stack);
    virtual_network(spec, vec![master], false)
}
