//! Application gateway fronting the ingress controller addon.

use serde_json::json;

use crate::api::ClusterSpec;
use crate::api::addons::APP_GATEWAY_INGRESS_ADDON;
use crate::engine::armtype::{ArmResource, ResourceBody};

fn app_gw_ref(path: &str) -> serde_json::Value {
    json!({ "id": format!("[concat(variables('appGwId'), '/{}')]", path) })
}

/// Application gateway with a single HTTP listener routed to an empty pool.
/// The ingress controller fills the pool at runtime.
pub fn create_application_gateway(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let config = spec
        .kubernetes_config()
        .addon(APP_GATEWAY_INGRESS_ADDON)
        .map(|a| a.config.clone())
        .unwrap_or_default();

    let mut frontend_ips = vec![json!({
        "name": "frontendIP",
        "properties": {
            "publicIPAddress": {
                "id": "[resourceId('Microsoft.Network/publicIpAddresses',variables('appGwPublicIPAddressName'))]",
            },
        },
    })];
    if let Some(private_ip) = config.get("appgw-private-ip").filter(|ip| !ip.is_empty()) {
        frontend_ips.push(json!({
            "name": "privateIp",
            "properties": { "privateIPAddress": private_ip },
        }));
    }

    let mut properties = json!({
        "sku": {
            "capacity": 2,
            "name": "[parameters('appGwSku')]",
            "tier": "[parameters('appGwSku')]",
        },
        "gatewayIPConfigurations": [{
            "name": "gatewayIP",
            "properties": {
                "subnet": { "id": "[concat(variables('vnetID'),'/subnets/',variables('appGwSubnetName'))]" },
            },
        }],
        "frontendIPConfigurations": frontend_ips,
        "frontendPorts": [{ "name": "httpPort", "properties": { "port": 80 } }],
        "backendAddressPools": [{ "name": "pool", "properties": { "backendAddresses": [] } }],
        "httpListeners": [{
            "name": "httpListener",
            "properties": {
                "frontendIPConfiguration": app_gw_ref("frontendIPConfigurations/frontendIP"),
                "frontendPort": app_gw_ref("frontendPorts/httpPort"),
                "protocol": "Http",
            },
        }],
        "backendHttpSettingsCollection": [{
            "name": "setting",
            "properties": { "port": 80, "protocol": "Http" },
        }],
        "requestRoutingRules": [{
            "name": "rule",
            "properties": {
                "backendAddressPool": app_gw_ref("backendAddressPools/pool"),
                "backendHttpSettings": app_gw_ref("backendHttpSettingsCollection/setting"),
                "httpListener": app_gw_ref("httpListeners/httpListener"),
            },
        }],
    });
    if config.get("appgw-sku").is_some_and(|sku| sku == "WAF_v2") {
        properties["webApplicationFirewallConfiguration"] =
            json!({ "enabled": true, "firewallMode": "Detection" });
    }

    let body = ResourceBody::new("[variables('appGwName')]", "Microsoft.Network/applicationGateways")
        .properties(properties);
    ArmResource::new("[variables('apiVersionNetwork')]", body).with_depends_on(vec![
        "[concat('Microsoft.Network/publicIPAddresses/', variables('appGwPublicIPAddressName'))]".to_string(),
        "[concat('Microsoft.Network/virtualNetworks/', variables('virtualNetworkName'))]".to_string(),
    ])
}

/// User-assigned identity used by the ingress controller.
pub fn create_app_gw_user_assigned_identity() -> ArmResource<ResourceBody> {
    ArmResource::new(
        "[variables('apiVersionManagedIdentity')]",
        ResourceBody::new(
            "[variables('appGwICIdentityName')]",
            "Microsoft.ManagedIdentity/userAssignedIdentities",
        ),
    )
}
