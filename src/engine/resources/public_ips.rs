use serde_json::json;

use crate::engine::armtype::{ArmResource, ResourceBody};

const PUBLIC_IP_TYPE: &str = "Microsoft.Network/publicIPAddresses";

fn public_ip(name: &str, sku: &str, properties: serde_json::Value) -> ArmResource<ResourceBody> {
    let mut body = ResourceBody::new(name, PUBLIC_IP_TYPE).properties(properties);
    body.sku = Some(json!({ "name": sku }));
    ArmResource::new("[variables('apiVersionNetwork')]", body)
}

/// Static public IP fronting the master or the agent load balancer. The DNS
/// label is only set when the address should resolve through the master FQDN.
pub fn create_public_ip_address(is_for_master: bool, include_dns: bool) -> ArmResource<ResourceBody> {
    let name = if is_for_master {
        "[variables('masterPublicIPAddressName')]"
    } else {
        "[variables('agentPublicIPAddressName')]"
    };
    let mut properties = json!({ "publicIPAllocationMethod": "Static" });
    if include_dns {
        properties["dnsSettings"] = json!({ "domainNameLabel": "[variables('masterFqdnPrefix')]" });
    }
    public_ip(name, "[variables('loadBalancerSku')]", properties)
}

pub fn create_app_gw_public_ip_address() -> ArmResource<ResourceBody> {
    public_ip(
        "[variables('appGwPublicIPAddressName')]",
        "Standard",
        json!({ "publicIPAllocationMethod": "Static" }),
    )
}

pub fn create_jumpbox_public_ip_address() -> ArmResource<ResourceBody> {
    public_ip(
        "[variables('jumpboxPublicIpAddressName')]",
        "Basic",
        json!({
            "dnsSettings": { "domainNameLabel": "[variables('masterFqdnPrefix')]" },
            "publicIPAllocationMethod": "Dynamic",
        }),
    )
}

/// IPv4 frontend for the dual-stack cluster load balancer.
pub fn create_cluster_public_ip_address() -> ArmResource<ResourceBody> {
    public_ip(
        "fee-ipv4",
        "[variables('loadBalancerSku')]",
        json!({ "publicIPAllocationMethod": "Static" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_public_ip_with_dns() {
        let value = create_public_ip_address(true, true).to_value().unwrap();
        assert_eq!(value["name"], "[variables('masterPublicIPAddressName')]");
        assert_eq!(
            value["properties"]["dnsSettings"]["domainNameLabel"],
            "[variables('masterFqdnPrefix')]"
        );
        assert_eq!(value["sku"]["name"], "[variables('loadBalancerSku')]");
    }

    #[test]
    fn test_agent_public_ip_without_dns() {
        let value = create_public_ip_address(false, false).to_value().unwrap();
        assert_eq!(value["name"], "[variables('agentPublicIPAddressName')]");
        assert!(value["properties"].get("dnsSettings").is_none());
    }
}
