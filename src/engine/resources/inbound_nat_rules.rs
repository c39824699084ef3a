use serde::{Deserialize, Serialize};

use crate::engine::armtype::SubResource;

/// SSH frontend ports assigned to masters by index.
pub const SSH_NAT_PORTS: [u16; 5] = [22, 2201, 2202, 2203, 2204];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundNatRuleProperties {
    pub backend_port: u16,
    #[serde(rename = "enableFloatingIP")]
    pub enable_floating_ip: bool,
    #[serde(rename = "frontendIPConfiguration")]
    pub frontend_ip_configuration: SubResource,
    /// Literal port, or an ARM expression indexing `sshNatPorts`.
    pub frontend_port: serde_json::Value,
    pub protocol: String,
}

/// Named inbound NAT rule, inline in a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundNatRule {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub properties: InboundNatRuleProperties,
}

/// Inline SSH NAT rules for availability-set masters, one per master.
/// Masters are capped at the length of [`SSH_NAT_PORTS`].
pub fn create_inbound_nat_rules(master_count: u32) -> Vec<InboundNatRule> {
    SSH_NAT_PORTS
        .iter()
        .take(master_count as usize)
        .enumerate()
        .map(|(i, port)| InboundNatRule {
            name: format!("[concat('SSH-', variables('masterVMNamePrefix'), {})]", i),
            resource_type: None,
            location: None,
            properties: InboundNatRuleProperties {
                backend_port: 22,
                enable_floating_ip: false,
                frontend_ip_configuration: SubResource::new("[variables('masterLbIPConfigID')]"),
                frontend_port: serde_json::Value::from(*port),
                protocol: "Tcp".to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_master_gets_port_22() {
        let rules = create_inbound_nat_rules(1);
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.name, "[concat('SSH-', variables('masterVMNamePrefix'), 0)]");
        assert_eq!(rule.properties.backend_port, 22);
        assert_eq!(rule.properties.frontend_port, serde_json::json!(22));
    }

    #[test]
    fn test_ports_follow_fixed_list() {
        let rules = create_inbound_nat_rules(3);
        let ports: Vec<_> = rules.iter().map(|r| r.properties.frontend_port.clone()).collect();
        assert_eq!(ports, vec![serde_json::json!(22), serde_json::json!(2201), serde_json::json!(2202)]);
    }
}
