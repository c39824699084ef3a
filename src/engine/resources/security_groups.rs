//! Network security groups for masters, the private-cluster jumpbox and
//! hosted masters.

use serde::{Deserialize, Serialize};

use crate::api::ClusterSpec;
use crate::engine::armtype::ArmResource;

const NSG_TYPE: &str = "Microsoft.Network/networkSecurityGroups";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSecurityGroup {
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: NetworkSecurityGroupProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroupProperties {
    pub security_rules: Vec<SecurityRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
    pub properties: SecurityRuleProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuleProperties {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub destination_address_prefix: String,
    pub destination_port_range: String,
    pub direction: String,
    pub priority: u32,
    pub protocol: String,
    pub source_address_prefix: String,
    pub source_port_range: String,
}

impl SecurityRule {
    fn inbound_tcp(name: &str, description: &str, port_range: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            properties: SecurityRuleProperties {
                access: "Allow".to_string(),
                description: Some(description.to_string()),
                destination_address_prefix: "*".to_string(),
                destination_port_range: port_range.to_string(),
                direction: "Inbound".to_string(),
                priority,
                protocol: "Tcp".to_string(),
                source_address_prefix: "*".to_string(),
                source_port_range: "*".to_string(),
            },
        }
    }
}

fn nsg(rules: Vec<SecurityRule>) -> ArmResource<NetworkSecurityGroup> {
    ArmResource::new(
        "[variables('apiVersionNetwork')]",
        NetworkSecurityGroup {
            name: "[variables('nsgName')]".to_string(),
            location: "[variables('location')]".to_string(),
            resource_type: NSG_TYPE.to_string(),
            properties: NetworkSecurityGroupProperties {
                security_rules: rules,
            },
        },
    )
}

/// Master NSG: SSH and API server TLS, RDP when Windows agents exist, and the
/// outbound lockdown pair when `BlockOutboundInternet` is set.
pub fn create_network_security_group(spec: &ClusterSpec) -> ArmResource<NetworkSecurityGroup> {
    let mut rules = vec![
        SecurityRule::inbound_tcp("allow_ssh", "Allow SSH traffic to master", "22-22", 101),
        SecurityRule::inbound_tcp(
            "allow_kube_tls",
            "Allow kube-apiserver (tls) traffic to master",
            "443-443",
            100,
        ),
    ];

    if spec.has_windows() {
        rules.push(SecurityRule::inbound_tcp(
            "allow_rdp",
            "Allow RDP traffic to master",
            "3389-3389",
            102,
        ));
    }

    if spec.feature_flags.block_outbound_internet {
        rules.push(SecurityRule {
            name: "allow_vnet".to_string(),
            properties: SecurityRuleProperties {
                access: "Allow".to_string(),
                description: Some("Allow outbound internet to vnet".to_string()),
                destination_address_prefix: "[parameters('masterSubnet')]".to_string(),
                destination_port_range: "*".to_string(),
                direction: "Outbound".to_string(),
                priority: 110,
                protocol: "*".to_string(),
                source_address_prefix: "VirtualNetwork".to_string(),
                source_port_range: "*".to_string(),
            },
        });
        rules.push(SecurityRule {
            name: "block_outbound".to_string(),
            properties: SecurityRuleProperties {
                access: "Deny".to_string(),
                description: Some("Block outbound internet from master".to_string()),
                destination_address_prefix: "*".to_string(),
                destination_port_range: "*".to_string(),
                direction: "Outbound".to_string(),
                priority: 120,
                protocol: "*".to_string(),
                source_address_prefix: "*".to_string(),
                source_port_range: "*".to_string(),
            },
        });
    }

    nsg(rules)
}

pub fn create_jumpbox_nsg() -> ArmResource<NetworkSecurityGroup> {
    let mut rule = SecurityRule::inbound_tcp("default-allow-ssh", "", "22", 1000);
    rule.properties.description = None;
    nsg(vec![rule])
}

/// Hosted masters get an NSG with no rules.
pub fn create_hosted_master_nsg() -> ArmResource<NetworkSecurityGroup> {
    nsg(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AgentPoolProfile, OsType};

    fn names(res: &ArmResource<NetworkSecurityGroup>) -> Vec<&str> {
        res.body
            .properties
            .security_rules
            .iter()
            .map(|r| r.name.as_str())
            .collect()
    }

    #[test]
    fn test_default_master_rules() {
        let res = create_network_security_group(&ClusterSpec::default());
        assert_eq!(names(&res), vec!["allow_ssh", "allow_kube_tls"]);
        assert_eq!(res.body.properties.security_rules[1].properties.priority, 100);
    }

    #[test]
    fn test_windows_and_block_outbound() {
        let mut spec = ClusterSpec::default();
        spec.agent_pool_profiles.push(AgentPoolProfile {
            name: "win".to_string(),
            os_type: OsType::Windows,
            ..Default::default()
        });
        spec.feature_flags.block_outbound_internet = true;
        let res = create_network_security_group(&spec);
        assert_eq!(
            names(&res),
            vec!["allow_ssh", "allow_kube_tls", "allow_rdp", "allow_vnet", "block_outbound"]
        );
        let block = &res.body.properties.security_rules[4].properties;
        assert_eq!(block.access, "Deny");
        assert_eq!(block.direction, "Outbound");
    }

    #[test]
    fn test_hosted_master_nsg_serializes_empty_rules() {
        let value = serde_json::to_value(create_hosted_master_nsg()).unwrap();
        assert_eq!(value["properties"]["securityRules"], serde_json::json!([]));
    }

    #[test]
    fn test_jumpbox_rule_has_no_description() {
        let value = serde_json::to_value(create_jumpbox_nsg()).unwrap();
        let rule = &value["properties"]["securityRules"][0];
        assert_eq!(rule["name"], "default-allow-ssh");
        assert!(rule["properties"].get("description").is_none());
    }
}
