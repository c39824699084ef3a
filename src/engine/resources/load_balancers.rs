//! Load balancers: master public, master internal, standard agent and the
//! dual-stack cluster balancer.

use serde::{Deserialize, Serialize};

use super::inbound_nat_rules::{InboundNatRule, create_inbound_nat_rules};
use crate::api::version::parse_version;
use crate::api::{ClusterSpec, LoadBalancerSku};
use crate::engine::armtype::{ArmResource, Sku, SubResource};

const LOAD_BALANCER_TYPE: &str = "Microsoft.Network/loadBalancers";

const MASTER_LB_BACKEND_POOL: &str =
    "[concat(variables('masterLbID'), '/backendAddressPools/', variables('masterLbBackendPoolName'))]";
const MASTER_INTERNAL_LB_BACKEND_POOL: &str = "[concat(variables('masterInternalLbID'), '/backendAddressPools/', variables('masterLbBackendPoolName'))]";
const AGENT_LB_BACKEND_POOL: &str =
    "[concat(variables('agentLbID'), '/backendAddressPools/', variables('agentLbBackendPoolName'))]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub sku: Sku,
    pub properties: LoadBalancerProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProperties {
    pub backend_address_pools: Vec<NamedItem>,
    #[serde(rename = "frontendIPConfigurations")]
    pub frontend_ip_configurations: Vec<FrontendIpConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancing_rules: Option<Vec<LoadBalancingRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probes: Option<Vec<Probe>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_nat_rules: Option<Vec<InboundNatRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_nat_pools: Option<Vec<InboundNatPool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_rules: Option<Vec<OutboundRule>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedItem {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendIpConfiguration {
    pub name: String,
    pub properties: FrontendIpConfigurationProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendIpConfigurationProperties {
    #[serde(rename = "publicIPAddress", default, skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<SubResource>,
    #[serde(rename = "privateIPAddress", default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    #[serde(rename = "privateIPAllocationMethod", default, skip_serializing_if = "Option::is_none")]
    pub private_ip_allocation_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancingRule {
    pub name: String,
    pub properties: LoadBalancingRuleProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingRuleProperties {
    #[serde(rename = "frontendIPConfiguration")]
    pub frontend_ip_configuration: SubResource,
    pub backend_address_pool: SubResource,
    pub protocol: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    #[serde(rename = "enableFloatingIP", default, skip_serializing_if = "Option::is_none")]
    pub enable_floating_ip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_in_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_distribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<SubResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub name: String,
    pub properties: ProbeProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeProperties {
    pub protocol: String,
    pub port: u16,
    pub interval_in_seconds: u32,
    pub number_of_probes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundNatPool {
    pub name: String,
    pub properties: InboundNatPoolProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundNatPoolProperties {
    #[serde(rename = "frontendIPConfiguration")]
    pub frontend_ip_configuration: SubResource,
    pub protocol: String,
    pub backend_port: u16,
    pub frontend_port_range_start: u16,
    pub frontend_port_range_end: u16,
    #[serde(rename = "enableFloatingIP")]
    pub enable_floating_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRule {
    pub name: String,
    pub properties: OutboundRuleProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRuleProperties {
    #[serde(rename = "frontendIPConfigurations")]
    pub frontend_ip_configurations: Vec<SubResource>,
    pub backend_address_pool: SubResource,
    pub protocol: String,
    pub idle_timeout_in_minutes: u32,
    #[serde(rename = "enableTcpReset", default, skip_serializing_if = "Option::is_none")]
    pub enable_tcp_reset: Option<bool>,
    pub allocated_outbound_ports: u32,
}

fn tcp_https_probe(port: u16) -> Probe {
    Probe {
        name: "tcpHTTPSProbe".to_string(),
        properties: ProbeProperties {
            protocol: "Tcp".to_string(),
            port,
            interval_in_seconds: 5,
            number_of_probes: 2,
        },
    }
}

fn public_frontend(name: &str, public_ip_var: &str) -> FrontendIpConfiguration {
    FrontendIpConfiguration {
        name: name.to_string(),
        properties: FrontendIpConfigurationProperties {
            public_ip_address: Some(SubResource::new(format!(
                "[resourceId('Microsoft.Network/publicIpAddresses',variables('{}'))]",
                public_ip_var
            ))),
            ..Default::default()
        },
    }
}

fn load_balancer(name: &str, properties: LoadBalancerProperties) -> LoadBalancer {
    LoadBalancer {
        name: name.to_string(),
        location: "[variables('location')]".to_string(),
        resource_type: LOAD_BALANCER_TYPE.to_string(),
        sku: Sku::named("[variables('loadBalancerSku')]"),
        properties,
    }
}

/// Master load balancer.
///
/// Public clusters expose HTTPS (plus UDP 1123 on Standard SKU) and SSH, as
/// NAT rules for availability-set masters or a NAT pool for scale-set
/// masters. Private clusters only carry the outbound rule.
pub fn create_master_load_balancer(spec: &ClusterSpec, is_vmss: bool) -> ArmResource<LoadBalancer> {
    let k8s = spec.kubernetes_config();
    let mut properties = LoadBalancerProperties {
        backend_address_pools: vec![NamedItem {
            name: "[variables('masterLbBackendPoolName')]".to_string(),
        }],
        frontend_ip_configurations: vec![public_frontend(
            "[variables('masterLbIPConfigName')]",
            "masterPublicIPAddressName",
        )],
        ..Default::default()
    };

    if !k8s.is_private_cluster() {
        let rule = |name: &str, protocol: &str, port: u16| LoadBalancingRule {
            name: name.to_string(),
            properties: LoadBalancingRuleProperties {
                frontend_ip_configuration: SubResource::new("[variables('masterLbIPConfigID')]"),
                backend_address_pool: SubResource::new(MASTER_LB_BACKEND_POOL),
                protocol: protocol.to_string(),
                frontend_port: port,
                backend_port: port,
                enable_floating_ip: Some(false),
                idle_timeout_in_minutes: Some(5),
                load_distribution: Some("Default".to_string()),
                probe: Some(SubResource::new(
                    "[concat(variables('masterLbID'),'/probes/tcpHTTPSProbe')]",
                )),
            },
        };
        let mut rules = vec![rule("LBRuleHTTPS", "Tcp", 443)];
        if k8s.load_balancer_sku == LoadBalancerSku::Standard {
            rules.push(rule("LBRuleUDP", "Udp", 1123));
        }
        properties.load_balancing_rules = Some(rules);
        properties.probes = Some(vec![tcp_https_probe(443)]);

        if is_vmss {
            properties.inbound_nat_pools = Some(vec![InboundNatPool {
                name: "[concat('SSH-', variables('masterVMNamePrefix'), 'natpools')]".to_string(),
                properties: InboundNatPoolProperties {
                    frontend_ip_configuration: SubResource::new("[variables('masterLbIPConfigID')]"),
                    protocol: "Tcp".to_string(),
                    backend_port: 22,
                    frontend_port_range_start: 50001,
                    frontend_port_range_end: 50119,
                    enable_floating_ip: false,
                },
            }]);
        } else {
            let count = spec.master_profile.as_ref().map_or(1, |m| m.count);
            properties.inbound_nat_rules = Some(create_inbound_nat_rules(count));
        }
    } else {
        let mut outbound = create_outbound_rules(spec);
        outbound.properties.backend_address_pool = SubResource::new(MASTER_LB_BACKEND_POOL);
        outbound.properties.frontend_ip_configurations =
            vec![SubResource::new("[variables('masterLbIPConfigID')]")];
        properties.outbound_rules = Some(vec![outbound]);
    }

    ArmResource::new(
        "[variables('apiVersionNetwork')]",
        load_balancer("[variables('masterLbName')]", properties),
    )
    .depends_on("[concat('Microsoft.Network/publicIPAddresses/', variables('masterPublicIPAddressName'))]")
}

/// Whether the orchestrator version supports TCP reset on outbound rules:
/// 1.13.7+, 1.14.3+ and every 1.15 onwards.
pub(crate) fn supports_tcp_reset(version: &str) -> bool {
    let Some(v) = parse_version(version) else {
        return false;
    };
    let current = (v.major, v.minor, v.patch);
    if current < (1, 13, 7) {
        return false;
    }
    if (v.major, v.minor) == (1, 14) && current < (1, 14, 3) {
        return false;
    }
    true
}

/// Outbound SNAT rule through the agent standard load balancer.
pub fn create_outbound_rules(spec: &ClusterSpec) -> OutboundRule {
    let k8s = spec.kubernetes_config();
    OutboundRule {
        name: "LBOutboundRule".to_string(),
        properties: OutboundRuleProperties {
            frontend_ip_configurations: vec![SubResource::new("[variables('agentLbIPConfigID')]")],
            backend_address_pool: SubResource::new(AGENT_LB_BACKEND_POOL),
            protocol: "All".to_string(),
            idle_timeout_in_minutes: k8s.outbound_rule_idle_timeout_in_minutes,
            enable_tcp_reset: supports_tcp_reset(&spec.orchestrator_profile.orchestrator_version)
                .then_some(true),
            allocated_outbound_ports: 0,
        },
    }
}

/// Standard SKU load balancer with every node in its backend pool.
pub fn create_standard_load_balancer_for_node_pools(spec: &ClusterSpec) -> ArmResource<LoadBalancer> {
    let properties = LoadBalancerProperties {
        backend_address_pools: vec![NamedItem {
            name: "[variables('agentLbBackendPoolName')]".to_string(),
        }],
        frontend_ip_configurations: vec![public_frontend(
            "[variables('agentLbIPConfigName')]",
            "agentPublicIPAddressName",
        )],
        outbound_rules: Some(vec![create_outbound_rules(spec)]),
        ..Default::default()
    };

    ArmResource::new(
        "[variables('apiVersionNetwork')]",
        load_balancer("[variables('agentLbName')]", properties),
    )
    .depends_on("[concat('Microsoft.Network/publicIPAddresses/', variables('agentPublicIPAddressName'))]")
}

/// Internal load balancer in front of the API servers of multi-master clusters.
pub fn create_master_internal_load_balancer(spec: &ClusterSpec) -> ArmResource<LoadBalancer> {
    let master = spec.master_profile.as_ref();
    let dependency = if master.is_some_and(|m| m.is_custom_vnet()) {
        "[variables('nsgID')]"
    } else {
        "[variables('vnetID')]"
    };
    let subnet = if master.is_some_and(|m| m.is_vmss()) {
        "[variables('vnetSubnetIDMaster')]"
    } else {
        "[variables('vnetSubnetID')]"
    };

    let rule = |name: &str, protocol: &str, frontend: u16, backend: u16| LoadBalancingRule {
        name: name.to_string(),
        properties: LoadBalancingRuleProperties {
            frontend_ip_configuration: SubResource::new("[variables('masterInternalLbIPConfigID')]"),
            backend_address_pool: SubResource::new(MASTER_INTERNAL_LB_BACKEND_POOL),
            protocol: protocol.to_string(),
            frontend_port: frontend,
            backend_port: backend,
            enable_floating_ip: Some(false),
            idle_timeout_in_minutes: Some(5),
            load_distribution: None,
            probe: Some(SubResource::new(
                "[concat(variables('masterInternalLbID'),'/probes/tcpHTTPSProbe')]",
            )),
        },
    };
    let mut rules = vec![rule("InternalLBRuleHTTPS", "Tcp", 443, 4443)];
    if spec.kubernetes_config().load_balancer_sku == LoadBalancerSku::Standard {
        rules.push(rule("LBRuleUDP", "Udp", 1123, 1123));
    }

    let properties = LoadBalancerProperties {
        backend_address_pools: vec![NamedItem {
            name: "[variables('masterLbBackendPoolName')]".to_string(),
        }],
        frontend_ip_configurations: vec![FrontendIpConfiguration {
            name: "[variables('masterInternalLbIPConfigName')]".to_string(),
            properties: FrontendIpConfigurationProperties {
                public_ip_address: None,
                private_ip_address: Some("[variables('kubernetesAPIServerIP')]".to_string()),
                private_ip_allocation_method: Some("Static".to_string()),
                subnet: Some(SubResource::new(subnet)),
            },
        }],
        load_balancing_rules: Some(rules),
        probes: Some(vec![tcp_https_probe(4443)]),
        ..Default::default()
    };

    ArmResource::new(
        "[variables('apiVersionNetwork')]",
        load_balancer("[variables('masterInternalLbName')]", properties),
    )
    .depends_on(dependency)
}

/// Cluster load balancer for IPv6 dual-stack: one IPv4 frontend and a rule
/// so egress works.
pub fn create_cluster_load_balancer_for_ipv6() -> ArmResource<LoadBalancer> {
    let properties = LoadBalancerProperties {
        backend_address_pools: vec![NamedItem {
            name: "[parameters('masterEndpointDNSNamePrefix')]".to_string(),
        }],
        frontend_ip_configurations: vec![FrontendIpConfiguration {
            name: "LBFE-v4".to_string(),
            properties: FrontendIpConfigurationProperties {
                public_ip_address: Some(SubResource::new(
                    "[resourceId('Microsoft.Network/publicIpAddresses', 'fee-ipv4')]",
                )),
                ..Default::default()
            },
        }],
        load_balancing_rules: Some(vec![LoadBalancingRule {
            name: "LBRuleIPv4".to_string(),
            properties: LoadBalancingRuleProperties {
                frontend_ip_configuration: SubResource::new("[resourceId('Microsoft.Network/loadBalancers/frontendIpConfigurations', parameters('masterEndpointDNSNamePrefix'), 'LBFE-v4')]"),
                backend_address_pool: SubResource::new("[resourceId('Microsoft.Network/loadBalancers/backendAddressPools', parameters('masterEndpointDNSNamePrefix'), parameters('masterEndpointDNSNamePrefix'))]"),
                protocol: "Tcp".to_string(),
                frontend_port: 9090,
                backend_port: 9090,
                enable_floating_ip: None,
                idle_timeout_in_minutes: None,
                load_distribution: None,
                probe: None,
            },
        }]),
        ..Default::default()
    };

    ArmResource::new(
        "[variables('apiVersionNetwork')]",
        load_balancer("[parameters('masterEndpointDNSNamePrefix')]", properties),
    )
    .depends_on("[concat('Microsoft.Network/publicIPAddresses/', 'fee-ipv4')]")
}
