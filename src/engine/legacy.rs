//! Legacy document assembly.
//!
//! The master load balancer, master NSG and cluster VNet are rendered from
//! their own templates through the deployment accessors, without touching
//! the structured builders, and take the place of the structured versions
//! in the resource list. The remaining sections are spliced in as JSON.

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::api::ClusterSpec;
use crate::engine::accessors::TemplateAccessors;
use crate::engine::assets::{
    KUBERNETES_BASE_TEMPLATE, MASTER_LB_TEMPLATE, MASTER_NSG_TEMPLATE, VNET_TEMPLATE, asset,
};
use crate::engine::substitution::describe;
use crate::error::GeneratorError;

const TEMPLATES: [&str; 4] = [
    KUBERNETES_BASE_TEMPLATE,
    MASTER_LB_TEMPLATE,
    MASTER_NSG_TEMPLATE,
    VNET_TEMPLATE,
];

#[derive(Debug, Serialize)]
struct Subnet {
    name: &'static str,
    prefix: &'static str,
    dual_stack: bool,
}

fn template_error(err: tera::Error) -> GeneratorError {
    GeneratorError::Template(describe(&err))
}

pub struct LegacyRenderer {
    tera: Tera,
    spec: Arc<ClusterSpec>,
}

impl LegacyRenderer {
    pub fn new(spec: Arc<ClusterSpec>) -> Result<Self, GeneratorError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        TemplateAccessors::deployment(Arc::clone(&spec)).register(&mut tera);
        for path in TEMPLATES {
            tera.add_raw_template(path, asset(path)?)
                .map_err(template_error)?;
        }
        Ok(Self { tera, spec })
    }

    fn render_resource(&self, path: &str, context: &Context) -> Result<Value, GeneratorError> {
        let text = self.tera.render(path, context).map_err(template_error)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn subnets(&self) -> Vec<Subnet> {
        let dual_stack = self.spec.feature_flags.enable_ipv6_dual_stack;
        if self.spec.is_vmss_master() && !self.spec.is_hosted_master() {
            vec![
                Subnet {
                    name: "subnetmaster",
                    prefix: "masterSubnet",
                    dual_stack,
                },
                Subnet {
                    name: "subnetagent",
                    prefix: "agentSubnet",
                    dual_stack: false,
                },
            ]
        } else {
            vec![Subnet {
                name: "[variables('subnetName')]",
                prefix: "masterSubnet",
                dual_stack,
            }]
        }
    }

    /// Master network resources this cluster deploys.
    pub fn network_resources(&self) -> Result<Vec<Value>, GeneratorError> {
        let spec = &self.spec;
        let empty = Context::new();
        let mut out = Vec::new();

        let custom_vnet = if spec.is_hosted_master() {
            spec.agent_pool_profiles.iter().any(|p| p.is_custom_vnet())
        } else {
            spec.master_profile.as_ref().is_some_and(|m| m.is_custom_vnet())
        };
        if !custom_vnet {
            let mut context = Context::new();
            context.insert("subnets", &self.subnets());
            out.push(self.render_resource(VNET_TEMPLATE, &context)?);
        }

        if !spec.is_hosted_master() {
            out.push(self.render_resource(MASTER_NSG_TEMPLATE, &empty)?);
            if spec.is_vmss_master() || !spec.is_private_cluster() {
                out.push(self.render_resource(MASTER_LB_TEMPLATE, &empty)?);
            }
        }
        Ok(out)
    }

    /// Renders the base template around the given sections.
    pub fn render_document(&self, context: &Context) -> Result<String, GeneratorError> {
        self.tera
            .render(KUBERNETES_BASE_TEMPLATE, context)
            .map_err(template_error)
    }
}

/// Puts `rendered` in place of the first resource with the same type and name.
pub fn replace_resource(resources: &mut [Value], rendered: Value) -> Result<(), GeneratorError> {
    let key = |v: &Value| (v["type"].clone(), v["name"].clone());
    let target = key(&rendered);
    let slot = resources
        .iter_mut()
        .find(|r| key(r) == target)
        .ok_or_else(|| {
            GeneratorError::Template(format!(
                "no {} resource named {} to replace",
                target.0, target.1
            ))
        })?;
    debug!("rendered {} {} from template", target.0, target.1);
    *slot = rendered;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AgentPoolProfile, AvailabilityProfile, HostedMasterProfile, LoadBalancerSku, MasterProfile,
        OsType, PrivateCluster,
    };
    use crate::engine::resources::{load_balancers, security_groups, virtual_networks};

    fn spec() -> ClusterSpec {
        let mut spec = ClusterSpec {
            location: "westus2".to_string(),
            master_profile: Some(MasterProfile {
                count: 3,
                dns_prefix: "mycluster".to_string(),
                ..Default::default()
            }),
            agent_pool_profiles: vec![AgentPoolProfile {
                name: "agentpool1".to_string(),
                count: 2,
                ..Default::default()
            }],
            ..Default::default()
        };
        spec.orchestrator_profile.orchestrator_version = "1.16.4".to_string();
        spec
    }

    fn renderer(spec: &ClusterSpec) -> LegacyRenderer {
        LegacyRenderer::new(Arc::new(spec.clone())).unwrap()
    }

    fn rendered(spec: &ClusterSpec, path: &str, context: &Context) -> Value {
        renderer(spec).render_resource(path, context).unwrap()
    }

    fn vnet_context(spec: &ClusterSpec) -> Context {
        let mut context = Context::new();
        context.insert("subnets", &renderer(spec).subnets());
        context
    }

    #[test]
    fn test_master_lb_matches_builder() {
        let mut standard = spec();
        standard.orchestrator_profile.kubernetes_config.load_balancer_sku = LoadBalancerSku::Standard;
        let mut private = standard.clone();
        private.orchestrator_profile.kubernetes_config.private_cluster = Some(PrivateCluster {
            enabled: true,
            jumpbox_profile: None,
        });
        let mut old = private.clone();
        old.orchestrator_profile.orchestrator_version = "1.13.5".to_string();

        for s in [spec(), standard, private, old] {
            let expected = load_balancers::create_master_load_balancer(&s, false).to_value().unwrap();
            assert_eq!(rendered(&s, MASTER_LB_TEMPLATE, &Context::new()), expected);
        }
    }

    #[test]
    fn test_vmss_master_lb_matches_builder() {
        let mut s = spec();
        if let Some(m) = s.master_profile.as_mut() {
            m.availability_profile = AvailabilityProfile::VirtualMachineScaleSets;
        }
        let expected = load_balancers::create_master_load_balancer(&s, true).to_value().unwrap();
        let actual = rendered(&s, MASTER_LB_TEMPLATE, &Context::new());
        assert_eq!(actual, expected);
        assert!(actual["properties"].get("inboundNatRules").is_none());
    }

    #[test]
    fn test_master_nsg_matches_builder() {
        let mut s = spec();
        s.agent_pool_profiles.push(AgentPoolProfile {
            name: "win".to_string(),
            count: 1,
            os_type: OsType::Windows,
            ..Default::default()
        });
        s.feature_flags.block_outbound_internet = true;

        for s in [spec(), s] {
            let expected = security_groups::create_network_security_group(&s).to_value().unwrap();
            assert_eq!(rendered(&s, MASTER_NSG_TEMPLATE, &Context::new()), expected);
        }
    }

    #[test]
    fn test_vnet_matches_builder() {
        let mut dual_stack = spec();
        dual_stack.feature_flags.enable_ipv6_dual_stack = true;
        dual_stack.orchestrator_profile.kubernetes_config.network_plugin = "azure".to_string();
        for s in [spec(), dual_stack] {
            let expected = virtual_networks::create_virtual_network(&s).to_value().unwrap();
            assert_eq!(rendered(&s, VNET_TEMPLATE, &vnet_context(&s)), expected);
        }

        let mut vmss = spec();
        if let Some(m) = vmss.master_profile.as_mut() {
            m.availability_profile = AvailabilityProfile::VirtualMachineScaleSets;
        }
        let expected = virtual_networks::create_virtual_network_vmss(&vmss).to_value().unwrap();
        assert_eq!(rendered(&vmss, VNET_TEMPLATE, &vnet_context(&vmss)), expected);

        let mut hosted = spec();
        hosted.master_profile = None;
        hosted.hosted_master_profile = Some(HostedMasterProfile::default());
        let expected = virtual_networks::create_hosted_master_virtual_network(&hosted)
            .to_value()
            .unwrap();
        assert_eq!(rendered(&hosted, VNET_TEMPLATE, &vnet_context(&hosted)), expected);
    }

    #[test]
    fn test_network_resources_follow_cluster_shape() {
        let names = |s: &ClusterSpec| -> Vec<String> {
            renderer(s)
                .network_resources()
                .unwrap()
                .iter()
                .map(|r| r["type"].as_str().unwrap_or_default().to_string())
                .collect()
        };
        assert_eq!(
            names(&spec()),
            vec![
                "Microsoft.Network/virtualNetworks",
                "Microsoft.Network/networkSecurityGroups",
                "Microsoft.Network/loadBalancers",
            ]
        );

        let mut private = spec();
        private.orchestrator_profile.kubernetes_config.private_cluster = Some(PrivateCluster {
            enabled: true,
            jumpbox_profile: None,
        });
        if let Some(m) = private.master_profile.as_mut() {
            m.vnet_subnet_id = "/subscriptions/x/subnets/master".to_string();
        }
        assert_eq!(names(&private), vec!["Microsoft.Network/networkSecurityGroups"]);
    }

    #[test]
    fn test_replace_resource_requires_a_slot() {
        let lb = load_balancers::create_master_load_balancer(&spec(), false).to_value().unwrap();
        let mut resources = vec![serde_json::json!({ "type": "x", "name": "y" }), lb.clone()];
        let mut changed = lb.clone();
        changed["properties"]["probes"] = serde_json::json!([]);
        replace_resource(&mut resources, changed.clone()).unwrap();
        assert_eq!(resources[1], changed);

        let mut empty: Vec<Value> = Vec::new();
        assert!(matches!(
            replace_resource(&mut empty, lb),
            Err(GeneratorError::Template(msg)) if msg.contains("masterLbName")
        ));
    }
}
