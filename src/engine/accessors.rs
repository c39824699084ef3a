//! Functions exposed to embedded templates.
//!
//! A [`TemplateAccessors`] binds the cluster model to one rendering scope:
//! the cloud-init documents see cluster-wide helpers, while every component
//! manifest and addon manifest sees the container settings of its own entry.
//! Registration installs the scope's functions on a [`Tera`] instance.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tera::{Tera, Value};

use crate::api::addons::{
    ADDON_MANAGER_COMPONENT, APP_GATEWAY_INGRESS_ADDON, CLOUD_CONTROLLER_MANAGER_COMPONENT,
    CLUSTER_AUTOSCALER_ADDON, KUBE_DNS_ADDON,
};
use crate::api::{
    ClusterSpec, ContainerSpec, KubernetesAddon, KubernetesComponent, LoadBalancerSku,
    is_addon_enabled,
};
use crate::engine::armtype::{splice_parameter, splice_variable, splice_verbatim};
use crate::engine::fragments::{
    get_data_disks, get_kubernetes_subnets, get_lb_rules, get_probes, get_security_rules,
    kubernetes_pod_start_index,
};
use crate::engine::images::image_spec;
use crate::engine::resources::inbound_nat_rules::SSH_NAT_PORTS;
use crate::engine::resources::load_balancers::supports_tcp_reset;

pub const DEFAULT_CPU_REQUESTS: &str = "100m";
pub const DEFAULT_MEMORY_REQUESTS: &str = "100Mi";
pub const DEFAULT_CPU_LIMITS: &str = "200m";
pub const DEFAULT_MEMORY_LIMITS: &str = "200Mi";
pub const DEFAULT_ADDON_MODE: &str = "Reconcile";

const MSI_VOLUME_MOUNTS: &str = "\n            - mountPath: /var/lib/waagent/\n              name: waagent\n              readOnly: true";
const MSI_VOLUMES: &str = "\n        - hostPath:\n            path: /var/lib/waagent/\n          name: waagent";
const MSI_HOST_NETWORK: &str = "\n      hostNetwork: true";

/// What a template is rendering.
#[derive(Debug, Clone)]
pub enum AccessorScope {
    /// Cloud-init and other cluster-wide documents.
    Cluster,
    /// Resource templates of the legacy deployment document.
    Deployment,
    Component(KubernetesComponent),
    Addon(KubernetesAddon),
    /// The autoscaler manifest needs pool and identity helpers on top of the addon set.
    ClusterAutoscaler(KubernetesAddon),
}

#[derive(Debug, Clone)]
pub struct TemplateAccessors {
    spec: Arc<ClusterSpec>,
    scope: AccessorScope,
}

type Args = HashMap<String, Value>;

fn string_arg(args: &Args, key: &str) -> tera::Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| tera::Error::msg(format!("missing string argument `{}`", key)))
}

/// Renders a flag map as a quoted, comma separated argument list.
fn format_args(config: &BTreeMap<String, String>) -> String {
    config
        .iter()
        .map(|(key, value)| Value::String(format!("{}={}", key, value)).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Image table key of a container name used in manifests.
fn image_key(container: &str) -> &str {
    match container {
        ADDON_MANAGER_COMPONENT => "addonmanager",
        CLOUD_CONTROLLER_MANAGER_COMPONENT => "ccm",
        "kubedns" => KUBE_DNS_ADDON,
        "sidecar" => "k8s-dns-sidecar",
        other => other,
    }
}

impl TemplateAccessors {
    pub fn cluster(spec: Arc<ClusterSpec>) -> Self {
        Self {
            spec,
            scope: AccessorScope::Cluster,
        }
    }

    pub fn deployment(spec: Arc<ClusterSpec>) -> Self {
        Self {
            spec,
            scope: AccessorScope::Deployment,
        }
    }

    pub fn for_component(spec: Arc<ClusterSpec>, name: &str) -> Self {
        let component = spec
            .kubernetes_config()
            .component(name)
            .cloned()
            .unwrap_or_else(|| KubernetesComponent {
                name: name.to_string(),
                ..Default::default()
            });
        Self {
            spec,
            scope: AccessorScope::Component(component),
        }
    }

    pub fn for_addon(spec: Arc<ClusterSpec>, name: &str) -> Self {
        let addon = spec
            .kubernetes_config()
            .addon(name)
            .cloned()
            .unwrap_or_else(|| KubernetesAddon {
                name: name.to_string(),
                ..Default::default()
            });
        let scope = if name == CLUSTER_AUTOSCALER_ADDON {
            AccessorScope::ClusterAutoscaler(addon)
        } else {
            AccessorScope::Addon(addon)
        };
        Self { spec, scope }
    }

    pub fn scope(&self) -> &AccessorScope {
        &self.scope
    }

    fn containers(&self) -> &[ContainerSpec] {
        match &self.scope {
            AccessorScope::Cluster | AccessorScope::Deployment => &[],
            AccessorScope::Component(c) => &c.containers,
            AccessorScope::Addon(a) | AccessorScope::ClusterAutoscaler(a) => &a.containers,
        }
    }

    fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers().iter().find(|c| c.name == name)
    }

    fn container_field(
        &self,
        name: &str,
        field: fn(&ContainerSpec) -> &str,
        default: &str,
    ) -> String {
        self.container(name)
            .map(field)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    }

    pub fn container_image(&self, name: &str) -> String {
        self.container(name)
            .map(|c| c.image.clone())
            .filter(|image| !image.is_empty())
            .or_else(|| image_spec(&self.spec, image_key(name)))
            .unwrap_or_default()
    }

    fn config_map(&self) -> Option<&BTreeMap<String, String>> {
        match &self.scope {
            AccessorScope::Cluster | AccessorScope::Deployment => None,
            AccessorScope::Component(c) => Some(&c.config),
            AccessorScope::Addon(a) | AccessorScope::ClusterAutoscaler(a) => Some(&a.config),
        }
    }

    /// Configured value for `key`, or the cluster-derived default.
    pub fn container_config(&self, key: &str) -> String {
        if let Some(value) = self.config_map().and_then(|c| c.get(key)) {
            return value.clone();
        }
        let k8s = self.spec.kubernetes_config();
        match key {
            "domain" => "cluster.local".to_string(),
            "clusterIP" => k8s.dns_service_ip.clone(),
            "cluster-cidr" | "cluster-subnet" | "non-masquerade-cidr" => k8s.cluster_subnet.clone(),
            "proxy-mode" => "iptables".to_string(),
            "max-history" => "0".to_string(),
            "scan-interval" => "1m".to_string(),
            "balance-similar-node-groups" | "enable-masq-link-local" => "false".to_string(),
            "clusterName" => self.spec.dns_prefix(),
            "region" => self.spec.location.clone(),
            "nodeName" => "aci-connector".to_string(),
            "os" => "Linux".to_string(),
            "taint" => "azure.com/aci".to_string(),
            _ => String::new(),
        }
    }

    pub fn mode(&self) -> String {
        match &self.scope {
            AccessorScope::Addon(a) | AccessorScope::ClusterAutoscaler(a) if !a.mode.is_empty() => {
                a.mode.clone()
            }
            _ => DEFAULT_ADDON_MODE.to_string(),
        }
    }

    /// `--nodes=min:max:name` lines for every pool the autoscaler manages.
    pub fn autoscaler_nodes_config(&self) -> String {
        self.spec
            .agent_pool_profiles
            .iter()
            .enumerate()
            .map(|(i, pool)| {
                format!(
                    "\n            - --nodes={}:{}:{}",
                    pool.count,
                    pool.count,
                    self.spec.agent_vm_prefix(pool, i)
                )
            })
            .collect()
    }

    /// Zone values of the first pool, one YAML list item per line.
    pub fn zones(&self) -> String {
        self.spec
            .agent_pool_profiles
            .first()
            .map(|pool| {
                pool.availability_zones
                    .iter()
                    .map(|zone| format!("\n          - {}-{}", self.spec.location, zone))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn first_pool_storage(&self, managed: bool) -> bool {
        self.spec.agent_pool_profiles.first().is_some_and(|pool| {
            if managed {
                pool.is_managed_disks()
            } else {
                pool.is_storage_account()
            }
        })
    }

    fn uses_managed_identity(&self) -> bool {
        self.spec.kubernetes_config().use_managed_identity
    }

    fn msi_fragment(&self, fragment: &str) -> String {
        if self.uses_managed_identity() {
            fragment.to_string()
        } else {
            String::new()
        }
    }

    fn version_ge(&self, args: &Args) -> tera::Result<Value> {
        let version = string_arg(args, "version")?;
        Ok(Value::Bool(self.spec.orchestrator_profile.is_version_ge(&version)))
    }

    /// Installs the scope's functions on `tera`.
    pub fn register(self, tera: &mut Tera) {
        let this = Arc::new(self);

        reg(tera, &this, "IsKubernetesVersionGe", |a, args| a.version_ge(args));
        reg(tera, &this, "IsAzureStackCloud", |a, _| {
            Ok(Value::Bool(a.spec.is_azure_stack_cloud()))
        });
        reg(tera, &this, "IsCustomCloudProfile", |a, _| {
            Ok(Value::Bool(a.spec.is_custom_cloud_profile()))
        });

        match &this.scope {
            AccessorScope::Cluster => register_cluster(tera, &this),
            AccessorScope::Deployment => {
                register_cluster(tera, &this);
                register_deployment(tera, &this);
            }
            AccessorScope::Component(_) => {
                register_containers(tera, &this);
                register_component(tera, &this);
            }
            AccessorScope::Addon(_) => {
                register_containers(tera, &this);
                register_addon(tera, &this);
            }
            AccessorScope::ClusterAutoscaler(_) => {
                register_containers(tera, &this);
                register_addon(tera, &this);
                register_autoscaler(tera, &this);
            }
        }
    }
}

fn reg<F>(tera: &mut Tera, accessors: &Arc<TemplateAccessors>, name: &str, f: F)
where
    F: Fn(&TemplateAccessors, &Args) -> tera::Result<Value> + Send + Sync + 'static,
{
    let this = Arc::clone(accessors);
    tera.register_function(name, move |args: &Args| f(&this, args));
}

fn text(s: impl Into<String>) -> tera::Result<Value> {
    Ok(Value::String(s.into()))
}

fn register_cluster(tera: &mut Tera, this: &Arc<TemplateAccessors>) {
    reg(tera, this, "WrapAsVariable", |_, args| {
        text(splice_variable(&string_arg(args, "name")?))
    });
    reg(tera, this, "WrapAsParameter", |_, args| {
        text(splice_parameter(&string_arg(args, "name")?))
    });
    reg(tera, this, "WrapAsVerbatim", |_, args| {
        text(splice_verbatim(&string_arg(args, "expr")?))
    });
    reg(tera, this, "HasWindows", |a, _| Ok(Value::Bool(a.spec.has_windows())));
    reg(tera, this, "HasLinux", |a, _| Ok(Value::Bool(a.spec.any_agent_is_linux())));
    reg(tera, this, "HasAvailabilityZones", |a, _| {
        Ok(Value::Bool(a.spec.has_availability_zones()))
    });
    reg(tera, this, "UsesCloudControllerManager", |a, _| {
        Ok(Value::Bool(a.spec.kubernetes_config().use_cloud_controller_manager))
    });
    reg(tera, this, "IsMasterVirtualMachineScaleSets", |a, _| {
        Ok(Value::Bool(a.spec.is_vmss_master()))
    });
    reg(tera, this, "HasCosmosEtcd", |a, _| {
        Ok(Value::Bool(
            a.spec.master_profile.as_ref().is_some_and(|m| m.cosmos_etcd),
        ))
    });
    reg(tera, this, "IsPrivateCluster", |a, _| Ok(Value::Bool(a.spec.is_private_cluster())));
    reg(tera, this, "GetTargetEnvironment", |a, _| text(a.spec.cloud_name()));
    reg(tera, this, "GetKubernetesVersion", |a, _| {
        text(a.spec.orchestrator_profile.orchestrator_version.clone())
    });
}

fn ports_arg(args: &Args) -> tera::Result<Vec<u16>> {
    let list = args
        .get("ports")
        .and_then(Value::as_array)
        .ok_or_else(|| tera::Error::msg("missing list argument `ports`"))?;
    list.iter()
        .map(|v| {
            v.as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| tera::Error::msg(format!("invalid port `{}`", v)))
        })
        .collect()
}

fn register_deployment(tera: &mut Tera, this: &Arc<TemplateAccessors>) {
    reg(tera, this, "IsHostedMaster", |a, _| Ok(Value::Bool(a.spec.is_hosted_master())));
    reg(tera, this, "RequiresRouteTable", |a, _| {
        Ok(Value::Bool(a.spec.requires_route_table()))
    });
    reg(tera, this, "IsStandardLoadBalancer", |a, _| {
        Ok(Value::Bool(
            a.spec.kubernetes_config().load_balancer_sku == LoadBalancerSku::Standard,
        ))
    });
    reg(tera, this, "IsIPv6DualStack", |a, _| {
        Ok(Value::Bool(a.spec.feature_flags.enable_ipv6_dual_stack))
    });
    reg(tera, this, "BlockOutboundInternet", |a, _| {
        Ok(Value::Bool(a.spec.feature_flags.block_outbound_internet))
    });
    reg(tera, this, "IsAppGatewayIngressEnabled", |a, _| {
        Ok(Value::Bool(is_addon_enabled(&a.spec, APP_GATEWAY_INGRESS_ADDON)))
    });
    reg(tera, this, "SupportsTcpReset", |a, _| {
        Ok(Value::Bool(supports_tcp_reset(
            &a.spec.orchestrator_profile.orchestrator_version,
        )))
    });
    reg(tera, this, "GetOutboundIdleTimeout", |a, _| {
        Ok(Value::from(a.spec.kubernetes_config().outbound_rule_idle_timeout_in_minutes))
    });
    // One SSH port per master, capped at the fixed port list.
    reg(tera, this, "GetMasterSSHPorts", |a, _| {
        let count = a.spec.master_profile.as_ref().map_or(1, |m| m.count) as usize;
        Ok(Value::from(SSH_NAT_PORTS.iter().take(count).copied().collect::<Vec<_>>()))
    });

    reg(tera, this, "GetLBRules", |_, args| {
        text(get_lb_rules(&string_arg(args, "name")?, &ports_arg(args)?))
    });
    reg(tera, this, "GetProbes", |_, args| text(get_probes(&ports_arg(args)?)));
    reg(tera, this, "GetSecurityRules", |_, args| {
        text(get_security_rules(&ports_arg(args)?))
    });
    reg(tera, this, "GetDataDisks", |a, args| {
        let name = string_arg(args, "pool")?;
        let pool = a
            .spec
            .agent_pool_profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| tera::Error::msg(format!("unknown agent pool `{}`", name)))?;
        text(get_data_disks(pool))
    });
    reg(tera, this, "GetKubernetesSubnets", |a, _| text(get_kubernetes_subnets(&a.spec)));
    reg(tera, this, "GetPodStartIndex", |a, _| {
        Ok(Value::from(kubernetes_pod_start_index(&a.spec)))
    });
}

fn register_containers(tera: &mut Tera, this: &Arc<TemplateAccessors>) {
    reg(tera, this, "ContainerImage", |a, args| {
        text(a.container_image(&string_arg(args, "name")?))
    });
    reg(tera, this, "ContainerCPUReqs", |a, args| {
        let name = string_arg(args, "name")?;
        text(a.container_field(&name, |c| c.cpu_requests.as_str(), DEFAULT_CPU_REQUESTS))
    });
    reg(tera, this, "ContainerCPULimits", |a, args| {
        let name = string_arg(args, "name")?;
        text(a.container_field(&name, |c| c.cpu_limits.as_str(), DEFAULT_CPU_LIMITS))
    });
    reg(tera, this, "ContainerMemReqs", |a, args| {
        let name = string_arg(args, "name")?;
        text(a.container_field(&name, |c| c.memory_requests.as_str(), DEFAULT_MEMORY_REQUESTS))
    });
    reg(tera, this, "ContainerMemLimits", |a, args| {
        let name = string_arg(args, "name")?;
        text(a.container_field(&name, |c| c.memory_limits.as_str(), DEFAULT_MEMORY_LIMITS))
    });
    reg(tera, this, "ContainerConfig", |a, args| {
        text(a.container_config(&string_arg(args, "name")?))
    });
}

fn register_component(tera: &mut Tera, this: &Arc<TemplateAccessors>) {
    reg(tera, this, "GetAPIServerArgs", |a, _| {
        text(format_args(&a.spec.kubernetes_config().apiserver_config))
    });
    reg(tera, this, "GetControllerManagerArgs", |a, _| {
        text(format_args(&a.spec.kubernetes_config().controller_manager_config))
    });
    reg(tera, this, "GetCloudControllerManagerArgs", |a, _| {
        text(format_args(&a.spec.kubernetes_config().controller_manager_config))
    });
    reg(tera, this, "GetSchedulerArgs", |a, _| {
        text(format_args(&a.spec.kubernetes_config().scheduler_config))
    });
}

fn register_addon(tera: &mut Tera, this: &Arc<TemplateAccessors>) {
    reg(tera, this, "GetMode", |a, _| text(a.mode()));
    reg(tera, this, "HasWindows", |a, _| Ok(Value::Bool(a.spec.has_windows())));
    reg(tera, this, "HasLinux", |a, _| Ok(Value::Bool(a.spec.any_agent_is_linux())));
    reg(tera, this, "NeedsStorageAccountStorageClasses", |a, _| {
        Ok(Value::Bool(a.first_pool_storage(false)))
    });
    reg(tera, this, "NeedsManagedDiskStorageClasses", |a, _| {
        Ok(Value::Bool(a.first_pool_storage(true)))
    });
    reg(tera, this, "UsesCloudControllerManager", |a, _| {
        Ok(Value::Bool(a.spec.kubernetes_config().use_cloud_controller_manager))
    });
    reg(tera, this, "HasAvailabilityZones", |a, _| {
        Ok(Value::Bool(
            a.spec
                .agent_pool_profiles
                .first()
                .is_some_and(|p| p.has_availability_zones()),
        ))
    });
    reg(tera, this, "GetZones", |a, _| text(a.zones()));
    reg(tera, this, "CSIControllerReplicas", |a, _| {
        text(if a.spec.any_agent_is_linux() { "2" } else { "1" })
    });
}

fn register_autoscaler(tera: &mut Tera, this: &Arc<TemplateAccessors>) {
    reg(tera, this, "GetClusterAutoscalerNodesConfig", |a, _| {
        text(a.autoscaler_nodes_config())
    });
    reg(tera, this, "GetBase64EncodedVMType", |a, _| {
        text(STANDARD.encode(a.spec.vm_type()))
    });
    reg(tera, this, "GetVolumeMounts", |a, _| text(a.msi_fragment(MSI_VOLUME_MOUNTS)));
    reg(tera, this, "GetVolumes", |a, _| text(a.msi_fragment(MSI_VOLUMES)));
    reg(tera, this, "GetHostNetwork", |a, _| text(a.msi_fragment(MSI_HOST_NETWORK)));
    reg(tera, this, "GetCloud", |a, _| text(a.spec.cloud_name()));
    reg(tera, this, "UseManagedIdentity", |a, _| {
        text(a.uses_managed_identity().to_string())
    });
}
