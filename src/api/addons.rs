//! Addon and component names, and their default enablement.

use super::types::{
    ClusterSpec, NETWORK_PLUGIN_CILIUM, NETWORK_PLUGIN_FLANNEL, NETWORK_POLICY_AZURE,
    NETWORK_POLICY_CALICO, NETWORK_POLICY_CILIUM,
};

pub const HEAPSTER_ADDON: &str = "heapster";
pub const METRICS_SERVER_ADDON: &str = "metrics-server";
pub const TILLER_ADDON: &str = "tiller";
pub const AAD_POD_IDENTITY_ADDON: &str = "aad-pod-identity";
pub const ACI_CONNECTOR_ADDON: &str = "aci-connector";
pub const CLUSTER_AUTOSCALER_ADDON: &str = "cluster-autoscaler";
pub const BLOBFUSE_FLEXVOLUME_ADDON: &str = "blobfuse-flexvolume";
pub const SMB_FLEXVOLUME_ADDON: &str = "smb-flexvolume";
pub const KEYVAULT_FLEXVOLUME_ADDON: &str = "keyvault-flexvolume";
pub const DASHBOARD_ADDON: &str = "kubernetes-dashboard";
pub const RESCHEDULER_ADDON: &str = "rescheduler";
pub const NVIDIA_DEVICE_PLUGIN_ADDON: &str = "nvidia-device-plugin";
pub const CONTAINER_MONITORING_ADDON: &str = "container-monitoring";
pub const IP_MASQ_AGENT_ADDON: &str = "ip-masq-agent";
pub const AZURE_CNI_NETWORK_MONITOR_ADDON: &str = "azure-cni-networkmonitor";
pub const CALICO_ADDON: &str = "calico-daemonset";
pub const CILIUM_ADDON: &str = "cilium-daemonset";
pub const FLANNEL_ADDON: &str = "flannel-daemonset";
pub const AZURE_NETWORK_POLICY_ADDON: &str = "azure-npm-daemonset";
pub const CLOUD_NODE_MANAGER_ADDON: &str = "cloud-node-manager";
pub const KUBE_DNS_ADDON: &str = "kube-dns";
pub const COREDNS_ADDON: &str = "coredns";
pub const KUBE_PROXY_ADDON: &str = "kube-proxy";
pub const POD_SECURITY_POLICY_ADDON: &str = "pod-security-policy";
pub const AUDIT_POLICY_ADDON: &str = "audit-policy";
pub const AZURE_CLOUD_PROVIDER_ADDON: &str = "azure-cloud-provider";
pub const APP_GATEWAY_INGRESS_ADDON: &str = "appgw-ingress";

pub const SCHEDULER_COMPONENT: &str = "kube-scheduler";
pub const CONTROLLER_MANAGER_COMPONENT: &str = "kube-controller-manager";
pub const CLOUD_CONTROLLER_MANAGER_COMPONENT: &str = "cloud-controller-manager";
pub const API_SERVER_COMPONENT: &str = "kube-apiserver";
pub const ADDON_MANAGER_COMPONENT: &str = "kube-addon-manager";
pub const CLUSTER_INIT_COMPONENT: &str = "cluster-init";

/// Default enablement when the api model does not say otherwise.
pub fn addon_enabled_by_default(spec: &ClusterSpec, name: &str) -> bool {
    let orch = &spec.orchestrator_profile;
    let k8s = &orch.kubernetes_config;
    let azure_stack = spec.is_azure_stack_cloud();
    let coreos = spec
        .master_profile
        .as_ref()
        .is_some_and(|m| m.is_coreos())
        || spec.agent_pool_profiles.iter().any(|p| p.is_coreos());

    match name {
        HEAPSTER_ADDON => !orch.is_version_ge("1.13.0"),
        METRICS_SERVER_ADDON => orch.is_version_ge("1.9.0"),
        TILLER_ADDON => false,
        DASHBOARD_ADDON => false,
        BLOBFUSE_FLEXVOLUME_ADDON | SMB_FLEXVOLUME_ADDON => {
            orch.is_version_ge("1.8.0") && !coreos && !azure_stack
        }
        KEYVAULT_FLEXVOLUME_ADDON => !coreos && !azure_stack,
        IP_MASQ_AGENT_ADDON => k8s.network_plugin != NETWORK_PLUGIN_CILIUM,
        AZURE_CNI_NETWORK_MONITOR_ADDON => {
            orch.is_azure_cni() && k8s.network_policy != NETWORK_POLICY_CALICO
        }
        AZURE_NETWORK_POLICY_ADDON => {
            orch.is_azure_cni() && k8s.network_policy == NETWORK_POLICY_AZURE
        }
        CALICO_ADDON => k8s.network_policy == NETWORK_POLICY_CALICO,
        CILIUM_ADDON => k8s.network_policy == NETWORK_POLICY_CILIUM,
        FLANNEL_ADDON => k8s.network_plugin == NETWORK_PLUGIN_FLANNEL,
        CLOUD_NODE_MANAGER_ADDON => {
            orch.is_version_ge("1.16.0") && k8s.use_cloud_controller_manager
        }
        COREDNS_ADDON => orch.is_version_ge("1.12.0"),
        KUBE_DNS_ADDON => !orch.is_version_ge("1.12.0"),
        KUBE_PROXY_ADDON => true,
        AUDIT_POLICY_ADDON => orch.is_version_ge("1.8.0"),
        AZURE_CLOUD_PROVIDER_ADDON => true,
        POD_SECURITY_POLICY_ADDON => orch.is_version_ge("1.15.0"),
        // Opt-in addons, unavailable on Azure Stack
        CLUSTER_AUTOSCALER_ADDON | ACI_CONNECTOR_ADDON | RESCHEDULER_ADDON => false,
        _ => false,
    }
}

/// Addons that may not run on Azure Stack regardless of the api model.
fn blocked_on_azure_stack(name: &str) -> bool {
    matches!(
        name,
        CLUSTER_AUTOSCALER_ADDON
            | ACI_CONNECTOR_ADDON
            | RESCHEDULER_ADDON
            | BLOBFUSE_FLEXVOLUME_ADDON
            | SMB_FLEXVOLUME_ADDON
    )
}

/// Effective enablement: an explicit `enabled` wins over the default predicate.
pub fn is_addon_enabled(spec: &ClusterSpec, name: &str) -> bool {
    if spec.is_azure_stack_cloud() && blocked_on_azure_stack(name) {
        return false;
    }
    match spec.kubernetes_config().addon(name).and_then(|a| a.enabled) {
        Some(enabled) => enabled,
        None => addon_enabled_by_default(spec, name),
    }
}

/// Component enablement. Core components are on unless disabled; the
/// cloud-controller-manager follows the kubernetes config flag; cluster-init
/// only exists when inline data is supplied.
pub fn is_component_enabled(spec: &ClusterSpec, name: &str) -> bool {
    let k8s = spec.kubernetes_config();
    if let Some(enabled) = k8s.component(name).and_then(|c| c.enabled) {
        return enabled;
    }
    match name {
        CLOUD_CONTROLLER_MANAGER_COMPONENT => k8s.use_cloud_controller_manager,
        CLUSTER_INIT_COMPONENT => !k8s.component_data(name).is_empty(),
        _ => true,
    }
}
