//! OS images and default container image references.

use crate::api::addons::{
    AAD_POD_IDENTITY_ADDON, ACI_CONNECTOR_ADDON, AZURE_CNI_NETWORK_MONITOR_ADDON,
    AZURE_NETWORK_POLICY_ADDON, BLOBFUSE_FLEXVOLUME_ADDON, CALICO_ADDON, CILIUM_ADDON,
    CLOUD_NODE_MANAGER_ADDON, CLUSTER_AUTOSCALER_ADDON, CONTAINER_MONITORING_ADDON, COREDNS_ADDON,
    DASHBOARD_ADDON, FLANNEL_ADDON, HEAPSTER_ADDON, IP_MASQ_AGENT_ADDON,
    KEYVAULT_FLEXVOLUME_ADDON, KUBE_PROXY_ADDON, METRICS_SERVER_ADDON, NVIDIA_DEVICE_PLUGIN_ADDON,
    RESCHEDULER_ADDON, SMB_FLEXVOLUME_ADDON, TILLER_ADDON,
};
use crate::api::{ClusterSpec, Distro};

/// Marketplace coordinates of a VM image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsImageConfig {
    pub offer: &'static str,
    pub sku: &'static str,
    pub publisher: &'static str,
    pub version: &'static str,
}

pub fn os_image_config(distro: Distro) -> OsImageConfig {
    match distro {
        Distro::Ubuntu => OsImageConfig {
            offer: "UbuntuServer",
            sku: "16.04-LTS",
            publisher: "Canonical",
            version: "latest",
        },
        Distro::AksUbuntu1804 => OsImageConfig {
            offer: "aks",
            sku: "aks-ubuntu-1804-201912",
            publisher: "microsoft-aks",
            version: "2019.12.11",
        },
        Distro::Rhel => OsImageConfig {
            offer: "RHEL",
            sku: "7.3",
            publisher: "RedHat",
            version: "latest",
        },
        Distro::CoreOS => OsImageConfig {
            offer: "CoreOS",
            sku: "Stable",
            publisher: "CoreOS",
            version: "latest",
        },
    }
}

pub const MCR_KUBERNETES_IMAGE_BASE: &str = "mcr.microsoft.com/k8s/core/";
pub const AZURE_STACK_IMAGE_SUFFIX: &str = "-azs";

fn addon_manager_image(major_minor: &str) -> &'static str {
    match major_minor {
        "1.16" | "1.17" => "kube-addon-manager-amd64:v9.0.2",
        "1.15" | "1.14" => "kube-addon-manager-amd64:v9.0.1",
        _ => "kube-addon-manager-amd64:v8.9.1",
    }
}

/// Image reference (without registry) of a component or addon for the
/// cluster's Kubernetes version. Unknown keys yield `None`.
pub fn component_image(spec: &ClusterSpec, key: &str) -> Option<String> {
    let version = &spec.orchestrator_profile.orchestrator_version;
    let image = match key {
        "hyperkube" => format!("hyperkube-amd64:v{}", version),
        "kube-apiserver" | "kube-controller-manager" | "kube-scheduler" | KUBE_PROXY_ADDON => {
            format!("{}:v{}", key, version)
        }
        "ccm" => format!("cloud-controller-manager-amd64:v{}", version),
        CLOUD_NODE_MANAGER_ADDON => "azure-cloud-node-manager:v0.3.0".to_string(),
        "addonmanager" => addon_manager_image(&spec.orchestrator_profile.major_minor()).to_string(),
        "k8s-dns-sidecar" => "k8s-dns-sidecar-amd64:1.14.10".to_string(),
        "kube-dns" => "k8s-dns-kube-dns-amd64:1.15.4".to_string(),
        "dnsmasq" => "k8s-dns-dnsmasq-nanny-amd64:1.15.4".to_string(),
        COREDNS_ADDON => "coredns:1.6.5".to_string(),
        "pause" => "pause:1.2.0".to_string(),
        HEAPSTER_ADDON => "heapster-amd64:v1.5.4".to_string(),
        METRICS_SERVER_ADDON => "metrics-server-amd64:v0.3.4".to_string(),
        TILLER_ADDON => "tiller:v2.13.1".to_string(),
        DASHBOARD_ADDON => "kubernetes-dashboard-amd64:v1.10.1".to_string(),
        RESCHEDULER_ADDON => "rescheduler:v0.4.0".to_string(),
        ACI_CONNECTOR_ADDON => "virtual-kubelet:latest".to_string(),
        CONTAINER_MONITORING_ADDON => "oms:ciprod11012019".to_string(),
        AZURE_CNI_NETWORK_MONITOR_ADDON => "networkmonitor:v0.0.6".to_string(),
        NVIDIA_DEVICE_PLUGIN_ADDON => "k8s-device-plugin:1.11".to_string(),
        CLUSTER_AUTOSCALER_ADDON => format!("cluster-autoscaler:v{}.0", spec.orchestrator_profile.major_minor()),
        IP_MASQ_AGENT_ADDON => "ip-masq-agent-amd64:v2.5.0".to_string(),
        BLOBFUSE_FLEXVOLUME_ADDON => "mcr.microsoft.com/k8s/flexvolume/blobfuse-flexvolume:1.0.8".to_string(),
        SMB_FLEXVOLUME_ADDON => "mcr.microsoft.com/k8s/flexvolume/smb-flexvolume:1.0.2".to_string(),
        KEYVAULT_FLEXVOLUME_ADDON => {
            "mcr.microsoft.com/k8s/flexvolume/keyvault-flexvolume:v0.0.13".to_string()
        }
        AZURE_NETWORK_POLICY_ADDON => "mcr.microsoft.com/containernetworking/azure-npm:v1.0.29".to_string(),
        AAD_POD_IDENTITY_ADDON => "mcr.microsoft.com/k8s/aad-pod-identity/nmi:1.2".to_string(),
        CALICO_ADDON => "calico/node:v3.8.0".to_string(),
        CILIUM_ADDON => "docker.io/cilium/cilium:v1.4".to_string(),
        FLANNEL_ADDON => "quay.io/coreos/flannel:v0.10.0-amd64".to_string(),
        _ => return None,
    };
    Some(image)
}

/// Registry prefix for Kubernetes images.
pub fn kubernetes_image_base(spec: &ClusterSpec) -> String {
    spec.kubernetes_config().kubernetes_image_base.clone()
}

/// Full image spec (`registry/name:tag`), or `None` for an unknown key.
/// References that already name a registry are returned unchanged.
pub fn image_spec(spec: &ClusterSpec, key: &str) -> Option<String> {
    let image = component_image(spec, key)?;
    if image.contains('/') {
        return Some(image);
    }
    Some(format!("{}{}", kubernetes_image_base(spec), image))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(version: &str) -> ClusterSpec {
        let mut spec = ClusterSpec::default();
        spec.orchestrator_profile.orchestrator_version = version.to_string();
        spec
    }

    #[test]
    fn test_os_image_config() {
        let ubuntu = os_image_config(Distro::Ubuntu);
        assert_eq!(ubuntu.publisher, "Canonical");
        assert_eq!(ubuntu.sku, "16.04-LTS");
        assert_eq!(os_image_config(Distro::AksUbuntu1804).publisher, "microsoft-aks");
    }

    #[test]
    fn test_versioned_images() {
        let spec = spec("1.16.4");
        assert_eq!(
            image_spec(&spec, "hyperkube").unwrap(),
            "k8s.gcr.io/hyperkube-amd64:v1.16.4"
        );
        assert_eq!(
            image_spec(&spec, KUBE_PROXY_ADDON).unwrap(),
            "k8s.gcr.io/kube-proxy:v1.16.4"
        );
        assert_eq!(
            component_image(&spec, "addonmanager").unwrap(),
            "kube-addon-manager-amd64:v9.0.2"
        );
    }

    #[test]
    fn test_registry_qualified_images_unchanged() {
        let spec = spec("1.15.7");
        assert_eq!(
            image_spec(&spec, AZURE_NETWORK_POLICY_ADDON).unwrap(),
            "mcr.microsoft.com/containernetworking/azure-npm:v1.0.29"
        );
        assert!(image_spec(&spec, "not-a-component").is_none());
    }
}
