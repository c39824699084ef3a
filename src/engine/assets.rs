//! Embedded template assets.
//!
//! Every fragment the generator renders is compiled into the binary and
//! looked up by its path relative to `assets/`.

use crate::error::SubstitutionError;

pub const KUBERNETES_BASE_TEMPLATE: &str = "k8s/kubernetesbase.t";
pub const MASTER_LB_TEMPLATE: &str = "k8s/kubernetesmasterlb.t";
pub const MASTER_NSG_TEMPLATE: &str = "k8s/kubernetesmasternsg.t";
pub const VNET_TEMPLATE: &str = "k8s/kubernetesvnet.t";
pub const KUBECONFIG_JSON: &str = "k8s/kubeconfig.json";
pub const MASTER_CUSTOM_DATA_YAML: &str = "k8s/cloud-init/masternodecustomdata.yml";
pub const NODE_CUSTOM_DATA_YAML: &str = "k8s/cloud-init/nodecustomdata.yml";
pub const JUMPBOX_CUSTOM_DATA_YAML: &str = "k8s/cloud-init/jumpboxcustomdata.yml";
pub const WINDOWS_CUSTOM_DATA_PS1: &str = "k8s/kuberneteswindowssetup.ps1";
pub const MANIFESTS_SOURCE_PATH: &str = "k8s/manifests";
pub const ADDONS_SOURCE_PATH: &str = "k8s/addons";

macro_rules! embed {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/", $path)))),*]
    };
}

static ASSETS: &[(&str, &str)] = embed![
    "k8s/kubernetesbase.t",
    "k8s/kubernetesmasterlb.t",
    "k8s/kubernetesmasternsg.t",
    "k8s/kubernetesvnet.t",
    "k8s/kubeconfig.json",
    "k8s/cloud-init/masternodecustomdata.yml",
    "k8s/cloud-init/nodecustomdata.yml",
    "k8s/cloud-init/jumpboxcustomdata.yml",
    "k8s/kuberneteswindowssetup.ps1",
    "k8s/manifests/kubernetesmaster-cloud-controller-manager.yaml",
    "k8s/manifests/kubernetesmaster-kube-addon-manager.yaml",
    "k8s/manifests/kubernetesmaster-kube-apiserver.yaml",
    "k8s/manifests/kubernetesmaster-kube-controller-manager.yaml",
    "k8s/manifests/kubernetesmaster-kube-scheduler.yaml",
    "k8s/addons/kubernetesmasteraddons-aad-pod-identity.yaml",
    "k8s/addons/kubernetesmasteraddons-aci-connector.yaml",
    "k8s/addons/kubernetesmasteraddons-audit-policy.yaml",
    "k8s/addons/kubernetesmasteraddons-azure-cloud-provider.yaml",
    "k8s/addons/kubernetesmasteraddons-azure-cni-networkmonitor.yaml",
    "k8s/addons/kubernetesmasteraddons-azure-npm-daemonset.yaml",
    "k8s/addons/kubernetesmasteraddons-blobfuse-flexvolume.yaml",
    "k8s/addons/kubernetesmasteraddons-calico-daemonset.yaml",
    "k8s/addons/kubernetesmasteraddons-cilium-daemonset.yaml",
    "k8s/addons/kubernetesmasteraddons-cloud-node-manager.yaml",
    "k8s/addons/kubernetesmasteraddons-cluster-autoscaler.yaml",
    "k8s/addons/kubernetesmasteraddons-container-monitoring.yaml",
    "k8s/addons/kubernetesmasteraddons-coredns.yaml",
    "k8s/addons/kubernetesmasteraddons-flannel-daemonset.yaml",
    "k8s/addons/kubernetesmasteraddons-heapster.yaml",
    "k8s/addons/kubernetesmasteraddons-ip-masq-agent.yaml",
    "k8s/addons/kubernetesmasteraddons-keyvault-flexvolume.yaml",
    "k8s/addons/kubernetesmasteraddons-kube-dns.yaml",
    "k8s/addons/kubernetesmasteraddons-kube-proxy.yaml",
    "k8s/addons/kubernetesmasteraddons-kubernetes-dashboard.yaml",
    "k8s/addons/kubernetesmasteraddons-metrics-server.yaml",
    "k8s/addons/kubernetesmasteraddons-nvidia-device-plugin.yaml",
    "k8s/addons/kubernetesmasteraddons-pod-security-policy.yaml",
    "k8s/addons/kubernetesmasteraddons-rescheduler.yaml",
    "k8s/addons/kubernetesmasteraddons-smb-flexvolume.yaml",
    "k8s/addons/kubernetesmasteraddons-tiller.yaml",
    "k8s/addons/1.16/kubernetesmasteraddons-kube-proxy.yaml",
];

/// Contents of the asset at `path`.
pub fn asset(path: &str) -> Result<&'static str, SubstitutionError> {
    ASSETS
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, contents)| *contents)
        .ok_or_else(|| SubstitutionError::AssetNotFound {
            path: path.to_string(),
        })
}

/// Resolves `file` under `source_path`, preferring the copy in the
/// `major_minor` subdirectory when one exists.
pub fn versioned_asset_path(source_path: &str, major_minor: &str, file: &str) -> String {
    let versioned = format!("{}/{}/{}", source_path, major_minor, file);
    if asset(&versioned).is_ok() {
        versioned
    } else {
        format!("{}/{}", source_path, file)
    }
}

/// Paths of all embedded assets.
pub fn asset_names() -> impl Iterator<Item = &'static str> {
    ASSETS.iter().map(|(p, _)| *p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(asset(KUBECONFIG_JSON).unwrap().contains("current-context"));
        assert!(matches!(
            asset("k8s/missing.yaml"),
            Err(SubstitutionError::AssetNotFound { path }) if path == "k8s/missing.yaml"
        ));
    }

    #[test]
    fn test_versioned_path_prefers_override() {
        assert_eq!(
            versioned_asset_path(ADDONS_SOURCE_PATH, "1.16", "kubernetesmasteraddons-kube-proxy.yaml"),
            "k8s/addons/1.16/kubernetesmasteraddons-kube-proxy.yaml"
        );
        assert_eq!(
            versioned_asset_path(ADDONS_SOURCE_PATH, "1.15", "kubernetesmasteraddons-kube-proxy.yaml"),
            "k8s/addons/kubernetesmasteraddons-kube-proxy.yaml"
        );
    }

    #[test]
    fn test_custom_data_has_placeholders() {
        let master = asset(MASTER_CUSTOM_DATA_YAML).unwrap();
        for token in [
            "MASTER_MANIFESTS_CONFIG_PLACEHOLDER",
            "MASTER_CUSTOM_FILES_PLACEHOLDER",
            "MASTER_CONTAINER_ADDONS_PLACEHOLDER",
        ] {
            assert!(master.contains(token), "{} missing", token);
        }
        assert!(asset(WINDOWS_CUSTOM_DATA_PS1).unwrap().contains("PREPROVISION_EXTENSION"));
    }

    #[test]
    fn test_asset_names_unique() {
        let mut names: Vec<_> = asset_names().collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
