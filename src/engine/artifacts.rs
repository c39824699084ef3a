//! Master node artifacts: component manifests and addon manifests written
//! by cloud-init.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::io::Write;

use crate::api::addons::{
    AAD_POD_IDENTITY_ADDON, ACI_CONNECTOR_ADDON, ADDON_MANAGER_COMPONENT, API_SERVER_COMPONENT,
    AUDIT_POLICY_ADDON, AZURE_CLOUD_PROVIDER_ADDON, AZURE_CNI_NETWORK_MONITOR_ADDON,
    AZURE_NETWORK_POLICY_ADDON, BLOBFUSE_FLEXVOLUME_ADDON, CALICO_ADDON, CILIUM_ADDON,
    CLOUD_CONTROLLER_MANAGER_COMPONENT, CLOUD_NODE_MANAGER_ADDON, CLUSTER_AUTOSCALER_ADDON,
    CLUSTER_INIT_COMPONENT, CONTAINER_MONITORING_ADDON, CONTROLLER_MANAGER_COMPONENT,
    COREDNS_ADDON, DASHBOARD_ADDON, FLANNEL_ADDON, HEAPSTER_ADDON, IP_MASQ_AGENT_ADDON,
    KEYVAULT_FLEXVOLUME_ADDON, KUBE_DNS_ADDON, KUBE_PROXY_ADDON, METRICS_SERVER_ADDON,
    NVIDIA_DEVICE_PLUGIN_ADDON, POD_SECURITY_POLICY_ADDON, RESCHEDULER_ADDON,
    SCHEDULER_COMPONENT, SMB_FLEXVOLUME_ADDON, TILLER_ADDON,
};
use crate::api::{ClusterSpec, is_addon_enabled, is_component_enabled};
use crate::error::SubstitutionError;

pub const MANIFESTS_DESTINATION: &str = "/etc/kubernetes/manifests";
pub const ADDONS_DESTINATION: &str = "/etc/kubernetes/addons";
pub const CLUSTER_INIT_DESTINATION: &str = "/opt/azure/containers";

const COMPONENTS: &[&str] = &[
    API_SERVER_COMPONENT,
    CONTROLLER_MANAGER_COMPONENT,
    CLOUD_CONTROLLER_MANAGER_COMPONENT,
    SCHEDULER_COMPONENT,
    ADDON_MANAGER_COMPONENT,
];

const ADDONS: &[&str] = &[
    AAD_POD_IDENTITY_ADDON,
    ACI_CONNECTOR_ADDON,
    AUDIT_POLICY_ADDON,
    AZURE_CLOUD_PROVIDER_ADDON,
    AZURE_CNI_NETWORK_MONITOR_ADDON,
    AZURE_NETWORK_POLICY_ADDON,
    BLOBFUSE_FLEXVOLUME_ADDON,
    CALICO_ADDON,
    CILIUM_ADDON,
    CLOUD_NODE_MANAGER_ADDON,
    CLUSTER_AUTOSCALER_ADDON,
    CONTAINER_MONITORING_ADDON,
    COREDNS_ADDON,
    FLANNEL_ADDON,
    HEAPSTER_ADDON,
    IP_MASQ_AGENT_ADDON,
    KEYVAULT_FLEXVOLUME_ADDON,
    KUBE_DNS_ADDON,
    KUBE_PROXY_ADDON,
    DASHBOARD_ADDON,
    METRICS_SERVER_ADDON,
    NVIDIA_DEVICE_PLUGIN_ADDON,
    POD_SECURITY_POLICY_ADDON,
    RESCHEDULER_ADDON,
    SMB_FLEXVOLUME_ADDON,
    TILLER_ADDON,
];

/// Where one manifest comes from and where cloud-init writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFileSpec {
    /// Embedded template file, if the manifest has one.
    pub source_file: Option<String>,
    /// Inline base64 payload from the api model; wins over `source_file`.
    pub base64_data: String,
    pub destination_path: &'static str,
    pub destination_file: String,
    pub enabled: bool,
}

/// Component manifests keyed by component name.
pub fn component_settings(spec: &ClusterSpec) -> BTreeMap<&'static str, ComponentFileSpec> {
    let k8s = spec.kubernetes_config();
    let mut settings: BTreeMap<_, _> = COMPONENTS
        .iter()
        .map(|&name| {
            let entry = ComponentFileSpec {
                source_file: Some(format!("kubernetesmaster-{}.yaml", name)),
                base64_data: k8s.component_data(name),
                destination_path: MANIFESTS_DESTINATION,
                destination_file: format!("{}.yaml", name),
                enabled: is_component_enabled(spec, name),
            };
            (name, entry)
        })
        .collect();
    settings.insert(
        CLUSTER_INIT_COMPONENT,
        ComponentFileSpec {
            source_file: None,
            base64_data: k8s.component_data(CLUSTER_INIT_COMPONENT),
            destination_path: CLUSTER_INIT_DESTINATION,
            destination_file: format!("{}.yaml", CLUSTER_INIT_COMPONENT),
            enabled: is_component_enabled(spec, CLUSTER_INIT_COMPONENT),
        },
    );
    settings
}

/// Addon manifests keyed by addon name.
pub fn addon_settings(spec: &ClusterSpec) -> BTreeMap<&'static str, ComponentFileSpec> {
    let k8s = spec.kubernetes_config();
    ADDONS
        .iter()
        .map(|&name| {
            let entry = ComponentFileSpec {
                source_file: Some(format!("kubernetesmasteraddons-{}.yaml", name)),
                base64_data: k8s.addon_data(name),
                destination_path: ADDONS_DESTINATION,
                destination_file: format!("{}.yaml", name),
                enabled: is_addon_enabled(spec, name),
            };
            (name, entry)
        })
        .collect()
}

/// Gzips `content` and base64 encodes the result.
pub fn gzip_base64(content: &str) -> Result<String, SubstitutionError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(content.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// cloud-init `write_files` entry for a gzipped, base64 encoded payload.
pub fn build_config_string(b64_gzip: &str, destination_path: &str, destination_file: &str) -> String {
    [
        format!("- path: {}/{}", destination_path, destination_file),
        "  permissions: \"0644\"".to_string(),
        "  encoding: gzip".to_string(),
        "  owner: \"root\"".to_string(),
        "  content: !!binary |".to_string(),
        format!("    {}\n\n", b64_gzip),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::KubernetesComponent;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn spec(version: &str) -> ClusterSpec {
        let mut spec = ClusterSpec::default();
        spec.orchestrator_profile.orchestrator_version = version.to_string();
        spec
    }

    #[test]
    fn test_component_settings() {
        let settings = component_settings(&spec("1.16.4"));
        let apiserver = &settings[API_SERVER_COMPONENT];
        assert_eq!(
            apiserver.source_file.as_deref(),
            Some("kubernetesmaster-kube-apiserver.yaml")
        );
        assert_eq!(apiserver.destination_path, MANIFESTS_DESTINATION);
        assert!(apiserver.enabled);
        assert!(!settings[CLOUD_CONTROLLER_MANAGER_COMPONENT].enabled);

        let init = &settings[CLUSTER_INIT_COMPONENT];
        assert!(init.source_file.is_none());
        assert_eq!(init.destination_path, CLUSTER_INIT_DESTINATION);
        assert!(!init.enabled);
    }

    #[test]
    fn test_cluster_init_enabled_by_data() {
        let mut spec = spec("1.16.4");
        spec.orchestrator_profile.kubernetes_config.components.push(KubernetesComponent {
            name: CLUSTER_INIT_COMPONENT.to_string(),
            data: "YXBpVmVyc2lvbjogdjE=".to_string(),
            ..Default::default()
        });
        let settings = component_settings(&spec);
        assert!(settings[CLUSTER_INIT_COMPONENT].enabled);
        assert_eq!(settings[CLUSTER_INIT_COMPONENT].base64_data, "YXBpVmVyc2lvbjogdjE=");
    }

    #[test]
    fn test_addon_settings_follow_defaults() {
        let settings = addon_settings(&spec("1.16.4"));
        assert_eq!(settings.len(), ADDONS.len());
        assert!(settings[COREDNS_ADDON].enabled);
        assert!(!settings[KUBE_DNS_ADDON].enabled);
        assert!(!settings[TILLER_ADDON].enabled);
        assert_eq!(settings[KUBE_PROXY_ADDON].destination_file, "kube-proxy.yaml");
        assert_eq!(settings[KUBE_PROXY_ADDON].destination_path, ADDONS_DESTINATION);
    }

    #[test]
    fn test_gzip_base64_decodes() {
        let encoded = gzip_base64("apiVersion: v1\nkind: Pod\n").unwrap();
        let compressed = STANDARD.decode(encoded).unwrap();
        let mut text = String::new();
        GzDecoder::new(&compressed[..]).read_to_string(&mut text).unwrap();
        assert_eq!(text, "apiVersion: v1\nkind: Pod\n");
    }

    #[test]
    fn test_build_config_string() {
        let entry = build_config_string("H4sI", ADDONS_DESTINATION, "coredns.yaml");
        assert_eq!(
            entry,
            "- path: /etc/kubernetes/addons/coredns.yaml\n  permissions: \"0644\"\n  encoding: gzip\n  owner: \"root\"\n  content: !!binary |\n    H4sI\n\n"
        );
    }
}
