//! ClusterSpec: the typed api model handed to the generator.
//!
//! Field names follow the camelCase JSON api model. Everything defaults so a
//! partially filled document still deserializes; the generator reads the
//! model but never mutates it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::version::is_kubernetes_version_ge;

pub const AZURE_PUBLIC_CLOUD: &str = "AzurePublicCloud";
pub const AZURE_CHINA_CLOUD: &str = "AzureChinaCloud";
pub const AZURE_GERMAN_CLOUD: &str = "AzureGermanCloud";
pub const AZURE_US_GOVERNMENT_CLOUD: &str = "AzureUSGovernmentCloud";
pub const AZURE_STACK_CLOUD: &str = "AzureStackCloud";

/// Root configuration for one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    pub location: String,
    pub orchestrator_profile: OrchestratorProfile,
    pub master_profile: Option<MasterProfile>,
    pub hosted_master_profile: Option<HostedMasterProfile>,
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
    pub linux_profile: Option<LinuxProfile>,
    pub windows_profile: Option<WindowsProfile>,
    pub service_principal_profile: Option<ServicePrincipalProfile>,
    pub certificate_profile: Option<CertificateProfile>,
    pub aad_profile: Option<AadProfile>,
    pub extension_profiles: Vec<ExtensionProfile>,
    pub feature_flags: FeatureFlags,
    pub custom_cloud_profile: Option<CustomCloudProfile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorType {
    #[default]
    Kubernetes,
    #[serde(rename = "DCOS")]
    Dcos,
    Swarm,
    SwarmMode,
}

impl OrchestratorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "Kubernetes",
            Self::Dcos => "DCOS",
            Self::Swarm => "Swarm",
            Self::SwarmMode => "SwarmMode",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorProfile {
    pub orchestrator_type: OrchestratorType,
    pub orchestrator_version: String,
    pub kubernetes_config: KubernetesConfig,
}

impl OrchestratorProfile {
    pub fn is_kubernetes(&self) -> bool {
        self.orchestrator_type == OrchestratorType::Kubernetes
    }

    /// `major.minor` of the orchestrator version, used for versioned asset paths.
    pub fn major_minor(&self) -> String {
        let mut parts = self.orchestrator_version.split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("{}.{}", major, minor),
            (Some(major), None) => major.to_string(),
            _ => String::new(),
        }
    }

    pub fn is_version_ge(&self, min: &str) -> bool {
        is_kubernetes_version_ge(&self.orchestrator_version, min)
    }

    pub fn is_azure_cni(&self) -> bool {
        self.kubernetes_config.network_plugin == NETWORK_PLUGIN_AZURE
    }
}

pub const NETWORK_PLUGIN_AZURE: &str = "azure";
pub const NETWORK_PLUGIN_KUBENET: &str = "kubenet";
pub const NETWORK_PLUGIN_FLANNEL: &str = "flannel";
pub const NETWORK_PLUGIN_CILIUM: &str = "cilium";
pub const NETWORK_POLICY_AZURE: &str = "azure";
pub const NETWORK_POLICY_CALICO: &str = "calico";
pub const NETWORK_POLICY_CILIUM: &str = "cilium";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalancerSku {
    #[default]
    Basic,
    Standard,
}

impl LoadBalancerSku {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Standard => "Standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubernetesConfig {
    pub network_plugin: String,
    pub network_policy: String,
    pub container_runtime: String,
    pub load_balancer_sku: LoadBalancerSku,
    pub private_cluster: Option<PrivateCluster>,
    pub use_managed_identity: bool,
    #[serde(rename = "userAssignedID")]
    pub user_assigned_id: String,
    pub use_cloud_controller_manager: bool,
    pub enable_encryption_with_external_kms: bool,
    pub exclude_master_from_standard_lb: bool,
    pub maximum_load_balancer_rule_count: u32,
    pub outbound_rule_idle_timeout_in_minutes: u32,
    pub cluster_subnet: String,
    pub cluster_subnet_ipv6: String,
    pub docker_bridge_subnet: String,
    #[serde(rename = "dnsServiceIP")]
    pub dns_service_ip: String,
    pub service_cidr: String,
    #[serde(rename = "etcdDiskSizeGB")]
    pub etcd_disk_size_gb: String,
    pub kubernetes_image_base: String,
    pub addons: Vec<KubernetesAddon>,
    pub components: Vec<KubernetesComponent>,
    pub apiserver_config: BTreeMap<String, String>,
    pub controller_manager_config: BTreeMap<String, String>,
    pub scheduler_config: BTreeMap<String, String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            network_plugin: NETWORK_PLUGIN_KUBENET.to_string(),
            network_policy: String::new(),
            container_runtime: "docker".to_string(),
            load_balancer_sku: LoadBalancerSku::Basic,
            private_cluster: None,
            use_managed_identity: false,
            user_assigned_id: String::new(),
            use_cloud_controller_manager: false,
            enable_encryption_with_external_kms: false,
            exclude_master_from_standard_lb: false,
            maximum_load_balancer_rule_count: 250,
            outbound_rule_idle_timeout_in_minutes: 30,
            cluster_subnet: "10.244.0.0/16".to_string(),
            cluster_subnet_ipv6: String::new(),
            docker_bridge_subnet: "172.17.0.1/16".to_string(),
            dns_service_ip: "10.0.0.10".to_string(),
            service_cidr: "10.0.0.0/16".to_string(),
            etcd_disk_size_gb: "256".to_string(),
            kubernetes_image_base: "k8s.gcr.io/".to_string(),
            addons: Vec::new(),
            components: Vec::new(),
            apiserver_config: BTreeMap::new(),
            controller_manager_config: BTreeMap::new(),
            scheduler_config: BTreeMap::new(),
        }
    }
}

impl KubernetesConfig {
    pub fn is_private_cluster(&self) -> bool {
        self.private_cluster.as_ref().is_some_and(|p| p.enabled)
    }

    pub fn private_jumpbox_provision(&self) -> bool {
        self.private_cluster
            .as_ref()
            .is_some_and(|p| p.enabled && p.jumpbox_profile.is_some())
    }

    pub fn user_assigned_id_enabled(&self) -> bool {
        self.use_managed_identity && !self.user_assigned_id.is_empty()
    }

    /// A user-assigned identity given by name (not a full resource id) is created by the template.
    pub fn should_create_user_assigned_identity(&self) -> bool {
        self.user_assigned_id_enabled() && !self.user_assigned_id.starts_with('/')
    }

    pub fn addon(&self, name: &str) -> Option<&KubernetesAddon> {
        self.addons.iter().find(|a| a.name == name)
    }

    pub fn component(&self, name: &str) -> Option<&KubernetesComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Inline base64 payload supplied for an addon, or empty.
    pub fn addon_data(&self, name: &str) -> String {
        self.addon(name).map(|a| a.data.clone()).unwrap_or_default()
    }

    pub fn component_data(&self, name: &str) -> String {
        self.component(name).map(|c| c.data.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivateCluster {
    pub enabled: bool,
    pub jumpbox_profile: Option<JumpboxProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JumpboxProfile {
    pub name: String,
    pub vm_size: String,
    #[serde(rename = "osDiskSizeGB")]
    pub os_disk_size_gb: u32,
    pub username: String,
    pub public_key: String,
    pub storage_profile: StorageProfile,
}

/// Container resource settings shared by addons and components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub cpu_requests: String,
    pub memory_requests: String,
    pub cpu_limits: String,
    pub memory_limits: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubernetesAddon {
    pub name: String,
    pub enabled: Option<bool>,
    pub mode: String,
    pub containers: Vec<ContainerSpec>,
    pub config: BTreeMap<String, String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubernetesComponent {
    pub name: String,
    pub enabled: Option<bool>,
    pub containers: Vec<ContainerSpec>,
    pub config: BTreeMap<String, String>,
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageProfile {
    #[default]
    ManagedDisks,
    StorageAccount,
    Ephemeral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityProfile {
    #[default]
    AvailabilitySet,
    VirtualMachineScaleSets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distro {
    #[default]
    Ubuntu,
    Rhel,
    CoreOS,
    #[serde(rename = "aks-ubuntu-18.04")]
    AksUbuntu1804,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

/// Reference from a profile to a named extension profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionRef {
    pub name: String,
    pub single_or_all: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageReference {
    pub name: String,
    pub resource_group: String,
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    pub gallery: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasterProfile {
    pub count: u32,
    pub dns_prefix: String,
    pub vm_size: String,
    #[serde(rename = "osDiskSizeGB")]
    pub os_disk_size_gb: u32,
    pub os_disk_caching_type: String,
    #[serde(rename = "vnetSubnetID")]
    pub vnet_subnet_id: String,
    #[serde(rename = "agentVnetSubnetID")]
    pub agent_vnet_subnet_id: String,
    pub vnet_cidr: String,
    pub subnet: String,
    #[serde(rename = "firstConsecutiveStaticIP")]
    pub first_consecutive_static_ip: String,
    pub storage_profile: Option<StorageProfile>,
    pub availability_profile: AvailabilityProfile,
    pub availability_zones: Vec<String>,
    pub platform_fault_domain_count: Option<u32>,
    pub cosmos_etcd: bool,
    pub distro: Distro,
    pub ip_address_count: u32,
    pub extensions: Vec<ExtensionRef>,
    pub preprovision_extension: Option<ExtensionRef>,
    pub image_ref: Option<ImageReference>,
    pub custom_vm_tags: BTreeMap<String, String>,
    pub ultra_ssd_enabled: bool,
}

impl Default for MasterProfile {
    fn default() -> Self {
        Self {
            count: 1,
            dns_prefix: String::new(),
            vm_size: "Standard_D2_v3".to_string(),
            os_disk_size_gb: 0,
            os_disk_caching_type: "ReadWrite".to_string(),
            vnet_subnet_id: String::new(),
            agent_vnet_subnet_id: String::new(),
            vnet_cidr: String::new(),
            subnet: "10.240.0.0/16".to_string(),
            first_consecutive_static_ip: "10.240.255.5".to_string(),
            storage_profile: None,
            availability_profile: AvailabilityProfile::AvailabilitySet,
            availability_zones: Vec::new(),
            platform_fault_domain_count: None,
            cosmos_etcd: false,
            distro: Distro::Ubuntu,
            ip_address_count: 0,
            extensions: Vec::new(),
            preprovision_extension: None,
            image_ref: None,
            custom_vm_tags: BTreeMap::new(),
            ultra_ssd_enabled: false,
        }
    }
}

impl MasterProfile {
    pub fn is_custom_vnet(&self) -> bool {
        !self.vnet_subnet_id.is_empty()
    }

    pub fn has_multiple_nodes(&self) -> bool {
        self.count > 1
    }

    pub fn has_availability_zones(&self) -> bool {
        !self.availability_zones.is_empty()
    }

    pub fn is_storage_account(&self) -> bool {
        self.storage_profile == Some(StorageProfile::StorageAccount)
    }

    pub fn is_managed_disks(&self) -> bool {
        self.storage_profile == Some(StorageProfile::ManagedDisks)
    }

    pub fn is_vmss(&self) -> bool {
        self.availability_profile == AvailabilityProfile::VirtualMachineScaleSets
    }

    pub fn is_coreos(&self) -> bool {
        self.distro == Distro::CoreOS
    }

    pub fn has_image_ref(&self) -> bool {
        self.image_ref.as_ref().is_some_and(|r| !r.name.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostedMasterProfile {
    pub fqdn: String,
    pub dns_prefix: String,
    pub subnet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentPoolProfile {
    pub name: String,
    pub count: u32,
    pub vm_size: String,
    pub os_type: OsType,
    pub distro: Distro,
    #[serde(rename = "osDiskSizeGB")]
    pub os_disk_size_gb: u32,
    pub storage_profile: StorageProfile,
    pub availability_profile: AvailabilityProfile,
    #[serde(rename = "diskSizesGB")]
    pub disk_sizes_gb: Vec<u32>,
    #[serde(rename = "vnetSubnetID")]
    pub vnet_subnet_id: String,
    pub subnet: String,
    pub availability_zones: Vec<String>,
    pub platform_fault_domain_count: Option<u32>,
    pub ip_address_count: u32,
    pub extensions: Vec<ExtensionRef>,
    pub preprovision_extension: Option<ExtensionRef>,
    pub single_placement_group: Option<bool>,
    pub custom_vm_tags: BTreeMap<String, String>,
}

impl Default for AgentPoolProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            count: 1,
            vm_size: "Standard_D2_v3".to_string(),
            os_type: OsType::Linux,
            distro: Distro::Ubuntu,
            os_disk_size_gb: 0,
            storage_profile: StorageProfile::ManagedDisks,
            availability_profile: AvailabilityProfile::VirtualMachineScaleSets,
            disk_sizes_gb: Vec::new(),
            vnet_subnet_id: String::new(),
            subnet: String::new(),
            availability_zones: Vec::new(),
            platform_fault_domain_count: None,
            ip_address_count: 0,
            extensions: Vec::new(),
            preprovision_extension: None,
            single_placement_group: None,
            custom_vm_tags: BTreeMap::new(),
        }
    }
}

impl AgentPoolProfile {
    pub fn is_windows(&self) -> bool {
        self.os_type == OsType::Windows
    }

    pub fn is_vmss(&self) -> bool {
        self.availability_profile == AvailabilityProfile::VirtualMachineScaleSets
    }

    pub fn is_availability_sets(&self) -> bool {
        self.availability_profile == AvailabilityProfile::AvailabilitySet
    }

    pub fn is_storage_account(&self) -> bool {
        self.storage_profile == StorageProfile::StorageAccount
    }

    pub fn is_managed_disks(&self) -> bool {
        self.storage_profile == StorageProfile::ManagedDisks
    }

    pub fn has_disks(&self) -> bool {
        !self.disk_sizes_gb.is_empty()
    }

    pub fn is_custom_vnet(&self) -> bool {
        !self.vnet_subnet_id.is_empty()
    }

    pub fn is_coreos(&self) -> bool {
        self.distro == Distro::CoreOS
    }

    pub fn has_availability_zones(&self) -> bool {
        !self.availability_zones.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinuxProfile {
    pub admin_username: String,
    pub ssh: SshConfig,
    #[serde(rename = "customNodesDNS")]
    pub custom_nodes_dns: Option<CustomNodesDns>,
}

impl LinuxProfile {
    pub fn has_custom_nodes_dns(&self) -> bool {
        self.custom_nodes_dns
            .as_ref()
            .is_some_and(|d| !d.dns_server.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SshConfig {
    pub public_keys: Vec<PublicKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicKey {
    pub key_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomNodesDns {
    #[serde(rename = "dnsServer")]
    pub dns_server: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowsProfile {
    pub admin_username: String,
    pub admin_password: String,
    pub windows_publisher: String,
    pub windows_offer: String,
    pub windows_sku: String,
    pub image_version: String,
}

/// Pointer to a secret stored in Azure Key Vault.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyvaultSecretRef {
    #[serde(rename = "vaultID")]
    pub vault_id: String,
    pub secret_name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicePrincipalProfile {
    pub client_id: String,
    pub secret: String,
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub keyvault_secret_ref: Option<KeyvaultSecretRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateProfile {
    pub ca_certificate: String,
    pub ca_private_key: String,
    pub api_server_certificate: String,
    pub api_server_private_key: String,
    pub client_certificate: String,
    pub client_private_key: String,
    pub kube_config_certificate: String,
    pub kube_config_private_key: String,
    pub etcd_server_certificate: String,
    pub etcd_server_private_key: String,
    pub etcd_client_certificate: String,
    pub etcd_client_private_key: String,
    pub etcd_peer_certificates: Vec<String>,
    pub etcd_peer_private_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AadProfile {
    #[serde(rename = "clientAppID")]
    pub client_app_id: String,
    #[serde(rename = "serverAppID")]
    pub server_app_id: String,
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    #[serde(rename = "adminGroupID")]
    pub admin_group_id: String,
}

/// A VM extension published under an extensions root URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionProfile {
    pub name: String,
    pub version: String,
    pub extensions_parameters: String,
    pub extensions_parameters_keyvault_secret: Option<KeyvaultSecretRef>,
    #[serde(rename = "rootURL")]
    pub root_url: String,
    pub script: String,
    #[serde(rename = "urlQuery")]
    pub url_query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    pub block_outbound_internet: bool,
    #[serde(rename = "enableIPv6DualStack")]
    pub enable_ipv6_dual_stack: bool,
    #[serde(rename = "enableCSERunInBackground")]
    pub cse_run_in_background: bool,
    pub enable_telemetry: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomCloudProfile {
    pub name: String,
    pub resource_manager_vm_dns_suffix: String,
}

impl ClusterSpec {
    pub fn kubernetes_config(&self) -> &KubernetesConfig {
        &self.orchestrator_profile.kubernetes_config
    }

    pub fn is_hosted_master(&self) -> bool {
        self.hosted_master_profile.is_some()
    }

    pub fn is_vmss_master(&self) -> bool {
        self.master_profile.as_ref().is_some_and(|m| m.is_vmss())
    }

    pub fn is_private_cluster(&self) -> bool {
        self.kubernetes_config().is_private_cluster()
    }

    pub fn has_windows(&self) -> bool {
        self.agent_pool_profiles.iter().any(|p| p.is_windows())
    }

    pub fn any_agent_is_linux(&self) -> bool {
        self.agent_pool_profiles.iter().any(|p| !p.is_windows())
    }

    pub fn has_availability_zones(&self) -> bool {
        self.master_profile
            .as_ref()
            .is_some_and(|m| m.has_availability_zones())
            || self
                .agent_pool_profiles
                .iter()
                .any(|p| p.has_availability_zones())
    }

    pub fn has_vmas_storage_account_pools(&self) -> bool {
        self.agent_pool_profiles
            .iter()
            .any(|p| p.is_availability_sets() && p.is_storage_account())
    }

    pub fn is_custom_cloud_profile(&self) -> bool {
        self.custom_cloud_profile.is_some()
    }

    pub fn is_azure_stack_cloud(&self) -> bool {
        self.custom_cloud_profile
            .as_ref()
            .is_some_and(|c| c.name.is_empty() || c.name == AZURE_STACK_CLOUD)
    }

    /// Azure cloud environment derived from the location.
    pub fn cloud_name(&self) -> &'static str {
        if self.is_azure_stack_cloud() {
            return AZURE_STACK_CLOUD;
        }
        let loc = self.location.to_lowercase();
        if loc.starts_with("china") {
            AZURE_CHINA_CLOUD
        } else if loc.starts_with("germany") {
            AZURE_GERMAN_CLOUD
        } else if loc.starts_with("usgov") || loc.starts_with("usdod") {
            AZURE_US_GOVERNMENT_CLOUD
        } else {
            AZURE_PUBLIC_CLOUD
        }
    }

    pub fn is_aks_billing_enabled(&self) -> bool {
        matches!(
            self.cloud_name(),
            AZURE_PUBLIC_CLOUD | AZURE_CHINA_CLOUD | AZURE_US_GOVERNMENT_CLOUD
        )
    }

    /// DNS suffix for public endpoints in the target cloud.
    pub fn endpoint_dns_suffix(&self) -> String {
        if let Some(custom) = &self.custom_cloud_profile {
            if !custom.resource_manager_vm_dns_suffix.is_empty() {
                return custom.resource_manager_vm_dns_suffix.clone();
            }
        }
        match self.cloud_name() {
            AZURE_CHINA_CLOUD => "cloudapp.chinacloudapi.cn",
            AZURE_GERMAN_CLOUD => "cloudapp.microsoftazure.de",
            AZURE_US_GOVERNMENT_CLOUD => "cloudapp.usgovcloudapi.net",
            _ => "cloudapp.azure.com",
        }
        .to_string()
    }

    pub fn dns_prefix(&self) -> String {
        if let Some(m) = &self.master_profile {
            return m.dns_prefix.clone();
        }
        self.hosted_master_profile
            .as_ref()
            .map(|h| h.dns_prefix.clone())
            .unwrap_or_default()
    }

    /// Public FQDN of the master endpoint for this location.
    pub fn master_fqdn(&self) -> String {
        format!(
            "{}.{}.{}",
            self.dns_prefix(),
            self.location,
            self.endpoint_dns_suffix()
        )
    }

    pub fn extension_profile(&self, name: &str) -> Option<&ExtensionProfile> {
        self.extension_profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// VM type string written into the cloud provider config.
    pub fn vm_type(&self) -> &'static str {
        if self.agent_pool_profiles.iter().any(|p| p.is_vmss()) {
            "vmss"
        } else {
            "standard"
        }
    }

    /// Whether the route table is needed (every plugin but Azure CNI).
    pub fn requires_route_table(&self) -> bool {
        !self.orchestrator_profile.is_azure_cni()
    }

    /// Stable eight-digit cluster id derived from the dns prefix (or the
    /// first pool name for hosted masters without one). Used as the default
    /// `nameSuffix` and in every VM name prefix.
    pub fn cluster_id(&self) -> String {
        let mut seed = self.dns_prefix();
        if seed.is_empty() {
            if let Some(pool) = self.agent_pool_profiles.first() {
                seed = pool.name.clone();
            }
        }
        format!("{:08}", fnv1a_64(seed.as_bytes()) % 100_000_000)
    }

    /// `k8s` for self-managed masters, `aks` when the master is hosted.
    pub fn orchestrator_name(&self) -> &'static str {
        if self.is_hosted_master() {
            DEFAULT_HOSTED_PROFILE_MASTER_NAME
        } else {
            DEFAULT_ORCHESTRATOR_NAME
        }
    }

    pub fn master_vm_prefix(&self) -> String {
        format!("{}-master-{}-", DEFAULT_ORCHESTRATOR_NAME, self.cluster_id())
    }

    /// VM name prefix of an agent pool. Windows computer names are capped
    /// at 15 characters, so Windows pools use a short positional prefix.
    pub fn agent_vm_prefix(&self, profile: &AgentPoolProfile, index: usize) -> String {
        let cluster_id = self.cluster_id();
        if profile.is_windows() {
            return format!("{}{}{:02}", &cluster_id[..4], DEFAULT_ORCHESTRATOR_NAME, index);
        }
        let mut prefix = format!("{}-{}-{}-", self.orchestrator_name(), profile.name, cluster_id);
        if profile.is_vmss() {
            prefix.push_str("vmss");
        }
        prefix
    }

    /// Name of the subnet the nodes attach to.
    pub fn subnet_name(&self) -> String {
        if let Some(master) = &self.master_profile {
            if master.is_custom_vnet() {
                return master
                    .vnet_subnet_id
                    .split('/')
                    .nth(SUBNET_NAME_RESOURCE_SEGMENT_INDEX)
                    .unwrap_or_default()
                    .to_string();
            }
            if master.is_vmss() {
                return "subnetmaster".to_string();
            }
            return DEFAULT_SUBNET_NAME.to_string();
        }
        self.agent_pool_profiles
            .first()
            .filter(|p| p.is_custom_vnet())
            .and_then(|p| p.vnet_subnet_id.split('/').nth(SUBNET_NAME_RESOURCE_SEGMENT_INDEX))
            .unwrap_or(DEFAULT_SUBNET_NAME)
            .to_string()
    }

    /// First agent pool's prefix when it is a scale set, otherwise empty.
    pub fn primary_scale_set_name(&self) -> String {
        match self.agent_pool_profiles.first() {
            Some(pool) if pool.is_vmss() => self.agent_vm_prefix(pool, 0),
            _ => String::new(),
        }
    }

    /// Availability set of the first agent pool, when it uses one.
    pub fn primary_availability_set_name(&self) -> String {
        match self.agent_pool_profiles.first() {
            Some(pool) if pool.is_availability_sets() => {
                format!("{}-availabilitySet-{}", pool.name, self.cluster_id())
            }
            _ => String::new(),
        }
    }
}

pub const DEFAULT_ORCHESTRATOR_NAME: &str = "k8s";
pub const DEFAULT_HOSTED_PROFILE_MASTER_NAME: &str = "aks";
pub const DEFAULT_SUBNET_NAME: &str = "k8s-subnet";
const SUBNET_NAME_RESOURCE_SEGMENT_INDEX: usize = 10;

fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_api_model() {
        let json = r#"{
            "location": "westus2",
            "orchestratorProfile": {"orchestratorType": "Kubernetes", "orchestratorVersion": "1.15.7"},
            "masterProfile": {"count": 3, "dnsPrefix": "mycluster", "vmSize": "Standard_D2_v3"},
            "agentPoolProfiles": [{"name": "agentpool1", "count": 2, "availabilityProfile": "AvailabilitySet"}]
        }"#;
        let spec: ClusterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.location, "westus2");
        assert_eq!(spec.orchestrator_profile.major_minor(), "1.15");
        let master = spec.master_profile.as_ref().unwrap();
        assert!(master.has_multiple_nodes());
        assert!(spec.agent_pool_profiles[0].is_availability_sets());
        // defaults survive partial documents
        assert_eq!(spec.kubernetes_config().network_plugin, "kubenet");
    }

    #[test]
    fn test_cloud_name_from_location() {
        let mut spec = ClusterSpec::default();
        spec.location = "chinaeast2".to_string();
        assert_eq!(spec.cloud_name(), AZURE_CHINA_CLOUD);
        spec.location = "westeurope".to_string();
        assert_eq!(spec.cloud_name(), AZURE_PUBLIC_CLOUD);
        spec.custom_cloud_profile = Some(CustomCloudProfile::default());
        assert_eq!(spec.cloud_name(), AZURE_STACK_CLOUD);
    }

    #[test]
    fn test_master_fqdn() {
        let mut spec = ClusterSpec::default();
        spec.location = "eastus".to_string();
        spec.master_profile = Some(MasterProfile {
            dns_prefix: "k8s".to_string(),
            ..Default::default()
        });
        assert_eq!(spec.master_fqdn(), "k8s.eastus.cloudapp.azure.com");
    }

    #[test]
    fn test_naming_helpers() {
        let mut spec = ClusterSpec {
            master_profile: Some(MasterProfile {
                dns_prefix: "mycluster".to_string(),
                ..Default::default()
            }),
            agent_pool_profiles: vec![
                AgentPoolProfile {
                    name: "linuxpool".to_string(),
                    ..Default::default()
                },
                AgentPoolProfile {
                    name: "winpool".to_string(),
                    os_type: OsType::Windows,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let id = spec.cluster_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(id, spec.clone().cluster_id());

        assert_eq!(spec.orchestrator_name(), "k8s");
        assert_eq!(spec.master_vm_prefix(), format!("k8s-master-{}-", id));
        let linux = spec.agent_vm_prefix(&spec.agent_pool_profiles[0], 0);
        assert_eq!(linux, format!("k8s-linuxpool-{}-vmss", id));
        let windows = spec.agent_vm_prefix(&spec.agent_pool_profiles[1], 1);
        assert_eq!(windows, format!("{}k8s01", &id[..4]));
        assert_eq!(spec.primary_scale_set_name(), linux);
        assert_eq!(spec.primary_availability_set_name(), "");
        assert_eq!(spec.subnet_name(), DEFAULT_SUBNET_NAME);

        if let Some(master) = spec.master_profile.as_mut() {
            master.vnet_subnet_id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/custom".to_string();
        }
        assert_eq!(spec.subnet_name(), "custom");
    }
}
