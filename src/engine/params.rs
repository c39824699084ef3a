//! Deployment parameters: the values document and the matching template
//! parameter declarations.
//!
//! Secrets may be given inline or as a Key Vault secret path of the form
//! `/subscriptions/<sub>/resourceGroups/<rg>/providers/Microsoft.KeyVault/vaults/<kv>/secrets/<name>[/<version>]`;
//! the latter turns into a Key Vault reference instead of a value.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::api::addons::{ACI_CONNECTOR_ADDON, APP_GATEWAY_INGRESS_ADDON, CLUSTER_AUTOSCALER_ADDON};
use crate::api::{ClusterSpec, KeyvaultSecretRef, StorageProfile, is_addon_enabled};
use crate::engine::armtype::{CONTENT_VERSION, DEPLOYMENT_PARAMETERS_SCHEMA};
use crate::engine::images::{
    AZURE_STACK_IMAGE_SUFFIX, MCR_KUBERNETES_IMAGE_BASE, component_image, image_spec,
    kubernetes_image_base, os_image_config,
};

pub type ParamsMap = Map<String, Value>;

pub const DEFAULT_WINDOWS_PUBLISHER: &str = "MicrosoftWindowsServer";
pub const DEFAULT_WINDOWS_OFFER: &str = "WindowsServer";
pub const DEFAULT_WINDOWS_SKU: &str = "Datacenter-Core-1809-with-Containers-smalldisk";
pub const DEFAULT_WINDOWS_DOCKER_VERSION: &str = "19.03.5";
pub const DEFAULT_VNET_CIDR: &str = "10.0.0.0/8";
pub const DEFAULT_VNET_CIDR_IPV6: &str = "2001:1234:5678:9a00::/56";
pub const DEFAULT_MASTER_SUBNET_IPV6: &str = "2001:1234:5678:9abc::/64";

static KEYVAULT_SECRET_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(/subscriptions/\S+/resourceGroups/\S+/providers/Microsoft.KeyVault/vaults/\S+)/secrets/([^/\s]+)(/(\S+))?$",
    )
    .unwrap()
});

pub fn add_value(params: &mut ParamsMap, key: impl Into<String>, value: impl Into<Value>) {
    params.insert(key.into(), json!({ "value": value.into() }));
}

pub fn add_keyvault_reference(
    params: &mut ParamsMap,
    key: impl Into<String>,
    vault_id: &str,
    secret_name: &str,
    secret_version: &str,
) {
    let mut reference = json!({
        "keyVault": { "id": vault_id },
        "secretName": secret_name,
    });
    if !secret_version.is_empty() {
        reference["secretVersion"] = Value::from(secret_version);
    }
    params.insert(key.into(), json!({ "reference": reference }));
}

fn add_keyvault_secret_ref(params: &mut ParamsMap, key: impl Into<String>, secret: &KeyvaultSecretRef) {
    add_keyvault_reference(params, key, &secret.vault_id, &secret.secret_name, &secret.version);
}

/// Adds a secret: a Key Vault path becomes a reference, anything else a
/// value, base64-encoded when `encode` is set.
pub fn add_secret(params: &mut ParamsMap, key: impl Into<String>, value: &str, encode: bool) {
    match KEYVAULT_SECRET_PATH_RE.captures(value) {
        Some(caps) => {
            let vault_id = caps.get(1).map_or("", |m| m.as_str());
            let secret_name = caps.get(2).map_or("", |m| m.as_str());
            let version = caps.get(4).map_or("", |m| m.as_str());
            add_keyvault_reference(params, key, vault_id, secret_name, version);
        }
        None if encode => add_value(params, key, STANDARD.encode(value)),
        None => add_value(params, key, value),
    }
}

/// Builds the parameter values for a cluster.
pub fn get_parameters(spec: &ClusterSpec, generator_code: &str, tool_version: &str) -> ParamsMap {
    let mut params = ParamsMap::new();

    add_value(&mut params, "aksEngineVersion", tool_version);
    add_value(&mut params, "location", spec.location.as_str());

    if let Some(master) = &spec.master_profile {
        let image = os_image_config(master.distro);
        add_value(&mut params, "osImageOffer", image.offer);
        add_value(&mut params, "osImageSKU", image.sku);
        add_value(&mut params, "osImagePublisher", image.publisher);
        add_value(&mut params, "osImageVersion", image.version);
        if let Some(image_ref) = &master.image_ref {
            add_value(&mut params, "osImageName", image_ref.name.as_str());
            add_value(&mut params, "osImageResourceGroup", image_ref.resource_group.as_str());
        }
    }

    add_value(&mut params, "fqdnEndpointSuffix", spec.endpoint_dns_suffix());
    add_value(&mut params, "targetEnvironment", spec.cloud_name());

    if let Some(linux) = &spec.linux_profile {
        add_value(&mut params, "linuxAdminUsername", linux.admin_username.as_str());
        if let Some(dns) = &linux.custom_nodes_dns {
            add_value(&mut params, "dnsServer", dns.dns_server.as_str());
        }
    }

    // basis for storage account names across all masters and agents
    if spec.master_profile.is_some() || spec.hosted_master_profile.is_some() {
        add_value(&mut params, "masterEndpointDNSNamePrefix", spec.dns_prefix());
    }

    if let Some(master) = &spec.master_profile {
        if master.is_custom_vnet() {
            add_value(&mut params, "masterVnetSubnetID", master.vnet_subnet_id.as_str());
            if master.is_vmss() {
                add_value(&mut params, "agentVnetSubnetID", master.agent_vnet_subnet_id.as_str());
            }
            if spec.orchestrator_profile.is_kubernetes() && !master.vnet_cidr.is_empty() {
                add_value(&mut params, "vnetCidr", master.vnet_cidr.as_str());
            }
        } else {
            add_value(&mut params, "masterSubnet", master.subnet.as_str());
            if spec.feature_flags.enable_ipv6_dual_stack {
                add_value(&mut params, "masterSubnetIPv6", DEFAULT_MASTER_SUBNET_IPV6);
            }
        }
        add_value(&mut params, "firstConsecutiveStaticIP", master.first_consecutive_static_ip.as_str());
        add_value(&mut params, "masterVMSize", master.vm_size.as_str());
        if master.has_availability_zones() {
            add_value(&mut params, "availabilityZones", master.availability_zones.clone());
        }
    }
    if let Some(hosted) = &spec.hosted_master_profile {
        add_value(&mut params, "masterSubnet", hosted.subnet.as_str());
    }

    if let Some(linux) = &spec.linux_profile {
        if let Some(key) = linux.ssh.public_keys.first() {
            add_value(&mut params, "sshRSAPublicKey", key.key_data.as_str());
        }
    }

    if spec.orchestrator_profile.is_kubernetes() {
        assign_kubernetes_parameters(spec, &mut params, generator_code);
    }

    for profile in &spec.agent_pool_profiles {
        let name = &profile.name;
        add_value(&mut params, format!("{}Count", name), profile.count);
        add_value(&mut params, format!("{}VMSize", name), profile.vm_size.as_str());
        if profile.has_availability_zones() {
            add_value(
                &mut params,
                format!("{}AvailabilityZones", name),
                profile.availability_zones.clone(),
            );
        }
        if profile.is_custom_vnet() {
            add_value(&mut params, format!("{}VnetSubnetID", name), profile.vnet_subnet_id.as_str());
        } else {
            add_value(&mut params, format!("{}Subnet", name), profile.subnet.as_str());
        }
        if !profile.is_windows() {
            let image = os_image_config(profile.distro);
            add_value(&mut params, format!("{}osImageOffer", name), image.offer);
            add_value(&mut params, format!("{}osImageSKU", name), image.sku);
            add_value(&mut params, format!("{}osImagePublisher", name), image.publisher);
            add_value(&mut params, format!("{}osImageVersion", name), image.version);
        }
    }

    if spec.has_windows() {
        let windows = spec.windows_profile.clone().unwrap_or_default();
        add_value(&mut params, "windowsAdminUsername", windows.admin_username.as_str());
        add_secret(&mut params, "windowsAdminPassword", &windows.admin_password, false);
        add_value(
            &mut params,
            "agentWindowsPublisher",
            or_default(&windows.windows_publisher, DEFAULT_WINDOWS_PUBLISHER),
        );
        add_value(
            &mut params,
            "agentWindowsOffer",
            or_default(&windows.windows_offer, DEFAULT_WINDOWS_OFFER),
        );
        add_value(&mut params, "agentWindowsSku", or_default(&windows.windows_sku, DEFAULT_WINDOWS_SKU));
        add_value(&mut params, "agentWindowsVersion", or_default(&windows.image_version, "latest"));
        add_value(&mut params, "windowsDockerVersion", DEFAULT_WINDOWS_DOCKER_VERSION);
    }

    for extension in &spec.extension_profiles {
        let key = format!("{}Parameters", extension.name);
        match &extension.extensions_parameters_keyvault_secret {
            Some(secret) => add_keyvault_secret_ref(&mut params, key, secret),
            None => add_value(&mut params, key, extension.extensions_parameters.as_str()),
        }
    }

    params
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

fn assign_kubernetes_parameters(spec: &ClusterSpec, params: &mut ParamsMap, generator_code: &str) {
    add_value(params, "generatorCode", generator_code);

    let orch = &spec.orchestrator_profile;
    let k8s = spec.kubernetes_config();
    let image_base = kubernetes_image_base(spec);
    let image = |key: &str| image_spec(spec, key).unwrap_or_default();

    if k8s.use_cloud_controller_manager {
        add_value(params, "kubernetesCcmImageSpec", image("ccm"));
    }
    let mut hyperkube = image("hyperkube");
    if spec.is_azure_stack_cloud() {
        hyperkube.push_str(AZURE_STACK_IMAGE_SUFFIX);
    }
    add_value(params, "kubernetesHyperkubeSpec", hyperkube);
    add_value(params, "kubeDNSServiceIP", k8s.dns_service_ip.as_str());
    add_value(params, "kubernetesAddonManagerSpec", image("addonmanager"));
    add_value(params, "kubernetesDNSSidecarSpec", image("k8s-dns-sidecar"));
    add_value(
        params,
        "kubernetesACIConnectorEnabled",
        is_addon_enabled(spec, ACI_CONNECTOR_ADDON),
    );
    if is_addon_enabled(spec, CLUSTER_AUTOSCALER_ADDON) {
        add_value(params, "kubernetesClusterAutoscalerAzureCloud", spec.cloud_name());
        add_value(params, "kubernetesClusterAutoscalerEnabled", true);
        add_value(
            params,
            "kubernetesClusterAutoscalerUseManagedIdentity",
            k8s.use_managed_identity.to_string(),
        );
    } else {
        add_value(params, "kubernetesClusterAutoscalerEnabled", false);
    }
    if orch.is_version_ge("1.12.0") {
        add_value(params, "kubernetesCoreDNSSpec", image("coredns"));
    } else {
        add_value(params, "kubernetesKubeDNSSpec", format!("{}{}", image_base, component_image(spec, "kube-dns").unwrap_or_default()));
        add_value(params, "kubernetesDNSMasqSpec", image("dnsmasq"));
    }
    add_value(
        params,
        "kubernetesPodInfraContainerSpec",
        format!(
            "{}{}",
            MCR_KUBERNETES_IMAGE_BASE,
            component_image(spec, "pause").unwrap_or_default()
        ),
    );
    add_value(params, "kubeClusterCidr", k8s.cluster_subnet.as_str());
    add_value(params, "dockerBridgeCidr", k8s.docker_bridge_subnet.as_str());
    add_value(params, "networkPolicy", k8s.network_policy.as_str());
    add_value(params, "networkPlugin", k8s.network_plugin.as_str());
    add_value(params, "containerRuntime", k8s.container_runtime.as_str());
    add_value(params, "etcdDiskSizeGB", k8s.etcd_disk_size_gb.as_str());

    if k8s.private_jumpbox_provision() {
        if let Some(jumpbox) = k8s.private_cluster.as_ref().and_then(|p| p.jumpbox_profile.as_ref()) {
            add_value(params, "jumpboxVMName", jumpbox.name.as_str());
            add_value(params, "jumpboxVMSize", jumpbox.vm_size.as_str());
            add_value(params, "jumpboxUsername", jumpbox.username.as_str());
            add_value(params, "jumpboxOSDiskSizeGB", jumpbox.os_disk_size_gb);
            add_value(params, "jumpboxPublicKey", jumpbox.public_key.as_str());
            let storage = match jumpbox.storage_profile {
                StorageProfile::StorageAccount => "StorageAccount",
                StorageProfile::Ephemeral => "Ephemeral",
                StorageProfile::ManagedDisks => "ManagedDisks",
            };
            add_value(params, "jumpboxStorageProfile", storage);
        }
    }

    add_value(params, "enableAggregatedAPIs", orch.is_version_ge("1.7.0"));

    if spec.has_windows() {
        add_value(params, "kubeServiceCidr", k8s.service_cidr.as_str());
        add_value(params, "kubeBinariesVersion", orch.orchestrator_version.as_str());
    }

    if !k8s.use_managed_identity || spec.is_hosted_master() {
        if let Some(sp) = &spec.service_principal_profile {
            add_value(params, "servicePrincipalClientId", sp.client_id.as_str());
            match &sp.keyvault_secret_ref {
                Some(secret) => add_keyvault_secret_ref(params, "servicePrincipalClientSecret", secret),
                None => add_value(params, "servicePrincipalClientSecret", sp.secret.as_str()),
            }
            if k8s.enable_encryption_with_external_kms
                && !k8s.use_managed_identity
                && !sp.object_id.is_empty()
            {
                add_value(params, "servicePrincipalObjectId", sp.object_id.as_str());
            }
        }
    }

    add_value(params, "orchestratorName", spec.orchestrator_name());

    if let Some(certs) = &spec.certificate_profile {
        add_secret(params, "apiServerCertificate", &certs.api_server_certificate, true);
        add_secret(params, "apiServerPrivateKey", &certs.api_server_private_key, true);
        add_secret(params, "caCertificate", &certs.ca_certificate, true);
        add_secret(params, "caPrivateKey", &certs.ca_private_key, true);
        add_secret(params, "clientCertificate", &certs.client_certificate, true);
        add_secret(params, "clientPrivateKey", &certs.client_private_key, true);
        add_secret(params, "kubeConfigCertificate", &certs.kube_config_certificate, true);
        add_secret(params, "kubeConfigPrivateKey", &certs.kube_config_private_key, true);
        if spec.master_profile.is_some() {
            add_secret(params, "etcdServerCertificate", &certs.etcd_server_certificate, true);
            add_secret(params, "etcdServerPrivateKey", &certs.etcd_server_private_key, true);
            add_secret(params, "etcdClientCertificate", &certs.etcd_client_certificate, true);
            add_secret(params, "etcdClientPrivateKey", &certs.etcd_client_private_key, true);
            for (i, cert) in certs.etcd_peer_certificates.iter().enumerate() {
                add_secret(params, format!("etcdPeerCertificate{}", i), cert, true);
            }
            for (i, key) in certs.etcd_peer_private_keys.iter().enumerate() {
                add_secret(params, format!("etcdPeerPrivateKey{}", i), key, true);
            }
        }
    }

    if let Some(hosted) = &spec.hosted_master_profile {
        if !hosted.fqdn.is_empty() {
            add_value(params, "kubernetesEndpoint", hosted.fqdn.as_str());
        }
    }

    if let Some(aad) = &spec.aad_profile {
        add_value(params, "aadTenantId", aad.tenant_id.as_str());
        if !aad.admin_group_id.is_empty() {
            add_value(params, "aadAdminGroupId", aad.admin_group_id.as_str());
        }
    }

    if is_addon_enabled(spec, APP_GATEWAY_INGRESS_ADDON) {
        let config = k8s.addon(APP_GATEWAY_INGRESS_ADDON).map(|a| &a.config);
        let get = |key: &str| config.and_then(|c| c.get(key)).cloned().unwrap_or_default();
        add_value(params, "appGwSku", get("appgw-sku"));
        add_value(params, "appGwSubnet", get("appgw-subnet"));
    }
}

/// The standalone parameters document handed to `az deployment`.
pub fn parameters_document(params: &ParamsMap) -> Value {
    json!({
        "$schema": DEPLOYMENT_PARAMETERS_SCHEMA,
        "contentVersion": CONTENT_VERSION,
        "parameters": params,
    })
}

fn is_secret_name(name: &str) -> bool {
    name.ends_with("PrivateKey") || name.ends_with("Secret") || name.ends_with("Password")
}

fn arm_type_of(name: &str, entry: &Value) -> &'static str {
    if entry.get("reference").is_some() || is_secret_name(name) {
        return "securestring";
    }
    match entry.get("value") {
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "int",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
        _ => "string",
    }
}

/// Parameters the template always declares, with the default applied when
/// the parameters document omits them.
fn optional_parameter_defaults(spec: &ClusterSpec) -> Vec<(String, &'static str, Value)> {
    let mut defaults = vec![
        ("nameSuffix".to_string(), "string", Value::from(spec.cluster_id())),
        ("clusterKeyVaultSku".to_string(), "string", Value::from("Standard")),
        ("servicePrincipalObjectId".to_string(), "string", Value::from("")),
        ("dnsServer".to_string(), "string", Value::from("")),
        ("vnetCidr".to_string(), "string", Value::from(DEFAULT_VNET_CIDR)),
        ("availabilityZones".to_string(), "array", json!([])),
        ("osImageName".to_string(), "string", Value::from("")),
        ("osImageResourceGroup".to_string(), "string", Value::from("")),
        ("kubernetesACIConnectorEnabled".to_string(), "bool", Value::from(false)),
        ("enableAggregatedAPIs".to_string(), "bool", Value::from(false)),
    ];
    if spec.feature_flags.enable_ipv6_dual_stack {
        defaults.push(("vnetCidrIPv6".to_string(), "string", Value::from(DEFAULT_VNET_CIDR_IPV6)));
        defaults.push(("masterSubnetIPv6".to_string(), "string", Value::from(DEFAULT_MASTER_SUBNET_IPV6)));
    }
    if spec.master_profile.as_ref().is_some_and(|m| !m.is_vmss()) {
        defaults.push(("masterOffset".to_string(), "int", Value::from(0)));
    }
    for profile in &spec.agent_pool_profiles {
        if profile.is_availability_sets() {
            defaults.push((format!("{}Offset", profile.name), "int", Value::from(0)));
        }
        if !profile.is_windows() {
            defaults.push((format!("{}osImageName", profile.name), "string", Value::from("")));
            defaults.push((format!("{}osImageResourceGroup", profile.name), "string", Value::from("")));
        }
    }
    defaults
}

/// Template `parameters` section declaring every supplied parameter plus the
/// optional ones the template references.
pub fn parameter_definitions(spec: &ClusterSpec, params: &ParamsMap) -> Map<String, Value> {
    let mut defs = Map::new();
    for (name, entry) in params {
        defs.insert(
            name.clone(),
            json!({
                "metadata": { "description": format!("The {} parameter.", name) },
                "type": arm_type_of(name, entry),
            }),
        );
    }
    for (name, param_type, default) in optional_parameter_defaults(spec) {
        defs.entry(name.clone()).or_insert_with(|| {
            json!({
                "defaultValue": default,
                "metadata": { "description": format!("The {} parameter.", name) },
                "type": param_type,
            })
        });
    }
    defs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AgentPoolProfile, CertificateProfile, HostedMasterProfile, MasterProfile, OsType,
        ServicePrincipalProfile, WindowsProfile,
    };

    const KV_PATH: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv/secrets/sp-secret";

    fn spec(version: &str) -> ClusterSpec {
        let mut spec = ClusterSpec {
            location: "westus2".to_string(),
            master_profile: Some(MasterProfile {
                dns_prefix: "mycluster".to_string(),
                ..Default::default()
            }),
            agent_pool_profiles: vec![AgentPoolProfile {
                name: "agentpool1".to_string(),
                count: 3,
                ..Default::default()
            }],
            ..Default::default()
        };
        spec.orchestrator_profile.orchestrator_version = version.to_string();
        spec
    }

    #[test]
    fn test_add_secret_plain_and_encoded() {
        let mut params = ParamsMap::new();
        add_secret(&mut params, "plain", "hunter2", false);
        add_secret(&mut params, "encoded", "hunter2", true);
        assert_eq!(params["plain"]["value"], "hunter2");
        assert_eq!(params["encoded"]["value"], "aHVudGVyMg==");
    }

    #[test]
    fn test_add_secret_keyvault_reference() {
        let mut params = ParamsMap::new();
        add_secret(&mut params, "latest", KV_PATH, true);
        add_secret(&mut params, "pinned", &format!("{}/abc123", KV_PATH), true);

        let latest = &params["latest"]["reference"];
        assert_eq!(
            latest["keyVault"]["id"],
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv"
        );
        assert_eq!(latest["secretName"], "sp-secret");
        assert!(latest.get("secretVersion").is_none());
        assert_eq!(params["pinned"]["reference"]["secretVersion"], "abc123");
        assert!(params["pinned"].get("value").is_none());
    }

    #[test]
    fn test_dns_spec_follows_version() {
        let new = get_parameters(&spec("1.15.7"), "aksengine", "v0.4.0");
        assert!(new.contains_key("kubernetesCoreDNSSpec"));
        assert!(!new.contains_key("kubernetesKubeDNSSpec"));

        let old = get_parameters(&spec("1.11.9"), "aksengine", "v0.4.0");
        assert!(!old.contains_key("kubernetesCoreDNSSpec"));
        assert_eq!(
            old["kubernetesKubeDNSSpec"]["value"],
            "k8s.gcr.io/k8s-dns-kube-dns-amd64:1.15.4"
        );
        assert!(old.contains_key("kubernetesDNSMasqSpec"));
    }

    #[test]
    fn test_general_parameters() {
        let params = get_parameters(&spec("1.15.7"), "aksengine", "v0.4.0");
        assert_eq!(params["aksEngineVersion"]["value"], "v0.4.0");
        assert_eq!(params["generatorCode"]["value"], "aksengine");
        assert_eq!(params["orchestratorName"]["value"], "k8s");
        assert_eq!(params["masterEndpointDNSNamePrefix"]["value"], "mycluster");
        assert_eq!(params["agentpool1Count"]["value"], 3);
        assert_eq!(params["agentpool1osImagePublisher"]["value"], "Canonical");
        assert_eq!(params["fqdnEndpointSuffix"]["value"], "cloudapp.azure.com");
        assert_eq!(params["kubernetesACIConnectorEnabled"]["value"], false);
    }

    #[test]
    fn test_service_principal_keyvault_secret() {
        let mut spec = spec("1.15.7");
        spec.service_principal_profile = Some(ServicePrincipalProfile {
            client_id: "client".to_string(),
            keyvault_secret_ref: Some(KeyvaultSecretRef {
                vault_id: "/vault".to_string(),
                secret_name: "sp".to_string(),
                version: String::new(),
            }),
            ..Default::default()
        });
        let params = get_parameters(&spec, "aksengine", "v0.4.0");
        assert_eq!(params["servicePrincipalClientId"]["value"], "client");
        assert_eq!(params["servicePrincipalClientSecret"]["reference"]["secretName"], "sp");

        spec.orchestrator_profile.kubernetes_config.use_managed_identity = true;
        let params = get_parameters(&spec, "aksengine", "v0.4.0");
        assert!(!params.contains_key("servicePrincipalClientId"));
    }

    #[test]
    fn test_certificates_are_encoded() {
        let mut spec = spec("1.15.7");
        spec.certificate_profile = Some(CertificateProfile {
            ca_certificate: "ca".to_string(),
            etcd_peer_certificates: vec!["p0".to_string(), "p1".to_string()],
            ..Default::default()
        });
        let params = get_parameters(&spec, "aksengine", "v0.4.0");
        assert_eq!(params["caCertificate"]["value"], "Y2E=");
        assert!(params.contains_key("etcdPeerCertificate1"));

        spec.master_profile = None;
        spec.hosted_master_profile = Some(HostedMasterProfile {
            fqdn: "api.example.com".to_string(),
            ..Default::default()
        });
        let params = get_parameters(&spec, "aksengine", "v0.4.0");
        assert!(!params.contains_key("etcdPeerCertificate0"));
        assert_eq!(params["kubernetesEndpoint"]["value"], "api.example.com");
        assert_eq!(params["orchestratorName"]["value"], "aks");
    }

    #[test]
    fn test_windows_defaults() {
        let mut spec = spec("1.15.7");
        spec.agent_pool_profiles[0].os_type = OsType::Windows;
        spec.windows_profile = Some(WindowsProfile {
            admin_username: "azureuser".to_string(),
            admin_password: "P@ssw0rd".to_string(),
            ..Default::default()
        });
        let params = get_parameters(&spec, "aksengine", "v0.4.0");
        assert_eq!(params["agentWindowsSku"]["value"], DEFAULT_WINDOWS_SKU);
        assert_eq!(params["windowsAdminPassword"]["value"], "P@ssw0rd");
        assert_eq!(params["kubeBinariesVersion"]["value"], "1.15.7");
        assert!(!params.contains_key("agentpool1osImageOffer"));
    }

    #[test]
    fn test_parameter_definitions() {
        let spec = spec("1.15.7");
        let mut params = get_parameters(&spec, "aksengine", "v0.4.0");
        add_secret(&mut params, "servicePrincipalClientSecret", "secret", false);
        let defs = parameter_definitions(&spec, &params);
        assert_eq!(defs["agentpool1Count"]["type"], "int");
        assert_eq!(defs["kubernetesClusterAutoscalerEnabled"]["type"], "bool");
        assert_eq!(defs["servicePrincipalClientSecret"]["type"], "securestring");
        assert_eq!(defs["nameSuffix"]["defaultValue"], spec.cluster_id());
        assert_eq!(defs["masterOffset"]["defaultValue"], 0);
        // supplied values never get a default
        assert!(defs["location"].get("defaultValue").is_none());
    }
}
