//! `variables` section of the deployment template.
//!
//! Most values are ARM expressions evaluated at deployment time. The few
//! literal values (master IPs, VM name prefixes, api versions) are decided
//! here from the cluster spec.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::api::addons::{APP_GATEWAY_INGRESS_ADDON, CLUSTER_AUTOSCALER_ADDON};
use crate::api::{
    AgentPoolProfile, ClusterSpec, LoadBalancerSku, MasterProfile, StorageProfile, is_addon_enabled,
};
use crate::engine::armtype::{splice_parameter, splice_variable};
use crate::engine::images::image_spec;
use crate::engine::kubeconfig::generate_kubeconfig;
use crate::engine::network::{INTERNAL_LB_STATIC_IP_OFFSET, generate_consecutive_ips};
use crate::error::GeneratorError;

pub type VariablesMap = Map<String, Value>;

pub const API_VERSION_AUTHORIZATION_USER: &str = "2018-09-01-preview";
pub const API_VERSION_AUTHORIZATION_SYSTEM: &str = "2018-01-01-preview";
pub const API_VERSION_COMPUTE: &str = "2019-07-01";
pub const API_VERSION_DEPLOYMENTS: &str = "2018-06-01";
pub const API_VERSION_KEY_VAULT: &str = "2018-02-14";
pub const API_VERSION_MANAGED_IDENTITY: &str = "2018-11-30";
pub const API_VERSION_NETWORK: &str = "2018-08-01";
pub const API_VERSION_STORAGE: &str = "2018-07-01";
pub const API_VERSION_COSMOS: &str = "2015-04-08";

const MAX_VMS_PER_POOL: u32 = 100;
const MAX_VMS_PER_STORAGE_ACCOUNT: u32 = 20;
const DATA_STORAGE_ACCOUNT_PREFIX_SEED: u32 = 97;
const MASTER_ETCD_SERVER_PORT: u16 = 2380;
const MASTER_ETCD_CLIENT_PORT: u16 = 2379;
const SSH_NAT_PORTS: [u16; 5] = [22, 2201, 2202, 2203, 2204];

const STORAGE_ACCOUNT_PREFIXES: [&str; 36] = [
    "0", "6", "c", "i", "o", "u", "1", "7", "d", "j", "p", "v", "2", "8", "e", "k", "q", "w", "3",
    "9", "f", "l", "r", "x", "4", "a", "g", "m", "s", "y", "5", "b", "h", "n", "t", "z",
];

/// Storage tier per VM size, looked up by the storage account and disk
/// builders.
const VM_SIZES: &[(&str, &str)] = &[
    ("Standard_A2_v2", "Standard_LRS"),
    ("Standard_A4_v2", "Standard_LRS"),
    ("Standard_B2ms", "Premium_LRS"),
    ("Standard_B4ms", "Premium_LRS"),
    ("Standard_D2_v2", "Standard_LRS"),
    ("Standard_D2_v3", "Standard_LRS"),
    ("Standard_D2s_v3", "Premium_LRS"),
    ("Standard_D4_v2", "Standard_LRS"),
    ("Standard_D4_v3", "Standard_LRS"),
    ("Standard_D4s_v3", "Premium_LRS"),
    ("Standard_D8_v3", "Standard_LRS"),
    ("Standard_D8s_v3", "Premium_LRS"),
    ("Standard_DS2_v2", "Premium_LRS"),
    ("Standard_DS3_v2", "Premium_LRS"),
    ("Standard_DS4_v2", "Premium_LRS"),
    ("Standard_E4s_v3", "Premium_LRS"),
    ("Standard_F4s_v2", "Premium_LRS"),
    ("Standard_F8s_v2", "Premium_LRS"),
    ("Standard_NC6", "Standard_LRS"),
    ("Standard_NC6s_v3", "Premium_LRS"),
];

const WINDOWS_CUSTOM_SCRIPT_SUFFIX: &str = " $inputFile = '%SYSTEMDRIVE%\\AzureData\\CustomData.bin' ; $outputFile = '%SYSTEMDRIVE%\\AzureData\\CustomDataSetupScript.ps1' ; Copy-Item $inputFile $outputFile ; Invoke-Expression('{0} {1}' -f $outputFile, $arguments) ; ";

const ROLE_DEFINITION_PREFIX: &str = "[concat('/subscriptions/', subscription().subscriptionId, '/providers/Microsoft.Authorization/roleDefinitions/', ";

fn set(vars: &mut VariablesMap, key: impl Into<String>, value: impl Into<Value>) {
    vars.insert(key.into(), value.into());
}

fn role_definition_id(role: &str) -> String {
    format!("{}'{}')]", ROLE_DEFINITION_PREFIX, role)
}

pub fn vm_sizes_map() -> Value {
    let sizes: Map<String, Value> = VM_SIZES
        .iter()
        .map(|(size, tier)| (size.to_string(), json!({ "storageAccountType": tier })))
        .collect();
    Value::Object(sizes)
}

/// Builds the template variables for a cluster.
pub fn get_kubernetes_variables(spec: &ClusterSpec) -> Result<VariablesMap, GeneratorError> {
    let mut vars = VariablesMap::new();

    for (index, profile) in spec.agent_pool_profiles.iter().enumerate() {
        set(&mut vars, format!("{}Index", profile.name), index);
        add_agent_variables(&mut vars, spec, profile, index);
        if profile.is_storage_account() {
            if profile.has_disks() {
                set(
                    &mut vars,
                    format!("{}DataAccountName", profile.name),
                    format!("[concat(variables('storageAccountBaseName'), 'data{}')]", index),
                );
            }
            set(
                &mut vars,
                format!("{}AccountName", profile.name),
                format!("[concat(variables('storageAccountBaseName'), 'agnt{}')]", index),
            );
        }
    }

    add_master_variables(&mut vars, spec)?;

    set(&mut vars, "enableTelemetry", spec.feature_flags.enable_telemetry);
    set(&mut vars, "applicationInsightsKey", "");
    set(&mut vars, "windowsEnableCSIProxy", false);
    set(&mut vars, "windowsCSIProxyURL", "");

    Ok(vars)
}

fn add_agent_variables(vars: &mut VariablesMap, spec: &ClusterSpec, profile: &AgentPoolProfile, index: usize) {
    let name = &profile.name;

    if profile.is_storage_account() {
        set(
            vars,
            format!("{}StorageAccountOffset", name),
            format!("[mul(variables('maxStorageAccountsPerAgent'),variables('{}Index'))]", name),
        );
        set(
            vars,
            format!("{}StorageAccountsCount", name),
            format!(
                "[add(div(variables('{0}Count'), variables('maxVMsPerStorageAccount')), mod(add(mod(variables('{0}Count'), variables('maxVMsPerStorageAccount')),2), add(mod(variables('{0}Count'), variables('maxVMsPerStorageAccount')),1)))]",
                name
            ),
        );
    }

    set(vars, format!("{}Count", name), format!("[parameters('{}Count')]", name));
    set(vars, format!("{}VMNamePrefix", name), spec.agent_vm_prefix(profile, index));

    if profile.is_windows() {
        set(vars, "winResourceNamePrefix", "[substring(parameters('nameSuffix'), 0, 5)]");
    }

    if profile.is_availability_sets() {
        set(vars, format!("{}Offset", name), format!("[parameters('{}Offset')]", name));
        set(
            vars,
            format!("{}AvailabilitySet", name),
            format!("[concat('{}-availabilitySet-', parameters('nameSuffix'))]", name),
        );
    }
    set(vars, format!("{}VMSize", name), format!("[parameters('{}VMSize')]", name));

    if profile.is_custom_vnet() {
        set(vars, format!("{}VnetSubnetID", name), format!("[parameters('{}VnetSubnetID')]", name));
        set(vars, format!("{}SubnetName", name), format!("[parameters('{}VnetSubnetID')]", name));
        set(
            vars,
            format!("{}VnetParts", name),
            format!("[split(parameters('{}VnetSubnetID'),'/subnets/')]", name),
        );
    } else {
        set(vars, format!("{}VnetSubnetID", name), "[variables('vnetSubnetID')]");
        set(vars, format!("{}SubnetName", name), "[variables('subnetName')]");
    }
    set(
        vars,
        format!("{}SubnetResourceGroup", name),
        format!("[split(variables('{}VnetSubnetID'), '/')[4]]", name),
    );
    set(
        vars,
        format!("{}Vnet", name),
        format!("[split(variables('{}VnetSubnetID'), '/')[8]]", name),
    );

    // Windows pools take their image from the cluster wide Windows parameters
    if !profile.is_windows() {
        for field in [
            "osImageOffer",
            "osImageSKU",
            "osImagePublisher",
            "osImageVersion",
            "osImageName",
            "osImageResourceGroup",
        ] {
            set(
                vars,
                format!("{}{}", name, field),
                format!("[parameters('{}{}')]", name, field),
            );
        }
    }
}

fn has_storage_account_disks(spec: &ClusterSpec) -> bool {
    spec.master_profile.as_ref().is_some_and(|m| m.is_storage_account())
        || spec.agent_pool_profiles.iter().any(|p| p.is_storage_account())
}

/// Space separated `KEY=value` pairs handed to every Linux provisioning
/// script, as the literal body of a `concat('...')`.
fn provision_script_parameters_common(spec: &ClusterSpec) -> String {
    let k8s = spec.kubernetes_config();
    let admin_user = spec
        .linux_profile
        .as_ref()
        .map(|l| l.admin_username.clone())
        .unwrap_or_default();
    let client_secret = format!(
        "{}{}{}",
        splice_variable("singleQuote"),
        splice_variable("servicePrincipalClientSecret"),
        splice_variable("singleQuote")
    );

    let params: BTreeMap<&str, String> = BTreeMap::from([
        ("ADMINUSER", admin_user),
        ("APISERVER_PUBLIC_KEY", splice_parameter("apiServerCertificate")),
        ("CLUSTER_KEYVAULT_NAME", splice_variable("clusterKeyVaultName")),
        ("CONTAINER_RUNTIME", k8s.container_runtime.clone()),
        ("EXCLUDE_MASTER_FROM_STANDARD_LB", k8s.exclude_master_from_standard_lb.to_string()),
        ("HYPERKUBE_URL", image_spec(spec, "hyperkube").unwrap_or_default()),
        (
            "IS_IPV6_DUALSTACK_FEATURE_ENABLED",
            spec.feature_flags.enable_ipv6_dual_stack.to_string(),
        ),
        ("KUBELET_PRIVATE_KEY", splice_parameter("clientPrivateKey")),
        (
            "KUBERNETES_VERSION",
            spec.orchestrator_profile.orchestrator_version.clone(),
        ),
        ("LOAD_BALANCER_SKU", k8s.load_balancer_sku.as_str().to_string()),
        ("LOCATION", splice_variable("location")),
        (
            "MAXIMUM_LOADBALANCER_RULE_COUNT",
            k8s.maximum_load_balancer_rule_count.to_string(),
        ),
        ("NETWORK_PLUGIN", k8s.network_plugin.clone()),
        ("NETWORK_POLICY", k8s.network_policy.clone()),
        ("NETWORK_SECURITY_GROUP", splice_variable("nsgName")),
        ("PRIMARY_AVAILABILITY_SET", splice_variable("primaryAvailabilitySetName")),
        ("PRIMARY_SCALE_SET", splice_variable("primaryScaleSetName")),
        ("RESOURCE_GROUP", splice_variable("resourceGroup")),
        ("ROUTE_TABLE", splice_variable("routeTableName")),
        ("SERVICE_PRINCIPAL_CLIENT_ID", splice_variable("servicePrincipalClientId")),
        ("SERVICE_PRINCIPAL_CLIENT_SECRET", client_secret),
        ("SUBNET", splice_variable("subnetName")),
        ("SUBSCRIPTION_ID", splice_variable("subscriptionId")),
        ("TENANT_ID", splice_variable("tenantID")),
        ("USE_INSTANCE_METADATA", "true".to_string()),
        ("USE_MANAGED_IDENTITY_EXTENSION", k8s.use_managed_identity.to_string()),
        ("VIRTUAL_NETWORK", splice_variable("virtualNetworkName")),
        (
            "VIRTUAL_NETWORK_RESOURCE_GROUP",
            splice_variable("virtualNetworkResourceGroupName"),
        ),
        ("VM_TYPE", spec.vm_type().to_string()),
    ]);

    let body = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ");
    format!("[concat('{}')]", body)
}

fn provision_script_parameters_master(spec: &ClusterSpec, master: &MasterProfile) -> String {
    let cosmos_uri = if master.cosmos_etcd {
        format!("{}k8s.etcd.cosmosdb.azure.com", master.dns_prefix)
    } else {
        String::new()
    };
    let node = if master.is_vmss() {
        String::new()
    } else {
        " MASTER_VM_NAME=',variables('masterVMNames')[variables('masterOffset')],' ETCD_PEER_URL=',variables('masterEtcdPeerURLs')[variables('masterOffset')],' ETCD_CLIENT_URL=',variables('masterEtcdClientURLs')[variables('masterOffset')],'".to_string()
    };
    format!(
        "[concat('COSMOS_URI={cosmos}{node} MASTER_NODE=true NO_OUTBOUND={no_outbound} CLUSTER_AUTOSCALER_ADDON={autoscaler} ACI_CONNECTOR_ADDON=',parameters('kubernetesACIConnectorEnabled'),' APISERVER_PRIVATE_KEY=',parameters('apiServerPrivateKey'),' CA_CERTIFICATE=',parameters('caCertificate'),' CA_PRIVATE_KEY=',parameters('caPrivateKey'),' MASTER_FQDN=',variables('masterFqdnPrefix'),' KUBECONFIG_CERTIFICATE=',parameters('kubeConfigCertificate'),' KUBECONFIG_KEY=',parameters('kubeConfigPrivateKey'),' ETCD_SERVER_CERTIFICATE=',parameters('etcdServerCertificate'),' ETCD_CLIENT_CERTIFICATE=',parameters('etcdClientCertificate'),' ETCD_SERVER_PRIVATE_KEY=',parameters('etcdServerPrivateKey'),' ETCD_CLIENT_PRIVATE_KEY=',parameters('etcdClientPrivateKey'),' ETCD_PEER_CERTIFICATES=',string(variables('etcdPeerCertificates')),' ETCD_PEER_PRIVATE_KEYS=',string(variables('etcdPeerPrivateKeys')),' ENABLE_AGGREGATED_APIS=',string(parameters('enableAggregatedAPIs')),' KUBECONFIG_SERVER=',variables('kubeconfigServer'))]",
        cosmos = cosmos_uri,
        node = node,
        no_outbound = spec.feature_flags.block_outbound_internet,
        autoscaler = is_addon_enabled(spec, CLUSTER_AUTOSCALER_ADDON),
    )
}

fn add_master_variables(vars: &mut VariablesMap, spec: &ClusterSpec) -> Result<(), GeneratorError> {
    let k8s = spec.kubernetes_config();
    let orch = &spec.orchestrator_profile;
    let hosted = spec.is_hosted_master();
    let storage_account_disks = has_storage_account_disks(spec);
    let has_agent_pool = !spec.agent_pool_profiles.is_empty();

    let user_assigned_id_reference = if k8s.should_create_user_assigned_identity() {
        "[resourceId('Microsoft.ManagedIdentity/userAssignedIdentities/', variables('userAssignedID'))]"
    } else {
        "[variables('userAssignedID')]"
    };

    set(vars, "maxVMsPerPool", MAX_VMS_PER_POOL);
    set(vars, "useManagedIdentityExtension", k8s.use_managed_identity.to_string());
    set(vars, "userAssignedIDReference", user_assigned_id_reference);
    set(vars, "useInstanceMetadata", "true");
    set(vars, "loadBalancerSku", k8s.load_balancer_sku.as_str());
    set(vars, "excludeMasterFromStandardLB", k8s.exclude_master_from_standard_lb.to_string());
    set(vars, "maximumLoadBalancerRuleCount", k8s.maximum_load_balancer_rule_count);
    set(vars, "masterFqdnPrefix", spec.dns_prefix());

    set(vars, "apiVersionCompute", API_VERSION_COMPUTE);
    set(vars, "apiVersionDeployments", API_VERSION_DEPLOYMENTS);
    set(vars, "apiVersionStorage", API_VERSION_STORAGE);
    set(vars, "apiVersionKeyVault", API_VERSION_KEY_VAULT);
    set(vars, "apiVersionNetwork", API_VERSION_NETWORK);
    set(vars, "apiVersionManagedIdentity", API_VERSION_MANAGED_IDENTITY);
    set(vars, "apiVersionAuthorizationUser", API_VERSION_AUTHORIZATION_USER);
    set(vars, "apiVersionAuthorizationSystem", API_VERSION_AUTHORIZATION_SYSTEM);

    set(vars, "locations", json!(["[resourceGroup().location]", "[parameters('location')]"]));
    set(
        vars,
        "location",
        "[variables('locations')[mod(add(2,length(parameters('location'))),add(1,length(parameters('location'))))]]",
    );
    set(vars, "masterAvailabilitySet", "[concat('master-availabilityset-', parameters('nameSuffix'))]");
    set(vars, "resourceGroup", "[resourceGroup().name]");
    set(
        vars,
        "truncatedResourceGroup",
        "[take(replace(replace(resourceGroup().name, '(', '-'), ')', '-'), 63)]",
    );
    set(
        vars,
        "labelResourceGroup",
        "[if(or(or(endsWith(variables('truncatedResourceGroup'), '-'), endsWith(variables('truncatedResourceGroup'), '_')), endsWith(variables('truncatedResourceGroup'), '.')), concat(take(variables('truncatedResourceGroup'), 62), 'z'), variables('truncatedResourceGroup'))]",
    );
    set(vars, "routeTableID", "[resourceId('Microsoft.Network/routeTables', variables('routeTableName'))]");
    set(vars, "sshNatPorts", json!(SSH_NAT_PORTS));
    set(vars, "sshKeyPath", "[concat('/home/',parameters('linuxAdminUsername'),'/.ssh/authorized_keys')]");
    set(vars, "provisionScriptParametersCommon", provision_script_parameters_common(spec));
    set(
        vars,
        "orchestratorNameVersionTag",
        format!(
            "{}:{}",
            orch.orchestrator_type.as_str(),
            orch.orchestrator_version
        ),
    );
    set(vars, "vnetNameResourceSegmentIndex", 8);
    set(vars, "vnetResourceGroupNameResourceSegmentIndex", 4);

    if let Some(master) = spec.master_profile.as_ref().filter(|m| m.cosmos_etcd) {
        let client_cert = spec
            .certificate_profile
            .as_ref()
            .map(|c| c.etcd_client_certificate.as_str())
            .unwrap_or_default();
        set(vars, "cosmosAccountName", format!("{}k8s", master.dns_prefix));
        set(vars, "cosmosDBCertb64", STANDARD.encode(client_cert));
        set(vars, "apiVersionCosmos", API_VERSION_COSMOS);
    }

    if spec.is_azure_stack_cloud() {
        set(vars, "apiVersionCompute", "2017-03-30");
        set(vars, "apiVersionStorage", "2017-10-01");
        set(vars, "apiVersionNetwork", "2017-10-01");
        set(vars, "apiVersionKeyVault", "2016-10-01");
    }

    if let Some(master) = &spec.master_profile {
        set(
            vars,
            "provisionScriptParametersMaster",
            provision_script_parameters_master(spec, master),
        );
    }

    set(vars, "userAssignedID", if k8s.user_assigned_id_enabled() { k8s.user_assigned_id.as_str() } else { "" });

    if let Some(master) = &spec.master_profile {
        let count = master.count as usize;
        set(vars, "etcdPeerPrivateKeys", peer_secret_expressions("etcdPeerPrivateKey", count));
        set(vars, "etcdPeerCertificates", peer_secret_expressions("etcdPeerCertificate", count));
        let cert_paths = |ext: &str| -> Vec<String> {
            (0..5)
                .map(|i| format!("/etc/kubernetes/certs/etcdpeer{}.{}", i, ext))
                .collect()
        };
        set(vars, "etcdPeerCertFilepath", cert_paths("crt"));
        set(vars, "etcdPeerKeyFilepath", cert_paths("key"));
        set(vars, "etcdCaFilepath", "/etc/kubernetes/certs/ca.crt");
        set(vars, "etcdClientCertFilepath", "/etc/kubernetes/certs/etcdclient.crt");
        set(vars, "etcdClientKeyFilepath", "/etc/kubernetes/certs/etcdclient.key");
        set(vars, "etcdServerCertFilepath", "/etc/kubernetes/certs/etcdserver.crt");
        set(vars, "etcdServerKeyFilepath", "/etc/kubernetes/certs/etcdserver.key");
    }

    if k8s.use_managed_identity && !hosted {
        set(vars, "servicePrincipalClientId", "msi");
        set(vars, "servicePrincipalClientSecret", "msi");
    } else {
        set(vars, "servicePrincipalClientId", "[parameters('servicePrincipalClientId')]");
        set(vars, "servicePrincipalClientSecret", "[parameters('servicePrincipalClientSecret')]");
    }

    match &spec.master_profile {
        Some(master) => add_master_network_variables(vars, master),
        None => add_hosted_network_variables(vars, spec),
    }

    set(vars, "nsgID", "[resourceId('Microsoft.Network/networkSecurityGroups',variables('nsgName'))]");
    set(vars, "subnetName", spec.subnet_name());

    if storage_account_disks {
        set(vars, "maxVMsPerStorageAccount", MAX_VMS_PER_STORAGE_ACCOUNT);
        set(
            vars,
            "maxStorageAccountsPerAgent",
            "[div(variables('maxVMsPerPool'),variables('maxVMsPerStorageAccount'))]",
        );
        set(vars, "dataStorageAccountPrefixSeed", DATA_STORAGE_ACCOUNT_PREFIX_SEED);
        set(vars, "storageAccountPrefixes", json!(&STORAGE_ACCOUNT_PREFIXES[..]));
        set(vars, "storageAccountPrefixesCount", "[length(variables('storageAccountPrefixes'))]");
        set(vars, "vmsPerStorageAccount", MAX_VMS_PER_STORAGE_ACCOUNT);
        set(
            vars,
            "storageAccountBaseName",
            "[uniqueString(concat(variables('masterFqdnPrefix'),variables('location')))]",
        );
        set(vars, "vmSizesMap", vm_sizes_map());
    } else {
        set(vars, "storageAccountPrefixes", json!([]));
        set(vars, "storageAccountBaseName", "");
    }

    set(vars, "vmType", spec.vm_type());

    let primary_availability_set = match spec.agent_pool_profiles.first() {
        Some(first) if !spec.agent_pool_profiles.iter().any(|p| p.is_vmss()) => format!(
            "[concat('{}-availabilitySet-',parameters('nameSuffix'))]",
            first.name
        ),
        _ => String::new(),
    };
    set(vars, "primaryAvailabilitySetName", primary_availability_set);
    set(vars, "primaryScaleSetName", spec.primary_scale_set_name());

    if hosted {
        set(vars, "kubernetesAPIServerIP", "[parameters('kubernetesEndpoint')]");
        set(
            vars,
            "agentNamePrefix",
            "[concat(parameters('orchestratorName'), '-agentpool-', parameters('nameSuffix'), '-')]",
        );
    } else if let Some(master) = &spec.master_profile {
        if k8s.load_balancer_sku == LoadBalancerSku::Standard && has_agent_pool {
            set(vars, "agentLbID", "[resourceId('Microsoft.Network/loadBalancers',variables('agentLbName'))]");
            set(vars, "agentLbName", "[parameters('masterEndpointDNSNamePrefix')]");
            set(vars, "agentLbBackendPoolName", "[parameters('masterEndpointDNSNamePrefix')]");
            set(vars, "agentPublicIPAddressName", "[concat(parameters('orchestratorName'), '-agent-ip-outbound')]");
            set(
                vars,
                "agentLbIPConfigID",
                "[concat(variables('agentLbID'),'/frontendIPConfigurations/', variables('agentLbIPConfigName'))]",
            );
            set(vars, "agentLbIPConfigName", "[concat(parameters('orchestratorName'), '-agent-outbound')]");
        }
        // a private cluster behind a basic LB reaches out through its NICs or
        // the internal LB and has no public master LB
        if !(spec.is_private_cluster() && k8s.load_balancer_sku == LoadBalancerSku::Basic) {
            set(
                vars,
                "masterPublicIPAddressName",
                "[concat(parameters('orchestratorName'), '-master-ip-', variables('masterFqdnPrefix'), '-', parameters('nameSuffix'))]",
            );
            set(vars, "masterLbID", "[resourceId('Microsoft.Network/loadBalancers',variables('masterLbName'))]");
            set(
                vars,
                "masterLbIPConfigID",
                "[concat(variables('masterLbID'),'/frontendIPConfigurations/', variables('masterLbIPConfigName'))]",
            );
            set(
                vars,
                "masterLbIPConfigName",
                "[concat(parameters('orchestratorName'), '-master-lbFrontEnd-', parameters('nameSuffix'))]",
            );
            set(
                vars,
                "masterLbName",
                "[concat(parameters('orchestratorName'), '-master-lb-', parameters('nameSuffix'))]",
            );
        }
        if spec.is_private_cluster() {
            set(vars, "kubeconfigServer", "[concat('https://', variables('kubernetesAPIServerIP'), ':443')]");
            if k8s.private_jumpbox_provision() {
                add_jumpbox_variables(vars, spec, storage_account_disks)?;
            }
        } else {
            set(
                vars,
                "kubeconfigServer",
                "[concat('https://', variables('masterFqdnPrefix'), '.', variables('location'), '.', parameters('fqdnEndpointSuffix'))]",
            );
        }
        add_master_address_variables(vars, spec, master)?;
    }

    set(vars, "subscriptionId", "[subscription().subscriptionId]");
    set(vars, "contributorRoleDefinitionId", role_definition_id("b24988ac-6180-42a0-ab88-20f7382dd24c"));
    set(vars, "readerRoleDefinitionId", role_definition_id("acdd72a7-3385-48ef-bd42-f606fba81ae7"));
    set(
        vars,
        "networkContributorRoleDefinitionId",
        role_definition_id("4d97b98b-1d4f-4787-a291-c67834d212e7"),
    );
    set(vars, "scope", "[resourceGroup().id]");
    set(vars, "tenantId", "[subscription().tenantId]");
    set(vars, "singleQuote", "'");

    if spec.has_windows() {
        set(vars, "windowsCustomScriptSuffix", WINDOWS_CUSTOM_SCRIPT_SUFFIX);
    }

    let key_vault_name = if k8s.enable_encryption_with_external_kms {
        "[take(concat('kv', tolower(uniqueString(concat(variables('masterFqdnPrefix'),variables('location'),parameters('nameSuffix'))))), 22)]"
    } else {
        ""
    };
    set(vars, "clusterKeyVaultName", key_vault_name);

    if is_addon_enabled(spec, APP_GATEWAY_INGRESS_ADDON) {
        set(
            vars,
            "managedIdentityOperatorRoleDefinitionId",
            role_definition_id("f1a07417-d97a-45cb-824c-7a7467783830"),
        );
        set(vars, "appGwName", "[concat(parameters('orchestratorName'), '-appgw-', parameters('nameSuffix'))]");
        set(vars, "appGwSubnetName", "appgw-subnet");
        set(
            vars,
            "appGwPublicIPAddressName",
            "[concat(parameters('orchestratorName'), '-appgw-ip-', parameters('nameSuffix'))]",
        );
        set(
            vars,
            "appGwICIdentityName",
            "[concat(parameters('orchestratorName'), '-appgw-ic-identity-', parameters('nameSuffix'))]",
        );
        set(vars, "appGwId", "[resourceId('Microsoft.Network/applicationGateways',variables('appGwName'))]");
        set(
            vars,
            "appGwICIdentityId",
            "[resourceId('Microsoft.ManagedIdentity/userAssignedIdentities', variables('appGwICIdentityName'))]",
        );
    }

    Ok(())
}

fn peer_secret_expressions(parameter: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("[parameters('{}{}')]", parameter, i))
        .collect()
}

fn add_master_network_variables(vars: &mut VariablesMap, master: &MasterProfile) {
    set(vars, "masterCount", master.count);
    if master.is_vmss() {
        set(vars, "masterOffset", "");
        set(vars, "masterIpAddressCount", master.ip_address_count);
    } else {
        set(vars, "masterOffset", "[parameters('masterOffset')]");
    }

    if master.is_custom_vnet() {
        if master.is_vmss() {
            set(vars, "vnetSubnetID", "[parameters('agentVnetSubnetID')]");
            set(vars, "vnetSubnetIDMaster", "[parameters('masterVnetSubnetID')]");
        } else {
            set(vars, "vnetSubnetID", "[parameters('masterVnetSubnetID')]");
        }
        set(
            vars,
            "virtualNetworkName",
            "[split(parameters('masterVnetSubnetID'), '/')[variables('vnetNameResourceSegmentIndex')]]",
        );
        set(
            vars,
            "virtualNetworkResourceGroupName",
            "[split(parameters('masterVnetSubnetID'), '/')[variables('vnetResourceGroupNameResourceSegmentIndex')]]",
        );
    } else {
        if master.is_vmss() {
            set(vars, "vnetSubnetID", "[concat(variables('vnetID'),'/subnets/subnetagent')]");
            set(vars, "vnetSubnetIDMaster", "[concat(variables('vnetID'),'/subnets/subnetmaster')]");
        } else {
            set(vars, "vnetSubnetID", "[concat(variables('vnetID'),'/subnets/',variables('subnetName'))]");
        }
        set(
            vars,
            "virtualNetworkName",
            "[concat(parameters('orchestratorName'), '-vnet-', parameters('nameSuffix'))]",
        );
        set(vars, "vnetID", "[resourceId('Microsoft.Network/virtualNetworks',variables('virtualNetworkName'))]");
        set(vars, "virtualNetworkResourceGroupName", "''");
    }
    set(vars, "routeTableName", "[concat(variables('masterVMNamePrefix'),'routetable')]");
    if master.is_storage_account() {
        set(
            vars,
            "masterStorageAccountName",
            "[concat(variables('storageAccountBaseName'), 'mstr0')]",
        );
    }
    set(vars, "nsgName", "[concat(variables('masterVMNamePrefix'), 'nsg')]");
}

fn add_hosted_network_variables(vars: &mut VariablesMap, spec: &ClusterSpec) {
    let custom_vnet = spec.agent_pool_profiles.iter().any(|p| p.is_custom_vnet());
    if custom_vnet {
        if let Some(first) = spec.agent_pool_profiles.first() {
            set(vars, "vnetSubnetID", format!("[parameters('{}VnetSubnetID')]", first.name));
        }
        set(
            vars,
            "virtualNetworkName",
            "[split(variables('vnetSubnetID'), '/')[variables('vnetNameResourceSegmentIndex')]]",
        );
        set(
            vars,
            "virtualNetworkResourceGroupName",
            "[split(variables('vnetSubnetID'), '/')[variables('vnetResourceGroupNameResourceSegmentIndex')]]",
        );
    } else {
        set(vars, "vnetID", "[resourceId('Microsoft.Network/virtualNetworks',variables('virtualNetworkName'))]");
        set(vars, "vnetSubnetID", "[concat(variables('vnetID'),'/subnets/',variables('subnetName'))]");
        set(
            vars,
            "virtualNetworkName",
            "[concat(parameters('orchestratorName'), '-vnet-', parameters('nameSuffix'))]",
        );
        set(vars, "virtualNetworkResourceGroupName", "");
    }
    set(vars, "nsgName", "[concat(variables('agentNamePrefix'), 'nsg')]");
    set(vars, "routeTableName", "[concat(variables('agentNamePrefix'), 'routetable')]");
}

fn add_jumpbox_variables(
    vars: &mut VariablesMap,
    spec: &ClusterSpec,
    storage_account_disks: bool,
) -> Result<(), GeneratorError> {
    set(vars, "jumpboxOSDiskName", "[concat(parameters('jumpboxVMName'), '-osdisk')]");
    set(vars, "jumpboxPublicIpAddressName", "[concat(parameters('jumpboxVMName'), '-ip')]");
    set(vars, "jumpboxNetworkInterfaceName", "[concat(parameters('jumpboxVMName'), '-nic')]");
    set(vars, "jumpboxNetworkSecurityGroupName", "[concat(parameters('jumpboxVMName'), '-nsg')]");
    set(vars, "kubeconfig", generate_kubeconfig(spec)?);

    let managed_disks = spec
        .kubernetes_config()
        .private_cluster
        .as_ref()
        .and_then(|p| p.jumpbox_profile.as_ref())
        .is_some_and(|j| j.storage_profile == StorageProfile::ManagedDisks);
    if !managed_disks {
        set(
            vars,
            "jumpboxStorageAccountName",
            "[concat(variables('storageAccountBaseName'), 'jb')]",
        );
    }
    if !storage_account_disks {
        set(vars, "vmSizesMap", vm_sizes_map());
    }
    Ok(())
}

/// Addressing of the masters: internal LB, api server IP, etcd endpoints.
fn add_master_address_variables(
    vars: &mut VariablesMap,
    spec: &ClusterSpec,
    master: &MasterProfile,
) -> Result<(), GeneratorError> {
    if master.has_multiple_nodes() {
        set(
            vars,
            "masterInternalLbName",
            "[concat(parameters('orchestratorName'), '-master-internal-lb-', parameters('nameSuffix'))]",
        );
        set(
            vars,
            "masterInternalLbID",
            "[resourceId('Microsoft.Network/loadBalancers',variables('masterInternalLbName'))]",
        );
        set(
            vars,
            "masterInternalLbIPConfigName",
            "[concat(parameters('orchestratorName'), '-master-internal-lbFrontEnd-', parameters('nameSuffix'))]",
        );
        set(
            vars,
            "masterInternalLbIPConfigID",
            "[concat(variables('masterInternalLbID'),'/frontendIPConfigurations/', variables('masterInternalLbIPConfigName'))]",
        );
        set(vars, "masterInternalLbIPOffset", INTERNAL_LB_STATIC_IP_OFFSET);
        let api_server_ip = if master.is_vmss() {
            "[concat(variables('masterFirstAddrOctets')[0],'.',variables('masterFirstAddrOctets')[1],'.255.', variables('masterInternalLbIPOffset'))]"
        } else {
            "[concat(variables('masterFirstAddrPrefix'), add(variables('masterInternalLbIPOffset'), int(variables('masterFirstAddrOctet4'))))]"
        };
        set(vars, "kubernetesAPIServerIP", api_server_ip);
    } else {
        set(vars, "kubernetesAPIServerIP", "[parameters('firstConsecutiveStaticIP')]");
    }

    set(
        vars,
        "masterLbBackendPoolName",
        "[concat(parameters('orchestratorName'), '-master-pool-', parameters('nameSuffix'))]",
    );
    set(
        vars,
        "masterFirstAddrComment",
        "these MasterFirstAddrComment are used to place multiple masters consecutively in the address space",
    );
    set(vars, "masterFirstAddrOctets", "[split(parameters('firstConsecutiveStaticIP'),'.')]");
    set(vars, "masterFirstAddrOctet4", "[variables('masterFirstAddrOctets')[3]]");
    set(
        vars,
        "masterFirstAddrPrefix",
        "[concat(variables('masterFirstAddrOctets')[0],'.',variables('masterFirstAddrOctets')[1],'.',variables('masterFirstAddrOctets')[2],'.')]",
    );
    set(vars, "masterEtcdServerPort", MASTER_ETCD_SERVER_PORT);
    set(vars, "masterEtcdClientPort", MASTER_ETCD_CLIENT_PORT);

    if master.is_vmss() {
        set(
            vars,
            "masterVMNamePrefix",
            "[concat(parameters('orchestratorName'), '-master-', parameters('nameSuffix'), '-')]",
        );
        return Ok(());
    }

    let count = master.count as usize;
    set(vars, "masterVMNamePrefix", spec.master_vm_prefix());
    let names: Vec<String> = (0..count)
        .map(|i| format!("[concat(variables('masterVMNamePrefix'), '{}')]", i))
        .collect();
    set(vars, "masterVMNames", names);
    set(
        vars,
        "masterPrivateIpAddrs",
        generate_consecutive_ips(count, &master.first_consecutive_static_ip)?,
    );

    let url = |scheme: &str, i: usize, port: &str| {
        format!(
            "[concat('{}://', variables('masterPrivateIpAddrs')[{}], ':', {})]",
            scheme, i, port
        )
    };
    let peer_urls: Vec<String> = (0..count)
        .map(|i| url("https", i, "variables('masterEtcdServerPort')"))
        .collect();
    let client_urls: Vec<String> = (0..count)
        .map(|i| url("https", i, "variables('masterEtcdClientPort')"))
        .collect();
    let metric_urls: Vec<String> = (0..count).map(|i| url("http", i, "'2480'")).collect();
    set(vars, "masterEtcdPeerURLs", peer_urls);
    set(vars, "masterEtcdClientURLs", client_urls);
    set(vars, "masterEtcdMetricURLs", metric_urls);
    set(vars, "masterEtcdClusterStates", etcd_cluster_states(count));
    Ok(())
}

/// Initial etcd cluster membership for one, three and five member
/// clusters, capped at the actual master count.
fn etcd_cluster_states(count: usize) -> Vec<String> {
    (0..3)
        .map(|i| {
            let members = (2 * i + 1).min(count);
            let body = (0..members)
                .map(|m| {
                    format!(
                        "variables('masterVMNames')[{0}], '=', variables('masterEtcdPeerURLs')[{0}]",
                        m
                    )
                })
                .collect::<Vec<_>>()
                .join(", ',', ");
            format!("[concat({})]", body)
        })
        .collect()
}
