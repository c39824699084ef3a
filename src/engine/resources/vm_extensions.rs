//! VM extensions: the provisioning custom script and the billing extension.

use serde_json::{Value, json};

use crate::api::{AZURE_CHINA_CLOUD, AgentPoolProfile, ClusterSpec};
use crate::engine::armtype::{ArmResource, CopyLoop, ResourceBody};

const EXTENSION_TYPE: &str = "Microsoft.Compute/virtualMachines/extensions";
const MASTER_VM_DEPENDENCY: &str =
    "[concat('Microsoft.Compute/virtualMachines/', variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')))]";

const RETRY_FN: &str = "retrycmd_if_failure() { r=$1; w=$2; t=$3; shift && shift && shift; for i in $(seq 1 $r); do timeout $t ${@}; [ $? -eq 0  ] && break || if [ $i -eq $r ]; then return 1; else sleep $w; fi; done };";
const WAIT_FOR_PROVISION: &str = "for i in $(seq 1 1200); do if [ -f /opt/azure/containers/provision.sh ]; then break; fi; if [ $i -eq 1200 ]; then exit 100; else sleep 1; fi; done;";
const PROVISION: &str =
    "/usr/bin/nohup /bin/bash -c \"/bin/bash /opt/azure/containers/provision.sh >> /var/log/azure/cluster-provision.log 2>&1";

const NVIDIA_SKUS: &[&str] = &[
    "Standard_NC6",
    "Standard_NC12",
    "Standard_NC24",
    "Standard_NC24r",
    "Standard_NV6",
    "Standard_NV12",
    "Standard_NV12s_v3",
    "Standard_NV24",
    "Standard_NV24s_v3",
    "Standard_NV24r",
    "Standard_NV48s_v3",
    "Standard_ND6s",
    "Standard_ND12s",
    "Standard_ND24s",
    "Standard_ND24rs",
    "Standard_NC6s_v2",
    "Standard_NC12s_v2",
    "Standard_NC24s_v2",
    "Standard_NC24rs_v2",
    "Standard_NC6s_v3",
    "Standard_NC12s_v3",
    "Standard_NC24s_v3",
    "Standard_NC24rs_v3",
    "Standard_ND40s_v3",
    "Standard_ND40rs_v2",
    "Standard_NC6_Promo",
];

/// VM sizes with NVIDIA driver support.
pub fn is_nvidia_enabled_sku(vm_size: &str) -> bool {
    NVIDIA_SKUS.contains(&vm_size)
}

/// VM sizes with SGX driver support.
pub fn is_sgx_enabled_sku(vm_size: &str) -> bool {
    matches!(vm_size, "Standard_DC2s" | "Standard_DC4s")
}

/// Registry reachability probe run before provisioning, or empty when
/// outbound internet is blocked.
pub fn outbound_connectivity_check(spec: &ClusterSpec, coreos: bool) -> String {
    if spec.feature_flags.block_outbound_internet {
        return String::new();
    }
    let nc = if coreos { "ncat" } else { "nc" };
    let registry = if spec.cloud_name() == AZURE_CHINA_CLOUD {
        "gcr.azk8s.cn 80".to_string()
    } else {
        format!(
            "k8s.gcr.io 443 && retrycmd_if_failure 50 1 3 {nc} -vz gcr.io 443 && retrycmd_if_failure 50 1 3 {nc} -vz docker.io 443"
        )
    };
    format!("ERR_OUTBOUND_CONN_FAIL=50; retrycmd_if_failure 50 1 3 {nc} -vz {registry} || exit $ERR_OUTBOUND_CONN_FAIL;")
}

/// Command run on masters by the provisioning extension.
pub fn master_cse_command(outbound: &str) -> String {
    format!(
        "[concat('{RETRY_FN} {outbound} {WAIT_FOR_PROVISION} ', variables('provisionScriptParametersCommon'),' ',variables('provisionScriptParametersMaster'), ' {PROVISION}\"')]"
    )
}

/// Command run on Linux agents by the provisioning extension.
pub fn agent_cse_command(spec: &ClusterSpec, profile: &AgentPoolProfile, outbound: &str) -> String {
    let background = if spec.feature_flags.cse_run_in_background { " &" } else { "" };
    format!(
        "[concat('{RETRY_FN} {outbound} {WAIT_FOR_PROVISION} ', variables('provisionScriptParametersCommon'),' GPU_NODE={} SGX_NODE={} {PROVISION}{background}\"')]",
        is_nvidia_enabled_sku(&profile.vm_size),
        is_sgx_enabled_sku(&profile.vm_size),
    )
}

/// Command run on Windows agents by the provisioning extension.
pub fn windows_cse_command() -> &'static str {
    "[concat('powershell.exe -ExecutionPolicy Unrestricted -command \"', '$arguments = ', variables('singleQuote'),'-MasterIP ',variables('kubernetesAPIServerIP'),' -KubeDnsServiceIp ',parameters('kubeDnsServiceIp'),' -MasterFQDNPrefix ',variables('masterFqdnPrefix'),' -Location ',variables('location'),' -AgentKey ',parameters('clientPrivateKey'),' -AADClientId ',variables('servicePrincipalClientId'),' -AADClientSecret ',variables('singleQuote'),variables('singleQuote'),variables('servicePrincipalClientSecret'),variables('singleQuote'),variables('singleQuote'), ' ',variables('singleQuote'), ' ; ', variables('windowsCustomScriptSuffix'), '\" > %SYSTEMDRIVE%\\AzureData\\CustomDataSetupScript.log 2>&1')]"
}

fn extension_properties(publisher: &str, kind: &str, version: &str, command: Option<&str>) -> Value {
    let mut properties = json!({
        "autoUpgradeMinorVersion": true,
        "publisher": publisher,
        "settings": {},
        "type": kind,
        "typeHandlerVersion": version,
    });
    if let Some(command) = command {
        properties["protectedSettings"] = json!({ "commandToExecute": command });
    }
    properties
}

/// Provisioning script extension on each master VM.
pub fn create_custom_script_extension(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let coreos = spec.master_profile.as_ref().is_some_and(|m| m.is_coreos());
    let command = master_cse_command(&outbound_connectivity_check(spec, coreos));
    let body = ResourceBody::new(
        "[concat(variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')),'/cse', '-master-', copyIndex(variables('masterOffset')))]",
        EXTENSION_TYPE,
    )
    .properties(extension_properties(
        "Microsoft.Azure.Extensions",
        "CustomScript",
        "2.0",
        Some(&command),
    ));
    ArmResource::new("[variables('apiVersionCompute')]", body)
        .with_copy(CopyLoop::masters("vmLoopNode"))
        .depends_on(MASTER_VM_DEPENDENCY)
}

/// Provisioning script extension on each availability-set agent VM.
pub fn create_agent_vmas_custom_script_extension(
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
) -> ArmResource<ResourceBody> {
    let pool = &profile.name;
    let properties = if profile.is_windows() {
        extension_properties(
            "Microsoft.Compute",
            "CustomScriptExtension",
            "1.8",
            Some(windows_cse_command()),
        )
    } else {
        let outbound = outbound_connectivity_check(spec, profile.is_coreos());
        let command = agent_cse_command(spec, profile, &outbound);
        extension_properties("Microsoft.Azure.Extensions", "CustomScript", "2.0", Some(&command))
    };
    let body = ResourceBody::new(
        format!("[concat(variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')),'/cse', '-agent-', copyIndex(variables('{pool}Offset')))]"),
        EXTENSION_TYPE,
    )
    .properties(properties);
    ArmResource::new("[variables('apiVersionCompute')]", body)
        .with_copy(CopyLoop::pool(pool, "vmLoopNode"))
        .depends_on(format!(
            "[concat('Microsoft.Compute/virtualMachines/', variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')))]"
        ))
}

/// AKS billing extension on each master VM.
pub fn create_aks_billing_extension() -> ArmResource<ResourceBody> {
    let body = ResourceBody::new(
        "[concat(variables('masterVMNamePrefix'), copyIndex(variables('masterOffset')), '/computeAksLinuxBilling')]",
        EXTENSION_TYPE,
    )
    .properties(extension_properties(
        "Microsoft.AKS",
        "Compute.AKS-Engine.Linux.Billing",
        "1.0",
        None,
    ));
    ArmResource::new("[variables('apiVersionCompute')]", body)
        .with_copy(CopyLoop::masters("vmLoopNode"))
        .depends_on(MASTER_VM_DEPENDENCY)
}

/// Billing extension type for an agent pool; hosted masters report under AKS.
pub fn billing_extension_type(spec: &ClusterSpec, windows: bool) -> &'static str {
    match (spec.is_hosted_master(), windows) {
        (true, true) => "Compute.AKS.Windows.Billing",
        (true, false) => "Compute.AKS.Linux.Billing",
        (false, true) => "Compute.AKS-Engine.Windows.Billing",
        (false, false) => "Compute.AKS-Engine.Linux.Billing",
    }
}

/// AKS billing extension on each availability-set agent VM.
pub fn create_agent_vmas_aks_billing_extension(
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
) -> ArmResource<ResourceBody> {
    let pool = &profile.name;
    let body = ResourceBody::new(
        format!("[concat(variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')), '/computeAksLinuxBilling')]"),
        EXTENSION_TYPE,
    )
    .properties(extension_properties(
        "Microsoft.AKS",
        billing_extension_type(spec, profile.is_windows()),
        "1.0",
        None,
    ));
    ArmResource::new("[variables('apiVersionCompute')]", body)
        .with_copy(CopyLoop::pool(pool, "vmLoopNode"))
        .depends_on(format!(
            "[concat('Microsoft.Compute/virtualMachines/', variables('{pool}VMNamePrefix'), copyIndex(variables('{pool}Offset')))]"
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Distro, FeatureFlags, MasterProfile, OsType};

    #[test]
    fn test_outbound_check_default_registries() {
        let spec = ClusterSpec {
            location: "westus2".to_string(),
            ..Default::default()
        };
        assert_eq!(
            outbound_connectivity_check(&spec, false),
            "ERR_OUTBOUND_CONN_FAIL=50; retrycmd_if_failure 50 1 3 nc -vz k8s.gcr.io 443 && retrycmd_if_failure 50 1 3 nc -vz gcr.io 443 && retrycmd_if_failure 50 1 3 nc -vz docker.io 443 || exit $ERR_OUTBOUND_CONN_FAIL;"
        );
    }

    #[test]
    fn test_outbound_check_china_and_blocked() {
        let mut spec = ClusterSpec {
            location: "chinaeast2".to_string(),
            ..Default::default()
        };
        assert_eq!(
            outbound_connectivity_check(&spec, true),
            "ERR_OUTBOUND_CONN_FAIL=50; retrycmd_if_failure 50 1 3 ncat -vz gcr.azk8s.cn 80 || exit $ERR_OUTBOUND_CONN_FAIL;"
        );
        spec.feature_flags = FeatureFlags {
            block_outbound_internet: true,
            ..Default::default()
        };
        assert_eq!(outbound_connectivity_check(&spec, false), "");
    }

    #[test]
    fn test_master_cse_uses_ncat_on_coreos() {
        let spec = ClusterSpec {
            master_profile: Some(MasterProfile {
                distro: Distro::CoreOS,
                ..Default::default()
            }),
            ..Default::default()
        };
        let cse = create_custom_script_extension(&spec);
        let command = cse.body.properties.unwrap()["protectedSettings"]["commandToExecute"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(command.contains("ncat -vz k8s.gcr.io 443"));
        assert!(command.contains("variables('provisionScriptParametersMaster')"));
    }

    #[test]
    fn test_agent_cse_gpu_flag_and_background() {
        let spec = ClusterSpec {
            feature_flags: FeatureFlags {
                cse_run_in_background: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let profile = AgentPoolProfile {
            name: "gpu".to_string(),
            vm_size: "Standard_NC6".to_string(),
            ..Default::default()
        };
        let command = agent_cse_command(&spec, &profile, "");
        assert!(command.contains("GPU_NODE=true SGX_NODE=false"));
        assert!(command.ends_with("2>&1 &\"')]"));
    }

    #[test]
    fn test_windows_agent_cse_and_billing() {
        let spec = ClusterSpec::default();
        let profile = AgentPoolProfile {
            name: "win".to_string(),
            os_type: OsType::Windows,
            ..Default::default()
        };
        let cse = create_agent_vmas_custom_script_extension(&spec, &profile);
        let props = cse.body.properties.unwrap();
        assert_eq!(props["type"], "CustomScriptExtension");
        assert_eq!(props["typeHandlerVersion"], "1.8");

        let billing = create_agent_vmas_aks_billing_extension(&spec, &profile);
        assert_eq!(billing.body.properties.unwrap()["type"], "Compute.AKS-Engine.Windows.Billing");
    }

    #[test]
    fn test_master_billing_extension() {
        let billing = create_aks_billing_extension();
        let value = billing.to_value().unwrap();
        assert_eq!(value["properties"]["publisher"], "Microsoft.AKS");
        assert!(value["properties"].get("protectedSettings").is_none());
        assert_eq!(value["dependsOn"][0], MASTER_VM_DEPENDENCY);
    }
}
