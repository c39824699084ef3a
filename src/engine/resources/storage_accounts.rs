use serde_json::json;

use crate::api::{AgentPoolProfile, ClusterSpec};
use crate::engine::armtype::{ArmResource, CopyLoop, ResourceBody};

const STORAGE_ACCOUNT_TYPE: &str = "Microsoft.Storage/storageAccounts";
const MASTER_PUBLIC_IP_DEPENDENCY: &str =
    "[concat('Microsoft.Network/publicIPAddresses/', variables('masterPublicIPAddressName'))]";

fn storage_account(name: String, sku: String) -> ResourceBody {
    let mut body = ResourceBody::new(name, STORAGE_ACCOUNT_TYPE);
    body.sku = Some(json!({ "name": sku }));
    body
}

pub fn create_storage_account(spec: &ClusterSpec) -> ArmResource<ResourceBody> {
    let res = ArmResource::new(
        "[variables('apiVersionStorage')]",
        storage_account(
            "[variables('masterStorageAccountName')]".to_string(),
            "[variables('vmSizesMap')[parameters('masterVMSize')].storageAccountType]".to_string(),
        ),
    );
    if spec.is_private_cluster() {
        res
    } else {
        res.depends_on(MASTER_PUBLIC_IP_DEPENDENCY)
    }
}

pub fn create_jumpbox_storage_account() -> ArmResource<ResourceBody> {
    ArmResource::new(
        "[variables('apiVersionStorage')]",
        storage_account(
            "[variables('jumpboxStorageAccountName')]".to_string(),
            "[variables('vmSizesMap')[parameters('jumpboxVMSize')].storageAccountType]".to_string(),
        ),
    )
}

pub fn create_key_vault_storage_account() -> ArmResource<ResourceBody> {
    ArmResource::new(
        "[variables('apiVersionStorage')]",
        storage_account(
            "[variables('clusterKeyVaultName')]".to_string(),
            "Standard_LRS".to_string(),
        ),
    )
}

/// Storage accounts backing an availability-set pool's OS disks, or its data
/// disks when `is_data_disk` is set. One account per copy iteration.
pub fn create_agent_vmas_storage_account(
    spec: &ClusterSpec,
    profile: &AgentPoolProfile,
    is_data_disk: bool,
) -> ArmResource<ResourceBody> {
    let pool = &profile.name;
    let (loop_name, seed, account) = if is_data_disk {
        ("datadiskLoop", "copyIndex(variables('dataStorageAccountPrefixSeed'))", "DataAccountName")
    } else {
        ("loop", "copyIndex()", "AccountName")
    };
    let name = format!(
        "[concat(variables('storageAccountPrefixes')[mod(add({seed},variables('{pool}StorageAccountOffset')),variables('storageAccountPrefixesCount'))],variables('storageAccountPrefixes')[div(add({seed},variables('{pool}StorageAccountOffset')),variables('storageAccountPrefixesCount'))],variables('{pool}{account}'))]"
    );
    let sku = format!("[variables('vmSizesMap')[variables('{pool}VMSize')].storageAccountType]");

    let res = ArmResource::new("[variables('apiVersionStorage')]", storage_account(name, sku))
        .with_copy(CopyLoop::new(
            format!("[variables('{pool}StorageAccountsCount')]"),
            loop_name,
        ));
    if spec.is_hosted_master() || spec.is_private_cluster() {
        res
    } else {
        res.depends_on(MASTER_PUBLIC_IP_DEPENDENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_data_disk_account_uses_seed() {
        let profile = AgentPoolProfile {
            name: "pool1".to_string(),
            ..Default::default()
        };
        let res = create_agent_vmas_storage_account(&ClusterSpec::default(), &profile, true);
        assert_eq!(res.copy.as_ref().unwrap().name, "datadiskLoop");
        assert!(res.body.name.contains("copyIndex(variables('dataStorageAccountPrefixSeed'))"));
        assert!(res.body.name.ends_with("variables('pool1DataAccountName'))]"));
        assert_eq!(res.depends_on, vec![MASTER_PUBLIC_IP_DEPENDENCY.to_string()]);
    }

    #[test]
    fn test_hosted_master_agent_account_has_no_dependency() {
        let spec = ClusterSpec {
            hosted_master_profile: Some(Default::default()),
            ..Default::default()
        };
        let profile = AgentPoolProfile {
            name: "pool1".to_string(),
            ..Default::default()
        };
        let res = create_agent_vmas_storage_account(&spec, &profile, false);
        assert!(res.depends_on.is_empty());
        assert_eq!(res.copy.unwrap().count, "[variables('pool1StorageAccountsCount')]");
    }
}
