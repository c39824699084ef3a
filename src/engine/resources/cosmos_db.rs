//! CosmosDB account backing etcd when the master opts into cosmos etcd.

use serde_json::json;
use std::collections::BTreeMap;

use crate::engine::armtype::{ArmResource, ResourceBody};

pub fn create_cosmos_db_account() -> ArmResource<ResourceBody> {
    let mut body = ResourceBody::new(
        "[variables('cosmosAccountName')]",
        "Microsoft.DocumentDB/databaseAccounts",
    )
    .properties(json!({
        "capabilities": [{ "name": "EnableEtcd" }],
        "consistencyPolicy": {
            "defaultConsistencyLevel": "BoundedStaleness",
            "maxIntervalInSeconds": 5,
            "maxStalenessPrefix": 100,
        },
        "databaseAccountOfferType": "Standard",
        "locations": [
            { "failoverPriority": 0, "locationName": "[resourceGroup().location]" },
            { "failoverPriority": 1, "locationName": "[resourceGroup().location]" },
        ],
        "primaryClientCertificatePemBytes": "[variables('cosmosDBCertb64')]",
    }));
    body.location = Some("[resourceGroup().location]".to_string());
    body.kind = Some("GlobalDocumentDB".to_string());
    body.tags = BTreeMap::from([("defaultExperience".to_string(), "Etcd".to_string())]);
    ArmResource::new("[variables('apiVersionCosmos')]", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosmos_account_shape() {
        let value = create_cosmos_db_account().to_value().unwrap();
        assert_eq!(value["type"], "Microsoft.DocumentDB/databaseAccounts");
        assert_eq!(value["kind"], "GlobalDocumentDB");
        assert_eq!(value["tags"]["defaultExperience"], "Etcd");
        assert_eq!(value["properties"]["capabilities"][0]["name"], "EnableEtcd");
        assert_eq!(value["properties"]["locations"][1]["failoverPriority"], 1);
    }
}
