//! ARM document types.
//!
//! Every generated resource is an [`ArmResource`] envelope flattened over a
//! kind-specific body. Field values are ARM template expressions, kept as
//! opaque strings.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEPLOYMENT_TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentTemplate.json#";
pub const DEPLOYMENT_PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentParameters.json#";
pub const CONTENT_VERSION: &str = "1.0.0.0";

/// Fault domain count evaluated by ARM at deployment time: 3 in the regions
/// that support it, 1 in the canary region, 2 elsewhere.
pub const FAULT_DOMAIN_COUNT_EXPR: &str = "[if(contains(split('canadacentral,centralus,eastus,eastus2,northcentralus,northeurope,southcentralus,westeurope,westus',','),variables('location')),3,if(equals('centraluseuap',variables('location')),1,2))]";

pub fn wrap_as_variable(name: &str) -> String {
    format!("[variables('{}')]", name)
}

pub fn wrap_as_parameter(name: &str) -> String {
    format!("[parameters('{}')]", name)
}

pub fn wrap_as_verbatim(expr: &str) -> String {
    format!("[{}]", expr)
}

/// Splices a variable into the literal text of a `concat('...')` expression.
pub fn splice_variable(name: &str) -> String {
    format!("',variables('{}'),'", name)
}

pub fn splice_parameter(name: &str) -> String {
    format!("',parameters('{}'),'", name)
}

pub fn splice_verbatim(expr: &str) -> String {
    format!("',{},'", expr)
}

/// ARM `copy` element: the resource is expanded `count` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyLoop {
    pub count: String,
    pub name: String,
}

impl CopyLoop {
    pub fn new(count: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            count: count.into(),
            name: name.into(),
        }
    }

    /// Loop over the masters not yet deployed.
    pub fn masters(name: &str) -> Self {
        Self::new("[sub(variables('masterCount'), variables('masterOffset'))]", name)
    }

    /// Loop over the agents of a pool not yet deployed.
    pub fn pool(pool: &str, name: &str) -> Self {
        Self::new(
            format!("[sub(variables('{0}Count'), variables('{0}Offset'))]", pool),
            name,
        )
    }
}

/// Common envelope of every generated resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmResource<T> {
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<CopyLoop>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> ArmResource<T> {
    pub fn new(api_version: impl Into<String>, body: T) -> Self {
        Self {
            api_version: api_version.into(),
            copy: None,
            depends_on: Vec::new(),
            body,
        }
    }

    pub fn with_copy(mut self, copy: CopyLoop) -> Self {
        self.copy = Some(copy);
        self
    }

    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    pub fn with_depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }
}

impl<T: Serialize> ArmResource<T> {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl Sku {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier: None,
        }
    }
}

/// Resource body for kinds whose properties are assembled as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceBody {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Target group of nested deployments.
    #[serde(rename = "resourceGroup", default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

impl ResourceBody {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            location: Some("[variables('location')]".to_string()),
            ..Default::default()
        }
    }

    pub fn properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySet {
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<AvailabilitySetProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySetProperties {
    pub platform_fault_domain_count: Option<u32>,
    pub platform_update_domain_count: Option<u32>,
}

impl Serialize for AvailabilitySetProperties {
    /// An unset fault domain count next to other set properties becomes the
    /// region-dependent ARM expression. An empty block stays empty.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self.platform_fault_domain_count {
            Some(count) => map.serialize_entry("platformFaultDomainCount", &count)?,
            None if self.platform_update_domain_count.is_some() => {
                map.serialize_entry("platformFaultDomainCount", FAULT_DOMAIN_COUNT_EXPR)?
            }
            None => {}
        }
        if let Some(count) = self.platform_update_domain_count {
            map.serialize_entry("platformUpdateDomainCount", &count)?;
        }
        map.end()
    }
}

/// A complete ARM deployment template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmTemplate {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub content_version: String,
    pub parameters: Map<String, Value>,
    pub variables: Map<String, Value>,
    pub resources: Vec<Value>,
    pub outputs: Map<String, Value>,
}

impl Default for ArmTemplate {
    fn default() -> Self {
        Self {
            schema: DEPLOYMENT_TEMPLATE_SCHEMA.to_string(),
            content_version: CONTENT_VERSION.to_string(),
            parameters: Map::new(),
            variables: Map::new(),
            resources: Vec::new(),
            outputs: Map::new(),
        }
    }
}
