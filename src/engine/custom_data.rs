//! First-boot payloads (`osProfile.customData`) of masters, agents and the
//! jumpbox.
//!
//! Each payload is rendered from an embedded document and embedded as the
//! literal text of an ARM `base64(concat('...'))` expression. Values only
//! known at deployment time are spliced in as `',variables('x'),'`.

use log::debug;
use std::sync::Arc;
use tera::Context;

use crate::api::{AgentPoolProfile, ClusterSpec};
use crate::engine::accessors::TemplateAccessors;
use crate::engine::artifacts::{addon_settings, component_settings};
use crate::engine::assets::{
    ADDONS_SOURCE_PATH, JUMPBOX_CUSTOM_DATA_YAML, MANIFESTS_SOURCE_PATH, MASTER_CUSTOM_DATA_YAML,
    NODE_CUSTOM_DATA_YAML, WINDOWS_CUSTOM_DATA_PS1, asset,
};
use crate::engine::extensions::{extension_script_commands, windows_extension_script_commands};
use crate::engine::resources::CustomData;
use crate::engine::substitution::{SubstitutionMode, SubstitutionRequest, render, substitute};
use crate::error::GeneratorError;

pub const MASTER_MANIFESTS_CONFIG_PLACEHOLDER: &str = "MASTER_MANIFESTS_CONFIG_PLACEHOLDER";
pub const MASTER_CUSTOM_FILES_PLACEHOLDER: &str = "MASTER_CUSTOM_FILES_PLACEHOLDER";
pub const MASTER_CONTAINER_ADDONS_PLACEHOLDER: &str = "MASTER_CONTAINER_ADDONS_PLACEHOLDER";
pub const PREPROVISION_EXTENSION_PLACEHOLDER: &str = "PREPROVISION_EXTENSION";

/// Knobs shared by every payload of one generation pass.
#[derive(Debug, Clone, Copy)]
pub struct CustomDataOptions<'a> {
    pub mode: SubstitutionMode,
    pub extensions_root_url: &'a str,
}

/// Wraps rendered text as the customData ARM expression.
pub fn wrap_custom_data(content: &str) -> String {
    format!("[base64(concat('{}'))]", content)
}

fn render_document(
    spec: &Arc<ClusterSpec>,
    path: &str,
    context: &Context,
) -> Result<String, GeneratorError> {
    let source = asset(path)?;
    let rendered = render(path, source, TemplateAccessors::cluster(Arc::clone(spec)), context)?;
    Ok(rendered.replace("\r\n", "\n"))
}

pub fn master_custom_data(
    spec: &Arc<ClusterSpec>,
    options: &CustomDataOptions<'_>,
) -> Result<String, GeneratorError> {
    let master = spec
        .master_profile
        .as_ref()
        .ok_or(GeneratorError::MissingMasterProfile)?;
    let preprovision = match &master.preprovision_extension {
        Some(ext) => extension_script_commands(spec, ext, options.extensions_root_url)?,
        None => String::new(),
    };
    let mut context = Context::new();
    context.insert("preprovision_extension", &preprovision);
    let document = render_document(spec, MASTER_CUSTOM_DATA_YAML, &context)?;

    let major_minor = spec.orchestrator_profile.major_minor();
    let manifests = SubstitutionRequest {
        source_path: MANIFESTS_SOURCE_PATH,
        placeholder: MASTER_MANIFESTS_CONFIG_PLACEHOLDER,
        major_minor: &major_minor,
        mode: options.mode,
    };
    let document = substitute(&document, &component_settings(spec), &manifests, |name| {
        TemplateAccessors::for_component(Arc::clone(spec), name)
    })?;

    // the api model carries no extra master files
    let document = document.replace(MASTER_CUSTOM_FILES_PLACEHOLDER, "");

    let addons = SubstitutionRequest {
        source_path: ADDONS_SOURCE_PATH,
        placeholder: MASTER_CONTAINER_ADDONS_PLACEHOLDER,
        ..manifests
    };
    let document = substitute(&document, &addon_settings(spec), &addons, |name| {
        TemplateAccessors::for_addon(Arc::clone(spec), name)
    })?;

    Ok(wrap_custom_data(&document))
}

pub fn agent_custom_data(
    spec: &Arc<ClusterSpec>,
    pool: &AgentPoolProfile,
    options: &CustomDataOptions<'_>,
) -> Result<String, GeneratorError> {
    let mut context = Context::new();
    context.insert("pool_name", &pool.name);
    context.insert("pool_is_vmss", &pool.is_vmss());

    if pool.is_windows() {
        let commands = match &pool.preprovision_extension {
            Some(ext) => windows_extension_script_commands(spec, ext, options.extensions_root_url)?,
            None => String::new(),
        };
        context.insert("preprovision_extension", "");
        let script = render_document(spec, WINDOWS_CUSTOM_DATA_PS1, &context)?;
        let script = script.replace(PREPROVISION_EXTENSION_PLACEHOLDER, commands.trim());
        return Ok(wrap_custom_data(&script));
    }

    let preprovision = match &pool.preprovision_extension {
        Some(ext) => extension_script_commands(spec, ext, options.extensions_root_url)?,
        None => String::new(),
    };
    context.insert("preprovision_extension", &preprovision);
    let document = render_document(spec, NODE_CUSTOM_DATA_YAML, &context)?;
    Ok(wrap_custom_data(&document))
}

pub fn jumpbox_custom_data(spec: &Arc<ClusterSpec>) -> Result<String, GeneratorError> {
    let document = render_document(spec, JUMPBOX_CUSTOM_DATA_YAML, &Context::new())?;
    Ok(wrap_custom_data(&document))
}

/// Payloads for every VM kind the cluster deploys.
pub fn build_custom_data(
    spec: &Arc<ClusterSpec>,
    options: &CustomDataOptions<'_>,
) -> Result<CustomData, GeneratorError> {
    let mut custom_data = CustomData::default();
    if spec.master_profile.is_some() {
        custom_data.master = master_custom_data(spec, options)?;
    }
    if spec.kubernetes_config().private_jumpbox_provision() {
        custom_data.jumpbox = jumpbox_custom_data(spec)?;
    }
    for pool in &spec.agent_pool_profiles {
        debug!("rendering custom data for pool {}", pool.name);
        custom_data
            .agents
            .insert(pool.name.clone(), agent_custom_data(spec, pool, options)?);
    }
    Ok(custom_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AvailabilityProfile, ExtensionProfile, ExtensionRef, KubernetesAddon, MasterProfile, OsType,
    };
    use crate::engine::extensions::DEFAULT_EXTENSIONS_ROOT_URL;
    use crate::error::{ExtensionError, SubstitutionError};

    fn options(mode: SubstitutionMode) -> CustomDataOptions<'static> {
        CustomDataOptions {
            mode,
            extensions_root_url: DEFAULT_EXTENSIONS_ROOT_URL,
        }
    }

    fn spec() -> ClusterSpec {
        let mut spec = ClusterSpec {
            location: "westus2".to_string(),
            master_profile: Some(MasterProfile {
                count: 1,
                dns_prefix: "mycluster".to_string(),
                first_consecutive_static_ip: "10.240.255.5".to_string(),
                ..Default::default()
            }),
            agent_pool_profiles: vec![AgentPoolProfile {
                name: "agentpool1".to_string(),
                count: 2,
                ..Default::default()
            }],
            ..Default::default()
        };
        spec.orchestrator_profile.orchestrator_version = "1.16.4".to_string();
        spec
    }

    /// Literal segments of a `concat('...')` body may not contain quotes.
    fn assert_splices_balanced(expr: &str) {
        let body = expr
            .strip_prefix("[base64(concat('")
            .and_then(|s| s.strip_suffix("'))]"))
            .unwrap();
        let quotes = body.matches('\'').count();
        assert_eq!(quotes % 2, 0, "unbalanced quotes in custom data");
    }

    #[test]
    fn test_master_custom_data_replaces_placeholders() {
        let custom = master_custom_data(&Arc::new(spec()), &options(SubstitutionMode::Strict)).unwrap();
        assert!(custom.starts_with("[base64(concat('#cloud-config\n"));
        for token in [
            MASTER_MANIFESTS_CONFIG_PLACEHOLDER,
            MASTER_CUSTOM_FILES_PLACEHOLDER,
            MASTER_CONTAINER_ADDONS_PLACEHOLDER,
            "{{",
            "{%",
        ] {
            assert!(!custom.contains(token), "{} left in custom data", token);
        }
        assert!(custom.contains("- path: /etc/kubernetes/manifests/kube-apiserver.yaml\n"));
        assert!(custom.contains("- path: /etc/kubernetes/addons/coredns.yaml\n"));
        assert!(!custom.contains("/etc/kubernetes/addons/kube-dns.yaml"));
        assert!(custom.contains("\"tenantId\": \"',variables('tenantID'),'\""));
        assert_splices_balanced(&custom);
    }

    #[test]
    fn test_invalid_addon_payload() {
        let mut spec = spec();
        spec.orchestrator_profile.kubernetes_config.addons.push(KubernetesAddon {
            name: "coredns".to_string(),
            data: "%%%".to_string(),
            ..Default::default()
        });
        let spec = Arc::new(spec);
        assert!(matches!(
            master_custom_data(&spec, &options(SubstitutionMode::Strict)),
            Err(GeneratorError::Substitution(SubstitutionError::Base64Decode { .. }))
        ));
        let custom = master_custom_data(&spec, &options(SubstitutionMode::BestEffort)).unwrap();
        assert!(!custom.contains("/etc/kubernetes/addons/coredns.yaml"));
        assert!(custom.contains("/etc/kubernetes/addons/kube-proxy.yaml"));
    }

    #[test]
    fn test_linux_agent_custom_data() {
        let mut spec = spec();
        spec.agent_pool_profiles.push(AgentPoolProfile {
            name: "avpool".to_string(),
            count: 1,
            availability_profile: AvailabilityProfile::AvailabilitySet,
            ..Default::default()
        });
        let spec = Arc::new(spec);

        let vmss = agent_custom_data(&spec, &spec.agent_pool_profiles[0], &options(SubstitutionMode::Strict)).unwrap();
        assert!(vmss.contains("agentpool=agentpool1,kubernetes.azure.com/vmss=true\n"));
        assert!(vmss.contains("',variables('agentpool1SubnetName'),'"));
        assert_splices_balanced(&vmss);

        let avset = agent_custom_data(&spec, &spec.agent_pool_profiles[1], &options(SubstitutionMode::Strict)).unwrap();
        assert!(avset.contains("agentpool=avpool\n"));
        assert!(!avset.contains("kubernetes.azure.com/vmss=true"));
        assert_splices_balanced(&avset);
    }

    #[test]
    fn test_preprovision_extension_commands() {
        let mut spec = spec();
        let hello = ExtensionRef {
            name: "hello".to_string(),
            ..Default::default()
        };
        spec.agent_pool_profiles[0].preprovision_extension = Some(hello.clone());
        spec.agent_pool_profiles.push(AgentPoolProfile {
            name: "win".to_string(),
            count: 1,
            os_type: OsType::Windows,
            preprovision_extension: Some(hello),
            ..Default::default()
        });
        spec.extension_profiles.push(ExtensionProfile {
            name: "hello".to_string(),
            version: "v1".to_string(),
            script: "hello.sh".to_string(),
            ..Default::default()
        });
        let spec = Arc::new(spec);
        let custom = build_custom_data(&spec, &options(SubstitutionMode::Strict)).unwrap();

        let linux = custom.agent("agentpool1");
        assert!(linux.contains("- sudo /bin/chmod 744 /opt/azure/containers/extensions/hello/hello.sh"));
        assert_splices_balanced(linux);

        let windows = custom.agent("win");
        assert!(!windows.contains(PREPROVISION_EXTENSION_PLACEHOLDER));
        assert!(windows.contains("Invoke-WebRequest -Uri"));
        assert!(custom.jumpbox.is_empty());
    }

    #[test]
    fn test_missing_extension_profile() {
        let mut spec = spec();
        if let Some(master) = spec.master_profile.as_mut() {
            master.preprovision_extension = Some(ExtensionRef {
                name: "absent".to_string(),
                ..Default::default()
            });
        }
        assert!(matches!(
            master_custom_data(&Arc::new(spec), &options(SubstitutionMode::BestEffort)),
            Err(GeneratorError::Extension(ExtensionError::NotFound { name })) if name == "absent"
        ));
    }
}
