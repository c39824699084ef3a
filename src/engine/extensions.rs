//! VM extensions published under an extensions root URL.
//!
//! An extension directory holds `supported-orchestrators.json` and a
//! `template-link.json` nested deployment. The linked template is emitted as
//! an extra resource once its placeholders are bound to the master or agent
//! pool that opted in. Preprovision extensions are instead run from
//! cloud-init with the script commands built here.

use log::{debug, info};
use serde_json::Value;
use std::time::Duration;

use crate::api::{AgentPoolProfile, ClusterSpec, ExtensionProfile, ExtensionRef};
use crate::error::{ExtensionError, GeneratorError};

pub const DEFAULT_EXTENSIONS_ROOT_URL: &str = "https://raw.githubusercontent.com/Azure/aks-engine/master/";
pub const SUPPORTED_ORCHESTRATORS_FILE: &str = "supported-orchestrators.json";
pub const TEMPLATE_LINK_FILE: &str = "template-link.json";
pub const AZURE_STACK_CA_CERT_LOCATION: &str = "/var/lib/waagent/Certificates.pem";

/// Fetches extension files by URL.
pub trait ExtensionSource {
    fn fetch(&self, url: &str) -> Result<String, ExtensionError>;
}

/// Fetches over HTTP with a blocking client.
pub struct HttpExtensionSource {
    client: reqwest::blocking::Client,
}

impl HttpExtensionSource {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ExtensionError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(format!("armgen/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ExtensionError::Client)?;
        Ok(Self { client })
    }
}

impl ExtensionSource for HttpExtensionSource {
    fn fetch(&self, url: &str) -> Result<String, ExtensionError> {
        debug!("GET {}", url);
        let http_error = |source| ExtensionError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(http_error)?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(ExtensionError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.text().map_err(http_error)
    }
}

/// `{root}extensions/{name}/{version}/{file}` with an optional query string.
pub fn extension_url(root_url: &str, name: &str, version: &str, file: &str, query: &str) -> String {
    let mut url = format!("{}extensions/{}/{}/{}", root_url, name, version, file);
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}

pub fn fetch_extension_resource(
    source: &dyn ExtensionSource,
    profile: &ExtensionProfile,
    file: &str,
) -> Result<String, ExtensionError> {
    let url = extension_url(
        &profile.root_url,
        &profile.name,
        &profile.version,
        file,
        &profile.url_query,
    );
    source.fetch(&url)
}

/// Whether `supported-orchestrators.json` lists `orchestrator`.
pub fn orchestrator_supports_extension(
    source: &dyn ExtensionSource,
    profile: &ExtensionProfile,
    orchestrator: &str,
) -> Result<bool, ExtensionError> {
    let manifest = fetch_extension_resource(source, profile, SUPPORTED_ORCHESTRATORS_FILE)?;
    let supported: Vec<String> =
        serde_json::from_str(&manifest).map_err(|_| ExtensionError::InvalidManifest {
            name: profile.name.clone(),
            version: profile.version.clone(),
        })?;
    Ok(supported.iter().any(|o| o == orchestrator))
}

/// Raw `template-link.json` text, after checking orchestrator support.
pub fn linked_template_text_for_url(
    source: &dyn ExtensionSource,
    profile: &ExtensionProfile,
    orchestrator: &str,
) -> Result<String, ExtensionError> {
    if !orchestrator_supports_extension(source, profile, orchestrator)? {
        return Err(ExtensionError::UnsupportedOrchestrator {
            orchestrator: orchestrator.to_string(),
            name: profile.name.clone(),
            version: profile.version.clone(),
        });
    }
    fetch_extension_resource(source, profile, TEMPLATE_LINK_FILE)
}

fn is_single(single_or_all: &str) -> bool {
    single_or_all.eq_ignore_ascii_case("single")
}

/// Binds the placeholders of a linked template to one target.
fn bind_linked_template(
    text: &str,
    profile: &ExtensionProfile,
    vm_name_prefix: &str,
    loop_count: &str,
    loop_offset: &str,
) -> String {
    let vm_type = if vm_name_prefix.contains("master") {
        "master"
    } else {
        "agent"
    };
    let mut text = text
        .replace("EXTENSION_TARGET_VM_TYPE", vm_type)
        .replace(
            "EXTENSION_PARAMETERS_REPLACE",
            &format!("[parameters('{}Parameters')]", profile.name),
        )
        .replace("EXTENSION_URL_REPLACE", &profile.root_url)
        .replace("EXTENSION_TARGET_VM_NAME_PREFIX", vm_name_prefix);
    // a numeric count replaces the quoted placeholder so the result stays a JSON number
    text = if loop_count.parse::<i64>().is_ok() {
        text.replace("\"EXTENSION_LOOP_COUNT\"", loop_count)
    } else {
        text.replace("EXTENSION_LOOP_COUNT", loop_count)
    };
    text.replace("EXTENSION_LOOP_OFFSET", loop_offset)
}

pub fn master_linked_template_text(
    source: &dyn ExtensionSource,
    spec: &ClusterSpec,
    profile: &ExtensionProfile,
    single_or_all: &str,
) -> Result<String, ExtensionError> {
    let orchestrator = spec.orchestrator_profile.orchestrator_type;
    let (mut loop_count, loop_offset) = if spec.orchestrator_profile.is_kubernetes() {
        (
            "[sub(variables('masterCount'), variables('masterOffset'))]",
            "variables('masterOffset')",
        )
    } else {
        ("[variables('masterCount')]", "")
    };
    if is_single(single_or_all) {
        loop_count = "1";
    }
    let text = linked_template_text_for_url(source, profile, orchestrator.as_str())?;
    Ok(bind_linked_template(
        &text,
        profile,
        "variables('masterVMNamePrefix')",
        loop_count,
        loop_offset,
    ))
}

pub fn agent_pool_linked_template_text(
    source: &dyn ExtensionSource,
    spec: &ClusterSpec,
    pool: &AgentPoolProfile,
    profile: &ExtensionProfile,
    single_or_all: &str,
) -> Result<String, ExtensionError> {
    let orchestrator = spec.orchestrator_profile.orchestrator_type;
    // availability set pools keep their deployed VMs, so only new ones get the extension
    let (mut loop_count, loop_offset) = if pool.is_availability_sets() {
        (
            format!("[sub(variables('{0}Count'), variables('{0}Offset'))]", pool.name),
            format!("variables('{}Offset')", pool.name),
        )
    } else {
        (format!("[variables('{}Count')]", pool.name), String::new())
    };
    if is_single(single_or_all) {
        loop_count = "1".to_string();
    }
    let text = linked_template_text_for_url(source, profile, orchestrator.as_str())?;
    Ok(bind_linked_template(
        &text,
        profile,
        &format!("variables('{}VMNamePrefix')", pool.name),
        &loop_count,
        &loop_offset,
    ))
}

/// Profile of `ext`, with `default_root_url` filled in when the profile has none.
fn resolve_profile(
    spec: &ClusterSpec,
    ext: &ExtensionRef,
    default_root_url: &str,
) -> Result<ExtensionProfile, ExtensionError> {
    let mut profile = spec
        .extension_profile(&ext.name)
        .cloned()
        .ok_or_else(|| ExtensionError::NotFound {
            name: ext.name.clone(),
        })?;
    if profile.root_url.is_empty() {
        profile.root_url = default_root_url.to_string();
    }
    Ok(profile)
}

fn parse_linked(name: &str, text: &str, out: &mut Vec<Value>) -> Result<(), ExtensionError> {
    let value: Value =
        serde_json::from_str(text).map_err(|source| ExtensionError::InvalidLinkedTemplate {
            name: name.to_string(),
            source,
        })?;
    match value {
        Value::Array(items) => out.extend(items),
        other => out.push(other),
    }
    Ok(())
}

/// Linked template deployments of every extension the master or a pool opted into.
pub fn linked_template_resources(
    source: &dyn ExtensionSource,
    spec: &ClusterSpec,
    default_root_url: &str,
) -> Result<Vec<Value>, GeneratorError> {
    let mut resources = Vec::new();
    if let Some(master) = &spec.master_profile {
        for ext in &master.extensions {
            let profile = resolve_profile(spec, ext, default_root_url)?;
            info!("linking extension {} for masters", profile.name);
            let text = master_linked_template_text(source, spec, &profile, &ext.single_or_all)?;
            parse_linked(&profile.name, &text, &mut resources)?;
        }
    }
    for pool in &spec.agent_pool_profiles {
        for ext in &pool.extensions {
            let profile = resolve_profile(spec, ext, default_root_url)?;
            info!("linking extension {} for pool {}", profile.name, pool.name);
            let text =
                agent_pool_linked_template_text(source, spec, pool, &profile, &ext.single_or_all)?;
            parse_linked(&profile.name, &text, &mut resources)?;
        }
    }
    Ok(resources)
}

/// cloud-init `runcmd` lines that download and run a Linux preprovision
/// script. The result is spliced into a `concat('...')` expression.
pub fn extension_script_commands(
    spec: &ClusterSpec,
    ext: &ExtensionRef,
    default_root_url: &str,
) -> Result<String, ExtensionError> {
    let profile = resolve_profile(spec, ext, default_root_url)?;
    let cacert = if spec.is_azure_stack_cloud() {
        format!("--cacert {}", AZURE_STACK_CA_CERT_LOCATION)
    } else {
        String::new()
    };
    let url = extension_url(
        &profile.root_url,
        &profile.name,
        &profile.version,
        &profile.script,
        &profile.url_query,
    );
    let path = format!("/opt/azure/containers/extensions/{}/{}", profile.name, profile.script);
    Ok(format!(
        "- sudo /usr/bin/curl --retry 5 --retry-delay 10 --retry-max-time 30 -o {path} --create-dirs {cacert} \"{url}\" \n- sudo /bin/chmod 744 {path} \n- sudo {path} ',parameters('{name}Parameters'),' > /var/log/{name}-output.log",
        path = path,
        cacert = cacert,
        url = url,
        name = profile.name,
    ))
}

/// PowerShell lines that download and run a Windows preprovision script.
pub fn windows_extension_script_commands(
    spec: &ClusterSpec,
    ext: &ExtensionRef,
    default_root_url: &str,
) -> Result<String, ExtensionError> {
    let profile = resolve_profile(spec, ext, default_root_url)?;
    let url = extension_url(
        &profile.root_url,
        &profile.name,
        &profile.version,
        &profile.script,
        &profile.url_query,
    );
    let dir = format!("$env:SystemDrive:/AzureData/extensions/{}", profile.name);
    let path = format!("{}/{}", dir, profile.script);
    Ok(format!(
        "New-Item -ItemType Directory -Force -Path \"{dir}\" ; Invoke-WebRequest -Uri \"{url}\" -OutFile \"{path}\" ; powershell \"{path} `\"',parameters('{name}Parameters'),'`\"\"\n",
        dir = dir,
        url = url,
        path = path,
        name = profile.name,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AvailabilityProfile, MasterProfile, OsType};
    use std::cell::RefCell;
    use std::collections::HashMap;

    const ROOT: &str = "https://example.test/";

    /// In-memory extension registry.
    #[derive(Default)]
    struct MemorySource {
        files: HashMap<String, String>,
        requests: RefCell<Vec<String>>,
    }

    impl MemorySource {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.files.insert(url.to_string(), body.to_string());
            self
        }
    }

    impl ExtensionSource for MemorySource {
        fn fetch(&self, url: &str) -> Result<String, ExtensionError> {
            self.requests.borrow_mut().push(url.to_string());
            self.files.get(url).cloned().ok_or(ExtensionError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    const LINKED: &str = r#"{"name": "[concat(EXTENSION_TARGET_VM_NAME_PREFIX, 'hello')]", "type": "Microsoft.Resources/deployments", "copy": {"count": "EXTENSION_LOOP_COUNT", "name": "helloLoop"}, "properties": {"parameters": {"artifactsLocation": {"value": "EXTENSION_URL_REPLACE"}, "extensionParameters": {"value": "EXTENSION_PARAMETERS_REPLACE"}, "targetVMType": {"value": "EXTENSION_TARGET_VM_TYPE"}, "vmIndexOffset": {"value": "[EXTENSION_LOOP_OFFSET]"}}}}"#;

    fn registry() -> MemorySource {
        MemorySource::default()
            .with(
                "https://example.test/extensions/Hello/v1/supported-orchestrators.json",
                r#"["Kubernetes"]"#,
            )
            .with("https://example.test/extensions/Hello/v1/template-link.json", LINKED)
    }

    fn ext(single_or_all: &str) -> ExtensionRef {
        ExtensionRef {
            name: "hello".to_string(),
            single_or_all: single_or_all.to_string(),
            template: String::new(),
        }
    }

    fn spec() -> ClusterSpec {
        ClusterSpec {
            master_profile: Some(MasterProfile {
                count: 3,
                extensions: vec![ext("all")],
                ..Default::default()
            }),
            agent_pool_profiles: vec![AgentPoolProfile {
                name: "pool1".to_string(),
                count: 2,
                availability_profile: AvailabilityProfile::VirtualMachineScaleSets,
                extensions: vec![ext("single")],
                ..Default::default()
            }],
            extension_profiles: vec![ExtensionProfile {
                name: "Hello".to_string(),
                version: "v1".to_string(),
                script: "hello.sh".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_extension_url() {
        assert_eq!(
            extension_url(ROOT, "hello", "v1", "hello.sh", ""),
            "https://example.test/extensions/hello/v1/hello.sh"
        );
        assert_eq!(
            extension_url(ROOT, "hello", "v1", "hello.sh", "sig=abc"),
            "https://example.test/extensions/hello/v1/hello.sh?sig=abc"
        );
    }

    #[test]
    fn test_master_linked_template() {
        let spec = spec();
        let profile = resolve_profile(&spec, &ext("all"), ROOT).unwrap();
        let text = master_linked_template_text(&registry(), &spec, &profile, "all").unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["copy"]["count"],
            "[sub(variables('masterCount'), variables('masterOffset'))]"
        );
        assert_eq!(value["properties"]["parameters"]["targetVMType"]["value"], "master");
        assert_eq!(
            value["properties"]["parameters"]["extensionParameters"]["value"],
            "[parameters('HelloParameters')]"
        );
        assert_eq!(
            value["properties"]["parameters"]["vmIndexOffset"]["value"],
            "[variables('masterOffset')]"
        );
    }

    #[test]
    fn test_single_agent_uses_numeric_count() {
        let resources = linked_template_resources(&registry(), &spec(), ROOT).unwrap();
        assert_eq!(resources.len(), 2);
        let agent = &resources[1];
        assert_eq!(agent["copy"]["count"], 1);
        assert_eq!(agent["properties"]["parameters"]["targetVMType"]["value"], "agent");
        assert_eq!(
            agent["name"],
            "[concat(variables('pool1VMNamePrefix'), 'hello')]"
        );
    }

    #[test]
    fn test_unsupported_orchestrator() {
        let source = MemorySource::default().with(
            "https://example.test/extensions/Hello/v1/supported-orchestrators.json",
            r#"["DCOS"]"#,
        );
        let spec = spec();
        let profile = resolve_profile(&spec, &ext("all"), ROOT).unwrap();
        let err = master_linked_template_text(&source, &spec, &profile, "all").unwrap_err();
        assert!(matches!(err, ExtensionError::UnsupportedOrchestrator { .. }));
        assert_eq!(source.requests.borrow().len(), 1);
    }

    #[test]
    fn test_missing_profile_is_an_error() {
        let mut spec = spec();
        spec.extension_profiles.clear();
        assert!(matches!(
            extension_script_commands(&spec, &ext("all"), ROOT),
            Err(ExtensionError::NotFound { name }) if name == "hello"
        ));
        assert!(matches!(
            linked_template_resources(&registry(), &spec, ROOT),
            Err(GeneratorError::Extension(ExtensionError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_linux_script_commands() {
        let commands = extension_script_commands(&spec(), &ext("all"), ROOT).unwrap();
        assert_eq!(
            commands,
            "- sudo /usr/bin/curl --retry 5 --retry-delay 10 --retry-max-time 30 -o /opt/azure/containers/extensions/Hello/hello.sh --create-dirs  \"https://example.test/extensions/Hello/v1/hello.sh\" \n- sudo /bin/chmod 744 /opt/azure/containers/extensions/Hello/hello.sh \n- sudo /opt/azure/containers/extensions/Hello/hello.sh ',parameters('HelloParameters'),' > /var/log/Hello-output.log"
        );
    }

    #[test]
    fn test_windows_script_commands() {
        let mut spec = spec();
        spec.agent_pool_profiles[0].os_type = OsType::Windows;
        let commands = windows_extension_script_commands(&spec, &ext("all"), ROOT).unwrap();
        assert!(commands.starts_with(
            "New-Item -ItemType Directory -Force -Path \"$env:SystemDrive:/AzureData/extensions/Hello\" ;"
        ));
        assert!(commands.contains("',parameters('HelloParameters'),'"));
        assert!(commands.ends_with("\n"));
    }
}
