//! Top-level template generation.
//!
//! Both generators build the same sections (parameters, variables,
//! resources, outputs). [`StructuredGenerator`] assembles the document as a
//! serde value. [`LegacyGenerator`] renders the master network resources
//! from their own templates, swaps them into the resource list and renders
//! the embedded base template around the result. Either way the output is
//! normalised through [`serde_json::Value`], so identical inputs give
//! byte-identical documents.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tera::Context;

use crate::api::{ClusterSpec, Distro, OrchestratorType};
use crate::engine::armtype::{CONTENT_VERSION, DEPLOYMENT_TEMPLATE_SCHEMA};
use crate::engine::custom_data::{CustomDataOptions, build_custom_data};
use crate::engine::extensions::{ExtensionSource, linked_template_resources};
use crate::engine::outputs::get_template_outputs;
use crate::engine::params::{get_parameters, parameter_definitions, parameters_document};
use crate::engine::resources::generate_arm_resources;
use crate::engine::legacy::{LegacyRenderer, replace_resource};
use crate::engine::substitution::SubstitutionMode;
use crate::engine::variables::get_kubernetes_variables;
use crate::error::GeneratorError;

/// How the template document is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    #[default]
    Structured,
    Legacy,
}

/// Settings of one generation run.
pub struct GeneratorContext<'a> {
    pub generator_code: String,
    pub tool_version: String,
    pub substitution: SubstitutionMode,
    pub extensions_root_url: String,
    pub extensions: &'a dyn ExtensionSource,
}

/// The deployment template and its parameters document, pretty-printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTemplate {
    pub template: String,
    pub parameters: String,
}

pub trait TemplateGenerator {
    fn generate(
        &self,
        spec: &ClusterSpec,
        ctx: &GeneratorContext<'_>,
    ) -> Result<GeneratedTemplate, GeneratorError>;
}

pub struct StructuredGenerator;

pub struct LegacyGenerator;

/// Sections shared by both generators.
struct TemplateSections {
    parameter_values: Map<String, Value>,
    parameter_definitions: Map<String, Value>,
    variables: Map<String, Value>,
    resources: Vec<Value>,
    outputs: Map<String, Value>,
}

impl TemplateSections {
    fn build(spec: &ClusterSpec, ctx: &GeneratorContext<'_>) -> Result<Self, GeneratorError> {
        validate_orchestrator(spec)?;
        validate_distro(spec)?;

        let shared = Arc::new(spec.clone());
        let options = CustomDataOptions {
            mode: ctx.substitution,
            extensions_root_url: &ctx.extensions_root_url,
        };
        let custom_data = build_custom_data(&shared, &options)?;

        let parameter_values = get_parameters(spec, &ctx.generator_code, &ctx.tool_version);
        let parameter_definitions = parameter_definitions(spec, &parameter_values);
        let variables = get_kubernetes_variables(spec)?;

        let mut resources = generate_arm_resources(spec, &custom_data)?;
        let linked = linked_template_resources(ctx.extensions, spec, &ctx.extensions_root_url)?;
        if !linked.is_empty() {
            debug!("appending {} linked extension resources", linked.len());
        }
        resources.extend(linked);

        Ok(Self {
            parameter_values,
            parameter_definitions,
            variables,
            resources,
            outputs: get_template_outputs(spec),
        })
    }

    fn parameters_text(&self) -> Result<String, GeneratorError> {
        Ok(serde_json::to_string_pretty(&parameters_document(
            &self.parameter_values,
        ))?)
    }
}

impl TemplateGenerator for StructuredGenerator {
    fn generate(
        &self,
        spec: &ClusterSpec,
        ctx: &GeneratorContext<'_>,
    ) -> Result<GeneratedTemplate, GeneratorError> {
        let sections = TemplateSections::build(spec, ctx)?;
        let document = json!({
            "$schema": DEPLOYMENT_TEMPLATE_SCHEMA,
            "contentVersion": CONTENT_VERSION,
            "parameters": sections.parameter_definitions,
            "variables": sections.variables,
            "resources": sections.resources,
            "outputs": sections.outputs,
        });
        Ok(GeneratedTemplate {
            template: serde_json::to_string_pretty(&document)?,
            parameters: sections.parameters_text()?,
        })
    }
}

impl TemplateGenerator for LegacyGenerator {
    fn generate(
        &self,
        spec: &ClusterSpec,
        ctx: &GeneratorContext<'_>,
    ) -> Result<GeneratedTemplate, GeneratorError> {
        let mut sections = TemplateSections::build(spec, ctx)?;
        let renderer = LegacyRenderer::new(Arc::new(spec.clone()))?;
        for resource in renderer.network_resources()? {
            replace_resource(&mut sections.resources, resource)?;
        }

        let mut context = Context::new();
        context.insert("schema", DEPLOYMENT_TEMPLATE_SCHEMA);
        context.insert("content_version", CONTENT_VERSION);
        context.insert("parameters", &sections.parameter_definitions);
        context.insert("variables", &sections.variables);
        context.insert("resources", &sections.resources);
        context.insert("outputs", &sections.outputs);

        let rendered = renderer.render_document(&context)?;

        let document: Value = serde_json::from_str(&rendered)?;
        Ok(GeneratedTemplate {
            template: serde_json::to_string_pretty(&document)?,
            parameters: sections.parameters_text()?,
        })
    }
}

/// Only Kubernetes clusters have resource builders.
pub fn validate_orchestrator(spec: &ClusterSpec) -> Result<(), GeneratorError> {
    match spec.orchestrator_profile.orchestrator_type {
        OrchestratorType::Kubernetes => Ok(()),
        other => Err(GeneratorError::UnsupportedOrchestrator {
            orchestrator: other.as_str().to_string(),
        }),
    }
}

/// RHEL is only supported with SwarmMode.
pub fn validate_distro(spec: &ClusterSpec) -> Result<(), GeneratorError> {
    let orchestrator = spec.orchestrator_profile.orchestrator_type;
    if orchestrator == OrchestratorType::SwarmMode {
        return Ok(());
    }
    let master_rhel = spec
        .master_profile
        .as_ref()
        .is_some_and(|m| m.distro == Distro::Rhel);
    let agent_rhel = spec.agent_pool_profiles.iter().any(|p| p.distro == Distro::Rhel);
    if master_rhel || agent_rhel {
        return Err(GeneratorError::UnsupportedDistro {
            orchestrator: orchestrator.as_str().to_string(),
        });
    }
    Ok(())
}

/// Generates the template with the adapter selected by `mode`.
pub fn generate_template(
    spec: &ClusterSpec,
    ctx: &GeneratorContext<'_>,
    mode: GeneratorMode,
) -> Result<GeneratedTemplate, GeneratorError> {
    info!(
        "generating {:?} template for {} {}",
        mode,
        spec.orchestrator_profile.orchestrator_type.as_str(),
        spec.orchestrator_profile.orchestrator_version
    );
    match mode {
        GeneratorMode::Structured => StructuredGenerator.generate(spec, ctx),
        GeneratorMode::Legacy => LegacyGenerator.generate(spec, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AgentPoolProfile, MasterProfile};
    use crate::error::ExtensionError;

    struct Offline;

    impl ExtensionSource for Offline {
        fn fetch(&self, url: &str) -> Result<String, ExtensionError> {
            Err(ExtensionError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn context(source: &dyn ExtensionSource) -> GeneratorContext<'_> {
        GeneratorContext {
            generator_code: "aksengine".to_string(),
            tool_version: "v0.4.0".to_string(),
            substitution: SubstitutionMode::Strict,
            extensions_root_url: "https://example.test/".to_string(),
            extensions: source,
        }
    }

    fn spec() -> ClusterSpec {
        let mut spec = ClusterSpec {
            location: "westus2".to_string(),
            master_profile: Some(MasterProfile {
                count: 1,
                dns_prefix: "mycluster".to_string(),
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

    #[test]
    fn test_structured_document_shape() {
        let out = generate_template(&spec(), &context(&Offline), GeneratorMode::Structured).unwrap();
        let doc: Value = serde_json::from_str(&out.template).unwrap();
        assert_eq!(doc["$schema"], DEPLOYMENT_TEMPLATE_SCHEMA);
        assert_eq!(doc["contentVersion"], CONTENT_VERSION);
        assert!(doc["parameters"]["agentpool1Count"].is_object());
        assert!(doc["variables"]["masterVMNamePrefix"].is_string());
        assert!(!doc["resources"].as_array().unwrap().is_empty());
        assert!(doc["outputs"]["masterFQDN"].is_object());

        let params: Value = serde_json::from_str(&out.parameters).unwrap();
        assert_eq!(params["parameters"]["masterEndpointDNSNamePrefix"]["value"], "mycluster");
    }

    #[test]
    fn test_legacy_matches_structured() {
        let ctx = context(&Offline);
        let structured = generate_template(&spec(), &ctx, GeneratorMode::Structured).unwrap();
        let legacy = generate_template(&spec(), &ctx, GeneratorMode::Legacy).unwrap();
        assert_eq!(structured, legacy);
    }

    #[test]
    fn test_non_kubernetes_orchestrators_rejected() {
        for orchestrator in [OrchestratorType::Dcos, OrchestratorType::Swarm, OrchestratorType::SwarmMode] {
            let mut spec = spec();
            spec.orchestrator_profile.orchestrator_type = orchestrator;
            for mode in [GeneratorMode::Structured, GeneratorMode::Legacy] {
                assert!(matches!(
                    generate_template(&spec, &context(&Offline), mode),
                    Err(GeneratorError::UnsupportedOrchestrator { orchestrator: name })
                        if name == orchestrator.as_str()
                ));
            }
        }
        assert!(validate_orchestrator(&spec()).is_ok());
    }

    #[test]
    fn test_rhel_rejected_outside_swarm_mode() {
        let mut spec = spec();
        spec.agent_pool_profiles[0].distro = Distro::Rhel;
        assert!(matches!(
            generate_template(&spec, &context(&Offline), GeneratorMode::Structured),
            Err(GeneratorError::UnsupportedDistro { orchestrator }) if orchestrator == "Kubernetes"
        ));

        spec.orchestrator_profile.orchestrator_type = OrchestratorType::SwarmMode;
        assert!(validate_distro(&spec).is_ok());
    }
}
