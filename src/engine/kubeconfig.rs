//! Admin kubeconfig for a generated cluster.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tera::{Context, Tera};

use crate::api::ClusterSpec;
use crate::engine::assets::{KUBECONFIG_JSON, asset};
use crate::engine::network::internal_lb_ip;
use crate::error::GeneratorError;

/// API server address written into the kubeconfig. Private clusters are
/// reached through the first master (single master) or the internal load
/// balancer; everything else through the public FQDN.
fn api_server_address(spec: &ClusterSpec) -> Result<String, GeneratorError> {
    let master = spec
        .master_profile
        .as_ref()
        .ok_or(GeneratorError::MissingMasterProfile)?;
    if !spec.is_private_cluster() {
        return Ok(spec.master_fqdn());
    }
    if master.has_multiple_nodes() {
        internal_lb_ip(&master.first_consecutive_static_ip)
    } else {
        Ok(master.first_consecutive_static_ip.clone())
    }
}

/// Renders the admin kubeconfig as JSON text.
pub fn generate_kubeconfig(spec: &ClusterSpec) -> Result<String, GeneratorError> {
    let certs = spec
        .certificate_profile
        .as_ref()
        .ok_or(GeneratorError::MissingCertificateProfile)?;
    let server = api_server_address(spec)?;

    let auth_info = match &spec.aad_profile {
        None => json!({
            "client-certificate-data": STANDARD.encode(&certs.kube_config_certificate),
            "client-key-data": STANDARD.encode(&certs.kube_config_private_key),
        }),
        Some(aad) => {
            let tenant_id = if aad.tenant_id.is_empty() {
                "common"
            } else {
                aad.tenant_id.as_str()
            };
            json!({
                "auth-provider": {
                    "name": "azure",
                    "config": {
                        "environment": spec.cloud_name(),
                        "tenant-id": tenant_id,
                        "apiserver-id": aad.server_app_id,
                        "client-id": aad.client_app_id,
                    }
                }
            })
        }
    };

    let mut context = Context::new();
    context.insert("ca_certificate", &STANDARD.encode(&certs.ca_certificate));
    context.insert("server", &server);
    context.insert("cluster_name", &spec.dns_prefix());
    context.insert("auth_info", &serde_json::to_string(&auth_info)?);

    let template = asset(KUBECONFIG_JSON)?;
    Tera::one_off(template, &context, false).map_err(|e| GeneratorError::Template(e.to_string()))
}
