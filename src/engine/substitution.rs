//! Splices rendered manifests into a parent cloud-init document.
//!
//! Each enabled entry of a settings table is loaded (inline base64 payload
//! first, embedded asset otherwise), rendered with tera when it carries
//! template syntax, gzipped, base64 encoded and written out as a
//! `write_files` block. The concatenated blocks replace a placeholder line
//! in the parent.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as _;
use tera::{Context, Tera};

use crate::engine::accessors::TemplateAccessors;
use crate::engine::artifacts::{ComponentFileSpec, build_config_string, gzip_base64};
use crate::engine::assets::{asset, versioned_asset_path};
use crate::error::SubstitutionError;

/// What to do when one entry cannot be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubstitutionMode {
    /// Fail the whole substitution.
    #[default]
    Strict,
    /// Log the failure and leave the entry out.
    BestEffort,
}

/// Where the fragments live and which placeholder they replace.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionRequest<'a> {
    pub source_path: &'a str,
    pub placeholder: &'a str,
    /// Kubernetes `major.minor`, used to pick version specific assets.
    pub major_minor: &'a str,
    pub mode: SubstitutionMode,
}

/// Flattens a tera error and its causes into one line.
pub(crate) fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_template(content: &str) -> bool {
    content.contains("{{") || content.contains("{%")
}

/// Renders `content` with the functions of `accessors` and the variables in
/// `context`.
pub fn render(
    name: &str,
    content: &str,
    accessors: TemplateAccessors,
    context: &Context,
) -> Result<String, SubstitutionError> {
    let render_error = |err: tera::Error| SubstitutionError::Render {
        name: name.to_string(),
        message: describe(&err),
    };
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    accessors.register(&mut tera);
    tera.add_raw_template(name, content).map_err(render_error)?;
    tera.render(name, context).map_err(render_error)
}

fn decode_inline(name: &str, data: &str) -> Result<String, SubstitutionError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|source| SubstitutionError::Base64Decode {
            name: name.to_string(),
            source,
        })?;
    String::from_utf8(bytes).map_err(|_| SubstitutionError::Utf8 {
        name: name.to_string(),
    })
}

/// Produces the `write_files` block of one entry.
fn config_block(
    name: &str,
    entry: &ComponentFileSpec,
    request: &SubstitutionRequest<'_>,
    accessors: TemplateAccessors,
) -> Result<String, SubstitutionError> {
    let content = if !entry.base64_data.is_empty() {
        decode_inline(name, &entry.base64_data)?
    } else if let Some(file) = &entry.source_file {
        let path = versioned_asset_path(request.source_path, request.major_minor, file);
        asset(&path)?.to_string()
    } else {
        return Err(SubstitutionError::AssetNotFound {
            path: format!("{}/{}", request.source_path, name),
        });
    };

    let rendered = if is_template(&content) {
        render(name, &content, accessors, &Context::new())?
    } else {
        content
    };
    let normalized = rendered.replace("\r\n", "\n");
    let encoded = gzip_base64(&normalized)?;
    Ok(build_config_string(
        &encoded,
        entry.destination_path,
        &entry.destination_file,
    ))
}

/// Replaces `request.placeholder` in `template` with the blocks of every
/// enabled entry, in table order.
pub fn substitute<F>(
    template: &str,
    specs: &BTreeMap<&'static str, ComponentFileSpec>,
    request: &SubstitutionRequest<'_>,
    accessors_for: F,
) -> Result<String, SubstitutionError>
where
    F: Fn(&str) -> TemplateAccessors,
{
    let mut blocks = String::new();
    for (name, entry) in specs.iter().filter(|(_, e)| e.enabled) {
        match config_block(name, entry, request, accessors_for(name)) {
            Ok(block) => {
                debug!("embedding {} at {}/{}", name, entry.destination_path, entry.destination_file);
                blocks.push_str(&block);
            }
            Err(err) if request.mode == SubstitutionMode::BestEffort => {
                warn!("skipping {}: {}", name, err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(template.replace(request.placeholder, &blocks))
}
