use colored::Colorize;
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ClusterSpec;
use crate::config::types::Config;
use crate::engine::{
    ExtensionSource, GeneratorContext, GeneratorMode, HttpExtensionSource, generate_kubeconfig,
    generate_template,
};
use crate::error::GeneratorError;
use crate::handlers::utils::load_api_model;

pub const TEMPLATE_FILE_NAME: &str = "azuredeploy.json";
pub const PARAMETERS_FILE_NAME: &str = "azuredeploy.parameters.json";
pub const KUBECONFIG_DIR: &str = "kubeconfig";

/// One output document, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

fn compact(text: &str) -> Result<String, GeneratorError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(serde_json::to_string(&value)?)
}

/// Builds every file `generate` writes for `spec`.
pub fn generate_files(
    spec: &ClusterSpec,
    config: &Config,
    mode: GeneratorMode,
    extensions: &dyn ExtensionSource,
) -> crate::Result<Vec<GeneratedFile>> {
    let ctx = GeneratorContext {
        generator_code: config.generator.generator_code.clone(),
        tool_version: config.generator.tool_version.clone(),
        substitution: config.generator.substitution,
        extensions_root_url: config.extensions.root_url.clone(),
        extensions,
    };
    let generated = generate_template(spec, &ctx, mode)?;

    let layout = |text: String| -> Result<String, GeneratorError> {
        if config.output.pretty {
            Ok(text)
        } else {
            compact(&text)
        }
    };

    let mut files = Vec::new();
    if !config.output.parameters_only {
        files.push(GeneratedFile {
            path: PathBuf::from(TEMPLATE_FILE_NAME),
            content: layout(generated.template)?,
        });
    }
    files.push(GeneratedFile {
        path: PathBuf::from(PARAMETERS_FILE_NAME),
        content: layout(generated.parameters)?,
    });

    if spec.certificate_profile.is_some() && !config.output.parameters_only {
        files.push(GeneratedFile {
            path: Path::new(KUBECONFIG_DIR).join(format!("kubeconfig.{}.json", spec.location)),
            content: generate_kubeconfig(spec)?,
        });
    }
    Ok(files)
}

/// Fails with `AlreadyExists` on the first target already on disk.
fn ensure_absent(dir: &Path, files: &[GeneratedFile]) -> crate::Result<()> {
    if let Some(target) = files.iter().map(|f| dir.join(&f.path)).find(|t| t.exists()) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        )
        .into());
    }
    Ok(())
}

fn write_file(dir: &Path, file: &GeneratedFile) -> crate::Result<PathBuf> {
    let target = dir.join(&file.path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, &file.content)?;
    debug!("wrote {} bytes to {}", file.content.len(), target.display());
    Ok(target)
}

/// Writes every file under `dir`. Without `overwrite`, nothing is written
/// unless all targets are absent.
fn write_files(dir: &Path, files: &[GeneratedFile], overwrite: bool) -> crate::Result<Vec<PathBuf>> {
    if !overwrite {
        ensure_absent(dir, files)?;
    }
    files.iter().map(|file| write_file(dir, file)).collect()
}

pub fn handle_generate(
    apimodel: PathBuf,
    output_dir: Option<PathBuf>,
    mode: Option<GeneratorMode>,
    dry_run: bool,
    config: &Config,
) -> crate::Result<()> {
    let spec = load_api_model(&apimodel)?;
    let mode = mode.unwrap_or(config.generator.mode);

    let timeout = config.extensions.timeout_secs.map(Duration::from_secs);
    let extensions = HttpExtensionSource::new(timeout)?;
    let files = generate_files(&spec, config, mode, &extensions)?;

    if dry_run {
        for file in &files {
            println!("--- {} (dry run) ---", file.path.display());
            println!("{}", file.content);
        }
        return Ok(());
    }

    let dir = output_dir.unwrap_or_else(|| config.output.directory.clone());
    info!("writing {} files to {}", files.len(), dir.display());
    for target in write_files(&dir, &files, config.output.overwrite)? {
        println!("{} {}", "wrote".green().bold(), target.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AgentPoolProfile, CertificateProfile, MasterProfile};
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
                count: 1,
                ..Default::default()
            }],
            ..Default::default()
        };
        spec.orchestrator_profile.orchestrator_version = "1.16.4".to_string();
        spec
    }

    fn names(files: &[GeneratedFile]) -> Vec<String> {
        files.iter().map(|f| f.path.display().to_string()).collect()
    }

    #[test]
    fn test_files_without_certificates() {
        let files = generate_files(&spec(), &Config::default(), GeneratorMode::Structured, &Offline).unwrap();
        assert_eq!(names(&files), vec![TEMPLATE_FILE_NAME, PARAMETERS_FILE_NAME]);
        assert!(files[0].content.contains("\n  \"$schema\""));
    }

    #[test]
    fn test_kubeconfig_written_with_certificates() {
        let mut spec = spec();
        spec.certificate_profile = Some(CertificateProfile {
            ca_certificate: "ca".to_string(),
            kube_config_certificate: "cert".to_string(),
            kube_config_private_key: "key".to_string(),
            ..Default::default()
        });
        let files = generate_files(&spec, &Config::default(), GeneratorMode::Structured, &Offline).unwrap();
        let kubeconfig = Path::new(KUBECONFIG_DIR).join("kubeconfig.westus2.json");
        assert_eq!(files.len(), 3);
        assert_eq!(files[2].path, kubeconfig);
    }

    #[test]
    fn test_parameters_only_compact() {
        let mut config = Config::default();
        config.output.parameters_only = true;
        config.output.pretty = false;
        let files = generate_files(&spec(), &config, GeneratorMode::Legacy, &Offline).unwrap();
        assert_eq!(names(&files), vec![PARAMETERS_FILE_NAME]);
        assert!(!files[0].content.contains('\n'));
    }

    #[test]
    fn test_write_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = GeneratedFile {
            path: Path::new(KUBECONFIG_DIR).join("kubeconfig.westus2.json"),
            content: "{}".to_string(),
        };
        let written = write_files(dir.path(), std::slice::from_ref(&file), true).unwrap();
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "{}");
        assert!(matches!(
            write_files(dir.path(), &[file], false),
            Err(crate::ArmgenError::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists
        ));
    }

    #[test]
    fn test_existing_target_blocks_every_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PARAMETERS_FILE_NAME), "STALE").unwrap();
        let files = vec![
            GeneratedFile {
                path: PathBuf::from(TEMPLATE_FILE_NAME),
                content: "{}".to_string(),
            },
            GeneratedFile {
                path: PathBuf::from(PARAMETERS_FILE_NAME),
                content: "{}".to_string(),
            },
        ];
        assert!(write_files(dir.path(), &files, false).is_err());
        assert!(!dir.path().join(TEMPLATE_FILE_NAME).exists());
        assert_eq!(
            fs::read_to_string(dir.path().join(PARAMETERS_FILE_NAME)).unwrap(),
            "STALE"
        );

        write_files(dir.path(), &files, true).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(PARAMETERS_FILE_NAME)).unwrap(), "{}");
    }
}
