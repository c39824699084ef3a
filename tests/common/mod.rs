#![allow(dead_code)]

use armgen::engine::SubstitutionMode;
use armgen::error::ExtensionError;
use armgen::{ClusterSpec, ExtensionSource, GeneratorContext, parse_api_model};
use std::collections::HashMap;
use std::path::PathBuf;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_spec() -> ClusterSpec {
    let text = std::fs::read_to_string(fixture_path("apimodel.json")).unwrap();
    parse_api_model(&text).unwrap()
}

/// Serves extension files from memory; anything else is a 404.
#[derive(Default)]
pub struct InMemorySource {
    pub files: HashMap<String, String>,
}

impl InMemorySource {
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.files.insert(url.to_string(), body.to_string());
        self
    }
}

impl ExtensionSource for InMemorySource {
    fn fetch(&self, url: &str) -> Result<String, ExtensionError> {
        self.files.get(url).cloned().ok_or_else(|| ExtensionError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

pub const ROOT_URL: &str = "https://extensions.example.test/";

pub fn context(source: &dyn ExtensionSource) -> GeneratorContext<'_> {
    GeneratorContext {
        generator_code: "aksengine".to_string(),
        tool_version: "v0.4.0".to_string(),
        substitution: SubstitutionMode::Strict,
        extensions_root_url: ROOT_URL.to_string(),
        extensions: source,
    }
}
