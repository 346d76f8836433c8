//! Model editor type definitions
//!
//! Supporting types for the modeled-method views pushed to the presentation surface.

use serde::{Deserialize, Serialize};

/// One external API call site subject to modeling
///
/// Enumerated once per editing session and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalApiUsage {
    /// Stable unique key, e.g. `org.example.Client#send(String)`
    pub signature: String,
    /// Logical package the call site belongs to
    pub package_name: String,
    /// Library (jar, module, crate) providing the API
    pub library: String,
    /// Whether the analysis already supports this API without a model
    pub supported: bool,
    /// Number of call sites in the analysed source
    pub usage_count: usize,
}

/// Kind of model assigned to a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeledMethodKind {
    None,
    Source,
    Sink,
    Summary,
    Neutral,
}

/// Where a model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Manual,
    AiGenerated,
    DfGenerated,
}

/// Current model for one signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeledMethod {
    pub signature: String,
    pub kind: ModeledMethodKind,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    pub provenance: Provenance,
}

impl ModeledMethod {
    /// Explicit "unmodeled" entry
    pub fn none(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            kind: ModeledMethodKind::None,
            input: String::new(),
            output: String::new(),
            provenance: Provenance::Manual,
        }
    }

    pub fn new(
        signature: impl Into<String>,
        kind: ModeledMethodKind,
        input: impl Into<String>,
        output: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            signature: signature.into(),
            kind,
            input: input.into(),
            output: output.into(),
            provenance,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == ModeledMethodKind::None
    }
}

/// Model editor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Model the APIs an application calls
    #[default]
    Application,
    /// Model the public surface of a library
    Framework,
}
