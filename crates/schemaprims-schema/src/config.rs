/// Default bound on nested schema evaluations for a single validation call.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Controls validation engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Maximum number of schema nodes active on one evaluation path.
    pub max_depth: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Controls schema registry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, object schemas without `additionalProperties` reject extra keys.
    pub strict_mode: bool,
    /// When true, validating against an unknown name returns `SchemaError::NoSchema`.
    pub fail_on_missing_schema: bool,
    /// Maximum number of schemas loaded from a directory.
    pub max_schemas_from_directory: usize,
    /// Maximum bytes allowed per schema file loaded from a directory.
    pub max_schema_file_size: usize,
    /// Depth bound applied to every validator in the registry.
    pub max_depth: usize,
}

impl RegistryConfig {
    pub(crate) fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            max_depth: self.max_depth,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            fail_on_missing_schema: false,
            max_schemas_from_directory: 256,
            max_schema_file_size: 256 * 1024,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
