//! Codec configuration, loadable from TOML.

use crate::{
    schema::EntitySchema,
    wire::{DecodeContext, EncodeContext},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid codec config: {0}")]
    Parse(#[from] toml::de::Error),
}

///
/// CodecConfig
///
/// Pass-level codec options. A missing `version` means the latest version
/// of whichever schema the context is built for.
///
/// ```toml
/// version = 1
/// skip_defaults = true
/// references = false
/// ```
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub version: Option<u32>,
    pub skip_defaults: bool,
    pub references: bool,
}

impl CodecConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    #[must_use]
    pub fn version_for(&self, schema: &EntitySchema) -> u32 {
        self.version.unwrap_or_else(|| schema.latest_version())
    }

    #[must_use]
    pub fn encode_context(&self, schema: &EntitySchema) -> EncodeContext {
        let ctx = EncodeContext::new(self.version_for(schema)).skip_defaults(self.skip_defaults);

        if self.references {
            ctx.with_references()
        } else {
            ctx
        }
    }

    #[must_use]
    pub fn decode_context(&self, schema: &EntitySchema) -> DecodeContext {
        let ctx = DecodeContext::new(self.version_for(schema));

        if self.references {
            ctx.with_references()
        } else {
            ctx
        }
    }
}

///
/// TESTS
///
