//! Decoder configuration.

use crate::error::{Diagnostic, Error, Result};

/// How recoverable irregularities are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strictness {
    /// Record a [`Diagnostic`] and keep decoding.
    #[default]
    Lenient,
    /// Fail with [`Error::Rejected`].
    Strict,
}

/// Options shared by the FBX and BAM decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeOptions {
    pub strictness: Strictness,
    /// Compare the 23-byte FBX preamble against the binary FBX signature.
    pub validate_fbx_magic: bool,
    /// Cut string properties at their first NUL byte. Node names are always cut.
    pub trim_strings_at_nul: bool,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            strictness: Strictness::Lenient,
            validate_fbx_magic: true,
            trim_strings_at_nul: false,
        }
    }
}

impl DecodeOptions {
    /// Default options with strict handling of diagnostics.
    pub fn strict() -> DecodeOptions {
        DecodeOptions::default().with_strictness(Strictness::Strict)
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> DecodeOptions {
        self.strictness = strictness;
        self
    }

    pub fn with_fbx_magic_validation(mut self, validate: bool) -> DecodeOptions {
        self.validate_fbx_magic = validate;
        self
    }

    pub fn with_nul_trimmed_strings(mut self, trim: bool) -> DecodeOptions {
        self.trim_strings_at_nul = trim;
        self
    }

    /// Routes a diagnostic according to the configured strictness.
    pub(crate) fn report(&self, diagnostic: Diagnostic, sink: &mut Vec<Diagnostic>) -> Result<()> {
        match self.strictness {
            Strictness::Strict => Err(Error::Rejected(diagnostic)),
            Strictness::Lenient => {
                tracing::warn!("{}", diagnostic);
                sink.push(diagnostic);
                Ok(())
            }
        }
    }
}
