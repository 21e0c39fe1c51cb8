//! Error types for configuration, convergence, and numerical failures.
//!
//! Configuration errors are fatal and carry the block/step/phase indices
//! needed to locate the offending input. Convergence events (`tnew_dt < 1`,
//! self-consistent iteration cap) are recoverable and only surface here once
//! the controller has exhausted its cutback budget.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MicromechError>;

#[derive(Debug, Error)]
pub enum MicromechError {
    /// Material-law identifier not in the closed registry.
    #[error("unknown material law `{name}` for phase {phase}")]
    UnknownMaterialLaw { name: String, phase: usize },

    /// Homogenization scheme requested on a node whose law is a leaf law,
    /// or vice versa.
    #[error("material law `{name}` cannot be used as {expected} (phase {phase})")]
    LawKindMismatch {
        name: String,
        expected: &'static str,
        phase: usize,
    },

    /// Block loading-type tag outside the supported set.
    #[error("block {block}: unsupported loading kind `{kind}`")]
    UnsupportedBlockKind { block: usize, kind: String },

    /// Step generation mode outside the supported set.
    #[error("block {block}, step {step}: unsupported loading mode `{mode}`")]
    UnsupportedLoadMode {
        block: usize,
        step: usize,
        mode: String,
    },

    /// Per-component control tag that is not strain, stress, or free.
    #[error("block {block}, step {step}: invalid control tag `{tag}`")]
    InvalidControlTag {
        block: usize,
        step: usize,
        tag: String,
    },

    /// Driving file for a file-driven step could not be opened or read.
    #[error("step {step}: cannot read loading path file `{path}`: {source}")]
    PathFile {
        step: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of a driving file did not contain the expected column count.
    #[error("step {step}, line {line}: expected {expected} columns in `{path}`")]
    PathFileFormat {
        step: usize,
        line: usize,
        expected: usize,
        path: PathBuf,
    },

    /// Child volume fractions of a phase exceed unity.
    #[error("phase {phase}: child concentrations sum to {sum}, must be <= 1")]
    ConcentrationSum { phase: usize, sum: f64 },

    /// Self-consistent fixed point failed to converge within its cap.
    #[error(
        "self-consistent iteration did not converge after {iterations} iterations \
         (last relative change {residual:.3e}, tolerance {tolerance:.3e})"
    )]
    SelfConsistentDiverged {
        iterations: usize,
        residual: f64,
        tolerance: f64,
    },

    /// A reference or interaction matrix could not be inverted.
    #[error("singular matrix while computing {context}")]
    SingularMatrix { context: &'static str },

    /// Eshelby tensor requested for a morphology the built-in provider does
    /// not cover; plug in an external provider for general ellipsoids.
    #[error("no Eshelby tensor available for aspect ratios ({a1}, {a2}, {a3})")]
    EshelbyUnsupported { a1: f64, a2: f64, a3: f64 },

    /// The cutback loop hit the minimum increment fraction and the last
    /// attempt still did not converge.
    #[error(
        "block {block}, step {step}, increment {inc}: no convergence at the \
         minimum increment fraction {dn_mini}"
    )]
    IncrementTooSmall {
        block: usize,
        step: usize,
        inc: usize,
        dn_mini: f64,
    },

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure while writing the result stream.
    #[error("output error: {source}")]
    Output {
        #[from]
        source: std::io::Error,
    },
}
