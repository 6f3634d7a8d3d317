//! The result aggregate and its persistence.
//!
//! Two encodings are supported:
//! - [`ResultsFormat::Json`]: one flat JSON object
//! - [`ResultsFormat::Toml`]: a hierarchical document with a single
//!   `bpe_results` group holding one named dataset per field
//!
//! Absent fields are omitted rather than written as placeholders. Non-finite
//! numbers are stored as the tokens `"NaN"`, `"inf"` and `"-inf"` so both
//! encodings can carry them.

use std::fmt;
use std::path::Path;

use bpe_core::math::solvers::StepType;
use bpe_core::types::Verbosity;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::error::BpeError;

/// Diagnostics recorded for one outer iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Outer iteration number, starting at 1.
    pub iteration: usize,
    /// Trust radius after the search.
    #[serde(with = "float_token")]
    pub trust_radius: f64,
    /// Type of the last trial step.
    pub step_type: StepType,
    /// Length of the last trial step.
    #[serde(with = "float_token")]
    pub step_len: f64,
    /// Scale factor of the last trial step.
    #[serde(with = "float_token")]
    pub step_scale: f64,
    /// Predicted cost change of the last trial step.
    #[serde(with = "float_token")]
    pub pred_func_change: f64,
    /// Step cuts taken by the search.
    pub num_shrinks: usize,
    /// Whether the search lowered the cost.
    pub improved: bool,
}

/// Everything one estimation run produces.
///
/// Created empty at the start of a run. The evaluation wrapper increments
/// `num_evals`; the driver fills in everything else.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BpeResults {
    /// Innovations at the starting parameters.
    pub begin_innovs: Option<DVector<f64>>,
    /// Innovations at the final parameters.
    pub final_innovs: Option<DVector<f64>>,
    /// Model evaluations performed.
    pub num_evals: usize,
    /// Outer iterations performed.
    pub num_iters: usize,
    /// Parameter values: the start, then one entry per outer iteration.
    pub params: Option<Vec<DVector<f64>>>,
    /// Best cost: the start, then one entry per outer iteration.
    pub costs: Option<Vec<f64>>,
    /// Per-iteration search diagnostics.
    pub step_info: Option<Vec<StepInfo>>,
    /// Parameter correlation matrix.
    pub correlation: Option<DMatrix<f64>>,
    /// Right singular vectors of the final Jacobian, transposed.
    pub info_svd: Option<DMatrix<f64>>,
    /// Parameter covariance matrix.
    pub covariance: Option<DMatrix<f64>>,
    /// Final parameter values.
    pub final_params: Option<DVector<f64>>,
}

/// On-disk encoding of [`BpeResults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultsFormat {
    /// Flat JSON object.
    Json,
    /// Hierarchical TOML document.
    #[default]
    Toml,
}

impl ResultsFormat {
    /// Pick the encoding from a file extension: `.json` is JSON, anything else TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ResultsFormat::Json,
            _ => ResultsFormat::Toml,
        }
    }
}

impl fmt::Display for ResultsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultsFormat::Json => write!(f, "json"),
            ResultsFormat::Toml => write!(f, "toml"),
        }
    }
}

/// Group name used by the hierarchical encoding.
pub const RESULTS_GROUP: &str = "bpe_results";

impl BpeResults {
    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameter one-sigma values, `sqrt(diag(covariance))`.
    pub fn one_sigmas(&self) -> Option<DVector<f64>> {
        self.covariance
            .as_ref()
            .map(|cov| cov.diagonal().map(f64::sqrt))
    }

    /// Write the results to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path, format: ResultsFormat) -> Result<(), BpeError> {
        if let Some(folder) = path.parent() {
            if !folder.as_os_str().is_empty() && !folder.is_dir() {
                std::fs::create_dir_all(folder)?;
            }
        }

        let record = PersistedResults::from(self);
        let text = match format {
            ResultsFormat::Json => serde_json::to_string_pretty(&record)
                .map_err(|e| BpeError::serialization(e.to_string()))?,
            ResultsFormat::Toml => toml::to_string(&TomlDocument {
                bpe_results: record,
            })
            .map_err(|e| BpeError::serialization(e.to_string()))?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Write the results, logging the destination at banner verbosity.
    pub fn save_logged(
        &self,
        path: &Path,
        format: ResultsFormat,
        verbosity: Verbosity,
    ) -> Result<(), BpeError> {
        if verbosity.allows(Verbosity::BANNER) {
            info!("Saving results to: \"{}\".", path.display());
        }
        self.save(path, format)
    }

    /// Read results written by [`save`](Self::save).
    pub fn load(path: &Path, format: ResultsFormat) -> Result<Self, BpeError> {
        let text = std::fs::read_to_string(path)?;
        let record = match format {
            ResultsFormat::Json => serde_json::from_str::<PersistedResults>(&text)
                .map_err(|e| BpeError::serialization(e.to_string()))?,
            ResultsFormat::Toml => {
                toml::from_str::<TomlDocument>(&text)
                    .map_err(|e| BpeError::serialization(e.to_string()))?
                    .bpe_results
            }
        };
        record.try_into()
    }
}

// ========================================
// Persisted representation
// ========================================

/// A float that serialises non-finite values as string tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Float(f64);

impl Serialize for Float {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        float_token::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Float {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        float_token::deserialize(deserializer).map(Float)
    }
}

mod float_token {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Token(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(x) => Ok(x),
            Repr::Token(token) => match token.as_str() {
                "NaN" | "nan" => Ok(f64::NAN),
                "inf" | "+inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::custom(format!("invalid float token: {}", other))),
            },
        }
    }
}

fn vector_record(v: &DVector<f64>) -> Vec<Float> {
    v.iter().copied().map(Float).collect()
}

fn matrix_record(m: &DMatrix<f64>) -> Vec<Vec<Float>> {
    m.row_iter()
        .map(|row| row.iter().copied().map(Float).collect())
        .collect()
}

fn vector_from_record(v: Vec<Float>) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.into_iter().map(|x| x.0))
}

fn matrix_from_record(field: &str, rows: Vec<Vec<Float>>) -> Result<DMatrix<f64>, BpeError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(BpeError::serialization(format!(
            "{} rows have inconsistent lengths",
            field
        )));
    }
    Ok(DMatrix::from_row_iterator(
        nrows,
        ncols,
        rows.into_iter().flatten().map(|x| x.0),
    ))
}

/// Field-for-field mirror of [`BpeResults`] in serialisable types.
///
/// Arrays of tables come last so the TOML encoder can place them after the
/// plain values.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    begin_innovs: Option<Vec<Float>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_innovs: Option<Vec<Float>>,
    #[serde(default)]
    num_evals: usize,
    #[serde(default)]
    num_iters: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Vec<Vec<Float>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    costs: Option<Vec<Float>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation: Option<Vec<Vec<Float>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info_svd: Option<Vec<Vec<Float>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    covariance: Option<Vec<Vec<Float>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_params: Option<Vec<Float>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step_info: Option<Vec<StepInfo>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TomlDocument {
    bpe_results: PersistedResults,
}

impl From<&BpeResults> for PersistedResults {
    fn from(r: &BpeResults) -> Self {
        Self {
            begin_innovs: r.begin_innovs.as_ref().map(vector_record),
            final_innovs: r.final_innovs.as_ref().map(vector_record),
            num_evals: r.num_evals,
            num_iters: r.num_iters,
            params: r
                .params
                .as_ref()
                .map(|history| history.iter().map(vector_record).collect()),
            costs: r
                .costs
                .as_ref()
                .map(|c| c.iter().copied().map(Float).collect()),
            correlation: r.correlation.as_ref().map(matrix_record),
            info_svd: r.info_svd.as_ref().map(matrix_record),
            covariance: r.covariance.as_ref().map(matrix_record),
            final_params: r.final_params.as_ref().map(vector_record),
            step_info: r.step_info.clone(),
        }
    }
}

impl TryFrom<PersistedResults> for BpeResults {
    type Error = BpeError;

    fn try_from(p: PersistedResults) -> Result<Self, Self::Error> {
        Ok(Self {
            begin_innovs: p.begin_innovs.map(vector_from_record),
            final_innovs: p.final_innovs.map(vector_from_record),
            num_evals: p.num_evals,
            num_iters: p.num_iters,
            params: p
                .params
                .map(|history| history.into_iter().map(vector_from_record).collect()),
            costs: p.costs.map(|c| c.into_iter().map(|x| x.0).collect()),
            step_info: p.step_info,
            correlation: p
                .correlation
                .map(|m| matrix_from_record("correlation", m))
                .transpose()?,
            info_svd: p
                .info_svd
                .map(|m| matrix_from_record("info_svd", m))
                .transpose()?,
            covariance: p
                .covariance
                .map(|m| matrix_from_record("covariance", m))
                .transpose()?,
            final_params: p.final_params.map(vector_from_record),
        })
    }
}
