//! Estimation options.
//!
//! Two layers:
//! - [`EstimatorSettings`]: plain tunables, loadable from a TOML file and
//!   overridable from `BPE_*` environment variables
//! - [`OptiOpts`]: a complete, immutable set of options for one run (model,
//!   argument bundles, parameter list, settings, verbosity), assembled through
//!   [`OptiOptsBuilder`]
//!
//! Priority when building settings (highest to lowest):
//! 1. CLI arguments (applied by the caller)
//! 2. Environment variables
//! 3. Settings file
//! 4. Default values

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bpe_core::traits::EstimationModel;
use bpe_core::types::{param_names, ConfigError, OptiParam, Verbosity};
use serde::{Deserialize, Serialize};

/// Normalise a method string: lowercase, spaces and hyphens become underscores.
fn method_key(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Finite-difference slope method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeMethod {
    /// Forward differences, one probe per parameter.
    #[default]
    OneSided,
    /// Central differences, two probes per parameter.
    TwoSided,
}

impl FromStr for SlopeMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match method_key(s).as_str() {
            "one_sided" => Ok(SlopeMethod::OneSided),
            "two_sided" => Ok(SlopeMethod::TwoSided),
            _ => Err(ConfigError::UnknownSlopeMethod(s.to_string())),
        }
    }
}

impl SlopeMethod {
    /// Whether central differences are used.
    pub fn is_two_sided(self) -> bool {
        matches!(self, SlopeMethod::TwoSided)
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            SlopeMethod::OneSided => "one_sided",
            SlopeMethod::TwoSided => "two_sided",
        }
    }
}

impl fmt::Display for SlopeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Double-dogleg trust-region search.
    #[default]
    TrustRegion,
    /// Levenberg-Marquardt search with damping `1 / trust_radius`.
    LevenbergMarquardt,
}

impl FromStr for SearchMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match method_key(s).as_str() {
            "trust_region" => Ok(SearchMethod::TrustRegion),
            "levenberg_marquardt" => Ok(SearchMethod::LevenbergMarquardt),
            _ => Err(ConfigError::UnknownSearchMethod(s.to_string())),
        }
    }
}

impl SearchMethod {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMethod::TrustRegion => "trust_region",
            SearchMethod::LevenbergMarquardt => "levenberg_marquardt",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn deserialize_slope_method<'de, D>(deserializer: D) -> Result<SlopeMethod, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    SlopeMethod::from_str(&s).map_err(serde::de::Error::custom)
}

fn deserialize_search_method<'de, D>(deserializer: D) -> Result<SearchMethod, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    SearchMethod::from_str(&s).map_err(serde::de::Error::custom)
}

/// Tunable estimator settings.
///
/// # Examples
///
/// ```
/// use bpe_optimiser::{EstimatorSettings, SearchMethod};
///
/// let settings: EstimatorSettings = toml::from_str(r#"
///     search_method = "levenberg marquardt"
///     max_iters = 25
/// "#).unwrap();
///
/// assert_eq!(settings.search_method, SearchMethod::LevenbergMarquardt);
/// assert_eq!(settings.max_iters, 25);
/// assert_eq!(settings.step_limit, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Finite-difference slope method.
    #[serde(deserialize_with = "deserialize_slope_method")]
    pub slope_method: SlopeMethod,
    /// Maximum-likelihood mode.
    pub is_max_like: bool,
    /// Step search strategy.
    #[serde(deserialize_with = "deserialize_search_method")]
    pub search_method: SearchMethod,
    /// Outer iteration budget.
    pub max_iters: usize,
    /// Convergence tolerance on the gradient cosine.
    pub tol_cosmax_grad: f64,
    /// Convergence tolerance on the Gauss-Newton step length.
    pub tol_delta_step: f64,
    /// Convergence tolerance on the predicted cost change.
    pub tol_delta_cost: f64,
    /// Maximum step cuts per trust-region search.
    pub step_limit: usize,
    /// Relaxed Newton bias for the double dogleg.
    pub x_bias: f64,
    /// Trust radius growth factor.
    pub grow_radius: f64,
    /// Trust radius shrink factor.
    pub shrink_radius: f64,
    /// Initial trust radius.
    pub trust_radius: f64,
    /// Work in parameters scaled by their typical values.
    pub normalized: bool,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            slope_method: SlopeMethod::OneSided,
            is_max_like: false,
            search_method: SearchMethod::TrustRegion,
            max_iters: 10,
            tol_cosmax_grad: 1e-4,
            tol_delta_step: 1e-20,
            tol_delta_cost: 1e-20,
            step_limit: 5,
            x_bias: 0.8,
            grow_radius: 2.0,
            shrink_radius: 0.5,
            trust_radius: 1.0,
            normalized: false,
        }
    }
}

/// Environment variables read by [`EstimatorSettings::apply_env`].
pub const ENV_VARS: &[&str] = &[
    "BPE_SLOPE_METHOD",
    "BPE_IS_MAX_LIKE",
    "BPE_SEARCH_METHOD",
    "BPE_MAX_ITERS",
    "BPE_TOL_COSMAX_GRAD",
    "BPE_TOL_DELTA_STEP",
    "BPE_TOL_DELTA_COST",
    "BPE_STEP_LIMIT",
    "BPE_X_BIAS",
    "BPE_GROW_RADIUS",
    "BPE_SHRINK_RADIUS",
    "BPE_TRUST_RADIUS",
    "BPE_NORMALIZED",
];

fn env_value<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid_setting(key, &raw, "could not be parsed")),
        None => Ok(None),
    }
}

fn env_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    lookup(key).map(|raw| matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

impl EstimatorSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: EstimatorSettings = toml::from_str(&content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overridden by `BPE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override fields from `BPE_*` environment variables that are set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable lookup.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("BPE_SLOPE_METHOD") {
            self.slope_method = raw.parse()?;
        }
        if let Some(flag) = env_flag(&lookup, "BPE_IS_MAX_LIKE") {
            self.is_max_like = flag;
        }
        if let Some(raw) = lookup("BPE_SEARCH_METHOD") {
            self.search_method = raw.parse()?;
        }
        if let Some(v) = env_value(&lookup, "BPE_MAX_ITERS")? {
            self.max_iters = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_TOL_COSMAX_GRAD")? {
            self.tol_cosmax_grad = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_TOL_DELTA_STEP")? {
            self.tol_delta_step = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_TOL_DELTA_COST")? {
            self.tol_delta_cost = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_STEP_LIMIT")? {
            self.step_limit = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_X_BIAS")? {
            self.x_bias = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_GROW_RADIUS")? {
            self.grow_radius = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_SHRINK_RADIUS")? {
            self.shrink_radius = v;
        }
        if let Some(v) = env_value(&lookup, "BPE_TRUST_RADIUS")? {
            self.trust_radius = v;
        }
        if let Some(flag) = env_flag(&lookup, "BPE_NORMALIZED") {
            self.normalized = flag;
        }
        Ok(())
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iters == 0 {
            return Err(ConfigError::invalid_setting(
                "max_iters",
                self.max_iters,
                "must be at least 1",
            ));
        }
        if self.step_limit == 0 {
            return Err(ConfigError::invalid_setting(
                "step_limit",
                self.step_limit,
                "must be at least 1",
            ));
        }
        for (name, tol) in [
            ("tol_cosmax_grad", self.tol_cosmax_grad),
            ("tol_delta_step", self.tol_delta_step),
            ("tol_delta_cost", self.tol_delta_cost),
        ] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(ConfigError::invalid_setting(
                    name,
                    tol,
                    "must be finite and non-negative",
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.x_bias) {
            return Err(ConfigError::invalid_setting(
                "x_bias",
                self.x_bias,
                "must be within [0, 1]",
            ));
        }
        if !self.grow_radius.is_finite() || self.grow_radius <= 1.0 {
            return Err(ConfigError::invalid_setting(
                "grow_radius",
                self.grow_radius,
                "must be finite and greater than 1",
            ));
        }
        if !(self.shrink_radius > 0.0 && self.shrink_radius < 1.0) {
            return Err(ConfigError::invalid_setting(
                "shrink_radius",
                self.shrink_radius,
                "must be within (0, 1)",
            ));
        }
        if !self.trust_radius.is_finite() || self.trust_radius <= 0.0 {
            return Err(ConfigError::invalid_setting(
                "trust_radius",
                self.trust_radius,
                "must be finite and positive",
            ));
        }
        Ok(())
    }

    /// Set the search method.
    pub fn with_search_method(mut self, search_method: SearchMethod) -> Self {
        self.search_method = search_method;
        self
    }

    /// Set the slope method.
    pub fn with_slope_method(mut self, slope_method: SlopeMethod) -> Self {
        self.slope_method = slope_method;
        self
    }

    /// Set the outer iteration budget.
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the initial trust radius.
    pub fn with_trust_radius(mut self, trust_radius: f64) -> Self {
        self.trust_radius = trust_radius;
        self
    }

    /// Set typical-value normalisation.
    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }
}

/// Build settings from an optional file plus the environment.
pub fn build_settings(path: Option<&Path>) -> Result<EstimatorSettings, ConfigError> {
    let mut settings = match path {
        Some(path) => EstimatorSettings::from_file(path)?,
        None => EstimatorSettings::default(),
    };
    settings.apply_env()?;
    settings.validate()?;
    Ok(settings)
}

/// Check a parameter list: non-empty, unique names, usable values.
///
/// Typical scales must be finite. They must also be non-zero when
/// `normalized` is set, since working coordinates divide by them.
pub fn validate_params(params: &[OptiParam], normalized: bool) -> Result<(), ConfigError> {
    if params.is_empty() {
        return Err(ConfigError::EmptyParameters);
    }
    let mut seen = HashSet::with_capacity(params.len());
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(ConfigError::DuplicateParameter {
                name: param.name.clone(),
            });
        }
        if !param.typical.is_finite() || (normalized && param.typical == 0.0) {
            return Err(ConfigError::InvalidTypical {
                name: param.name.clone(),
                value: param.typical,
            });
        }
        if !param.best.is_finite() {
            return Err(ConfigError::NonFiniteParameter {
                name: param.name.clone(),
                value: param.best,
            });
        }
    }
    Ok(())
}

/// Complete options for one estimation run.
///
/// Immutable once built. Use [`into_builder`](Self::into_builder) to adjust
/// options between runs.
pub struct OptiOpts<M: EstimationModel> {
    model: M,
    model_args: M::Args,
    cost_args: M::CostArgs,
    output_loc: Option<PathBuf>,
    params: Vec<OptiParam>,
    names: Vec<String>,
    settings: EstimatorSettings,
    verbosity: Verbosity,
}

impl<M: EstimationModel> OptiOpts<M> {
    /// Start building options around a model.
    pub fn builder(model: M) -> OptiOptsBuilder<M> {
        OptiOptsBuilder::new(model)
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Caller's model argument bundle. Runs clone it before mutating.
    pub fn model_args(&self) -> &M::Args {
        &self.model_args
    }

    /// Cost argument bundle.
    pub fn cost_args(&self) -> &M::CostArgs {
        &self.cost_args
    }

    /// Where results are persisted, if anywhere.
    pub fn output_loc(&self) -> Option<&Path> {
        self.output_loc.as_deref()
    }

    /// Ordered parameter list.
    pub fn params(&self) -> &[OptiParam] {
        &self.params
    }

    /// Parameter names, in list order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Tunable settings.
    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Reopen the options for modification.
    pub fn into_builder(self) -> OptiOptsBuilder<M> {
        OptiOptsBuilder {
            model: self.model,
            model_args: Some(self.model_args),
            cost_args: Some(self.cost_args),
            output_loc: self.output_loc,
            params: self.params,
            settings: self.settings,
            verbosity: self.verbosity,
        }
    }
}

/// Builder for [`OptiOpts`].
///
/// # Examples
///
/// ```
/// use bpe_core::traits::ClosureModel;
/// use bpe_core::types::OptiParam;
/// use bpe_optimiser::{OptiOpts, SearchMethod};
/// use nalgebra::DVector;
///
/// let model = ClosureModel::builder()
///     .model(|a: &f64| *a)
///     .cost(|o: &f64, t: &f64| DVector::from_element(1, o - t))
///     .getter(|_: &[String], a: &f64| DVector::from_element(1, *a))
///     .setter(|_: &[String], v: &DVector<f64>, a: &mut f64| *a = v[0])
///     .build()
///     .unwrap();
///
/// let opts = OptiOpts::builder(model)
///     .model_args(1.0)
///     .cost_args(2.0)
///     .param(OptiParam::new("a"))
///     .search_method(SearchMethod::LevenbergMarquardt)
///     .build()
///     .unwrap();
///
/// assert_eq!(opts.param_names(), ["a"]);
/// ```
pub struct OptiOptsBuilder<M: EstimationModel> {
    model: M,
    model_args: Option<M::Args>,
    cost_args: Option<M::CostArgs>,
    output_loc: Option<PathBuf>,
    params: Vec<OptiParam>,
    settings: EstimatorSettings,
    verbosity: Verbosity,
}

impl<M: EstimationModel> OptiOptsBuilder<M> {
    /// Create a builder with default settings and verbosity.
    pub fn new(model: M) -> Self {
        Self {
            model,
            model_args: None,
            cost_args: None,
            output_loc: None,
            params: Vec::new(),
            settings: EstimatorSettings::default(),
            verbosity: Verbosity::default(),
        }
    }

    /// Set the model argument bundle.
    pub fn model_args(mut self, args: M::Args) -> Self {
        self.model_args = Some(args);
        self
    }

    /// Set the cost argument bundle.
    pub fn cost_args(mut self, args: M::CostArgs) -> Self {
        self.cost_args = Some(args);
        self
    }

    /// Persist results here at the end of a run. An empty path disables saving.
    pub fn output_loc(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.output_loc = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    /// Replace the parameter list.
    pub fn params(mut self, params: Vec<OptiParam>) -> Self {
        self.params = params;
        self
    }

    /// Append a parameter.
    pub fn param(mut self, param: OptiParam) -> Self {
        self.params.push(param);
        self
    }

    /// Replace all tunable settings.
    pub fn settings(mut self, settings: EstimatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the search method.
    pub fn search_method(mut self, search_method: SearchMethod) -> Self {
        self.settings.search_method = search_method;
        self
    }

    /// Set the slope method.
    pub fn slope_method(mut self, slope_method: SlopeMethod) -> Self {
        self.settings.slope_method = slope_method;
        self
    }

    /// Set the outer iteration budget.
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.settings.max_iters = max_iters;
        self
    }

    /// Set the verbosity.
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Validate and assemble the options.
    pub fn build(self) -> Result<OptiOpts<M>, ConfigError> {
        let model_args = self
            .model_args
            .ok_or_else(|| ConfigError::missing_args("model_args"))?;
        let cost_args = self
            .cost_args
            .ok_or_else(|| ConfigError::missing_args("cost_args"))?;
        validate_params(&self.params, self.settings.normalized)?;
        self.settings.validate()?;

        Ok(OptiOpts {
            model: self.model,
            model_args,
            cost_args,
            output_loc: self.output_loc,
            names: param_names(&self.params),
            params: self.params,
            settings: self.settings,
            verbosity: self.verbosity,
        })
    }
}
