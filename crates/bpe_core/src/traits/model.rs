//! Four-function model interface.
//!
//! # Example
//!
//! ```
//! use bpe_core::traits::EstimationModel;
//! use nalgebra::DVector;
//!
//! // y = gain * x, fitted against fixed measurements
//! struct Line;
//!
//! #[derive(Clone)]
//! struct LineArgs {
//!     gain: f64,
//!     x: Vec<f64>,
//! }
//!
//! impl EstimationModel for Line {
//!     type Args = LineArgs;
//!     type CostArgs = Vec<f64>;
//!     type Output = Vec<f64>;
//!
//!     fn simulate(&self, args: &LineArgs) -> Vec<f64> {
//!         args.x.iter().map(|x| args.gain * x).collect()
//!     }
//!
//!     fn innovations(&self, output: &Vec<f64>, measured: &Vec<f64>) -> DVector<f64> {
//!         DVector::from_iterator(output.len(), output.iter().zip(measured).map(|(s, m)| s - m))
//!     }
//!
//!     fn get_params(&self, _names: &[String], args: &LineArgs) -> DVector<f64> {
//!         DVector::from_element(1, args.gain)
//!     }
//!
//!     fn set_params(&self, _names: &[String], values: &DVector<f64>, args: &mut LineArgs) {
//!         args.gain = values[0];
//!     }
//! }
//!
//! let args = LineArgs { gain: 2.0, x: vec![1.0, 2.0] };
//! let out = Line.simulate(&args);
//! let innovs = Line.innovations(&out, &vec![1.0, 2.0]);
//! assert_eq!(innovs.as_slice(), &[1.0, 2.0]);
//! ```

use nalgebra::DVector;

use crate::types::ConfigError;

/// A system whose parameters can be estimated.
///
/// `Args` is the mutable state the setter writes into. The estimator clones
/// it once at the start of each run and only ever mutates the clone, so the
/// caller's bundle is left untouched.
pub trait EstimationModel {
    /// Model argument bundle.
    type Args: Clone;
    /// Cost argument bundle, typically the reference data.
    type CostArgs;
    /// Opaque simulation output, consumed only by [`innovations`](Self::innovations).
    type Output;

    /// Run the model.
    fn simulate(&self, args: &Self::Args) -> Self::Output;

    /// Residuals between the simulation and the reference data.
    ///
    /// Non-finite entries are allowed; the estimator zeroes them.
    fn innovations(&self, output: &Self::Output, cost_args: &Self::CostArgs) -> DVector<f64>;

    /// Read the named parameters, in `names` order.
    fn get_params(&self, names: &[String], args: &Self::Args) -> DVector<f64>;

    /// Write the named parameters, in `names` order.
    fn set_params(&self, names: &[String], values: &DVector<f64>, args: &mut Self::Args);
}

type SimulateFn<A, O> = Box<dyn Fn(&A) -> O>;
type CostFn<O, C> = Box<dyn Fn(&O, &C) -> DVector<f64>>;
type GetterFn<A> = Box<dyn Fn(&[String], &A) -> DVector<f64>>;
type SetterFn<A> = Box<dyn Fn(&[String], &DVector<f64>, &mut A)>;

/// An [`EstimationModel`] assembled from four closures.
///
/// # Example
///
/// ```
/// use bpe_core::traits::{ClosureModel, EstimationModel};
/// use nalgebra::DVector;
///
/// let model = ClosureModel::<f64, f64, f64>::builder()
///     .model(|a: &f64| 2.0 * a)
///     .cost(|out: &f64, target: &f64| DVector::from_element(1, out - target))
///     .getter(|_: &[String], a: &f64| DVector::from_element(1, *a))
///     .setter(|_: &[String], v: &DVector<f64>, a: &mut f64| *a = v[0])
///     .build()
///     .unwrap();
///
/// let out = model.simulate(&3.0);
/// assert_eq!(model.innovations(&out, &5.0)[0], 1.0);
/// ```
pub struct ClosureModel<A, C, O> {
    model: SimulateFn<A, O>,
    cost: CostFn<O, C>,
    getter: GetterFn<A>,
    setter: SetterFn<A>,
}

impl<A, C, O> ClosureModel<A, C, O> {
    /// Start assembling a closure model.
    pub fn builder() -> ClosureModelBuilder<A, C, O> {
        ClosureModelBuilder::default()
    }
}

impl<A: Clone, C, O> EstimationModel for ClosureModel<A, C, O> {
    type Args = A;
    type CostArgs = C;
    type Output = O;

    fn simulate(&self, args: &A) -> O {
        (self.model)(args)
    }

    fn innovations(&self, output: &O, cost_args: &C) -> DVector<f64> {
        (self.cost)(output, cost_args)
    }

    fn get_params(&self, names: &[String], args: &A) -> DVector<f64> {
        (self.getter)(names, args)
    }

    fn set_params(&self, names: &[String], values: &DVector<f64>, args: &mut A) {
        (self.setter)(names, values, args)
    }
}

/// Builder for [`ClosureModel`].
///
/// [`build`](Self::build) fails with [`ConfigError::MissingCallable`] naming
/// the first callable that was not supplied.
pub struct ClosureModelBuilder<A, C, O> {
    model: Option<SimulateFn<A, O>>,
    cost: Option<CostFn<O, C>>,
    getter: Option<GetterFn<A>>,
    setter: Option<SetterFn<A>>,
}

impl<A, C, O> Default for ClosureModelBuilder<A, C, O> {
    fn default() -> Self {
        Self {
            model: None,
            cost: None,
            getter: None,
            setter: None,
        }
    }
}

impl<A, C, O> ClosureModelBuilder<A, C, O> {
    /// Set the model closure.
    pub fn model(mut self, f: impl Fn(&A) -> O + 'static) -> Self {
        self.model = Some(Box::new(f));
        self
    }

    /// Set the cost closure.
    pub fn cost(mut self, f: impl Fn(&O, &C) -> DVector<f64> + 'static) -> Self {
        self.cost = Some(Box::new(f));
        self
    }

    /// Set the parameter getter.
    pub fn getter(mut self, f: impl Fn(&[String], &A) -> DVector<f64> + 'static) -> Self {
        self.getter = Some(Box::new(f));
        self
    }

    /// Set the parameter setter.
    pub fn setter(mut self, f: impl Fn(&[String], &DVector<f64>, &mut A) + 'static) -> Self {
        self.setter = Some(Box::new(f));
        self
    }

    /// Assemble the model.
    pub fn build(self) -> Result<ClosureModel<A, C, O>, ConfigError> {
        Ok(ClosureModel {
            model: self
                .model
                .ok_or_else(|| ConfigError::missing_callable("model_func"))?,
            cost: self
                .cost
                .ok_or_else(|| ConfigError::missing_callable("cost_func"))?,
            getter: self
                .getter
                .ok_or_else(|| ConfigError::missing_callable("get_param_func"))?,
            setter: self
                .setter
                .ok_or_else(|| ConfigError::missing_callable("set_param_func"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_builder() -> ClosureModelBuilder<Vec<f64>, Vec<f64>, Vec<f64>> {
        ClosureModel::builder()
            .model(|a: &Vec<f64>| a.iter().map(|x| x * x).collect())
            .cost(|out: &Vec<f64>, target: &Vec<f64>| {
                DVector::from_iterator(out.len(), out.iter().zip(target).map(|(o, t)| o - t))
            })
            .getter(|_: &[String], a: &Vec<f64>| DVector::from_column_slice(a))
            .setter(|_: &[String], v: &DVector<f64>, a: &mut Vec<f64>| {
                a.clear();
                a.extend(v.iter());
            })
    }

    #[test]
    fn test_build_complete() {
        let model = full_builder().build().unwrap();
        let names = vec!["x".to_string(), "y".to_string()];
        let mut args = vec![1.0, 2.0];

        let out = model.simulate(&args);
        let innovs = model.innovations(&out, &vec![0.0, 0.0]);
        assert_eq!(innovs.as_slice(), &[1.0, 4.0]);

        model.set_params(&names, &DVector::from_vec(vec![3.0, 4.0]), &mut args);
        assert_eq!(model.get_params(&names, &args).as_slice(), &[3.0, 4.0]);
    }

    #[test]
    fn test_build_missing_setter() {
        let builder: ClosureModelBuilder<f64, f64, f64> = ClosureModel::builder()
            .model(|a: &f64| *a)
            .cost(|o: &f64, c: &f64| DVector::from_element(1, o - c))
            .getter(|_: &[String], a: &f64| DVector::from_element(1, *a));
        let err = builder.build().err().unwrap();
        assert_eq!(err, ConfigError::missing_callable("set_param_func"));
    }

    #[test]
    fn test_build_missing_model_reported_first() {
        let builder: ClosureModelBuilder<f64, f64, f64> = ClosureModel::builder();
        let err = builder.build().err().unwrap();
        assert_eq!(err, ConfigError::missing_callable("model_func"));
    }
}
