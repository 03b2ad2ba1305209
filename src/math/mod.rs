//! Numerical building blocks: utility, discrete shocks, function objects

pub mod distribution;
pub mod interpolation;
pub mod utility;
pub mod value;

pub use distribution::{
    combine_independent, DiscreteDistribution, IncomeShock, IncomeShockDstn, JointShockDstn,
    ReturnDstn, ShockRealization,
};
pub use interpolation::{
    Axis, BilinearInterp, ConstantFunction, CubicInterp, Function1D, Function2D,
    IdentityFunction, IdentityFunction2D, LinearInterp, LinearInterpOnInterp1D, StepFunction,
};
pub use utility::CrraUtility;
pub use value::{MargValueFuncCrra, MargValueFuncCrra2D, ValueFuncCrra, ValueFuncCrra2D};
