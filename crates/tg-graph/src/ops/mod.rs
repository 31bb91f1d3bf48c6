//! Built-in operator catalog.

pub mod concat;
pub mod constant;
pub mod convert;
pub mod elementwise;
pub mod parameter;
pub mod range;
pub mod reduce;
pub mod shape_of;
pub mod split;
pub mod squeeze;
mod util;

use crate::registry::OpRegistry;

pub const PARAMETER: &str = "Parameter";
pub const CONSTANT: &str = "Constant";
pub const ADD: &str = "Add";
pub const MINIMUM: &str = "Minimum";
pub const MAXIMUM: &str = "Maximum";
pub const CONVERT: &str = "Convert";
pub const CONCAT: &str = "Concat";
pub const REDUCE_MIN: &str = "ReduceMin";
pub const REDUCE_MAX: &str = "ReduceMax";
pub const RANGE: &str = "Range";
pub const SHAPE_OF: &str = "ShapeOf";
pub const SQUEEZE: &str = "Squeeze";
pub const UNSQUEEZE: &str = "Unsqueeze";
pub const SPLIT: &str = "Split";

/// Register every built-in operator.
pub fn register_defaults(registry: &mut OpRegistry) {
    registry
        .register(parameter::Parameter)
        .register(constant::Constant)
        .register(elementwise::Add)
        .register(elementwise::Minimum)
        .register(elementwise::Maximum)
        .register(convert::Convert)
        .register(concat::Concat)
        .register(reduce::ReduceMin)
        .register(reduce::ReduceMax)
        .register(range::Range)
        .register(shape_of::ShapeOf)
        .register(squeeze::Squeeze)
        .register(squeeze::Unsqueeze)
        .register(split::Split);
}
