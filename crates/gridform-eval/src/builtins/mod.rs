pub mod aggregate;
pub mod criteria;
pub mod datetime;
pub mod financial;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod reference;
mod support;
pub mod text;

use crate::registry::FunctionRegistry;

pub fn register_builtins(reg: &mut FunctionRegistry) {
    aggregate::register(reg);
    criteria::register(reg);
    datetime::register(reg);
    financial::register(reg);
    logical::register(reg);
    lookup::register(reg);
    math::register(reg);
    reference::register(reg);
    text::register(reg);
}
