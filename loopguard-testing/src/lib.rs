//! Test support for `loopguard`: instrumented thread factories, chaos
//! injection, lifecycle assertions and tracing setup.

#![forbid(
    dead_code,
    invalid_value,
    overflowing_literals,
    unconditional_recursion,
    unreachable_pub,
    unused_allocation,
    unsafe_code
)]
#![deny(
    bad_style,
    deprecated,
    meta_variable_misuse,
    non_ascii_idents,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unused_assignments,
    unused_attributes,
    unused_extern_crates,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_variables
)]

pub mod assertions;
pub mod chaos;
pub mod counting;
pub mod logging;

pub use assertions::*;
pub use chaos::*;
pub use counting::*;
pub use logging::*;
