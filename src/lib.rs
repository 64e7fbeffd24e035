#![warn(
    clippy::all,
    clippy::pedantic,
    future_incompatible,
    macro_use_extern_crate,
    meta_variable_misuse,
    missing_abi,
    nonstandard_style,
    noop_method_call,
    rust_2018_compatibility,
    rust_2018_idioms,
    rust_2021_compatibility,
    trivial_casts,
    unreachable_pub,
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    unused
)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::expl_impl_clone_on_copy,
    clippy::items_after_statements,
    clippy::many_single_char_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::unreadable_literal
)]

//! Core document, geometry, routing, and placement-optimization engine for
//! KiCad PCB tooling: round-trip S-expression parsing (`sexp`), typed
//! design views (`model`), geometric primitives (`geom`), a grid-based
//! autorouter (`route`), and a placement optimizer (`placement`).

pub mod drc;
pub mod error;
pub mod geom;
pub mod model;
pub mod placement;
pub mod route;
pub mod sexp;

pub use error::{Error, Result};
