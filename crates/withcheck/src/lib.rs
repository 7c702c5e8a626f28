//! Detects `with` actions in Go `text/template` source whose binding is never
//! used in the body.
//!
//! ```text
//! {{ with $x := .Values.name }}static text{{ end }}
//! ```
//!
//! declares `$x` and narrows `.`, but the body references neither.

mod binding;
mod checker;
mod error;
mod usage;

pub use binding::{Bindings, CURRENT_CONTEXT, extract_bindings};
pub use checker::{CheckOptions, Checker, Finding, InvalidOption, Mode, Policy, check};
pub use error::{CheckError, ErrorKind};
pub use usage::{check_usage, satisfies};
