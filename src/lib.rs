#![allow(dead_code)]
#![allow(clippy::needless_return)]
#![allow(clippy::redundant_static_lifetimes)]
#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate lazy_static;

pub mod constants;
mod engine;
mod errors;
mod parser;
mod proto;
mod schema;
mod sql_type;

pub use crate::engine::Engine;
pub use crate::errors::{ProtoError, ProtoResult};
pub use crate::proto::{Connection, Listener};
pub use crate::sql_type::{SqlResult, Value};
