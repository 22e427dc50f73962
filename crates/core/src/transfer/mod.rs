//! Transfer backends for the download engine.

mod http;

pub use http::{HttpGetter, HttpInformer};
