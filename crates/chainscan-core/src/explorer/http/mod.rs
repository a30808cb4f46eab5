//! Building blocks shared by the HTTP explorer adapters: request limiting,
//! transport, envelope normalization, pagination and field parsing.

pub mod limiter;
pub mod normalize;
pub mod paginate;
pub(crate) mod parsing;
pub mod transport;
