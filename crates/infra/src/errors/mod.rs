//! Infrastructure-side error conversions

mod conversions;

pub use conversions::InfraError;
pub(crate) use conversions::transport_error;
