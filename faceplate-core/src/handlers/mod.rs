// The mock handler is always built: tests and desk development rely on it.
pub mod mock;

#[cfg(feature = "handler_nmdbus")]
pub mod nmdbus;
