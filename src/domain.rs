pub mod errors;
pub mod profile;
pub mod qr;
pub mod scanner;

pub use errors::{ErrorKind, ExchangeError};
