pub mod support;

pub use self::support::*;
