//! Macro for implementing Display and FromStr for tag enums
//!
//! Connection-mode tags appear in settings files, log fields and error
//! messages. This macro keeps their string form in one place and handles
//! case-insensitive parsing.
//!
//! # Example
//!
//! ```rust
//! use senserest_domain::impl_tag_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Scope {
//!     Hub,
//!     Console,
//! }
//!
//! impl_tag_conversions!(Scope {
//!     Hub => "hub",
//!     Console => "console",
//! });
//!
//! assert_eq!(Scope::Hub.to_string(), "hub");
//! assert_eq!("CONSOLE".parse::<Scope>(), Ok(Scope::Console));
//! ```

/// Implements Display and FromStr traits for tag enums
///
/// This macro generates:
/// - Display trait: converts enum variants to their lowercase tag
/// - FromStr trait: parses case-insensitive strings to enum variants
#[macro_export]
macro_rules! impl_tag_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
