//!
//! Decode environment variables into nested serde structs.
//!
//! Every leaf field maps to one variable named after its path:
//! `PREFIX<sep>field<sep>nested_field`, matched case-insensitively.
//! `#[serde(rename = "...")]` overrides a name segment and
//! `#[serde(deserialize_with = "envconf::skip")]` marks a field as skipped:
//! it keeps its default, its variable is never read and strict mode doesn't
//! report it.
//!
//! ```
//! use envconf::Environment;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct Storage {
//!     hosts: Vec<String>,
//!     max_conns: u32,
//! }
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct Server {
//!     addr: String,
//!     #[serde(deserialize_with = "envconf::skip")]
//!     key: String,
//!     storage: Storage,
//! }
//!
//! let env = Environment::new(&[
//!     "SERVER_ADDR= :8080",
//!     "SERVER_KEY=secret",
//!     "SERVER_STORAGE_HOSTS=[::1]:6160,:6160",
//!     "server_storage_max_conns=500",
//! ]);
//!
//! let server: Server = env.decode("server", "_").unwrap();
//! assert_eq!(server.addr, ":8080");
//! assert_eq!(server.storage.hosts, vec!["[::1]:6160", ":6160"]);
//! assert_eq!(server.storage.max_conns, 500);
//! assert_eq!(server.key, "");
//!
//! let strict: Server = env.decode_strict("server", "_", None::<&str>).unwrap();
//! assert_eq!(strict.addr, ":8080");
//! ```
//!
//! Values that are missing or don't parse never fail a decode, the field
//! keeps its serde default. Use [`Environment::decode_strict`] to catch
//! misspelled variable names.
//!

mod de;
mod error;
mod options;
mod types;
mod value;

use serde::de::DeserializeOwned;

pub use crate::{
    de::skip,
    error::{Error, LiteralError},
    options::{Options, OptionsBuilder, OptionsBuilderError},
    types::Environment,
    value::split_list,
};

/// Snapshot the environment of the current process.
#[inline]
pub fn load() -> Environment {
    Environment::from_env()
}

/// Decode the variables of the current process under `prefix` into `T`.
pub fn from_env<T>(prefix: &str, field_sep: &str) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    load().decode(prefix, field_sep)
}
