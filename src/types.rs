//! Overview
//!
//! [`Environment`](Environment) is the immutable key/value store every decode
//! reads from. Keys are matched case-insensitively, an exact match is always
//! preferred.
//!
use std::{
    borrow::Cow,
    collections::{btree_map, BTreeMap},
    ffi::OsString,
    iter::FromIterator,
};

use serde::de::DeserializeOwned;

use crate::{de, error::Error, options::Options};

/// Lowercased form of `s`, borrowed when there is nothing to lower.
pub(crate) fn fold(s: &str) -> Cow<'_, str> {
    if s.is_ascii() && !s.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.to_lowercase())
    }
}

/// Case-insensitive string equality.
pub(crate) fn eq_fold(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || fold(a) == fold(b)
}

/// Case-insensitive `str::starts_with`.
pub(crate) fn has_prefix_fold(s: &str, prefix: &str) -> bool {
    fold(s).starts_with(&*fold(prefix))
}

///
/// Environment variables, as decoded from `KEY=VALUE` entries.
///
/// Entries without `=` are dropped, only the first `=` splits key from value.
/// Later entries override earlier ones with the exact same key. Iteration is
/// ordered by key.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    inner: BTreeMap<String, String>,
    // folded key -> first matching key of `inner`, in key order
    folded: BTreeMap<String, String>,
}

impl Environment {
    pub fn new<I, S>(environ: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = environ
            .into_iter()
            .filter_map(|entry| {
                let mut pair = entry.as_ref().splitn(2, '=');

                match (pair.next(), pair.next()) {
                    (Some(key), Some(value)) => Some((String::from(key), String::from(value))),
                    _ => None,
                }
            })
            .collect::<BTreeMap<_, _>>();

        Self::from_map(inner)
    }

    fn from_map(inner: BTreeMap<String, String>) -> Self {
        let mut folded = BTreeMap::new();

        for key in inner.keys() {
            folded
                .entry(fold(key).into_owned())
                .or_insert_with(|| key.clone());
        }

        log::trace!("Environment built with {} variables", inner.len());

        Self { inner, folded }
    }

    ///
    /// Snapshot the variables of the current process.
    ///
    /// Variables whose name or value isn't valid unicode are skipped.
    ///
    pub fn from_env() -> Self {
        let inner = std::env::vars_os()
            .filter_map(|(key, value): (OsString, OsString)| {
                Some((key.into_string().ok()?, value.into_string().ok()?))
            })
            .collect::<BTreeMap<_, _>>();

        Self::from_map(inner)
    }

    ///
    /// Value of `name`, with surrounding whitespace trimmed.
    ///
    /// An exact match is tried first, otherwise the first key (in key order)
    /// that matches case-insensitively wins.
    ///
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|(_, value)| value.trim())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<(&String, &String)> {
        self.inner.get_key_value(name).or_else(|| {
            let key = self.folded.get(&*fold(name))?;
            self.inner.get_key_value(key)
        })
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Raw (untrimmed) pairs, ordered by key.
    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.inner.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    ///
    /// Decode the variables under `prefix` into `T`.
    ///
    /// Nested structs extend the prefix with `field_sep` and their field
    /// name (`#[serde(rename)]` overrides it, [`skip`](crate::skip) leaves
    /// the field unread).
    /// Absent or unparsable values leave the field to its serde default,
    /// they never fail the decode.
    ///
    pub fn decode<T>(&self, prefix: &str, field_sep: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let options = Options {
            prefix: String::from(prefix),
            field_sep: String::from(field_sep),
            ..Options::default()
        };

        de::decode(self, &options, false).map(|(value, _)| value)
    }

    ///
    /// Like [`decode`](Environment::decode), also returning the qualified
    /// keys that were consumed, in the order they were decoded.
    ///
    pub fn decode_consumed<T>(
        &self,
        prefix: &str,
        field_sep: &str,
    ) -> Result<(T, Vec<String>), Error>
    where
        T: DeserializeOwned,
    {
        let options = Options {
            prefix: String::from(prefix),
            field_sep: String::from(field_sep),
            ..Options::default()
        };

        de::decode(self, &options, true)
    }

    ///
    /// Like [`decode`](Environment::decode), but fails on variables under
    /// `prefix` that no field consumed and that aren't listed in `ignore`.
    ///
    pub fn decode_strict<T, I, S>(&self, prefix: &str, field_sep: &str, ignore: I) -> Result<T, Error>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (value, consumed) = self.decode_consumed(prefix, field_sep)?;
        self.validate_strict(prefix, &consumed, ignore)?;

        Ok(value)
    }

    /// Decode with every knob taken from `options`.
    pub fn decode_with<T>(&self, options: &Options) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let (value, consumed) = de::decode(self, options, options.is_strict())?;

        if options.is_strict() {
            self.validate_strict(options.prefix(), &consumed, options.ignore())?;
        }

        Ok(value)
    }

    ///
    /// Fail with [`Error::Unrecognized`](Error::Unrecognized) on the first
    /// key (in key order) that starts with `prefix` and matches neither
    /// `consumed` nor `ignore`. All comparisons ignore case.
    ///
    pub fn validate_strict<C, I, S>(&self, prefix: &str, consumed: &[C], ignore: I) -> Result<(), Error>
    where
        C: AsRef<str>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignore = ignore.into_iter().collect::<Vec<_>>();

        let unrecognized = self
            .inner
            .keys()
            .filter(|key| has_prefix_fold(key, prefix))
            .find(|key| {
                !ignore.iter().any(|name| eq_fold(key, name.as_ref()))
                    && !consumed.iter().any(|name| eq_fold(key, name.as_ref()))
            });

        match unrecognized {
            Some(key) => {
                log::debug!("Unrecognized environment variable {}", key);
                Err(Error::Unrecognized(key.clone()))
            }
            None => Ok(()),
        }
    }
}

impl<S> FromIterator<S> for Environment
where
    S: AsRef<str>,
{
    #[inline]
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
