//!
//! Decode options.
//!
//! For decoding, there are several options that can be modified, such as :
//!
//! - prefix (root name every qualified key starts with)
//! - field separator (joins the prefix and each nested field name)
//! - array separator & escape character for list values
//! - strict mode, plus the keys strict mode should tolerate
//!

use derive_builder::Builder;

#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Options {
    #[builder(default)]
    pub(crate) prefix: String,
    #[builder(default = "String::from(\"_\")")]
    pub(crate) field_sep: String,
    #[builder(default = "','")]
    pub(crate) array_sep: char,
    #[builder(default = "'\\\\'")]
    pub(crate) escape: char,
    #[builder(default)]
    pub(crate) strict: bool,
    #[builder(default)]
    pub(crate) ignore: Vec<String>,
}

impl OptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        let array_sep = self.array_sep.unwrap_or(',');
        let escape = self.escape.unwrap_or('\\');

        if array_sep == escape {
            Err(format!(
                "array separator and escape character are both {:?}",
                array_sep
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            field_sep: String::from("_"),
            array_sep: ',',
            escape: '\\',
            strict: false,
            ignore: Vec::new(),
        }
    }
}

impl Options {
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub fn field_sep(&self) -> &str {
        &self.field_sep
    }

    #[inline]
    pub fn array_sep(&self) -> char {
        self.array_sep
    }

    #[inline]
    pub fn escape(&self) -> char {
        self.escape
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[inline]
    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }
}
