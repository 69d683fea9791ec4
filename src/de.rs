use std::{collections::BTreeSet, slice, vec};

use serde::de::{
    self, value::BorrowedStrDeserializer, DeserializeOwned, DeserializeSeed, Deserializer as _,
    Error as _, IgnoredAny, MapAccess, SeqAccess, Visitor,
};

use crate::{
    error::{Error, LiteralError},
    options::Options,
    types::Environment,
    value,
};

///
/// Decode `T` out of `env`.
///
/// A value that fails to convert aborts the pass with [`Error::Value`]; its
/// key is then excluded and the decode starts over, so the field falls back to
/// its serde default as if the variable was never set. Every pass excludes one
/// more key, structural errors are returned as is.
///
/// Absent leaves take the same path, so a target with `n` unset leaves costs
/// `n + 1` passes. Lookups go through the folded index of [`Environment`].
///
pub(crate) fn decode<T>(
    env: &Environment,
    options: &Options,
    track: bool,
) -> Result<(T, Vec<String>), Error>
where
    T: DeserializeOwned,
{
    let mut excluded = BTreeSet::new();

    loop {
        log::trace!(
            "Decoding `{}` with {} excluded keys",
            options.prefix(),
            excluded.len()
        );

        let mut consumed = Vec::new();
        let context = Context {
            env,
            field_sep: options.field_sep(),
            array_sep: options.array_sep(),
            escape: options.escape(),
            excluded: &excluded,
        };

        let deserializer = Deserializer {
            context,
            name: String::from(options.prefix()),
            consumed: if track { Some(&mut consumed) } else { None },
        };

        match T::deserialize(deserializer) {
            Ok(value) => return Ok((value, consumed)),
            Err(Error::Value { key, reason }) if !excluded.contains(&key) => {
                log::debug!("Ignoring `{}`: {}", key, reason);
                excluded.insert(key);
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Clone, Copy)]
struct Context<'a> {
    env: &'a Environment,
    field_sep: &'a str,
    array_sep: char,
    escape: char,
    excluded: &'a BTreeSet<String>,
}

impl<'a> Context<'a> {
    fn qualify(&self, prefix: &str, field: &str) -> String {
        if prefix.is_empty() {
            String::from(field)
        } else {
            format!("{}{}{}", prefix, self.field_sep, field)
        }
    }
}

///
/// Deserializer for a single qualified key.
///
/// Structs recurse with the key as the new prefix, everything else is looked
/// up and handed to [`LiteralDeserializer`](LiteralDeserializer).
///
pub(crate) struct Deserializer<'a> {
    context: Context<'a>,
    name: String,
    consumed: Option<&'a mut Vec<String>>,
}

impl<'a> Deserializer<'a> {
    fn literal<F, T>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce(LiteralDeserializer<'a>) -> Result<T, LiteralError>,
    {
        let Deserializer {
            context,
            name,
            consumed,
            ..
        } = self;

        let source = match context.env.get(&name) {
            Some(source) => source,
            None => return Err(Error::literal(name, LiteralError::Absent)),
        };

        match f(LiteralDeserializer::new(
            source,
            context.array_sep,
            context.escape,
        )) {
            Ok(value) => {
                log::trace!("Decoded `{}`", name);

                if let Some(consumed) = consumed {
                    consumed.push(name);
                }

                Ok(value)
            }
            Err(e) => Err(Error::literal(name, e)),
        }
    }
}

macro_rules! forward_to_literal {
    ($($method:ident)*) => {
        $(
            #[inline]
            fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                self.literal(move |literal| literal.$method(visitor))
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for Deserializer<'a> {
    type Error = Error;

    ///
    /// Untyped targets can't be decoded, there is nothing to tell us what
    /// the literal should become.
    ///
    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "any"))
    }

    forward_to_literal! {
        deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64 deserialize_i128
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_u128
        deserialize_f32 deserialize_f64
        deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf
    }

    ///
    /// Lists are leaves. With nothing set the element type is still checked,
    /// against a single blank element, so unsupported elements always fail.
    ///
    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.context.env.contains(&self.name) {
            return self.literal(move |literal| literal.deserialize_seq(visitor));
        }

        let blank = ListAccess {
            items: vec![String::new()].into_iter(),
            array_sep: self.context.array_sep,
            escape: self.context.escape,
        };

        match visitor.visit_seq(blank) {
            Err(LiteralError::Unsupported(kind)) => Err(Error::unsupported(self.name, kind)),
            _ => Err(Error::literal(self.name, LiteralError::Absent)),
        }
    }

    ///
    /// Options are allocated before recursing. Only a key excluded by an
    /// earlier pass decodes to `None`, nested ones never get here since
    /// their field isn't yielded.
    ///
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.context.excluded.contains(&self.name) {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "unit"))
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "unit struct"))
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "tuple"))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "tuple struct"))
    }

    fn deserialize_map<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "map"))
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        log::trace!("Decoding struct {} at `{}`", name, self.name);

        visitor.visit_map(StructAccess {
            context: self.context,
            prefix: self.name,
            fields: fields.iter(),
            pending: None,
            consumed: self.consumed,
        })
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "enum"))
    }

    fn deserialize_identifier<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(self.name, "identifier"))
    }

    ///
    /// `IgnoredAny` fields reserve their key: it is never read, but strict
    /// mode counts it as consumed.
    ///
    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        log::trace!("Reserving `{}`", self.name);

        if let Some(consumed) = self.consumed {
            consumed.push(self.name);
        }

        visitor.visit_unit()
    }
}

///
/// Skip marker for a field, used as `#[serde(deserialize_with = "envconf::skip")]`.
///
/// The field keeps its default and its variable is never read, but strict
/// mode doesn't report it. Plain `#[serde(skip)]` hides the field name from
/// the decoder entirely, so strict mode has no way to tell its variable
/// apart from a misspelled one.
///
pub fn skip<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: de::Deserializer<'de>,
    T: Default,
{
    deserializer.deserialize_ignored_any(IgnoredAny)?;
    Ok(T::default())
}

///
/// Walks the declared fields of a struct in order. A field is yielded
/// unless its qualified key was excluded by an earlier pass.
///
struct StructAccess<'a> {
    context: Context<'a>,
    prefix: String,
    fields: slice::Iter<'static, &'static str>,
    pending: Option<String>,
    consumed: Option<&'a mut Vec<String>>,
}

impl<'de, 'a> MapAccess<'de> for StructAccess<'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        for field in self.fields.by_ref() {
            let name = self.context.qualify(&self.prefix, field);

            if self.context.excluded.contains(&name) {
                log::trace!("Skipping excluded `{}`", name);
                continue;
            }

            self.pending = Some(name);
            return seed
                .deserialize(BorrowedStrDeserializer::<Error>::new(*field))
                .map(Some);
        }

        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let name = self
            .pending
            .take()
            .ok_or_else(|| Error::custom("value requested before its key"))?;

        seed.deserialize(Deserializer {
            context: self.context,
            name,
            consumed: self.consumed.as_deref_mut(),
        })
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

/// Literal deserializer, (non top-level deserializer)
///
#[derive(Debug, Clone, Copy)]
struct LiteralDeserializer<'a> {
    // already trimmed str
    inner: &'a str,
    array_sep: char,
    escape: char,
    // list elements can't be lists themselves
    element: bool,
}

impl<'a> LiteralDeserializer<'a> {
    #[inline]
    fn new(inner: &'a str, array_sep: char, escape: char) -> Self {
        Self {
            inner,
            array_sep,
            escape,
            element: false,
        }
    }
}

macro_rules! deserialize_number {
    ($($method:ident => $visit:ident($parse:ident::<$ty:ty>))*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                value::$parse::<$ty>(self.inner).and_then(move |v| visitor.$visit(v))
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for LiteralDeserializer<'a> {
    type Error = LiteralError;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("any"))
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        value::parse_bool(self.inner).and_then(move |v| visitor.visit_bool(v))
    }

    deserialize_number! {
        deserialize_i8 => visit_i8(parse_int::<i8>)
        deserialize_i16 => visit_i16(parse_int::<i16>)
        deserialize_i32 => visit_i32(parse_int::<i32>)
        deserialize_i64 => visit_i64(parse_int::<i64>)
        deserialize_i128 => visit_i128(parse_int::<i128>)
        deserialize_u8 => visit_u8(parse_uint::<u8>)
        deserialize_u16 => visit_u16(parse_uint::<u16>)
        deserialize_u32 => visit_u32(parse_uint::<u32>)
        deserialize_u64 => visit_u64(parse_uint::<u64>)
        deserialize_u128 => visit_u128(parse_uint::<u128>)
        deserialize_f32 => visit_f32(parse_float::<f32>)
        deserialize_f64 => visit_f64(parse_float::<f64>)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let mut chars = self.inner.chars();

        match (chars.next(), chars.next()) {
            (Some(ch), None) => visitor.visit_char(ch),
            _ => Err(LiteralError::Syntax),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(self.inner)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(String::from(self.inner))
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bytes(self.inner.as_bytes())
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_byte_buf(self.inner.as_bytes().to_vec())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.element {
            return Err(LiteralError::Unsupported("nested list"));
        }

        visitor.visit_seq(ListAccess {
            items: value::split_list(self.inner, self.array_sep, self.escape).into_iter(),
            array_sep: self.array_sep,
            escape: self.escape,
        })
    }

    fn deserialize_unit<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("unit"))
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("unit struct"))
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("tuple"))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("tuple struct"))
    }

    fn deserialize_map<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("map"))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("struct"))
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("enum"))
    }

    fn deserialize_identifier<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(LiteralError::Unsupported("identifier"))
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

struct ListAccess {
    items: vec::IntoIter<String>,
    array_sep: char,
    escape: char,
}

impl<'de> SeqAccess<'de> for ListAccess {
    type Error = LiteralError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(item) => seed
                .deserialize(LiteralDeserializer {
                    inner: &item,
                    array_sep: self.array_sep,
                    escape: self.escape,
                    element: true,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}
