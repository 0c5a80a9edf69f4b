//! Binding merged sections onto typed values
//!
//! Layers only hold strings, so [`Section`] implements [`serde::Deserializer`] and parses
//! leaf values into whatever primitive the target asks for. Sections bind as maps,
//! structs (field names matched ignoring case) or sequences (children in index order).
//! Removed keys are skipped for structs and sequences and show up as `None` in maps.

use crate::section::Section;
use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, VariantAccess, Visitor,
};
use std::fmt::Display;
use thiserror::Error;

/// Failure to convert a section into the requested type
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BindError(String);

impl de::Error for BindError {
    fn custom<T: Display>(msg: T) -> Self {
        BindError(msg.to_string())
    }
}

/// Deserialize `T` from a section
pub fn from_section<T: DeserializeOwned>(section: Section) -> Result<T, BindError> {
    T::deserialize(section)
}

impl Section {
    fn error(&self, message: impl Display) -> BindError {
        if self.path().is_empty() {
            BindError(message.to_string())
        } else {
            BindError(format!("{} (at '{}')", message, self.path()))
        }
    }

    fn into_scalar(self, expected: &str) -> Result<String, BindError> {
        if self.value().is_none() {
            return Err(if self.has_children() {
                self.error(format!("invalid type: section, expected {}", expected))
            } else {
                self.error(format!("missing value, expected {}", expected))
            });
        }
        let (_, _, value, _) = self.into_parts();
        Ok(value.unwrap_or_default())
    }

    /// An empty or blank leaf binds as an empty collection
    fn is_blank_leaf(&self) -> bool {
        !self.has_children() && self.value().is_none_or(|v| v.trim().is_empty())
    }

    fn bind_map<'de, V, F>(self, visitor: V, include_empty: bool, rename: F) -> Result<V::Value, BindError>
    where
        V: Visitor<'de>,
        F: Fn(&str) -> String,
    {
        let (_, _, _, children) = self.into_parts();
        let entries = children
            .into_iter()
            .filter(|child| include_empty || !child.is_empty())
            .map(|child| (rename(child.key()), child));
        let mut map: MapDeserializer<'de, _, BindError> = MapDeserializer::new(entries);
        let value = visitor.visit_map(&mut map)?;
        map.end()?;
        Ok(value)
    }
}

impl<'de> IntoDeserializer<'de, BindError> for Section {
    type Deserializer = Section;

    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
                let path = self.path().to_owned();
                let raw = self.into_scalar(stringify!($ty))?;
                let parsed = raw.trim().parse::<$ty>().map_err(|e| {
                    BindError(format!(
                        "invalid {} value {:?}: {} (at '{}')",
                        stringify!($ty),
                        raw,
                        e,
                        path
                    ))
                })?;
                visitor.$visit(parsed)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Section {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.is_sequence() {
            self.deserialize_seq(visitor)
        } else if self.has_children() {
            self.bind_map(visitor, true, str::to_owned)
        } else {
            match self.into_parts().2 {
                Some(value) => visitor.visit_string(value),
                None => visitor.visit_none(),
            }
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let path = self.path().to_owned();
        let raw = self.into_scalar("bool")?;
        match raw.trim() {
            v if v.eq_ignore_ascii_case("true") => visitor.visit_bool(true),
            v if v.eq_ignore_ascii_case("false") => visitor.visit_bool(false),
            _ => Err(BindError(format!(
                "invalid bool value {:?} (at '{}')",
                raw, path
            ))),
        }
    }

    deserialize_parsed! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let path = self.path().to_owned();
        let raw = self.into_scalar("char")?;
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(BindError(format!(
                "invalid char value {:?} (at '{}')",
                raw, path
            ))),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.into_scalar("string")?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_byte_buf(self.into_scalar("bytes")?.into_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if !self.has_children() && !self.is_blank_leaf() {
            return Err(self.error("invalid type: value, expected a sequence"));
        }
        let (_, _, _, children) = self.into_parts();
        let present = children.into_iter().filter(|child| !child.is_empty());
        let mut seq: SeqDeserializer<_, BindError> = SeqDeserializer::new(present);
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if !self.has_children() && !self.is_blank_leaf() {
            return Err(self.error("invalid type: value, expected a map"));
        }
        self.bind_map(visitor, true, str::to_owned)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        if !self.has_children() && !self.is_blank_leaf() {
            return Err(self.error("invalid type: value, expected a struct"));
        }
        self.bind_map(visitor, false, |key| match_name(fields, key))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        if !self.has_children() {
            let raw = self.into_scalar("enum variant")?;
            return visitor.visit_enum(SectionEnum {
                variant: match_name(variants, raw.trim()),
                content: Section::default(),
            });
        }

        let path = self.path().to_owned();
        let (_, _, _, children) = self.into_parts();
        let mut present = children.into_iter().filter(|child| !child.is_empty());
        match (present.next(), present.next()) {
            (Some(content), None) => visitor.visit_enum(SectionEnum {
                variant: match_name(variants, content.key()),
                content,
            }),
            _ => Err(BindError(format!(
                "expected a section with a single variant key (at '{}')",
                path
            ))),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }
}

/// Map `key` onto a declared field or variant name, ignoring case
fn match_name(names: &[&str], key: &str) -> String {
    names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(key))
        .map_or_else(|| key.to_owned(), |name| (*name).to_owned())
}

struct SectionEnum {
    variant: String,
    content: Section,
}

impl<'de> EnumAccess<'de> for SectionEnum {
    type Error = BindError;
    type Variant = Section;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Section), BindError> {
        let variant: StringDeserializer<BindError> = self.variant.into_deserializer();
        Ok((seed.deserialize(variant)?, self.content))
    }
}

impl<'de> VariantAccess<'de> for Section {
    type Error = BindError;

    fn unit_variant(self) -> Result<(), BindError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, BindError> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, BindError> {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, Deserialize, PartialEq, Default)]
    #[serde(rename_all = "camelCase")]
    struct MyObject {
        one: i32,
        two: f64,
        three: Option<u32>,
    }

    #[derive(Debug, Deserialize, PartialEq, Default)]
    #[serde(rename_all = "camelCase", default)]
    struct MyConfiguration {
        array: Option<Vec<String>>,
        object: Option<MyObject>,
        deeper_objects: Vec<MyDeeperObject>,
    }

    #[derive(Debug, Deserialize, PartialEq, Default)]
    #[serde(rename_all = "camelCase", default)]
    struct MyDeeperObject {
        name: Option<String>,
        is_enabled: bool,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    enum Mode {
        Fast,
        Careful,
    }

    fn bind<T: DeserializeOwned>(entries: &[(&str, Option<&str>)]) -> Result<T, BindError> {
        from_section(Section::from_entries(entries.iter().copied()))
    }

    #[test]
    fn test_bind_struct_with_parsed_values() {
        let config: MyConfiguration = bind(&[
            ("Array:0", Some("item 1")),
            ("Array:1", Some("item 2")),
            ("OBJECT:One", Some("1")),
            ("object:two", Some(" 2.5 ")),
            ("deeperObjects:1:isEnabled", Some("True")),
            ("deeperObjects:0:name", Some("first")),
        ])
        .unwrap();

        assert_eq!(
            config,
            MyConfiguration {
                array: Some(vec!["item 1".into(), "item 2".into()]),
                object: Some(MyObject {
                    one: 1,
                    two: 2.5,
                    three: None
                }),
                deeper_objects: vec![
                    MyDeeperObject {
                        name: Some("first".into()),
                        is_enabled: false
                    },
                    MyDeeperObject {
                        name: None,
                        is_enabled: true
                    },
                ],
            }
        );
    }

    #[test]
    fn test_removed_keys_are_skipped_in_structs() {
        let config: MyObject = bind(&[
            ("one", Some("1")),
            ("two", Some("2")),
            ("three", Some("3")),
            ("three", None),
        ])
        .unwrap();

        assert_eq!(config.three, None);
    }

    #[test]
    fn test_removed_keys_are_none_in_maps() {
        let map: HashMap<String, Option<String>> =
            bind(&[("Kept", Some("v")), ("removed", None)]).unwrap();

        assert_eq!(map["Kept"], Some("v".to_string()));
        assert_eq!(map["removed"], None);
    }

    #[test]
    fn test_sequence_skips_gaps_and_removed_items() {
        let items: Vec<u8> = bind(&[("5", Some("5")), ("0", Some("0")), ("2", None)]).unwrap();
        assert_eq!(items, [0, 5]);
    }

    #[test]
    fn test_invalid_number_reports_path() {
        let err = bind::<MyObject>(&[("one", Some("one")), ("two", Some("2"))]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("invalid i32 value"), "{message}");
        assert!(message.contains("'one'"), "{message}");
    }

    #[test]
    fn test_enum_variants_ignore_case() {
        let modes: BTreeMap<String, Mode> =
            bind(&[("a", Some("FAST")), ("b", Some("careful"))]).unwrap();
        assert_eq!(modes["a"], Mode::Fast);
        assert_eq!(modes["b"], Mode::Careful);
    }

    #[test]
    fn test_any_produces_strings_and_arrays() {
        let value: serde_json::Value = bind(&[
            ("list:0", Some("x")),
            ("list:1", Some("y")),
            ("n", Some("3")),
        ])
        .unwrap();

        assert_eq!(value, serde_json::json!({ "list": ["x", "y"], "n": "3" }));
    }

    #[test]
    fn test_scalar_where_struct_expected() {
        let err = bind::<HashMap<String, MyObject>>(&[("a", Some("oops"))]).unwrap_err();
        assert!(err.to_string().contains("expected a struct"));
    }
}
