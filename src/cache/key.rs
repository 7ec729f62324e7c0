//! Cache Key Module
//!
//! Turns call arguments into a stable, comparable cache key.
//!
//! Arguments are canonicalized through serde: the value is serialized into a
//! `serde_json::Value` tree (whose object keys are kept sorted) and rendered
//! as compact JSON text. Two argument values that serialize equally produce
//! the same key; map iteration order never leaks into the key. `Option` keeps
//! its shape (`None` is `[]`, `Some(v)` is `[v]`) so nested options and unit
//! never collapse into one `null`, and `-0.0` keys like `0.0`.
//!
//! Anything without a canonical form is rejected with
//! `MemoError::UnkeyableArguments`: maps whose keys are not strings, numbers
//! or bools, `Serialize` impls that fail, and non-finite floats.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{MemoError, Result};

// == Cache Key ==
/// Canonical form of a call's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the canonical text of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Keyable ==
/// Arguments that can be canonicalized into a `CacheKey`.
///
/// Implemented for every `Serialize` type, so tuples like `(3,)`, plain
/// scalars, strings, derived structs and `CallArgs` all work as arguments.
pub trait Keyable {
    /// Builds the cache key for these arguments.
    fn cache_key(&self) -> Result<CacheKey>;
}

impl<T> Keyable for T
where
    T: Serialize + ?Sized,
{
    fn cache_key(&self) -> Result<CacheKey> {
        let value = canonical_value(self)?;
        Ok(CacheKey(value.to_string()))
    }
}

/// Serializes `value` into its canonical JSON tree.
fn canonical_value<T>(value: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    value
        .serialize(Canonicalizer)
        .map_err(|e| MemoError::UnkeyableArguments(e.0))
}

// == Call Args ==
/// An explicit bundle of positional and named arguments.
///
/// Positional order is significant. Named bindings behave as a set: the order
/// in which they are added does not affect the key, and binding the same name
/// twice keeps the last value. Values are held in their canonical key form,
/// so an `Option` argument reads back as `[]` or `[v]`.
///
/// # Example
/// ```
/// use ttl_memo::cache::{CallArgs, Keyable};
///
/// let a = CallArgs::new().arg(1)?.named("scale", 2.5)?.named("unit", "m")?;
/// let b = CallArgs::new().arg(1)?.named("unit", "m")?.named("scale", 2.5)?;
/// assert_eq!(a.cache_key()?, b.cache_key()?);
/// # Ok::<(), ttl_memo::MemoError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Creates an empty argument bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    ///
    /// # Errors
    /// Returns `MemoError::UnkeyableArguments` if `value` cannot be canonicalized.
    pub fn arg<T: Serialize>(mut self, value: T) -> Result<Self> {
        self.positional.push(canonical_value(&value)?);
        Ok(self)
    }

    /// Binds a named argument.
    ///
    /// # Errors
    /// Returns `MemoError::UnkeyableArguments` if `value` cannot be canonicalized.
    pub fn named<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Result<Self> {
        self.named.insert(name.into(), canonical_value(&value)?);
        Ok(self)
    }

    /// Returns the positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Looks up a named argument.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }
}

// == Canonicalizer ==
// A serde serializer that builds the canonical `Value` tree directly.
//
// It follows serde_json's data model with three differences. `Option` is
// written as `[]` or `[v]` and unit as `null`, so `None`, `Some(None)`,
// `Some(())` and `()` stay apart. Non-finite floats are rejected instead of
// becoming `null`. `-0.0` is written as `0.0`.
//
// `Value` trees produced here serialize back to themselves, which is what
// lets `CallArgs` store canonical values and still key consistently.

#[derive(Debug)]
struct CanonicalError(String);

impl fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CanonicalError {}

impl ser::Error for CanonicalError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CanonicalError(msg.to_string())
    }
}

type CanonicalResult<T = Value> = std::result::Result<T, CanonicalError>;

#[derive(Clone, Copy)]
struct Canonicalizer;

fn canonical_float(v: f64) -> CanonicalResult {
    // `-0.0 == 0.0`, so this also folds negative zero
    let v = if v == 0.0 { 0.0 } else { v };
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| CanonicalError(format!("non-finite float {} has no canonical form", v)))
}

fn canonical_wide_int<T>(v: T) -> CanonicalResult
where
    T: Copy + fmt::Display + TryInto<i64> + TryInto<u64>,
{
    if let Ok(n) = TryInto::<i64>::try_into(v) {
        return Ok(Value::from(n));
    }
    if let Ok(n) = TryInto::<u64>::try_into(v) {
        return Ok(Value::from(n));
    }
    Err(CanonicalError(format!("integer {} is out of range", v)))
}

/// Map keys must end up as strings; scalars are rendered as text.
fn canonical_map_key(key: Value) -> CanonicalResult<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CanonicalError(format!(
            "map key {} is not a string, number or bool",
            other
        ))),
    }
}

fn tagged(variant: &'static str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(variant.to_string(), value);
    Value::Object(map)
}

impl ser::Serializer for Canonicalizer {
    type Ok = Value;
    type Error = CanonicalError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> CanonicalResult {
        Ok(Value::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_i16(self, v: i16) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_i32(self, v: i32) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_i64(self, v: i64) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_i128(self, v: i128) -> CanonicalResult {
        canonical_wide_int(v)
    }
    fn serialize_u8(self, v: u8) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_u16(self, v: u16) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_u32(self, v: u32) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_u64(self, v: u64) -> CanonicalResult {
        Ok(Value::from(v))
    }
    fn serialize_u128(self, v: u128) -> CanonicalResult {
        canonical_wide_int(v)
    }
    fn serialize_f32(self, v: f32) -> CanonicalResult {
        canonical_float(f64::from(v))
    }
    fn serialize_f64(self, v: f64) -> CanonicalResult {
        canonical_float(v)
    }
    fn serialize_char(self, v: char) -> CanonicalResult {
        Ok(Value::String(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> CanonicalResult {
        Ok(Value::String(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> CanonicalResult {
        Ok(Value::Array(v.iter().copied().map(Value::from).collect()))
    }
    fn serialize_none(self) -> CanonicalResult {
        Ok(Value::Array(Vec::new()))
    }
    fn serialize_some<T>(self, value: &T) -> CanonicalResult
    where
        T: ?Sized + Serialize,
    {
        Ok(Value::Array(vec![value.serialize(self)?]))
    }
    fn serialize_unit(self) -> CanonicalResult {
        Ok(Value::Null)
    }
    fn serialize_unit_struct(self, _: &'static str) -> CanonicalResult {
        Ok(Value::Null)
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, variant: &'static str) -> CanonicalResult {
        Ok(Value::String(variant.to_string()))
    }
    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> CanonicalResult
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> CanonicalResult
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(variant, value.serialize(self)?))
    }
    fn serialize_seq(self, len: Option<usize>) -> CanonicalResult<SeqBuilder> {
        Ok(SeqBuilder::new(None, len.unwrap_or(0)))
    }
    fn serialize_tuple(self, len: usize) -> CanonicalResult<SeqBuilder> {
        Ok(SeqBuilder::new(None, len))
    }
    fn serialize_tuple_struct(self, _: &'static str, len: usize) -> CanonicalResult<SeqBuilder> {
        Ok(SeqBuilder::new(None, len))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> CanonicalResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(variant), len))
    }
    fn serialize_map(self, _: Option<usize>) -> CanonicalResult<MapBuilder> {
        Ok(MapBuilder::new(None))
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> CanonicalResult<MapBuilder> {
        Ok(MapBuilder::new(None))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> CanonicalResult<MapBuilder> {
        Ok(MapBuilder::new(Some(variant)))
    }
}

/// Collects sequence and tuple elements, tagged with the variant if any.
struct SeqBuilder {
    variant: Option<&'static str>,
    items: Vec<Value>,
}

impl SeqBuilder {
    fn new(variant: Option<&'static str>, len: usize) -> Self {
        Self {
            variant,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T>(&mut self, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(Canonicalizer)?);
        Ok(())
    }

    fn finish(self) -> CanonicalResult {
        let array = Value::Array(self.items);
        Ok(match self.variant {
            Some(variant) => tagged(variant, array),
            None => array,
        })
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_element<T>(&mut self, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_element<T>(&mut self, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

/// Collects map entries and struct fields into a sorted object.
struct MapBuilder {
    variant: Option<&'static str>,
    map: Map<String, Value>,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn new(variant: Option<&'static str>) -> Self {
        Self {
            variant,
            map: Map::new(),
            pending_key: None,
        }
    }

    fn field<T>(&mut self, name: &'static str, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(name.to_string(), value.serialize(Canonicalizer)?);
        Ok(())
    }

    fn finish(self) -> CanonicalResult {
        let object = Value::Object(self.map);
        Ok(match self.variant {
            Some(variant) => tagged(variant, object),
            None => object,
        })
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_key<T>(&mut self, key: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(canonical_map_key(key.serialize(Canonicalizer)?)?);
        Ok(())
    }
    fn serialize_value<T>(&mut self, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CanonicalError("map value without a key".to_string()))?;
        self.map.insert(key, value.serialize(Canonicalizer)?);
        Ok(())
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, name: &'static str, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.field(name, value)
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = Value;
    type Error = CanonicalError;

    fn serialize_field<T>(&mut self, name: &'static str, value: &T) -> CanonicalResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.field(name, value)
    }
    fn end(self) -> CanonicalResult {
        self.finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_equal_args_equal_keys() {
        assert_eq!((3,).cache_key().unwrap(), (3,).cache_key().unwrap());
        assert_eq!(
            ("a", 1, true).cache_key().unwrap(),
            ("a", 1, true).cache_key().unwrap()
        );
    }

    #[test]
    fn test_distinct_args_distinct_keys() {
        assert_ne!((1,).cache_key().unwrap(), (2,).cache_key().unwrap());
        assert_ne!((1, 2).cache_key().unwrap(), (2, 1).cache_key().unwrap());
        assert_ne!("3".cache_key().unwrap(), 3i32.cache_key().unwrap());
        assert_ne!(
            Option::<i32>::None.cache_key().unwrap(),
            Some(0).cache_key().unwrap()
        );
    }

    #[test]
    fn test_option_and_unit_keep_their_shape() {
        let none = Option::<Option<i32>>::None.cache_key().unwrap();
        let some_none = Some(Option::<i32>::None).cache_key().unwrap();
        assert_ne!(none, some_none);
        assert_eq!(none.as_str(), "[]");
        assert_eq!(some_none.as_str(), "[[]]");

        let keys = [
            Option::<()>::None.cache_key().unwrap(),
            Some(()).cache_key().unwrap(),
            ().cache_key().unwrap(),
        ];
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
    }

    #[test]
    fn test_negative_zero_keys_like_zero() {
        assert_eq!(0.0f64.cache_key().unwrap(), (-0.0f64).cache_key().unwrap());
        assert_eq!((1, -0.0f32).cache_key().unwrap().as_str(), "[1,0.0]");
        assert_ne!(0.0f64.cache_key().unwrap(), 0.5f64.cache_key().unwrap());
    }

    #[test]
    fn test_enum_variants_are_tagged() {
        #[derive(serde::Serialize)]
        enum Shape {
            Point,
            Circle(u32),
            Rect { w: u32, h: u32 },
        }

        assert_eq!(Shape::Point.cache_key().unwrap().as_str(), r#""Point""#);
        assert_eq!(Shape::Circle(2).cache_key().unwrap().as_str(), r#"{"Circle":2}"#);
        assert_eq!(
            Shape::Rect { w: 1, h: 2 }.cache_key().unwrap().as_str(),
            r#"{"Rect":{"h":2,"w":1}}"#
        );
    }

    #[test]
    fn test_integer_map_keys_are_stringified() {
        let mut m = HashMap::new();
        m.insert(2u8, "b");
        m.insert(1u8, "a");
        assert_eq!(m.cache_key().unwrap().as_str(), r#"{"1":"a","2":"b"}"#);
    }

    #[test]
    fn test_call_args_keep_option_shape() {
        let none = CallArgs::new().arg(Option::<Option<i32>>::None).unwrap();
        let some_none = CallArgs::new().arg(Some(Option::<i32>::None)).unwrap();
        let unit = CallArgs::new().arg(()).unwrap();

        assert_eq!(none.positional()[0], Value::Array(vec![]));
        assert_ne!(none.cache_key().unwrap(), some_none.cache_key().unwrap());
        assert_ne!(none.cache_key().unwrap(), unit.cache_key().unwrap());
    }

    #[test]
    fn test_key_text_is_compact_json() {
        assert_eq!((3,).cache_key().unwrap().as_str(), "[3]");
        assert_eq!(("x", 1.5).cache_key().unwrap().to_string(), r#"["x",1.5]"#);
    }

    #[test]
    fn test_hashmap_order_does_not_leak() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..32 {
            a.insert(format!("k{}", i), i);
        }
        for i in (0..32).rev() {
            b.insert(format!("k{}", i), i);
        }
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
    }

    #[test]
    fn test_derived_struct_is_keyable() {
        #[derive(serde::Serialize)]
        struct Query {
            user: u64,
            tags: Vec<String>,
        }

        let q1 = Query { user: 7, tags: vec!["a".into()] };
        let q2 = Query { user: 7, tags: vec!["b".into()] };
        assert_ne!(q1.cache_key().unwrap(), q2.cache_key().unwrap());
    }

    #[test]
    fn test_non_string_map_keys_are_unkeyable() {
        let mut m = HashMap::new();
        m.insert((1, 2), "pair");
        let result = m.cache_key();
        assert!(matches!(result, Err(MemoError::UnkeyableArguments(_))));
    }

    #[test]
    fn test_non_finite_floats_are_unkeyable() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                (1, bad).cache_key(),
                Err(MemoError::UnkeyableArguments(_))
            ));
        }
        assert!(matches!(
            vec![Some(1.0f32), Some(f32::NAN)].cache_key(),
            Err(MemoError::UnkeyableArguments(_))
        ));
    }

    #[test]
    fn test_failing_serialize_is_unkeyable() {
        struct Opaque;

        impl Serialize for Opaque {
            fn serialize<S: ser::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(ser::Error::custom("opaque handle"))
            }
        }

        let err = Opaque.cache_key().unwrap_err();
        assert_eq!(err, MemoError::UnkeyableArguments("opaque handle".to_string()));
    }

    #[test]
    fn test_call_args_named_order_is_irrelevant() {
        let a = CallArgs::new()
            .arg(1)
            .unwrap()
            .named("x", 10)
            .unwrap()
            .named("y", 20)
            .unwrap();
        let b = CallArgs::new()
            .arg(1)
            .unwrap()
            .named("y", 20)
            .unwrap()
            .named("x", 10)
            .unwrap();
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
    }

    #[test]
    fn test_call_args_positional_vs_named_differ() {
        let positional = CallArgs::new().arg(1).unwrap();
        let named = CallArgs::new().named("0", 1).unwrap();
        assert_ne!(positional.cache_key().unwrap(), named.cache_key().unwrap());
    }

    #[test]
    fn test_call_args_rebinding_keeps_last() {
        let args = CallArgs::new().named("x", 1).unwrap().named("x", 2).unwrap();
        assert_eq!(args.get_named("x"), Some(&Value::from(2)));
        assert_eq!(
            args.cache_key().unwrap(),
            CallArgs::new().named("x", 2).unwrap().cache_key().unwrap()
        );
    }

    #[test]
    fn test_call_args_rejects_unkeyable_value() {
        let result = CallArgs::new().arg(f64::NAN);
        assert!(matches!(result, Err(MemoError::UnkeyableArguments(_))));
        assert_eq!(CallArgs::new().arg("ok").unwrap().positional().len(), 1);
    }
}
