use crate::error::DriverLogError;
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// A label value that is not one of the scalar variants.
///
/// The encoder first asks for a structured JSON encoding; if that fails it falls back to
/// the string rendering. A value failing both is unrepresentable and the whole entry is
/// dropped.
pub trait OpaqueLabel: Send + Sync {
    fn encode(&self) -> Result<Value, serde_json::Error>;

    fn render(&self) -> Result<String, fmt::Error>;
}

/// Opaque label backed by a serializable value, rendered with `Debug` as fallback.
pub struct Structured<T>(pub T);

impl<T> OpaqueLabel for Structured<T>
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }

    fn render(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        write!(out, "{:?}", self.0)?;
        Ok(out)
    }
}

/// Opaque label with no structured form; always encoded as its `Display` string.
pub struct Rendered<T>(pub T);

impl<T> OpaqueLabel for Rendered<T>
where
    T: fmt::Display + Send + Sync,
{
    fn encode(&self) -> Result<Value, serde_json::Error> {
        Err(serde::ser::Error::custom("value has no structured encoding"))
    }

    fn render(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        write!(out, "{}", self.0)?;
        Ok(out)
    }
}

/// Value of a single caller-supplied label.
#[derive(Clone)]
pub enum LabelValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Opaque(Arc<dyn OpaqueLabel>),
}

impl LabelValue {
    pub fn structured<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Self::Opaque(Arc::new(Structured(value)))
    }

    pub fn rendered<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        Self::Opaque(Arc::new(Rendered(value)))
    }

    pub fn opaque(value: impl OpaqueLabel + 'static) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Infers a typed value from loosely-typed text such as a `key=value` CLI argument.
    ///
    /// `null`, `true` and `false` map to their JSON counterparts, integers and finite
    /// floats to numbers, anything else stays a string.
    pub fn infer(raw: &str) -> Self {
        match raw {
            "null" => return Self::Null,
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Self::Int(int);
        }
        if let Ok(uint) = raw.parse::<u64>() {
            return Self::UInt(uint);
        }
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => Self::Float(float),
            _ => Self::String(raw.to_string()),
        }
    }

    /// Encodes the value for the label `key`.
    ///
    /// Non-finite floats and opaque values without a structured form degrade to their
    /// string rendering.
    pub fn to_json(&self, key: &str) -> Result<Value, DriverLogError> {
        let value = match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::UInt(u) => Value::from(*u),
            Self::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            Self::String(s) => Value::String(s.clone()),
            Self::Opaque(opaque) => match opaque.encode() {
                Ok(value) => value,
                Err(_) => opaque.render().map(Value::String).map_err(|_| {
                    DriverLogError::Unrepresentable {
                        key: key.to_string(),
                    }
                })?,
            },
        };
        Ok(value)
    }
}

impl fmt::Debug for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Opaque(opaque) => match opaque.render() {
                Ok(rendered) => f.debug_tuple("Opaque").field(&rendered).finish(),
                Err(_) => f.write_str("Opaque(<unrenderable>)"),
            },
        }
    }
}

impl PartialEq for LabelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! impl_from_number {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for LabelValue {
                fn from(value: $source) -> Self {
                    Self::$variant(value as $target)
                }
            }
        )+
    };
}

impl_from_number!(Int as i64: i8, i16, i32, i64, isize);
impl_from_number!(UInt as u64: u8, u16, u32, u64, usize);
impl_from_number!(Float as f64: f32, f64);

impl From<bool> for LabelValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for LabelValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl<T: Into<LabelValue>> From<Option<T>> for LabelValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Value> for LabelValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s),
            nested @ (Value::Array(_) | Value::Object(_)) => Self::structured(nested),
        }
    }
}

/// Ordered bag of caller labels. Inserting an existing key replaces its value in place.
///
/// Lookups are linear scans over a `Vec`, so merging is quadratic in the label count.
/// Entries carry a handful of labels, where this beats hashing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Labels {
    entries: Vec<(String, LabelValue)>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<LabelValue>,
    ) -> Option<LabelValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&LabelValue> {
        self.entries
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value))
    }

    pub fn remove(&mut self, key: &str) -> Option<LabelValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = Self::new();
        labels.extend(iter);
        labels
    }
}

impl<K, V> Extend<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for Labels {
    type Item = (String, LabelValue);
    type IntoIter = std::vec::IntoIter<(String, LabelValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Builds [`Labels`](crate::Labels) from `key => value` pairs.
///
/// ```
/// use conveyor_driver_log::labels;
///
/// let labels = labels! { "attempt" => 1, "cached" => false };
/// assert_eq!(labels.len(), 2);
/// ```
#[macro_export]
macro_rules! labels {
    () => {
        $crate::Labels::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut labels = $crate::Labels::new();
        $(
            labels.insert($key, $value);
        )+
        labels
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unrepresentable;

    impl OpaqueLabel for Unrepresentable {
        fn encode(&self) -> Result<Value, serde_json::Error> {
            Err(serde::ser::Error::custom("no encoding"))
        }

        fn render(&self) -> Result<String, fmt::Error> {
            Err(fmt::Error)
        }
    }

    struct BrokenDisplay;

    impl fmt::Display for BrokenDisplay {
        fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_infer_scalars() {
        assert_eq!(LabelValue::infer("null"), LabelValue::Null);
        assert_eq!(LabelValue::infer("true"), LabelValue::Bool(true));
        assert_eq!(LabelValue::infer("-12"), LabelValue::Int(-12));
        assert_eq!(
            LabelValue::infer("18446744073709551615"),
            LabelValue::UInt(u64::MAX)
        );
        assert_eq!(LabelValue::infer("0.5"), LabelValue::Float(0.5));
        assert_eq!(LabelValue::infer("NaN"), LabelValue::String("NaN".into()));
        assert_eq!(LabelValue::infer("inf"), LabelValue::String("inf".into()));
        assert_eq!(LabelValue::infer("ingest"), LabelValue::String("ingest".into()));
    }

    #[test]
    fn test_non_finite_float_encodes_as_string() {
        let value = LabelValue::Float(f64::NAN).to_json("ratio").unwrap();
        assert_eq!(value, Value::String("NaN".into()));
        let value = LabelValue::Float(f64::INFINITY).to_json("ratio").unwrap();
        assert_eq!(value, Value::String("inf".into()));
    }

    #[test]
    fn test_structured_value_encodes_natively() {
        let value = LabelValue::structured(vec![1, 2, 3]).to_json("ids").unwrap();
        assert_eq!(value, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_rendered_value_falls_back_to_string() {
        let value = LabelValue::rendered(std::net::Ipv4Addr::LOCALHOST)
            .to_json("addr")
            .unwrap();
        assert_eq!(value, Value::String("127.0.0.1".into()));
    }

    #[test]
    fn test_broken_display_is_unrepresentable() {
        let err = LabelValue::rendered(BrokenDisplay).to_json("bad").unwrap_err();
        assert!(matches!(err, DriverLogError::Unrepresentable { ref key } if key == "bad"));
    }

    #[test]
    fn test_custom_opaque_is_unrepresentable() {
        let err = LabelValue::opaque(Unrepresentable)
            .to_json("bad")
            .unwrap_err();
        assert!(err.to_string().contains("`bad`"));
    }

    #[test]
    fn test_json_value_conversion() {
        assert_eq!(LabelValue::from(serde_json::json!(7)), LabelValue::Int(7));
        assert_eq!(
            LabelValue::from(serde_json::json!("x")),
            LabelValue::String("x".into())
        );
        let nested = LabelValue::from(serde_json::json!({"a": 1}));
        assert_eq!(
            nested.to_json("nested").unwrap(),
            serde_json::json!({"a": 1})
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut labels = labels! { "a" => 1, "b" => 2 };
        assert_eq!(labels.insert("a", "one"), Some(LabelValue::Int(1)));
        let keys: Vec<_> = labels.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(labels.get("a"), Some(&LabelValue::String("one".into())));
    }

    #[test]
    fn test_remove_and_option_conversion() {
        let mut labels = Labels::new()
            .with("stage", Some("build"))
            .with("exit_code", None::<i32>);
        assert_eq!(labels.get("exit_code"), Some(&LabelValue::Null));
        assert_eq!(
            labels.remove("stage"),
            Some(LabelValue::String("build".into()))
        );
        assert_eq!(labels.remove("stage"), None);
        assert_eq!(labels.len(), 1);
    }
}
