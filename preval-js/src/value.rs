use crate::error::EvalError;
use crate::exports::Exports;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use syntax_js::num::format_number;

/// Anything that can be invoked with arguments: interpreted closures and built-in methods.
pub trait Callable {
  fn call(&self, args: Vec<Value>) -> Result<Value, EvalError>;
}

/// A built-in function.
pub struct Native {
  pub name: &'static str,
  pub func: Box<dyn Fn(Vec<Value>) -> Result<Value, EvalError>>,
}

impl Callable for Native {
  fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
    (self.func)(args)
  }
}

pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

#[derive(Clone)]
pub enum Value {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Rc<str>),
  Array(ArrayRef),
  Object(ObjectRef),
  Function(Rc<dyn Callable>),
  /// A module namespace (`import * as ns`) or the ambient `exports` object.
  Module(Rc<Exports>),
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Undefined => f.write_str("undefined"),
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Number(n) => f.write_str(&format_number(*n)),
      Value::String(s) => write!(f, "{s:?}"),
      Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
      Value::Object(props) => f.debug_map().entries(props.borrow().iter()).finish(),
      Value::Function(_) => f.write_str("[function]"),
      Value::Module(exports) => write!(f, "[module {:?}]", exports.names()),
    }
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(Rc::from(value))
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(value)
  }
}

impl Value {
  pub fn string(value: impl AsRef<str>) -> Value {
    Value::String(Rc::from(value.as_ref()))
  }

  pub fn array(items: Vec<Value>) -> Value {
    Value::Array(Rc::new(RefCell::new(items)))
  }

  pub fn object(props: IndexMap<String, Value>) -> Value {
    Value::Object(Rc::new(RefCell::new(props)))
  }

  pub fn native(
    name: &'static str,
    func: impl Fn(Vec<Value>) -> Result<Value, EvalError> + 'static,
  ) -> Value {
    Value::Function(Rc::new(Native {
      name,
      func: Box::new(func),
    }))
  }

  pub fn is_nullish(&self) -> bool {
    matches!(self, Value::Undefined | Value::Null)
  }

  pub fn truthy(&self) -> bool {
    match self {
      Value::Undefined | Value::Null => false,
      Value::Bool(b) => *b,
      Value::Number(n) => *n != 0.0 && !n.is_nan(),
      Value::String(s) => !s.is_empty(),
      _ => true,
    }
  }

  pub fn type_of(&self) -> &'static str {
    match self {
      Value::Undefined => "undefined",
      Value::Null | Value::Array(_) | Value::Object(_) | Value::Module(_) => "object",
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::Function(_) => "function",
    }
  }

  pub fn to_number(&self) -> f64 {
    match self {
      Value::Undefined => f64::NAN,
      Value::Null => 0.0,
      Value::Bool(b) => f64::from(u8::from(*b)),
      Value::Number(n) => *n,
      Value::String(s) => {
        let trimmed = s.trim();
        if trimmed.is_empty() {
          0.0
        } else {
          trimmed.parse().unwrap_or(f64::NAN)
        }
      }
      Value::Array(items) => {
        let items = items.borrow();
        match items.as_slice() {
          [] => 0.0,
          [single] => single.to_number(),
          _ => f64::NAN,
        }
      }
      _ => f64::NAN,
    }
  }

  /// String conversion as performed by template literals and `+`.
  pub fn to_js_string(&self) -> String {
    match self {
      Value::Undefined => "undefined".to_string(),
      Value::Null => "null".to_string(),
      Value::Bool(b) => b.to_string(),
      Value::Number(n) => format_number(*n),
      Value::String(s) => s.to_string(),
      Value::Array(items) => items
        .borrow()
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
        .collect::<Vec<_>>()
        .join(","),
      Value::Object(_) | Value::Module(_) => "[object Object]".to_string(),
      Value::Function(_) => "function () { [native code] }".to_string(),
    }
  }

  pub fn strict_equals(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Number(a), Value::Number(b)) => a == b,
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
      (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
      (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
      (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }

  pub fn loose_equals(&self, other: &Value) -> bool {
    match (self, other) {
      (a, b) if a.is_nullish() && b.is_nullish() => true,
      (a, b) if a.is_nullish() || b.is_nullish() => false,
      (Value::Number(_), Value::String(_))
      | (Value::String(_), Value::Number(_))
      | (Value::Bool(_), _)
      | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
      _ => self.strict_equals(other),
    }
  }

  /// Invokes the value, failing if it is not a function.
  pub fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
    match self {
      Value::Function(f) => f.call(args),
      other => Err(EvalError::new(format!(
        "{} is not a function",
        other.describe()
      ))),
    }
  }

  /// Short description for error messages.
  pub fn describe(&self) -> String {
    match self {
      Value::String(s) => format!("{s:?}"),
      Value::Function(_) => "function".to_string(),
      Value::Array(_) => "array".to_string(),
      Value::Object(_) | Value::Module(_) => "object".to_string(),
      other => other.to_js_string(),
    }
  }

  /// Plain data view of the value. Functions become `null`; module namespaces are read eagerly.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      // Integral numbers are written without a fraction, like `JSON.stringify` does.
      Value::Number(n) if n.fract() == 0.0 && n.abs() < 9007199254740992.0 => {
        serde_json::Value::from(*n as i64)
      }
      Value::Number(n) => serde_json::Number::from_f64(*n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.to_string()),
      Value::Array(items) => {
        serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
      }
      Value::Object(props) => serde_json::Value::Object(
        props
          .borrow()
          .iter()
          .map(|(k, v)| (k.clone(), v.to_json()))
          .collect(),
      ),
      Value::Module(exports) => serde_json::Value::Object(
        exports
          .names()
          .into_iter()
          .filter_map(|name| exports.get(&name).ok().map(|v| (name, v.to_json())))
          .collect(),
      ),
    }
  }

  /// Snapshot of an array's elements.
  pub fn array_items(&self) -> Option<Vec<Value>> {
    match self {
      Value::Array(items) => Some(items.borrow().clone()),
      _ => None,
    }
  }

  /// Reads `object.name`, including the built-in members of strings and arrays.
  pub fn property(&self, name: &str) -> Result<Value, EvalError> {
    match self {
      Value::Undefined | Value::Null => Err(EvalError::new(format!(
        "cannot read properties of {} (reading {name:?})",
        self.to_js_string()
      ))),
      Value::String(s) => Ok(string_member(s, name)),
      Value::Array(items) => Ok(array_member(items, name)),
      Value::Object(props) => Ok(props.borrow().get(name).cloned().unwrap_or(Value::Undefined)),
      Value::Module(exports) => exports.get_or_undefined(name),
      Value::Bool(_) | Value::Number(_) | Value::Function(_) => Ok(Value::Undefined),
    }
  }

  /// Writes `object.name = value`.
  pub fn set_property(&self, name: &str, value: Value) -> Result<(), EvalError> {
    match self {
      Value::Object(props) => {
        props.borrow_mut().insert(name.to_string(), value);
        Ok(())
      }
      Value::Array(items) => {
        let index = array_index(name)
          .ok_or_else(|| EvalError::new(format!("cannot set {name:?} on an array")))?;
        let mut items = items.borrow_mut();
        if index >= items.len() {
          items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        Ok(())
      }
      Value::Module(exports) => {
        exports.set(name, value);
        Ok(())
      }
      other => Err(EvalError::new(format!(
        "cannot set property {name:?} of {}",
        other.describe()
      ))),
    }
  }
}

fn array_index(name: &str) -> Option<usize> {
  if name.len() > 1 && name.starts_with('0') {
    return None;
  }
  name.parse().ok()
}

fn string_member(s: &Rc<str>, name: &str) -> Value {
  let receiver = s.clone();
  match name {
    "length" => Value::Number(s.encode_utf16().count() as f64),
    "toUpperCase" => Value::native("toUpperCase", move |_| Ok(Value::string(receiver.to_uppercase()))),
    "toLowerCase" => Value::native("toLowerCase", move |_| Ok(Value::string(receiver.to_lowercase()))),
    "trim" => Value::native("trim", move |_| Ok(Value::string(receiver.trim()))),
    _ => array_index(name)
      .and_then(|i| s.chars().nth(i))
      .map(|c| Value::string(c.to_string()))
      .unwrap_or(Value::Undefined),
  }
}

fn array_member(items: &ArrayRef, name: &str) -> Value {
  let receiver = items.clone();
  match name {
    "length" => Value::Number(items.borrow().len() as f64),
    "push" => Value::native("push", move |args| {
      let mut items = receiver.borrow_mut();
      items.extend(args);
      Ok(Value::Number(items.len() as f64))
    }),
    "join" => Value::native("join", move |args| {
      let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(sep) => sep.to_js_string(),
      };
      let parts: Vec<String> = receiver
        .borrow()
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
        .collect();
      Ok(Value::string(parts.join(&separator)))
    }),
    "map" => Value::native("map", move |args| {
      let callback = args.into_iter().next().unwrap_or(Value::Undefined);
      // The callback may touch the array, so it runs over a snapshot.
      let snapshot = receiver.borrow().clone();
      let mut out = Vec::with_capacity(snapshot.len());
      for (i, item) in snapshot.into_iter().enumerate() {
        out.push(callback.call(vec![item, Value::Number(i as f64)])?);
      }
      Ok(Value::array(out))
    }),
    "filter" => Value::native("filter", move |args| {
      let callback = args.into_iter().next().unwrap_or(Value::Undefined);
      let snapshot = receiver.borrow().clone();
      let mut out = Vec::new();
      for (i, item) in snapshot.into_iter().enumerate() {
        if callback.call(vec![item.clone(), Value::Number(i as f64)])?.truthy() {
          out.push(item);
        }
      }
      Ok(Value::array(out))
    }),
    "includes" => Value::native("includes", move |args| {
      let needle = args.first().cloned().unwrap_or(Value::Undefined);
      Ok(Value::Bool(
        receiver.borrow().iter().any(|v| v.strict_equals(&needle)),
      ))
    }),
    _ => array_index(name)
      .and_then(|i| items.borrow().get(i).cloned())
      .unwrap_or(Value::Undefined),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn converts_like_javascript() {
    assert_eq!(Value::Number(1.5).to_js_string(), "1.5");
    assert_eq!(Value::Number(3.0).to_js_string(), "3");
    assert_eq!(
      Value::array(vec![Value::Number(1.0), Value::Null, Value::from("a")]).to_js_string(),
      "1,,a"
    );
    assert_eq!(Value::from(" 12 ").to_number(), 12.0);
    assert!(Value::from("x").to_number().is_nan());
    assert!(!Value::from("").truthy());
    assert!(Value::array(vec![]).truthy());
  }

  #[test]
  fn equality() {
    assert!(Value::Null.loose_equals(&Value::Undefined));
    assert!(!Value::Null.strict_equals(&Value::Undefined));
    assert!(Value::from("1").loose_equals(&Value::Number(1.0)));
    let obj = Value::object(IndexMap::new());
    assert!(obj.strict_equals(&obj.clone()));
    assert!(!obj.strict_equals(&Value::object(IndexMap::new())));
  }

  #[test]
  fn built_in_members() {
    let items = Value::array(vec![Value::from("a")]);
    items
      .property("push")
      .unwrap()
      .call(vec![Value::from("b")])
      .unwrap();
    assert_eq!(items.property("length").unwrap().to_number(), 2.0);
    let joined = items.property("join").unwrap().call(vec![Value::from("-")]).unwrap();
    assert_eq!(joined.to_js_string(), "a-b");
    let upper = Value::from("ab").property("toUpperCase").unwrap().call(vec![]).unwrap();
    assert_eq!(upper.to_js_string(), "AB");
    assert!(Value::Undefined.property("x").is_err());
    assert!(Value::object(IndexMap::new()).property("x").unwrap().is_nullish());
  }

  #[test]
  fn json_view() {
    let mut props = IndexMap::new();
    props.insert("a".to_string(), Value::Number(1.0));
    props.insert("h".to_string(), Value::Number(0.5));
    props.insert("f".to_string(), Value::native("f", |_| Ok(Value::Undefined)));
    assert_eq!(
      Value::object(props).to_json(),
      serde_json::json!({ "a": 1, "h": 0.5, "f": null })
    );
  }
}
