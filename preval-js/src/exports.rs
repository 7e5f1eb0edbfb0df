use crate::error::EvalError;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type Getter = Rc<dyn Fn() -> Result<Value, EvalError>>;

#[derive(Clone)]
enum Slot {
  Value(Value),
  Deferred(Getter),
}

/// Export values of one module, in definition order.
///
/// An export is either a concrete value or a getter that reads the live binding behind it. Reading
/// a getter memoizes its value, except when the binding is not initialized yet (a module cycle read
/// it too early): that read fails and the getter stays in place.
#[derive(Default)]
pub struct Exports {
  slots: RefCell<IndexMap<String, Slot>>,
}

impl fmt::Debug for Exports {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Exports").field(&self.names()).finish()
  }
}

impl Exports {
  pub fn new() -> Exports {
    Exports::default()
  }

  pub fn set(&self, name: impl Into<String>, value: Value) {
    self.slots.borrow_mut().insert(name.into(), Slot::Value(value));
  }

  pub fn define_getter(&self, name: impl Into<String>, getter: Getter) {
    self
      .slots
      .borrow_mut()
      .insert(name.into(), Slot::Deferred(getter));
  }

  pub fn contains(&self, name: &str) -> bool {
    self.slots.borrow().contains_key(name)
  }

  pub fn names(&self) -> Vec<String> {
    self.slots.borrow().keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.slots.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.borrow().is_empty()
  }

  /// Forgets every value, e.g. before the module runs again with a wider export set.
  pub fn clear(&self) {
    self.slots.borrow_mut().clear();
  }

  pub fn get(&self, name: &str) -> Result<Value, EvalError> {
    // The getter may read other exports of this module, so it runs without the map borrowed.
    let slot = self.slots.borrow().get(name).cloned();
    match slot {
      None => Err(EvalError::new(format!("{name} is not exported"))),
      Some(Slot::Value(value)) => Ok(value),
      Some(Slot::Deferred(getter)) => {
        let value = getter()?;
        let mut slots = self.slots.borrow_mut();
        if let Some(slot @ Slot::Deferred(_)) = slots.get_mut(name) {
          *slot = Slot::Value(value.clone());
        }
        Ok(value)
      }
    }
  }

  /// Like [`Exports::get`], but a missing export reads as `undefined`.
  pub fn get_or_undefined(&self, name: &str) -> Result<Value, EvalError> {
    if self.contains(name) {
      self.get(name)
    } else {
      Ok(Value::Undefined)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn getters_are_memoized() {
    let calls = Rc::new(Cell::new(0));
    let exports = Exports::new();
    let counter = calls.clone();
    exports.define_getter(
      "a",
      Rc::new(move || {
        counter.set(counter.get() + 1);
        Ok(Value::Number(1.0))
      }),
    );
    assert_eq!(exports.get("a").unwrap().to_number(), 1.0);
    assert_eq!(exports.get("a").unwrap().to_number(), 1.0);
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn uninitialized_reads_fail_without_memoizing() {
    let ready = Rc::new(Cell::new(false));
    let exports = Exports::new();
    let flag = ready.clone();
    exports.define_getter(
      "late",
      Rc::new(move || {
        if flag.get() {
          Ok(Value::from("ok"))
        } else {
          Err(EvalError::new("cannot access late before initialization"))
        }
      }),
    );
    assert!(exports.get("late").is_err());
    ready.set(true);
    assert_eq!(exports.get("late").unwrap().to_js_string(), "ok");
  }

  #[test]
  fn keeps_definition_order() {
    let exports = Exports::new();
    exports.set("b", Value::Null);
    exports.set("a", Value::Null);
    exports.set("b", Value::Bool(true));
    assert_eq!(exports.names(), vec!["b".to_string(), "a".to_string()]);
    assert!(exports.get("missing").is_err());
    assert!(exports.get_or_undefined("missing").unwrap().is_nullish());
  }
}
