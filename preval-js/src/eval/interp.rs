use super::Evaluator;
use crate::cache::PreparedModule;
use crate::error::EvalError;
use crate::exports::Exports;
use crate::value::Callable;
use crate::value::Value;
use ahash::HashMap;
use ahash::HashMapExt;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use syntax_js::ast::AssignOp;
use syntax_js::ast::Ast;
use syntax_js::ast::BinaryOp;
use syntax_js::ast::ImportName;
use syntax_js::ast::NodeId;
use syntax_js::ast::NodeKind;
use syntax_js::ast::PropKey;
use syntax_js::ast::UnaryOp;
use syntax_js::ast::VarDeclMode;
use syntax_js::parse::lit::cook;

// Holds the value of `export default <expr>` until the statement runs.
const DEFAULT_SLOT: &str = "*default*";

enum Binding {
  /// `None` until the declaration runs.
  Local { value: Option<Value>, mutable: bool },
  /// Live view of another module's export; `None` for a namespace import.
  Import {
    exports: Rc<Exports>,
    name: Option<String>,
  },
}

#[derive(Default)]
struct Scope {
  bindings: RefCell<HashMap<String, Binding>>,
  parent: Option<Env>,
}

type Env = Rc<Scope>;

impl Scope {
  fn child(parent: &Env) -> Env {
    Rc::new(Scope {
      bindings: RefCell::new(HashMap::new()),
      parent: Some(parent.clone()),
    })
  }

  fn declare(&self, name: &str, binding: Binding) {
    self.bindings.borrow_mut().insert(name.to_string(), binding);
  }

  fn define(&self, name: &str, value: Value, mutable: bool) {
    self.declare(name, Binding::Local {
      value: Some(value),
      mutable,
    });
  }

  fn lookup<R>(&self, name: &str, f: impl FnOnce(&mut Binding) -> R) -> Option<R> {
    let mut scope = self;
    loop {
      if let Some(binding) = scope.bindings.borrow_mut().get_mut(name) {
        return Some(f(binding));
      }
      scope = scope.parent.as_deref()?;
    }
  }

  fn has(&self, name: &str) -> bool {
    self.lookup(name, |_| ()).is_some()
  }

  fn get(&self, name: &str) -> Result<Value, EvalError> {
    let read = self.lookup(name, |binding| match binding {
      Binding::Local { value: Some(v), .. } => Ok(Ok(v.clone())),
      Binding::Local { value: None, .. } => Err(EvalError::new(format!(
        "cannot access {name} before initialization"
      ))),
      Binding::Import { exports, name } => Ok(Err((exports.clone(), name.clone()))),
    });
    // Imports are read without the scope borrowed, their getters may read this module.
    match read {
      None => Err(EvalError::new(format!("{name} is not defined"))),
      Some(Err(err)) => Err(err),
      Some(Ok(Ok(value))) => Ok(value),
      Some(Ok(Err((exports, None)))) => Ok(Value::Module(exports)),
      Some(Ok(Err((exports, Some(imported))))) => exports.get(&imported),
    }
  }

  /// Initializes the nearest binding named `name`, as a declaration does.
  fn initialize(&self, name: &str, value: Value) {
    self.lookup(name, |binding| {
      if let Binding::Local { value: slot, .. } = binding {
        *slot = Some(value);
      }
    });
  }

  fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
    let result = self.lookup(name, |binding| match binding {
      Binding::Local { value: None, .. } => Err(EvalError::new(format!(
        "cannot access {name} before initialization"
      ))),
      Binding::Local { mutable: false, .. } => {
        Err(EvalError::new(format!("assignment to constant {name}")))
      }
      Binding::Local { value: slot, .. } => {
        *slot = Some(value);
        Ok(())
      }
      Binding::Import { .. } => Err(EvalError::new(format!("assignment to import {name}"))),
    });
    result.unwrap_or_else(|| Err(EvalError::new(format!("{name} is not defined"))))
  }
}

enum Completion {
  Normal,
  Return(Value),
}

/// A function value created by interpreted code.
struct Closure {
  ast: Rc<Ast>,
  node: NodeId,
  env: Env,
}

impl Callable for Closure {
  fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
    let NodeKind::Function {
      name, params, body, ..
    } = self.ast.kind(self.node)
    else {
      return Err(EvalError::new("not a function"));
    };
    let machine = Machine {
      ast: self.ast.clone(),
    };
    let scope = Scope::child(&self.env);
    // A named function expression can refer to itself.
    if let Some(name) = name.and_then(|n| self.ast.binding_name(n)) {
      let this = Closure {
        ast: self.ast.clone(),
        node: self.node,
        env: self.env.clone(),
      };
      scope.define(name, Value::Function(Rc::new(this)), false);
    }
    let mut args = args.into_iter();
    for param in params {
      let value = args.next().unwrap_or(Value::Undefined);
      if let Some(name) = self.ast.binding_name(*param) {
        scope.define(name, value, true);
      }
    }
    if let NodeKind::Block { body: stmts } = self.ast.kind(*body) {
      machine.hoist(&scope, stmts, true);
      return match machine.stmts(&scope, stmts)? {
        Completion::Return(value) => Ok(value),
        Completion::Normal => Ok(Value::Undefined),
      };
    }
    machine.expr(&scope, *body)
  }
}

/// Tree-walking evaluator for the module subset `syntax-js` parses.
///
/// Imports are live: every read goes through the imported module's [`Exports`]. Exports are
/// registered as getters before the module body runs, so a cyclic import can observe a binding that
/// is not initialized yet and fails with a reference error instead of reading `undefined`.
#[derive(Default)]
pub struct Interpreter;

impl Interpreter {
  pub fn new() -> Interpreter {
    Interpreter
  }
}

fn globals() -> Env {
  let scope = Scope::default();
  scope.define("undefined", Value::Undefined, false);
  scope.define("NaN", Value::Number(f64::NAN), false);
  scope.define("Infinity", Value::Number(f64::INFINITY), false);
  scope.define(
    "String",
    Value::native("String", |args| {
      Ok(Value::string(
        args.first().map(Value::to_js_string).unwrap_or_default(),
      ))
    }),
    false,
  );
  scope.define(
    "Number",
    Value::native("Number", |args| {
      Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    }),
    false,
  );
  Rc::new(scope)
}

impl Evaluator for Interpreter {
  fn execute(
    &self,
    module: &PreparedModule,
    exports: &Rc<Exports>,
    require: &mut dyn FnMut(&str) -> Result<Rc<Exports>, EvalError>,
  ) -> Result<(), EvalError> {
    let ast = Rc::new(module.ast.clone());
    let machine = Machine { ast: ast.clone() };
    let env = Scope::child(&globals());
    let exports_value = Value::Module(exports.clone());
    env.define("exports", exports_value.clone(), true);
    let mut props = IndexMap::new();
    props.insert("exports".to_string(), exports_value.clone());
    let module_object = Value::object(props);
    env.define("module", module_object.clone(), true);

    let body = ast.top_level_statements().to_vec();
    machine.hoist(&env, &body, true);
    env.declare(DEFAULT_SLOT, Binding::Local {
      value: None,
      mutable: true,
    });

    // Imports are hoisted above the body.
    for stmt in &body {
      machine.link(&env, *stmt, exports, require)?;
    }

    match machine.stmts(&env, &body)? {
      Completion::Normal => {}
      Completion::Return(_) => return Err(EvalError::new("return outside of a function")),
    };

    // `module.exports = { ... }` replaces the export surface.
    let replaced = module_object.property("exports")?;
    if !replaced.strict_equals(&exports_value) {
      if let Value::Object(props) = &replaced {
        for (name, value) in props.borrow().iter() {
          exports.set(name.clone(), value.clone());
        }
      }
      exports.set("default", replaced);
    }
    Ok(())
  }
}

struct Machine {
  ast: Rc<Ast>,
}

fn export_getter(env: &Env, local: String) -> Rc<dyn Fn() -> Result<Value, EvalError>> {
  let env = env.clone();
  Rc::new(move || env.get(&local))
}

impl Machine {
  fn kind(&self, id: NodeId) -> &NodeKind {
    self.ast.kind(id)
  }

  fn name(&self, id: NodeId) -> Result<&str, EvalError> {
    self
      .ast
      .binding_name(id)
      .ok_or_else(|| EvalError::new("expected a name"))
  }

  fn closure(&self, env: &Env, node: NodeId) -> Value {
    Value::Function(Rc::new(Closure {
      ast: self.ast.clone(),
      node,
      env: env.clone(),
    }))
  }

  /// Declares the names `stmts` introduce in `env`: functions are created up front, `let` and
  /// `const` start uninitialized, and `var` starts as `undefined`.
  fn hoist(&self, env: &Env, stmts: &[NodeId], function_scope: bool) {
    for stmt in stmts {
      let decl = match self.kind(*stmt) {
        NodeKind::ExportDecl { decl } => *decl,
        _ => *stmt,
      };
      match self.kind(decl) {
        NodeKind::Function {
          name: Some(name),
          decl: true,
          ..
        } => {
          if let Some(name) = self.ast.binding_name(*name) {
            env.define(name, self.closure(env, decl), true);
          }
        }
        NodeKind::VarDecl { mode, declarators } => {
          if *mode == VarDeclMode::Var && !function_scope {
            continue;
          }
          for declarator in declarators {
            let NodeKind::VarDeclarator { binding, .. } = self.kind(*declarator) else {
              continue;
            };
            let Some(name) = self.ast.binding_name(*binding) else {
              continue;
            };
            let value = (*mode == VarDeclMode::Var).then_some(Value::Undefined);
            env.declare(name, Binding::Local {
              value,
              mutable: *mode != VarDeclMode::Const,
            });
          }
        }
        _ => {}
      };
      if function_scope {
        self.hoist_nested_vars(env, decl);
      }
    }
  }

  // `var` inside blocks and branches belongs to the enclosing function.
  fn hoist_nested_vars(&self, env: &Env, stmt: NodeId) {
    let nested: Vec<NodeId> = match self.kind(stmt) {
      NodeKind::Block { body } => body.clone(),
      NodeKind::If {
        consequent,
        alternate,
        ..
      } => std::iter::once(*consequent).chain(*alternate).collect(),
      _ => return,
    };
    for stmt in nested {
      if let NodeKind::VarDecl {
        mode: VarDeclMode::Var,
        declarators,
      } = self.kind(stmt)
      {
        for declarator in declarators {
          if let NodeKind::VarDeclarator { binding, .. } = self.kind(*declarator) {
            if let Some(name) = self.ast.binding_name(*binding) {
              if !env.bindings.borrow().contains_key(name) {
                env.define(name, Value::Undefined, true);
              }
            }
          }
        }
      }
      self.hoist_nested_vars(env, stmt);
    }
  }

  /// Binds imports and registers exports of one top-level statement.
  fn link(
    &self,
    env: &Env,
    stmt: NodeId,
    exports: &Rc<Exports>,
    require: &mut dyn FnMut(&str) -> Result<Rc<Exports>, EvalError>,
  ) -> Result<(), EvalError> {
    match self.kind(stmt) {
      NodeKind::Import { specifiers, source } => {
        let imported = require(source)?;
        for spec in specifiers {
          let NodeKind::ImportSpecifier { imported: name, binding } = self.kind(*spec) else {
            continue;
          };
          let name = match name {
            ImportName::Default => Some("default".to_string()),
            ImportName::Named(n) => Some(n.clone()),
            ImportName::Namespace => None,
          };
          env.declare(self.name(*binding)?, Binding::Import {
            exports: imported.clone(),
            name,
          });
        }
      }
      NodeKind::ExportDecl { decl } => match self.kind(*decl) {
        NodeKind::VarDecl { declarators, .. } => {
          for declarator in declarators {
            if let NodeKind::VarDeclarator { binding, .. } = self.kind(*declarator) {
              let name = self.name(*binding)?.to_string();
              exports.define_getter(name.clone(), export_getter(env, name));
            }
          }
        }
        NodeKind::Function { name: Some(name), .. } => {
          let name = self.name(*name)?.to_string();
          exports.define_getter(name.clone(), export_getter(env, name));
        }
        _ => {}
      },
      NodeKind::ExportDefault { .. } => {
        exports.define_getter("default", export_getter(env, DEFAULT_SLOT.to_string()));
      }
      NodeKind::ExportList {
        specifiers,
        from: None,
      } => {
        for spec in specifiers {
          if let NodeKind::ExportSpecifier { local, exported } = self.kind(*spec) {
            let local = self.name(*local)?.to_string();
            exports.define_getter(exported.clone(), export_getter(env, local));
          }
        }
      }
      NodeKind::ExportList {
        specifiers,
        from: Some(source),
      } => {
        let imported = require(source)?;
        for spec in specifiers {
          if let NodeKind::ExportSpecifier { local, exported } = self.kind(*spec) {
            let local = self.name(*local)?.to_string();
            let from = imported.clone();
            exports.define_getter(exported.clone(), Rc::new(move || from.get(&local)));
          }
        }
      }
      NodeKind::ExportAll {
        from,
        alias: Some(alias),
      } => {
        let imported = require(from)?;
        exports.set(alias.clone(), Value::Module(imported));
      }
      NodeKind::ExportAll { from, alias: None } => {
        let imported = require(from)?;
        for name in imported.names() {
          if name == "default" || exports.contains(&name) {
            continue;
          }
          let from = imported.clone();
          let read = name.clone();
          exports.define_getter(name, Rc::new(move || from.get(&read)));
        }
      }
      _ => {}
    };
    Ok(())
  }

  fn stmts(&self, env: &Env, stmts: &[NodeId]) -> Result<Completion, EvalError> {
    for stmt in stmts {
      if let Completion::Return(value) = self.stmt(env, *stmt)? {
        return Ok(Completion::Return(value));
      }
    }
    Ok(Completion::Normal)
  }

  fn stmt(&self, env: &Env, id: NodeId) -> Result<Completion, EvalError> {
    match self.kind(id) {
      NodeKind::Import { .. }
      | NodeKind::ExportList { .. }
      | NodeKind::ExportAll { .. }
      | NodeKind::Empty
      | NodeKind::Function { decl: true, .. } => {}
      NodeKind::ExportDecl { decl } => return self.stmt(env, *decl),
      NodeKind::ExportDefault { expr } => {
        let value = self.expr(env, *expr)?;
        env.initialize(DEFAULT_SLOT, value);
      }
      NodeKind::VarDecl { mode, declarators } => {
        for declarator in declarators {
          let NodeKind::VarDeclarator { binding, init } = self.kind(*declarator) else {
            continue;
          };
          // `var x;` without an initializer keeps any earlier value.
          if init.is_none() && *mode == VarDeclMode::Var {
            continue;
          }
          let value = match init {
            Some(init) => self.expr(env, *init)?,
            None => Value::Undefined,
          };
          env.initialize(self.name(*binding)?, value);
        }
      }
      NodeKind::Return { value } => {
        let value = match value {
          Some(value) => self.expr(env, *value)?,
          None => Value::Undefined,
        };
        return Ok(Completion::Return(value));
      }
      NodeKind::Throw { value } => {
        let value = self.expr(env, *value)?;
        return Err(EvalError::new(format!("uncaught {}", value.to_js_string())));
      }
      NodeKind::If {
        test,
        consequent,
        alternate,
      } => {
        if self.expr(env, *test)?.truthy() {
          return self.stmt(env, *consequent);
        }
        if let Some(alternate) = alternate {
          return self.stmt(env, *alternate);
        }
      }
      NodeKind::Block { body } => {
        let scope = Scope::child(env);
        self.hoist(&scope, body, false);
        return self.stmts(&scope, body);
      }
      NodeKind::ExprStmt { expr } => {
        self.expr(env, *expr)?;
      }
      _ => {
        self.expr(env, id)?;
      }
    };
    Ok(Completion::Normal)
  }

  fn expr(&self, env: &Env, id: NodeId) -> Result<Value, EvalError> {
    match self.kind(id) {
      NodeKind::Ident { name } | NodeKind::Binding { name } => env.get(name),
      NodeKind::Num { value } => Ok(Value::Number(*value)),
      NodeKind::Str { value } => Ok(Value::string(value)),
      NodeKind::Bool { value } => Ok(Value::Bool(*value)),
      NodeKind::Null => Ok(Value::Null),
      NodeKind::Paren { expr } => self.expr(env, *expr),
      NodeKind::Template { quasis, exprs } => {
        let mut out = String::new();
        for (i, quasi) in quasis.iter().enumerate() {
          out.push_str(&cooked(quasi)?);
          if let Some(expr) = exprs.get(i) {
            out.push_str(&self.expr(env, *expr)?.to_js_string());
          }
        }
        Ok(Value::string(out))
      }
      NodeKind::TaggedTemplate { tag, template } => {
        let tag = self.expr(env, *tag)?;
        let NodeKind::Template { quasis, exprs } = self.kind(*template) else {
          return Err(EvalError::new("malformed tagged template"));
        };
        let strings = quasis
          .iter()
          .map(|q| cooked(q).map(Value::string))
          .collect::<Result<Vec<_>, _>>()?;
        let mut args = vec![Value::array(strings)];
        for expr in exprs {
          args.push(self.expr(env, *expr)?);
        }
        tag.call(args)
      }
      NodeKind::Array { elements } => {
        let items = elements
          .iter()
          .map(|e| self.expr(env, *e))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::array(items))
      }
      NodeKind::Object { props } => {
        let mut out = IndexMap::new();
        for prop in props {
          let NodeKind::Property { key, value, .. } = self.kind(*prop) else {
            continue;
          };
          let key = match key {
            PropKey::Name(name) => name.clone(),
            PropKey::Computed(expr) => self.expr(env, *expr)?.to_js_string(),
          };
          out.insert(key, self.expr(env, *value)?);
        }
        Ok(Value::object(out))
      }
      NodeKind::Function { .. } => Ok(self.closure(env, id)),
      NodeKind::Unary { op, arg } => self.unary(env, *op, *arg),
      NodeKind::Binary { op, left, right } => self.binary(env, *op, *left, *right),
      NodeKind::Conditional {
        test,
        consequent,
        alternate,
      } => {
        if self.expr(env, *test)?.truthy() {
          self.expr(env, *consequent)
        } else {
          self.expr(env, *alternate)
        }
      }
      NodeKind::Assign { op, target, value } => self.assign(env, *op, *target, *value),
      NodeKind::Call { callee, args } => {
        let callee = self.expr(env, *callee)?;
        let args = args
          .iter()
          .map(|a| self.expr(env, *a))
          .collect::<Result<Vec<_>, _>>()?;
        callee.call(args)
      }
      NodeKind::Member { object, property } => self.expr(env, *object)?.property(property),
      NodeKind::Index { object, index } => {
        let object = self.expr(env, *object)?;
        let key = self.expr(env, *index)?.to_js_string();
        object.property(&key)
      }
      other => Err(EvalError::new(format!(
        "unsupported syntax: {}",
        node_name(other)
      ))),
    }
  }

  fn unary(&self, env: &Env, op: UnaryOp, arg: NodeId) -> Result<Value, EvalError> {
    if op == UnaryOp::Typeof {
      // `typeof undeclared` is not an error.
      if let NodeKind::Ident { name } = self.kind(arg) {
        if !env.has(name) {
          return Ok(Value::string("undefined"));
        }
      }
      return Ok(Value::string(self.expr(env, arg)?.type_of()));
    }
    let value = self.expr(env, arg)?;
    Ok(match op {
      UnaryOp::Neg => Value::Number(-value.to_number()),
      UnaryOp::Plus => Value::Number(value.to_number()),
      UnaryOp::Not => Value::Bool(!value.truthy()),
      UnaryOp::Void | UnaryOp::Typeof => Value::Undefined,
    })
  }

  fn binary(&self, env: &Env, op: BinaryOp, left: NodeId, right: NodeId) -> Result<Value, EvalError> {
    let lhs = self.expr(env, left)?;
    match op {
      BinaryOp::LogicalAnd if !lhs.truthy() => return Ok(lhs),
      BinaryOp::LogicalOr if lhs.truthy() => return Ok(lhs),
      BinaryOp::Nullish if !lhs.is_nullish() => return Ok(lhs),
      BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::Nullish => {
        return self.expr(env, right)
      }
      _ => {}
    };
    let rhs = self.expr(env, right)?;
    Ok(apply_binary(op, &lhs, &rhs))
  }

  fn assign(&self, env: &Env, op: AssignOp, target: NodeId, value: NodeId) -> Result<Value, EvalError> {
    let combine = |current: Value, value: Value| match op.binary() {
      Some(bin) => apply_binary(bin, &current, &value),
      None => value,
    };
    match self.kind(target) {
      NodeKind::Ident { name } | NodeKind::Binding { name } => {
        let current = match op {
          AssignOp::Assign => Value::Undefined,
          _ => env.get(name)?,
        };
        let value = combine(current, self.expr(env, value)?);
        env.assign(name, value.clone())?;
        Ok(value)
      }
      NodeKind::Member { object, property } => {
        let object = self.expr(env, *object)?;
        let current = match op {
          AssignOp::Assign => Value::Undefined,
          _ => object.property(property)?,
        };
        let value = combine(current, self.expr(env, value)?);
        object.set_property(property, value.clone())?;
        Ok(value)
      }
      NodeKind::Index { object, index } => {
        let object = self.expr(env, *object)?;
        let key = self.expr(env, *index)?.to_js_string();
        let current = match op {
          AssignOp::Assign => Value::Undefined,
          _ => object.property(&key)?,
        };
        let value = combine(current, self.expr(env, value)?);
        object.set_property(&key, value.clone())?;
        Ok(value)
      }
      _ => Err(EvalError::new("invalid assignment target")),
    }
  }
}

fn cooked(raw: &str) -> Result<String, EvalError> {
  cook(raw).ok_or_else(|| EvalError::new(format!("invalid escape in template {raw:?}")))
}

fn to_int32(value: &Value) -> i32 {
  let n = value.to_number();
  if !n.is_finite() {
    return 0;
  }
  (n.trunc() as i64 as u64 & 0xffff_ffff) as u32 as i32
}

// Operands that turn `+` into string concatenation.
fn concatenates(value: &Value) -> bool {
  matches!(
    value,
    Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Module(_) | Value::Function(_)
  )
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
  let number = |f: fn(f64, f64) -> f64| Value::Number(f(lhs.to_number(), rhs.to_number()));
  let compare = |f: fn(std::cmp::Ordering) -> bool| match (lhs, rhs) {
    (Value::String(a), Value::String(b)) => Value::Bool(f(a.cmp(b))),
    _ => Value::Bool(
      lhs
        .to_number()
        .partial_cmp(&rhs.to_number())
        .is_some_and(f),
    ),
  };
  let bits = |f: fn(i32, i32) -> i32| Value::Number(f64::from(f(to_int32(lhs), to_int32(rhs))));
  match op {
    BinaryOp::Add => {
      if concatenates(lhs) || concatenates(rhs) {
        Value::string(format!("{}{}", lhs.to_js_string(), rhs.to_js_string()))
      } else {
        number(|a, b| a + b)
      }
    }
    BinaryOp::Sub => number(|a, b| a - b),
    BinaryOp::Mul => number(|a, b| a * b),
    BinaryOp::Div => number(|a, b| a / b),
    BinaryOp::Rem => number(|a, b| a % b),
    BinaryOp::Exp => number(f64::powf),
    BinaryOp::Lt => compare(|o| o.is_lt()),
    BinaryOp::LtEq => compare(|o| o.is_le()),
    BinaryOp::Gt => compare(|o| o.is_gt()),
    BinaryOp::GtEq => compare(|o| o.is_ge()),
    BinaryOp::Eq => Value::Bool(lhs.loose_equals(rhs)),
    BinaryOp::NotEq => Value::Bool(!lhs.loose_equals(rhs)),
    BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
    BinaryOp::StrictNotEq => Value::Bool(!lhs.strict_equals(rhs)),
    BinaryOp::BitAnd => bits(|a, b| a & b),
    BinaryOp::BitOr => bits(|a, b| a | b),
    BinaryOp::BitXor => bits(|a, b| a ^ b),
    // Short-circuiting operators are handled before both sides are evaluated.
    BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::Nullish => Value::Undefined,
  }
}

fn node_name(kind: &NodeKind) -> &'static str {
  match kind {
    NodeKind::Program { .. } => "program",
    NodeKind::Import { .. } => "import",
    NodeKind::ExportDecl { .. }
    | NodeKind::ExportDefault { .. }
    | NodeKind::ExportList { .. }
    | NodeKind::ExportAll { .. } => "export",
    NodeKind::Property { .. } => "property",
    _ => "statement in expression position",
  }
}
