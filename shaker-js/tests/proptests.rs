use proptest::prelude::*;
use shaker_js::shake;
use shaker_js::ShakeOptions;
use std::collections::BTreeSet;
use syntax_js::parse;

#[derive(Clone, Debug)]
struct ModuleCase {
  source: String,
  exports: Vec<String>,
}

// Each statement declares a fresh name and may read any name declared before it.
fn module_case() -> impl Strategy<Value = ModuleCase> {
  prop::collection::vec((0u8..6, any::<prop::sample::Index>()), 1..14).prop_map(|stmts| {
    let mut source = String::new();
    let mut declared: Vec<String> = Vec::new();
    let mut exports = Vec::new();
    for (i, (kind, pick)) in stmts.into_iter().enumerate() {
      let operand = if declared.is_empty() {
        "1".to_string()
      } else {
        declared[pick.index(declared.len())].clone()
      };
      match kind {
        0 => {
          source.push_str(&format!("const v{i} = {operand} + {i};\n"));
          declared.push(format!("v{i}"));
        }
        1 => {
          source.push_str(&format!("export const e{i} = [{operand}];\n"));
          declared.push(format!("e{i}"));
          exports.push(format!("e{i}"));
        }
        2 => {
          source.push_str(&format!("function f{i}(p) {{ return p ?? {operand}; }}\n"));
          declared.push(format!("f{i}"));
        }
        3 => {
          source.push_str(&format!("const o{i} = {{ k: {operand} }};\no{i}.k = {i};\n"));
          declared.push(format!("o{i}"));
        }
        4 if !declared.is_empty() => {
          source.push_str(&format!("export {{ {operand} as x{i} }};\n"));
          exports.push(format!("x{i}"));
        }
        _ => {
          source.push_str(&format!("export const e{i} = () => {operand};\n"));
          declared.push(format!("e{i}"));
          exports.push(format!("e{i}"));
        }
      };
    }
    ModuleCase { source, exports }
  })
}

fn with_subsets() -> impl Strategy<Value = (ModuleCase, Vec<bool>, Vec<bool>)> {
  module_case().prop_flat_map(|case| {
    let n = case.exports.len();
    (
      Just(case),
      prop::collection::vec(any::<bool>(), n),
      prop::collection::vec(any::<bool>(), n),
    )
  })
}

fn select(exports: &[String], mask: &[bool]) -> BTreeSet<String> {
  exports
    .iter()
    .zip(mask)
    .filter(|(_, keep)| **keep)
    .map(|(name, _)| name.clone())
    .collect()
}

proptest! {
  #![proptest_config(ProptestConfig {
    cases: 64,
    .. ProptestConfig::default()
  })]

  #[test]
  fn shaking_is_idempotent((case, mask, _) in with_subsets()) {
    let ast = parse(&case.source).unwrap();
    let only = select(&case.exports, &mask);
    let once = shake(&ast, Some(&only), &ShakeOptions::default());
    let twice = shake(&once.ast, Some(&only), &ShakeOptions::default());
    prop_assert_eq!(&once.code, &twice.code);
    prop_assert_eq!(&once.imports, &twice.imports);
    // The printed output parses back to the same module.
    let reparsed = parse(&once.code).unwrap();
    prop_assert_eq!(syntax_js::emit(&reparsed), once.code);
  }

  #[test]
  fn shaking_is_monotonic((case, larger, smaller) in with_subsets()) {
    let ast = parse(&case.source).unwrap();
    let s2 = select(&case.exports, &larger);
    let s1: BTreeSet<String> = select(&case.exports, &smaller)
      .intersection(&s2)
      .cloned()
      .collect();
    let small: BTreeSet<_> = shake(&ast, Some(&s1), &ShakeOptions::default()).ast.reachable().into_iter().collect();
    let large: BTreeSet<_> = shake(&ast, Some(&s2), &ShakeOptions::default()).ast.reachable().into_iter().collect();
    prop_assert!(small.is_subset(&large));
  }

  #[test]
  fn requested_exports_stay_exported((case, mask, _) in with_subsets()) {
    let ast = parse(&case.source).unwrap();
    let only = select(&case.exports, &mask);
    let shaken = shake(&ast, Some(&only), &ShakeOptions::default());
    let graph = shaker_js::build_graph(&shaken.ast);
    let kept: BTreeSet<String> = graph.exports().keys().cloned().collect();
    // Unrequested exports may survive when a requested one reads them.
    prop_assert!(only.is_subset(&kept));
    let all: BTreeSet<String> = case.exports.iter().cloned().collect();
    prop_assert!(kept.is_subset(&all));
  }
}
