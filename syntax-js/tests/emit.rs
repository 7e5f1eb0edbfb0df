use similar::ChangeTag;
use similar::TextDiff;
use syntax_js::ast::NodeKind;
use syntax_js::emit;
use syntax_js::parse;

fn assert_same(expected: &str, actual: &str) {
  if expected == actual {
    return;
  }
  let diff = TextDiff::from_lines(expected, actual);
  let mut msg = String::new();
  for change in diff.iter_all_changes() {
    let sign = match change.tag() {
      ChangeTag::Delete => "-",
      ChangeTag::Insert => "+",
      ChangeTag::Equal => " ",
    };
    msg.push_str(&format!("{}{}", sign, change));
  }
  panic!("emitted output differs:\n{}", msg);
}

const MODULE: &str = r#"
import { css } from "@preval/css";
import * as util from './util'
const base = 4
function scale(n) {
  if (n > 10) return n
  else {
    return n * base;
  }
}
export const size = scale(2) + 'px';
export const title = css`font-size: ${size};`;
export default { size, label: "a\"b", "x-y": [1, 2.5], nested: () => ({}) };
export { base as b, util };
"#;

const EMITTED: &str = r#"import { css } from "@preval/css";
import * as util from "./util";
const base = 4;
function scale(n) {
  if (n > 10) return n; else {
    return n * base;
  }
}
export const size = scale(2) + "px";
export const title = css`font-size: ${size};`;
export default { size, label: "a\"b", "x-y": [1, 2.5], nested: () => ({}) };
export { base as b, util };
"#;

#[test]
fn emits_canonical_source() {
  let ast = parse(MODULE).unwrap();
  assert_same(EMITTED, &emit(&ast));
}

#[test]
fn emitting_is_a_fixed_point() {
  let once = emit(&parse(MODULE).unwrap());
  let twice = emit(&parse(&once).unwrap());
  assert_same(&once, &twice);
}

#[test]
fn emits_patched_trees() {
  let mut ast = parse("const a = 1, b = 2;\nconst c = 3;\n").unwrap();
  let root = ast.root();
  let stmts = ast.top_level_statements().to_vec();
  let NodeKind::VarDecl { declarators, .. } = ast.kind(stmts[0]).clone() else {
    panic!("expected declaration");
  };
  let patched = ast.kind(stmts[0]).with_removable_children(vec![declarators[1]]);
  ast.replace(stmts[0], patched);
  let body = ast.kind(root).with_removable_children(vec![stmts[0]]);
  ast.replace(root, body);
  assert_same("const b = 2;\n", &emit(&ast));
}

#[test]
fn keeps_parentheses_and_unary_spacing() {
  let ast = parse("x = -(-y); z = - -w; f = function () { return (a) => a + 1 };").unwrap();
  assert_same(
    "x = -(-y);\nz = - -w;\nf = function() {\n  return (a) => a + 1;\n};\n",
    &emit(&ast),
  );
}
