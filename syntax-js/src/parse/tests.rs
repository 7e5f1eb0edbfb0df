use super::Parser;
use super::ParseOptions;
use super::TopLevelMode;
use crate::ast::ImportName;
use crate::ast::NodeKind;
use crate::ast::VarDeclMode;
use crate::error::SyntaxErrorType;
use crate::lex::LexMode;
use crate::lex::Lexer;
use crate::parse;
use crate::parse_with_options;
use crate::token::TT;

#[test]
fn test_parser_buffer() {
  let lexer = Lexer::new("let x = `a${b}`;");
  let mut p = Parser::new(lexer);
  let cp = p.checkpoint();
  assert_eq!(p.next_tok_i, 0);

  let t = p.peek();
  assert_eq!(p.next_tok_i, 0);
  assert_eq!(p.buf.len(), 1);
  assert_eq!(t.typ, TT::KeywordLet);

  let t = p.consume();
  assert_eq!(p.next_tok_i, 1);
  assert_eq!(t.typ, TT::KeywordLet);
  let t = p.consume();
  assert_eq!(p.next_tok_i, 2);
  assert_eq!(p.buf.len(), 2);
  assert_eq!(t.typ, TT::Identifier);

  p.restore_checkpoint(cp);
  assert_eq!(p.next_tok_i, 0);
  assert_eq!(p.buf.len(), 2);

  // A different lex mode truncates the buffer.
  let t = p.consume_with_mode(LexMode::TemplateStrContinue);
  assert_eq!(p.buf.len(), 1);
  assert_eq!(t.typ, TT::LiteralTemplatePartStringEnd);
}

fn top_level_kinds(source: &str) -> Vec<NodeKind> {
  let ast = parse(source).unwrap();
  ast
    .top_level_statements()
    .iter()
    .map(|id| ast.kind(*id).clone())
    .collect()
}

#[test]
fn parses_imports() {
  let ast = parse(r#"import d, { a, b as c, default as e } from "m"; import * as ns from "n"; import "side";"#).unwrap();
  let stmts = ast.top_level_statements();
  assert_eq!(stmts.len(), 3);
  let NodeKind::Import { specifiers, source } = ast.kind(stmts[0]) else {
    panic!("expected import");
  };
  assert_eq!(source, "m");
  let names: Vec<_> = specifiers
    .iter()
    .map(|s| match ast.kind(*s) {
      NodeKind::ImportSpecifier { imported, binding } => {
        (imported.clone(), ast.binding_name(*binding).unwrap().to_string())
      }
      other => panic!("unexpected {:?}", other),
    })
    .collect();
  assert_eq!(names, vec![
    (ImportName::Default, "d".to_string()),
    (ImportName::Named("a".into()), "a".to_string()),
    (ImportName::Named("b".into()), "c".to_string()),
    (ImportName::Default, "e".to_string()),
  ]);
  let NodeKind::Import { specifiers, .. } = ast.kind(stmts[1]) else {
    panic!("expected import");
  };
  assert!(matches!(ast.kind(specifiers[0]), NodeKind::ImportSpecifier {
    imported: ImportName::Namespace,
    ..
  }));
  assert!(matches!(ast.kind(stmts[2]), NodeKind::Import { specifiers, .. } if specifiers.is_empty()));
}

#[test]
fn parses_exports() {
  let kinds = top_level_kinds(
    r#"
      export const a = 1, b = 2;
      export function f() {}
      export default a + b;
      export { a as x, b };
      export { y } from "m";
      export * from "n";
      export * as ns from "o";
    "#,
  );
  assert!(matches!(kinds[0], NodeKind::ExportDecl { .. }));
  assert!(matches!(kinds[1], NodeKind::ExportDecl { .. }));
  assert!(matches!(kinds[2], NodeKind::ExportDefault { .. }));
  assert!(matches!(&kinds[3], NodeKind::ExportList { specifiers, from: None } if specifiers.len() == 2));
  assert!(matches!(&kinds[4], NodeKind::ExportList { from: Some(f), .. } if f == "m"));
  assert_eq!(kinds[5], NodeKind::ExportAll {
    from: "n".into(),
    alias: None,
  });
  assert_eq!(kinds[6], NodeKind::ExportAll {
    from: "o".into(),
    alias: Some("ns".into()),
  });
}

#[test]
fn parses_declarations_without_semicolons() {
  let ast = parse("let a = 1\nvar b\nconst c = a").unwrap();
  let modes: Vec<_> = ast
    .top_level_statements()
    .iter()
    .map(|id| match ast.kind(*id) {
      NodeKind::VarDecl { mode, .. } => *mode,
      other => panic!("unexpected {:?}", other),
    })
    .collect();
  assert_eq!(modes, vec![VarDeclMode::Let, VarDeclMode::Var, VarDeclMode::Const]);
}

#[test]
fn parses_arrows_and_templates() {
  let ast = parse("const f = (a, b) => `${a}-${b}`; const g = x => ({ x }); const h = (1 + 2) * 3;").unwrap();
  let fns: Vec<_> = ast
    .reachable()
    .into_iter()
    .filter(|id| matches!(ast.kind(*id), NodeKind::Function { arrow: true, .. }))
    .collect();
  assert_eq!(fns.len(), 2);
  let template = ast
    .reachable()
    .into_iter()
    .find_map(|id| match ast.kind(id) {
      NodeKind::Template { quasis, exprs } => Some((quasis.clone(), exprs.len())),
      _ => None,
    })
    .unwrap();
  assert_eq!(template, (vec!["".to_string(), "-".to_string(), "".to_string()], 2));
}

#[test]
fn parses_tagged_templates_with_nested_braces() {
  let ast = parse("const c = css`color: ${({ a: 1 }).a}; }`;").unwrap();
  let tagged = ast
    .reachable()
    .into_iter()
    .find(|id| matches!(ast.kind(*id), NodeKind::TaggedTemplate { .. }))
    .unwrap();
  assert_eq!(ast.text(tagged), "css`color: ${({ a: 1 }).a}; }`");
}

#[test]
fn precedence_and_associativity() {
  let ast = parse("x = 1 + 2 * 3 ** 2 ** 2;").unwrap();
  let printed = crate::emit(&ast);
  assert_eq!(printed, "x = 1 + 2 * 3 ** 2 ** 2;\n");
  let NodeKind::ExprStmt { expr } = ast.kind(ast.top_level_statements()[0]) else {
    panic!("expected expression statement");
  };
  let NodeKind::Assign { value, .. } = ast.kind(*expr) else {
    panic!("expected assignment");
  };
  assert!(matches!(ast.kind(*value), NodeKind::Binary {
    op: crate::ast::BinaryOp::Add,
    ..
  }));
}

#[test]
fn rejects_invalid_assignment_target() {
  let err = parse("1 = 2;").unwrap_err();
  assert_eq!(err.typ, SyntaxErrorType::InvalidAssigmentTarget);
}

#[test]
fn rejects_module_syntax_in_scripts_and_nested_scopes() {
  let err = parse_with_options("import a from 'a';", ParseOptions {
    top_level_mode: TopLevelMode::Global,
  })
  .unwrap_err();
  assert!(matches!(err.typ, SyntaxErrorType::UnsupportedSyntax(_)));
  assert!(parse("function f() { export const a = 1; }").is_err());
}

#[test]
fn rejects_missing_separator() {
  let err = parse("const a = 1 const b = 2;").unwrap_err();
  assert_eq!(err.typ, SyntaxErrorType::RequiredTokenNotFound(TT::Semicolon));
}

#[test]
fn rejects_unsupported_syntax() {
  assert!(matches!(
    parse("const { a } = b;").unwrap_err().typ,
    SyntaxErrorType::UnsupportedSyntax(_)
  ));
  assert!(matches!(
    parse("return 1;").unwrap_err().typ,
    SyntaxErrorType::UnsupportedSyntax(_)
  ));
}
