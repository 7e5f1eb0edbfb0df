use ast::Ast;
use error::SyntaxResult;
use lex::Lexer;
use parse::ParseOptions;
use parse::Parser;

pub mod ast;
pub mod emit;
pub mod error;
pub mod lex;
pub mod loc;
pub mod num;
pub mod parse;
pub mod token;

pub use emit::emit;

/// Parses an ES module.
pub fn parse(source: &str) -> SyntaxResult<Ast> {
  parse_with_options(source, ParseOptions::default())
}

pub fn parse_with_options(source: &str, options: ParseOptions) -> SyntaxResult<Ast> {
  let lexer = Lexer::new(source);
  let parser = Parser::new(lexer);
  parser.top_level(options.top_level_mode)
}
