use crate::error::SyntaxError;
use crate::error::SyntaxErrorType;
use crate::token::TT;
use serde::Serialize;
use std::cmp::{max, min};
use std::ops::{Add, AddAssign};

/// A half-open byte range within a single source text.
///
/// A location is not a source range in the strict sense: after transformations (e.g. re-export
/// explosion) new nodes exist that never appeared in the source, and those carry the location of
/// the node they were derived from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize)]
pub struct Loc(pub usize, pub usize);

impl Loc {
  pub fn error(self, typ: SyntaxErrorType, actual_token: Option<TT>) -> SyntaxError {
    SyntaxError::new(typ, self, actual_token)
  }

  pub fn is_empty(&self) -> bool {
    self.0 >= self.1
  }

  pub fn len(&self) -> usize {
    self.1.saturating_sub(self.0)
  }

  pub fn extend(&mut self, other: Loc) {
    self.0 = min(self.0, other.0);
    self.1 = max(self.1, other.1);
  }

  pub fn add_option(self, rhs: Option<Loc>) -> Loc {
    let mut new = self;
    if let Some(rhs) = rhs {
      new.extend(rhs);
    };
    new
  }

  /// Returns the slice of `source` covered by this location, or an empty string if it is out of
  /// bounds (possible for synthetic nodes).
  pub fn slice<'s>(&self, source: &'s str) -> &'s str {
    source.get(self.0..self.1).unwrap_or("")
  }

  /// 1-based line and column of the start offset.
  pub fn line_col(&self, source: &str) -> (usize, usize) {
    let upto = source.get(..self.0).unwrap_or(source);
    let line = upto.matches('\n').count() + 1;
    let col = upto.rfind('\n').map(|i| self.0 - i).unwrap_or(self.0 + 1);
    (line, col)
  }
}

impl Add for Loc {
  type Output = Loc;

  fn add(self, rhs: Self) -> Self::Output {
    let mut new = self;
    new.extend(rhs);
    new
  }
}

impl AddAssign for Loc {
  fn add_assign(&mut self, rhs: Self) {
    self.extend(rhs);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extend_covers_both_ranges() {
    let mut loc = Loc(4, 6);
    loc.extend(Loc(1, 2));
    assert_eq!(loc, Loc(1, 6));
    assert_eq!(Loc(3, 4) + Loc(8, 9), Loc(3, 9));
    assert_eq!(Loc(3, 4).add_option(None), Loc(3, 4));
  }

  #[test]
  fn line_col_is_one_based() {
    let source = "a\nbc\nd";
    assert_eq!(Loc(0, 1).line_col(source), (1, 1));
    assert_eq!(Loc(3, 4).line_col(source), (2, 2));
    assert_eq!(Loc(5, 6).line_col(source), (3, 1));
  }

  #[test]
  fn slice_out_of_bounds_is_empty() {
    assert_eq!(Loc(2, 4).slice("abcdef"), "cd");
    assert_eq!(Loc(10, 12).slice("abc"), "");
  }
}
