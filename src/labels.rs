use tracing::trace;

/// Categories of generated control-flow labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
  Clause,
  Else,
  End,
  Post,
}

impl LabelKind {
  const ALL: [LabelKind; 4] = [Self::Clause, Self::Else, Self::End, Self::Post];

  pub fn prefix(self) -> &'static str {
    match self {
      Self::Clause => "clause",
      Self::Else => "else",
      Self::End => "end",
      Self::Post => "post",
    }
  }

  fn index(self) -> usize {
    match self {
      Self::Clause => 0,
      Self::Else => 1,
      Self::End => 2,
      Self::Post => 3,
    }
  }
}

/// Hands out `<category><n>` labels with one zero-based counter per
/// category. A single generator lives for a whole program so labels never
/// collide across functions.
#[derive(Debug, Default)]
pub struct LabelGenerator {
  counts: [usize; LabelKind::ALL.len()],
}

impl LabelGenerator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn next(&mut self, kind: LabelKind) -> String {
    let count = &mut self.counts[kind.index()];
    let label = format!("{}{}", kind.prefix(), count);
    *count += 1;
    trace!(%label, "new label");
    label
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counters_are_per_category() {
    let mut labels = LabelGenerator::new();
    assert_eq!(labels.next(LabelKind::Clause), "clause0");
    assert_eq!(labels.next(LabelKind::End), "end0");
    assert_eq!(labels.next(LabelKind::Clause), "clause1");
    assert_eq!(labels.next(LabelKind::Post), "post0");
    assert_eq!(labels.next(LabelKind::Else), "else0");
    assert_eq!(labels.counts, [2, 1, 1, 1]);
  }

  #[test]
  fn every_category_has_a_distinct_prefix() {
    let prefixes: Vec<&str> = LabelKind::ALL.iter().map(|k| k.prefix()).collect();
    assert_eq!(prefixes, ["clause", "else", "end", "post"]);
  }
}
