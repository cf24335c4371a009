//! Assembly line records and their column-aligned rendering.
//!
//! Each record is a list of text cells (mnemonic, operands, comment) plus an
//! indentation depth. Rendering pads every cell but the last to the widest
//! cell of its column across the whole output, then adds [`COLUMN_PADDING`].

use tracing::debug;

/// Extra spaces after the widest cell of a column.
pub const COLUMN_PADDING: usize = 2;

/// Spaces per indentation level.
pub const INDENT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
  pub depth: usize,
  pub cells: Vec<String>,
}

#[derive(Debug)]
pub struct Emitter {
  records: Vec<LineRecord>,
  depth: usize,
  comments: bool,
}

impl Emitter {
  pub fn new(comments: bool) -> Self {
    Self {
      records: Vec::new(),
      depth: 0,
      comments,
    }
  }

  pub fn indent(&mut self) {
    self.depth += 1;
  }

  pub fn dedent(&mut self) {
    self.depth = self.depth.saturating_sub(1);
  }

  /// An instruction at the current depth. `operands` may be empty; `comment`
  /// is dropped when comments are disabled.
  pub fn instr(&mut self, mnemonic: &str, operands: &str, comment: &str) {
    let mut cells = vec![mnemonic.to_string()];
    let comment = (self.comments && !comment.is_empty()).then(|| format!("# {comment}"));
    if !operands.is_empty() || comment.is_some() {
      cells.push(operands.to_string());
    }
    cells.extend(comment);
    self.push(self.depth, cells);
  }

  /// A label line, always at depth 0.
  pub fn label(&mut self, name: &str) {
    self.push(0, vec![format!("{name}:")]);
  }

  /// An assembler directive, always at depth 0.
  pub fn directive(&mut self, name: &str, argument: &str) {
    self.push(0, vec![name.to_string(), argument.to_string()]);
  }

  fn push(&mut self, depth: usize, cells: Vec<String>) {
    self.records.push(LineRecord { depth, cells });
  }

  pub fn render(&self) -> String {
    let columns = self.records.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for record in &self.records {
      for (width, cell) in widths.iter_mut().zip(&record.cells) {
        *width = (*width).max(cell.chars().count());
      }
    }

    let mut out = String::new();
    for record in &self.records {
      let mut line = " ".repeat(record.depth * INDENT);
      let last = record.cells.len().saturating_sub(1);
      for (i, cell) in record.cells.iter().enumerate() {
        line.push_str(cell);
        if i < last {
          let pad = widths[i] - cell.chars().count() + COLUMN_PADDING;
          line.push_str(&" ".repeat(pad));
        }
      }
      out.push_str(line.trim_end());
      out.push('\n');
    }
    debug!(lines = self.records.len(), "rendered assembly");
    out
  }
}
