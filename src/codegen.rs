//! Code generation: lower the syntax tree into AT&T x86-64 assembly.
//!
//! Every expression leaves its value in `%rax`; binary operators park one
//! operand on the stack while the other is computed and pop it into `%rcx`.
//! `-`, `/` and `%` compute their right operand first so the left one ends
//! up in `%rax` for the final instruction; every other operator computes the
//! left operand first. Locals live in the frame below `%rbp`, which the
//! prologue reserves in one step.

use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::ast::{InfixOp, Node, PrefixOp};
use crate::emit::Emitter;
use crate::error::{CompileResult, LiteralOutOfRangeSnafu, SemanticSnafu, UnsupportedNodeSnafu};
use crate::labels::{LabelGenerator, LabelKind};
use crate::locals::VariableTable;

#[derive(Debug, Clone)]
pub struct CodegenOptions {
  /// Emit a trailing comment explaining each instruction.
  pub comments: bool,
}

impl Default for CodegenOptions {
  fn default() -> Self {
    Self { comments: true }
  }
}

/// Emit assembly for a whole program.
pub fn generate(program: &Node, options: &CodegenOptions) -> CompileResult<String> {
  let mut generator = Generator::new(options);
  generator.emit_program(program)?;
  Ok(generator.out.render())
}

struct Generator {
  labels: LabelGenerator,
  locals: VariableTable,
  out: Emitter,
}

impl Generator {
  fn new(options: &CodegenOptions) -> Self {
    Self {
      labels: LabelGenerator::new(),
      locals: VariableTable::new(),
      out: Emitter::new(options.comments),
    }
  }

  fn emit_program(&mut self, program: &Node) -> CompileResult<()> {
    let Node::Program { functions } = program else {
      return unsupported(program);
    };
    for function in functions {
      self.emit_function(function)?;
    }
    Ok(())
  }

  /// No epilogue is synthesised: a body that does not end in `return` falls
  /// off the end of the function.
  fn emit_function(&mut self, function: &Node) -> CompileResult<()> {
    let Node::FunctionDecl { name, body, .. } = function else {
      return unsupported(function);
    };
    debug!(function = %name, "generating function");
    self.locals = VariableTable::new();

    self.out.directive(".globl", name);
    self.out.label(name);
    self.out.indent();
    self.out.instr("push", "%rbp", "save the caller's frame pointer");
    self.out.instr("mov", "%rsp, %rbp", "establish our frame");
    let frame = frame_size(body);
    if frame > 0 {
      self
        .out
        .instr("sub", &format!("${frame}, %rsp"), "reserve local variable slots");
    }
    self.emit_stmt(body)?;
    self.out.dedent();
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Node) -> CompileResult<()> {
    match stmt {
      Node::Block { statements } => {
        for stmt in statements {
          self.emit_stmt(stmt)?;
        }
      }
      Node::VarDecl { ty, name, init } => {
        match init {
          Some(init) => self.emit_expr(init)?,
          None => self.out.instr("mov", "$0, %rax", "uninitialised locals start at zero"),
        }
        let offset = self.locals.declare(name, *ty)?;
        self.out.instr(
          "mov",
          &format!("%rax, {offset}(%rbp)"),
          &format!("{ty} {name}"),
        );
      }
      Node::ExpressionStatement { expression } => self.emit_expr(expression)?,
      Node::ReturnStatement { value } => {
        self.emit_expr(value)?;
        self.out.instr("mov", "%rbp, %rsp", "discard the frame");
        self.out.instr("pop", "%rbp", "restore the caller's frame pointer");
        self.out.instr("ret", "", "");
      }
      Node::IfStatement {
        condition,
        then,
        otherwise,
      } => self.emit_if(condition, then, otherwise.as_deref())?,
      _ => return unsupported(stmt),
    }
    Ok(())
  }

  fn emit_if(&mut self, condition: &Node, then: &Node, otherwise: Option<&Node>) -> CompileResult<()> {
    let clause = self.labels.next(LabelKind::Clause);
    let other = otherwise.map(|_| self.labels.next(LabelKind::Else));
    let post = self.labels.next(LabelKind::Post);

    self.emit_expr(condition)?;
    self.out.instr("cmp", "$0, %rax", "test the condition");
    self.out.instr("jne", &clause, "true: run the then-branch");
    self.out.instr("jmp", other.as_ref().unwrap_or(&post), "false: skip it");

    self.out.label(&clause);
    self.out.indent();
    self.emit_stmt(then)?;
    self.out.instr("jmp", &post, "");
    self.out.dedent();

    if let (Some(other), Some(otherwise)) = (other, otherwise) {
      self.out.label(&other);
      self.out.indent();
      self.emit_stmt(otherwise)?;
      self.out.dedent();
    }
    self.out.label(&post);
    Ok(())
  }

  fn emit_expr(&mut self, expr: &Node) -> CompileResult<()> {
    match expr {
      Node::IntegerLiteral { value } => {
        let value = literal_value(value)?;
        self.out.instr("mov", &format!("${value}, %rax"), "load constant");
      }
      Node::Identifier { name } => {
        let offset = self.locals.lookup(name)?;
        self
          .out
          .instr("mov", &format!("{offset}(%rbp), %rax"), &format!("load {name}"));
      }
      Node::PrefixExpression { op, operand } => {
        self.emit_expr(operand)?;
        match op {
          PrefixOp::Neg => self.out.instr("neg", "%rax", "negate"),
          PrefixOp::BitNot => self.out.instr("not", "%rax", "flip every bit"),
          PrefixOp::Not => {
            self.out.instr("cmp", "$0, %rax", "ZF is set when the operand is zero");
            self.out.instr("sete", "%al", "");
            self.out.instr("movzbq", "%al, %rax", "zero-extend the flag");
          }
        }
      }
      Node::InfixExpression { op, lhs, rhs } => self.emit_infix(*op, lhs, rhs)?,
      Node::AssignExpression { op, target, value } => {
        let offset = self.locals.lookup(target)?;
        let slot = format!("{offset}(%rbp)");
        self.emit_expr(value)?;
        if let Some(arith) = op.arithmetic() {
          self.out.instr("mov", "%rax, %rcx", "right-hand side");
          self
            .out
            .instr("mov", &format!("{slot}, %rax"), &format!("current {target}"));
          self.emit_arith(arith);
        }
        self
          .out
          .instr("mov", &format!("%rax, {slot}"), &format!("store {target}"));
      }
      _ => return unsupported(expr),
    }
    Ok(())
  }

  fn emit_infix(&mut self, op: InfixOp, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    match op {
      InfixOp::And => return self.emit_logical_and(lhs, rhs),
      InfixOp::Or => return self.emit_logical_or(lhs, rhs),
      _ => {}
    }

    let (first, second) = if matches!(op, InfixOp::Sub | InfixOp::Div | InfixOp::Mod) {
      (rhs, lhs)
    } else {
      (lhs, rhs)
    };
    self.emit_expr(first)?;
    self.out.instr("push", "%rax", "save the first operand");
    self.emit_expr(second)?;

    match op {
      InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Le | InfixOp::Gt | InfixOp::Ge => {
        self.out.instr("pop", "%rcx", "left operand");
        self.out.instr("cmp", "%rax, %rcx", "compare left with right");
        self.out.instr(set_instr(op), "%al", "");
        self.out.instr("movzbq", "%al, %rax", "zero-extend the flag");
      }
      _ => {
        self.out.instr("pop", "%rcx", "");
        self.emit_arith(op);
      }
    }
    Ok(())
  }

  /// Combine `%rax` with `%rcx` into `%rax`. For `-` and `/` the left
  /// operand is the one in `%rax`.
  fn emit_arith(&mut self, op: InfixOp) {
    match op {
      InfixOp::Add => self.out.instr("add", "%rcx, %rax", ""),
      InfixOp::Sub => self.out.instr("sub", "%rcx, %rax", ""),
      InfixOp::Mul => self.out.instr("imul", "%rcx, %rax", ""),
      InfixOp::Div | InfixOp::Mod => {
        self.out.instr("cqo", "", "sign-extend %rax into %rdx:%rax");
        self.out.instr("idiv", "%rcx", "quotient in %rax, remainder in %rdx");
        if op == InfixOp::Mod {
          self.out.instr("mov", "%rdx, %rax", "keep the remainder");
        }
      }
      _ => {}
    }
  }

  /// `lhs && rhs`: the right operand only runs when the left one is true.
  fn emit_logical_and(&mut self, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    let clause = self.labels.next(LabelKind::Clause);
    let end = self.labels.next(LabelKind::End);

    self.emit_expr(lhs)?;
    self.out.instr("cmp", "$0, %rax", "");
    self.out.instr("jne", &clause, "left is true: evaluate the right");
    self.out.instr("jmp", &end, "left is false: result is 0");
    self.emit_clause(&clause, rhs)?;
    self.out.label(&end);
    Ok(())
  }

  /// `lhs || rhs`: the right operand only runs when the left one is false.
  fn emit_logical_or(&mut self, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    let clause = self.labels.next(LabelKind::Clause);
    let end = self.labels.next(LabelKind::End);

    self.emit_expr(lhs)?;
    self.out.instr("cmp", "$0, %rax", "");
    self.out.instr("je", &clause, "left is false: evaluate the right");
    self.out.instr("mov", "$1, %rax", "left is true: result is 1");
    self.out.instr("jmp", &end, "");
    self.emit_clause(&clause, rhs)?;
    self.out.label(&end);
    Ok(())
  }

  /// The right operand of a short-circuit operator, normalised to 0 or 1.
  fn emit_clause(&mut self, clause: &str, rhs: &Node) -> CompileResult<()> {
    self.out.label(clause);
    self.out.indent();
    self.emit_expr(rhs)?;
    self.out.instr("cmp", "$0, %rax", "");
    self.out.instr("setne", "%al", "");
    self.out.instr("movzbq", "%al, %rax", "");
    self.out.dedent();
    Ok(())
  }
}

fn set_instr(op: InfixOp) -> &'static str {
  match op {
    InfixOp::Eq => "sete",
    InfixOp::Ne => "setne",
    InfixOp::Lt => "setl",
    InfixOp::Le => "setle",
    InfixOp::Gt => "setg",
    _ => "setge",
  }
}

/// Bytes of frame needed by every declaration in `node`, nested blocks and
/// branches included.
fn frame_size(node: &Node) -> i64 {
  match node {
    Node::Block { statements } => statements.iter().map(frame_size).sum(),
    Node::VarDecl { ty, .. } => ty.size(),
    Node::IfStatement {
      then, otherwise, ..
    } => frame_size(then) + otherwise.as_deref().map_or(0, frame_size),
    _ => 0,
  }
}

/// Literals are decimal text. The assembler would read a leading zero as
/// octal, so the value is re-rendered rather than pasted.
fn literal_value(text: &str) -> CompileResult<i64> {
  text
    .parse::<i64>()
    .ok()
    .context(LiteralOutOfRangeSnafu { literal: text })
    .context(SemanticSnafu)
}

fn unsupported<T>(node: &Node) -> CompileResult<T> {
  UnsupportedNodeSnafu {
    node: node.kind_name(),
  }
  .fail()
}
