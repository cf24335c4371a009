//! A tiny interpreter for the subset of x86-64 AT&T assembly the compiler
//! emits. Good enough to run compiled test programs and read `%rax` back.

use std::collections::HashMap;

const RETURN_ADDRESS: i64 = -1;
const STACK_TOP: i64 = 0x7fff_0000;
const STEP_LIMIT: usize = 1_000_000;

#[derive(Debug)]
struct Instr {
  op: String,
  args: Vec<String>,
}

pub struct Machine {
  program: Vec<Instr>,
  labels: HashMap<String, usize>,
  regs: HashMap<&'static str, i64>,
  memory: HashMap<i64, i64>,
  /// `(destination, source)` of the last `cmp`.
  flags: (i64, i64),
}

impl Machine {
  pub fn load(asm: &str) -> Self {
    let mut program = Vec::new();
    let mut labels = HashMap::new();
    for line in asm.lines() {
      let line = line.split('#').next().unwrap_or("").trim();
      if line.is_empty() || line.starts_with('.') {
        continue;
      }
      if let Some(label) = line.strip_suffix(':') {
        labels.insert(label.to_string(), program.len());
        continue;
      }
      let (op, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
      let args = rest
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect();
      program.push(Instr {
        op: op.to_string(),
        args,
      });
    }

    let regs = ["rax", "rcx", "rdx", "rbp", "rsp"]
      .into_iter()
      .map(|r| (r, 0))
      .collect();
    Self {
      program,
      labels,
      regs,
      memory: HashMap::new(),
      flags: (0, 0),
    }
  }

  fn reg(&self, name: &str) -> i64 {
    *self
      .regs
      .get(name)
      .unwrap_or_else(|| panic!("unknown register {name}"))
  }

  fn set_reg(&mut self, name: &str, value: i64) {
    let slot = self
      .regs
      .get_mut(name)
      .unwrap_or_else(|| panic!("unknown register {name}"));
    *slot = value;
  }

  fn address(&self, operand: &str) -> Option<i64> {
    let (disp, base) = operand.strip_suffix(')')?.split_once('(')?;
    let disp: i64 = if disp.is_empty() { 0 } else { disp.parse().ok()? };
    Some(self.reg(base.trim_start_matches('%')) + disp)
  }

  fn read(&self, operand: &str) -> i64 {
    if let Some(imm) = operand.strip_prefix('$') {
      // The assembler reads a leading zero as octal.
      let digits = imm.trim_start_matches('-');
      assert!(digits == "0" || !digits.starts_with('0'), "octal immediate {operand}");
      return imm.parse().unwrap_or_else(|_| panic!("bad immediate {operand}"));
    }
    if operand == "%al" {
      return self.reg("rax") & 0xff;
    }
    if let Some(reg) = operand.strip_prefix('%') {
      return self.reg(reg);
    }
    let addr = self
      .address(operand)
      .unwrap_or_else(|| panic!("bad operand {operand}"));
    *self
      .memory
      .get(&addr)
      .unwrap_or_else(|| panic!("read of uninitialised memory at {addr:#x}"))
  }

  fn write(&mut self, operand: &str, value: i64) {
    if operand == "%al" {
      let rax = self.reg("rax");
      self.set_reg("rax", (rax & !0xff) | (value & 0xff));
    } else if let Some(reg) = operand.strip_prefix('%') {
      self.set_reg(reg, value);
    } else {
      let addr = self
        .address(operand)
        .unwrap_or_else(|| panic!("bad operand {operand}"));
      self.memory.insert(addr, value);
    }
  }

  fn push(&mut self, value: i64) {
    let rsp = self.reg("rsp") - 8;
    self.set_reg("rsp", rsp);
    self.memory.insert(rsp, value);
  }

  fn pop(&mut self) -> i64 {
    let rsp = self.reg("rsp");
    let value = *self.memory.get(&rsp).expect("pop from empty stack");
    self.set_reg("rsp", rsp + 8);
    value
  }

  fn condition(&self, op: &str) -> bool {
    let (dst, src) = self.flags;
    match op {
      "sete" | "je" => dst == src,
      "setne" | "jne" => dst != src,
      "setl" => dst < src,
      "setle" => dst <= src,
      "setg" => dst > src,
      "setge" => dst >= src,
      other => panic!("unknown condition {other}"),
    }
  }

  /// Call `entry` and return `%rax` when it returns.
  pub fn call(&mut self, entry: &str) -> i64 {
    let mut pc = *self
      .labels
      .get(entry)
      .unwrap_or_else(|| panic!("no function {entry}"));
    self.set_reg("rsp", STACK_TOP);
    self.set_reg("rbp", 0x1234);
    self.push(RETURN_ADDRESS);

    for _ in 0..STEP_LIMIT {
      let instr = self
        .program
        .get(pc)
        .unwrap_or_else(|| panic!("fell off the end of the program"));
      let op = instr.op.clone();
      let args = instr.args.clone();
      pc += 1;

      match (op.as_str(), args.as_slice()) {
        ("mov" | "movzbq", [src, dst]) => {
          let value = self.read(src);
          self.write(dst, value);
        }
        ("push", [src]) => {
          let value = self.read(src);
          self.push(value);
        }
        ("pop", [dst]) => {
          let value = self.pop();
          self.write(dst, value);
        }
        ("add", [src, dst]) => {
          let value = self.read(dst).wrapping_add(self.read(src));
          self.write(dst, value);
        }
        ("sub", [src, dst]) => {
          let value = self.read(dst).wrapping_sub(self.read(src));
          self.write(dst, value);
        }
        ("imul", [src, dst]) => {
          let value = self.read(dst).wrapping_mul(self.read(src));
          self.write(dst, value);
        }
        ("neg", [dst]) => {
          let value = self.read(dst).wrapping_neg();
          self.write(dst, value);
        }
        ("not", [dst]) => {
          let value = !self.read(dst);
          self.write(dst, value);
        }
        ("cqo", []) => {
          let sign = if self.reg("rax") < 0 { -1 } else { 0 };
          self.set_reg("rdx", sign);
        }
        ("idiv", [src]) => {
          let divisor = i128::from(self.read(src));
          assert_ne!(divisor, 0, "division by zero");
          let dividend = (i128::from(self.reg("rdx")) << 64) | i128::from(self.reg("rax") as u64);
          self.set_reg("rax", (dividend / divisor) as i64);
          self.set_reg("rdx", (dividend % divisor) as i64);
        }
        ("cmp", [src, dst]) => {
          self.flags = (self.read(dst), self.read(src));
        }
        (set, [dst]) if set.starts_with("set") => {
          let value = i64::from(self.condition(set));
          self.write(dst, value);
        }
        ("jmp", [label]) => pc = self.labels[label],
        (jump @ ("je" | "jne"), [label]) => {
          if self.condition(jump) {
            pc = self.labels[label];
          }
        }
        ("ret", []) => {
          let target = self.pop();
          if target == RETURN_ADDRESS {
            return self.reg("rax");
          }
          pc = usize::try_from(target).expect("bad return address");
        }
        _ => panic!("unsupported instruction {op} {args:?}"),
      }
    }
    panic!("step limit exceeded");
  }
}

/// Compile `source` and run its `main`.
pub fn run(source: &str) -> i64 {
  let asm = nanocc::generate_assembly(source)
    .unwrap_or_else(|err| panic!("compile failed: {err}\n{source}"));
  Machine::load(&asm).call("main")
}
