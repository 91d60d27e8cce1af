//! Two-pass assembler
//!
//! Statements, in matching priority:
//!
//! ```text
//! // comment            to end of line
//! name:                 label, bound to the index of the next instruction
//! source -> dest        move
//! ```
//!
//! Sources: `$N` integer, `(token, N)` micro-op with count, bare micro-op
//! token (count 1), `unit@buffer` output address, or a label reference.
//! Destinations: `unit@buffer` input address, `pc` or `null`.
//!
//! Label references emit a placeholder immediate and a fixup that
//! [`Assembler::build`] patches with the label's instruction index.

use crate::error::{AssemblerError, Operand};
use crate::topology::ProcessorDescription;
use regex::{Captures, Regex};
use scad_chip::{BufferAddress, Direction, Instruction, MicroOp, ScadValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<comment>//[^\n]*)
        | (?P<label>[A-Za-z_]\w*)[\ \t]*:
        | (?P<src>\([^()\n]*\)|[\w.$@]+)\s*->\s*(?P<dst>[\w.@]+)
        ",
    )
    .expect("statement pattern compiles")
});

/// A classified move source
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Immediate(ScadValue),
    Address(BufferAddress),
    Label(String),
}

/// A classified move destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Address(BufferAddress),
    Pc,
    Null,
}

/// Accumulates statements and resolves labels
///
/// `parse` may be called several times (e.g. one call per source file);
/// line numbers continue across calls. The first error is sticky: later
/// `parse` calls and `build` return it again, so no partial stream is
/// ever returned.
#[derive(Debug)]
pub struct Assembler<'t> {
    topology: &'t ProcessorDescription,
    instructions: Vec<Instruction>,
    symbols: HashMap<String, (usize, usize)>,
    fixups: BTreeMap<usize, (String, usize)>,
    line_base: usize,
    failed: Option<AssemblerError>,
}

impl<'t> Assembler<'t> {
    /// Start an empty program against `topology`
    pub fn new(topology: &'t ProcessorDescription) -> Self {
        Self {
            topology,
            instructions: Vec::new(),
            symbols: HashMap::new(),
            fixups: BTreeMap::new(),
            line_base: 1,
            failed: None,
        }
    }

    /// Instructions emitted so far
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Scan `text` and append its statements
    ///
    /// # Errors
    ///
    /// Returns the first error found: duplicate label, unresolvable
    /// address, malformed operand or stray text. Once an error has been
    /// returned every further call returns it again.
    pub fn parse(&mut self, text: &str) -> Result<(), AssemblerError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.scan(text).inspect_err(|err| self.failed = Some(err.clone()))
    }

    fn scan(&mut self, text: &str) -> Result<(), AssemblerError> {
        let mut cursor = 0;
        let mut line = self.line_base;

        for caps in STATEMENT.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };

            check_gap(&text[cursor..whole.start()], line)?;
            line += text[cursor..whole.start()].matches('\n').count();
            cursor = whole.end();

            self.statement(&caps, line)?;
            line += whole.as_str().matches('\n').count();
        }

        check_gap(&text[cursor..], line)?;
        line += text[cursor..].matches('\n').count();
        self.line_base = line;
        Ok(())
    }

    /// Patch fixups and return the finished stream
    ///
    /// # Errors
    ///
    /// Returns the error of a failed `parse`, otherwise
    /// [`AssemblerError::UnknownSymbol`] for the first reference (in
    /// instruction order) to a label that was never defined.
    pub fn build(mut self) -> Result<Vec<Instruction>, AssemblerError> {
        if let Some(err) = self.failed {
            return Err(err);
        }
        for (&index, (label, line)) in &self.fixups {
            let &(target, _) = self.symbols.get(label).ok_or_else(|| AssemblerError::UnknownSymbol {
                label: label.clone(),
                line: *line,
            })?;

            let target = ScadValue::from_u64(target as u64);
            match &mut self.instructions[index] {
                Instruction::MoveImmediate { value, .. } | Instruction::MovePc { target: value } => {
                    *value = target;
                }
                Instruction::Move { .. } => {}
            }
            tracing::debug!("Fixup #{}: '{}' -> {}", index, label, target.as_u64());
        }

        tracing::info!(
            "Assembled {} instructions ({} labels, {} fixups)",
            self.instructions.len(),
            self.symbols.len(),
            self.fixups.len()
        );
        Ok(self.instructions)
    }

    fn statement(&mut self, caps: &Captures<'_>, line: usize) -> Result<(), AssemblerError> {
        if caps.name("comment").is_some() {
            return Ok(());
        }

        if let Some(label) = caps.name("label") {
            return self.push_label(label.as_str(), line);
        }

        match (caps.name("src"), caps.name("dst")) {
            (Some(src), Some(dst)) => self.push_move(src.as_str(), dst.as_str(), line),
            _ => Ok(()),
        }
    }

    fn push_label(&mut self, label: &str, line: usize) -> Result<(), AssemblerError> {
        if label == "pc" || label == "null" || MicroOp::from_token(label).is_some() {
            return Err(AssemblerError::ReservedLabel {
                label: label.to_string(),
                line,
            });
        }
        if let Some(&(_, first_line)) = self.symbols.get(label) {
            return Err(AssemblerError::DuplicateLabel {
                label: label.to_string(),
                line,
                first_line,
            });
        }

        tracing::debug!("line {}: label '{}' = {}", line, label, self.instructions.len());
        self.symbols
            .insert(label.to_string(), (self.instructions.len(), line));
        Ok(())
    }

    fn push_move(&mut self, src: &str, dst: &str, line: usize) -> Result<(), AssemblerError> {
        let statement = format!("{src} -> {dst}");
        let source = self.classify_source(src, &statement, line)?;
        let destination = self.classify_destination(dst, &statement, line)?;

        let index = self.instructions.len();
        let instruction = match (source, destination) {
            (Source::Address(_), Destination::Pc) => {
                return Err(AssemblerError::InvalidPcSource { statement, line });
            }
            (Source::Immediate(value), Destination::Pc) => Instruction::MovePc { target: value },
            (Source::Label(label), Destination::Pc) => {
                self.fixups.insert(index, (label, line));
                Instruction::MovePc { target: ScadValue::ZERO }
            }
            (source, Destination::Address(to)) => self.data_move(index, source, to, line),
            (source, Destination::Null) => self.data_move(index, source, BufferAddress::NULL, line),
        };

        tracing::debug!("line {}: #{} {}", line, index, instruction);
        self.instructions.push(instruction);
        Ok(())
    }

    fn data_move(&mut self, index: usize, source: Source, to: BufferAddress, line: usize) -> Instruction {
        match source {
            Source::Address(from) => Instruction::Move { from, to },
            Source::Immediate(value) => Instruction::MoveImmediate { value, to },
            Source::Label(label) => {
                self.fixups.insert(index, (label, line));
                Instruction::MoveImmediate { value: ScadValue::ZERO, to }
            }
        }
    }

    fn classify_source(&self, src: &str, statement: &str, line: usize) -> Result<Source, AssemblerError> {
        let malformed = || AssemblerError::MalformedSource {
            source_token: src.to_string(),
            statement: statement.to_string(),
            line,
        };

        if let Some(digits) = src.strip_prefix('$') {
            return parse_integer(digits)
                .map(|n| Source::Immediate(ScadValue::from_u64(n)))
                .ok_or_else(malformed);
        }

        if let Some(inner) = src.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let (token, count) = inner.split_once(',').ok_or_else(malformed)?;
            let (token, count) = (token.trim(), count.trim());
            let count = parse_integer(count)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(malformed)?;
            let op = MicroOp::from_token(token).ok_or_else(|| AssemblerError::UnknownMicroOp {
                token: token.to_string(),
                statement: statement.to_string(),
                line,
            })?;
            return Ok(Source::Immediate(ScadValue::from_op(op.opcode(), count)));
        }

        if let Some(op) = MicroOp::from_token(src) {
            return Ok(Source::Immediate(ScadValue::from_op(op.opcode(), 1)));
        }

        if let Some((unit, buffer)) = split_address(src) {
            return self
                .topology
                .resolve(unit, buffer, Direction::Output)
                .map(Source::Address)
                .map_err(|e| AssemblerError::from_resolve(e, Operand::Source, statement, line));
        }

        if is_identifier(src) && src != "pc" && src != "null" {
            return Ok(Source::Label(src.to_string()));
        }

        Err(malformed())
    }

    fn classify_destination(&self, dst: &str, statement: &str, line: usize) -> Result<Destination, AssemblerError> {
        match dst {
            "pc" => return Ok(Destination::Pc),
            "null" => return Ok(Destination::Null),
            _ => {}
        }

        let (unit, buffer) = split_address(dst).ok_or_else(|| AssemblerError::InvalidDestination {
            destination: dst.to_string(),
            statement: statement.to_string(),
            line,
        })?;

        self.topology
            .resolve(unit, buffer, Direction::Input)
            .map(Destination::Address)
            .map_err(|e| AssemblerError::from_resolve(e, Operand::Destination, statement, line))
    }
}

/// Assemble one program text against a topology
///
/// # Errors
///
/// Returns the first [`AssemblerError`]; no partial stream is produced.
pub fn assemble(topology: &ProcessorDescription, text: &str) -> Result<Vec<Instruction>, AssemblerError> {
    let mut assembler = Assembler::new(topology);
    assembler.parse(text)?;
    assembler.build()
}

/// Assemble a program file against a topology
///
/// # Errors
///
/// Returns error if the file cannot be read or does not assemble.
pub fn assemble_file<P: AsRef<std::path::Path>>(
    topology: &ProcessorDescription,
    path: P,
) -> crate::Result<Vec<Instruction>> {
    let path = path.as_ref();
    tracing::info!("Assembling: {}", path.display());

    if !path.exists() {
        return Err(crate::ScadAsmError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path)?;
    Ok(assemble(topology, &text)?)
}

fn check_gap(gap: &str, line: usize) -> Result<(), AssemblerError> {
    let trimmed = gap.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let leading = gap.len() - gap.trim_start().len();
    Err(AssemblerError::UnexpectedText {
        text: trimmed.to_string(),
        line: line + gap[..leading].matches('\n').count(),
    })
}

fn parse_integer(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn split_address(token: &str) -> Option<(&str, &str)> {
    let (unit, buffer) = token.split_once('@')?;
    let word = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    (word(unit) && word(buffer)).then_some((unit, buffer))
}

fn is_identifier(token: &str) -> bool {
    let mut bytes = token.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use scad_chip::{LsuOp, PuOp};

    fn demo() -> ProcessorDescription {
        ProcessorDescription::parse(
            r#"
            [processor]
            name = "demo"
            buffer_depth = 4

            [[interconnect]]
            name = "ic"
            unit_count = 4

            [[unit]]
            name = "a"
            type = "lsu"
            number = 0

            [[unit]]
            name = "b"
            type = "pu"
            number = 1
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_micro_op_sources() {
        let topo = demo();
        let program = assemble(&topo, "(st, 3) -> a@opc\nld -> a@opc\n( mulZ ,2 ) -> b@opc").unwrap();
        assert_eq!(
            program,
            vec![
                Instruction::MoveImmediate {
                    value: ScadValue::from_op(LsuOp::Store as u32, 3),
                    to: BufferAddress::new(0, 2),
                },
                Instruction::MoveImmediate {
                    value: ScadValue::from_op(LsuOp::Load as u32, 1),
                    to: BufferAddress::new(0, 2),
                },
                Instruction::MoveImmediate {
                    value: ScadValue::from_op(PuOp::MulZ as u32, 2),
                    to: BufferAddress::new(1, 2),
                },
            ]
        );
    }

    #[test]
    fn test_unknown_micro_op() {
        let err = assemble(&demo(), "(jmp, 1) -> b@opc").unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownMicroOp { ref token, line: 1, .. } if token == "jmp"));
    }

    #[test]
    fn test_null_destination() {
        let program = assemble(&demo(), "b@out -> null").unwrap();
        assert_eq!(
            program,
            vec![Instruction::Move {
                from: BufferAddress::new(1, 0),
                to: BufferAddress::NULL,
            }]
        );
    }

    #[test]
    fn test_null_and_pc_are_not_sources() {
        for src in ["null", "pc"] {
            let err = assemble(&demo(), &format!("{src} -> a@in0")).unwrap_err();
            assert!(matches!(err, AssemblerError::MalformedSource { .. }), "{src}");
        }
    }

    #[test]
    fn test_address_to_pc_rejected() {
        let err = assemble(&demo(), "a@out -> pc").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::InvalidPcSource {
                statement: "a@out -> pc".into(),
                line: 1
            }
        );
    }

    #[test]
    fn test_destination_must_be_address() {
        let err = assemble(&demo(), "$1 -> a").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidDestination { ref destination, .. } if destination == "a"));
    }

    #[test]
    fn test_source_side_resolution() {
        // `in0` exists on `a`, but only as an input
        let err = assemble(&demo(), "a@in0 -> b@in0").unwrap_err();
        assert!(matches!(
            err,
            AssemblerError::UnknownBuffer {
                operand: Operand::Source,
                ..
            }
        ));
        let err = assemble(&demo(), "a@out -> z@in0").unwrap_err();
        assert!(matches!(
            err,
            AssemblerError::UnknownUnit {
                operand: Operand::Destination,
                ..
            }
        ));
    }

    #[test]
    fn test_stray_text_reports_line() {
        let err = assemble(&demo(), "$1 -> a@in0\n\n  ??? \n$2 -> a@in0").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::UnexpectedText {
                text: "???".into(),
                line: 3
            }
        );
    }

    #[test]
    fn test_comments_and_compact_moves() {
        let program = assemble(&demo(), "// setup\n$7->a@in1 // trailing\n").unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_lines_continue_across_parse_calls() {
        let topo = demo();
        let mut asm = Assembler::new(&topo);
        asm.parse("$1 -> a@in0\n$2 -> a@in0\n").unwrap();
        let err = asm.parse("again -> pc\nx:\nx:").unwrap_err();
        assert_eq!(err.line(), 5);
    }

    #[test]
    fn test_label_at_end_points_past_last_instruction() {
        let program = assemble(&demo(), "end -> pc\nend:").unwrap();
        assert_eq!(program, vec![Instruction::MovePc { target: ScadValue::from_u64(1) }]);
    }

    #[test]
    fn test_immediate_overflow_is_malformed() {
        let err = assemble(&demo(), "$99999999999999999999 -> a@in0").unwrap_err();
        assert!(matches!(err, AssemblerError::MalformedSource { .. }));
    }

    #[test]
    fn test_failed_parse_poisons_build() {
        let topo = demo();
        let mut asm = Assembler::new(&topo);
        let err = asm.parse("$1 -> a@in0\nz@out -> a@in0").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::UnknownUnit {
                operand: Operand::Source,
                unit: "z".into(),
                statement: "z@out -> a@in0".into(),
                line: 2,
            }
        );

        assert_eq!(asm.parse("$2 -> a@in1"), Err(err.clone()));
        assert_eq!(asm.build(), Err(err));
    }

    #[test]
    fn test_reserved_label_names() {
        let err = assemble(&demo(), "ld: $1 -> a@in0\nld -> pc").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::ReservedLabel {
                label: "ld".into(),
                line: 1,
            }
        );

        for name in ["pc", "null", "addN", "st"] {
            let err = assemble(&demo(), &format!("$1 -> a@in0\n{name}:")).unwrap_err();
            assert_eq!(err.line(), 2, "{name}");
            assert!(matches!(err, AssemblerError::ReservedLabel { .. }), "{name}");
        }
        assert!(assemble(&demo(), "load: $1 -> a@in0\nload -> pc").is_ok());
    }
}
