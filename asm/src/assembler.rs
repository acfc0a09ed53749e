use crate::config::Config;
use crate::error::{Diagnostic, Error};
use crate::expr::{BinaryOp, EvalContext, Evaluated, Expr, Strictness};
use crate::image::ProgramImage;
use crate::matcher::match_variant;
use crate::parser::{DataItem, DataWidth, Line, Location, Predefined, Stmt, Target};
use crate::symbol::{Scoped, SymbolKind, Symbols};
use std::time::{SystemTime, UNIX_EPOCH};
use z80_arch::{InstructionVariant, OpcodeByte, PlaceholderKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceFile {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A placeholder whose operand references a symbol. Its value is settled in
/// pass 2, when every label of every `#local` block is known.
#[derive(Debug, Clone, PartialEq)]
pub struct FixupRecord {
    /// Index of the planned line
    pub line: usize,
    /// Byte offset within that line's encoding
    pub offset: usize,
    pub kind: PlaceholderKind,
    pub expr: Expr,
}

#[derive(Debug)]
pub struct Assembly {
    pub image: ProgramImage,
    pub symbols: Symbols,
    /// Address of every source line, in source order
    pub addresses: Vec<(Location, u16)>,
}

pub struct Assembler {
    config: Config,
    timestamp: Option<u64>,
}

impl Assembler {
    pub fn new(config: Config) -> Self {
        Assembler {
            config,
            timestamp: None,
        }
    }

    /// Fixes `__date__` and `__time__` to `secs` since the Unix epoch (UTC)
    /// instead of the time of the run.
    pub fn with_timestamp(mut self, secs: u64) -> Self {
        self.timestamp = Some(secs);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn assemble_str(&self, text: &str) -> Result<Assembly, Vec<Diagnostic>> {
        self.assemble(&[SourceFile::new("<input>", text)])
    }

    /// Assembles `files` as one translation unit.
    pub fn assemble(&self, files: &[SourceFile]) -> Result<Assembly, Vec<Diagnostic>> {
        let diag = |loc: Location, err: &Error| {
            let name = files.get(loc.file).map_or("", |f| f.name.as_str());
            Diagnostic::new(name, loc.line, err)
        };

        let timestamp = self.timestamp.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs())
        });

        tracing::trace!("starting pass 1");
        let mut pass1 = Pass1::new(&self.config, BuildInfo::new(files, timestamp));
        for (file, source) in files.iter().enumerate() {
            for (idx, raw) in source.text.lines().enumerate() {
                let loc = Location {
                    file,
                    line: idx + 1,
                };
                if let Err(err) = Line::parse(loc, raw).and_then(|line| pass1.step(&line)) {
                    pass1.errors.push((loc, err));
                }
            }
        }
        let Pass1 {
            build,
            symbols,
            planned,
            fixups,
            addresses,
            mut errors,
            ..
        } = pass1.finish();
        tracing::debug!(
            "pass 1: {} lines planned, {} symbols, {} fixups",
            planned.len(),
            symbols.len(),
            fixups.len()
        );
        if !errors.is_empty() {
            errors.sort_by_key(|(loc, _)| *loc);
            return Err(errors.iter().map(|(loc, e)| diag(*loc, e)).collect());
        }

        tracing::trace!("starting pass 2");
        let (image, errors) = pass2(self.config.start_address, &planned, &fixups, &symbols, &build);
        tracing::debug!("pass 2: {} bytes emitted", image.len());
        if !errors.is_empty() {
            return Err(errors.iter().map(|(loc, e)| diag(*loc, e)).collect());
        }

        Ok(Assembly {
            image,
            symbols,
            addresses,
        })
    }
}

/// Text behind the predefined names of `db`, the same in both passes.
struct BuildInfo {
    files: Vec<String>,
    date: String,
    time: String,
}

impl BuildInfo {
    fn new(files: &[SourceFile], timestamp: u64) -> Self {
        let (year, month, day) = civil_date(timestamp / 86400);
        let secs = timestamp % 86400;
        BuildInfo {
            files: files.iter().map(|f| f.name.clone()).collect(),
            date: format!("{year:04}-{month:02}-{day:02}"),
            time: format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60),
        }
    }

    fn text(&self, name: Predefined, loc: Location) -> Vec<u8> {
        match name {
            Predefined::Date => self.date.as_bytes().to_vec(),
            Predefined::Time => self.time.as_bytes().to_vec(),
            Predefined::File => self
                .files
                .get(loc.file)
                .map(|f| f.as_bytes().to_vec())
                .unwrap_or_default(),
            Predefined::Line => loc.line.to_string().into_bytes(),
        }
    }
}

/// Gregorian (year, month, day) of a day count since 1970-01-01.
fn civil_date(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = era * 400 + yoe + u64::from(month <= 2);
    (year, month, day)
}

// ----------------------------------------------------------------------------
// Pass 1: addresses and symbols
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum Item {
    Instruction {
        mnemonic: String,
        variant: &'static InstructionVariant,
        /// Placeholder kind, byte offset and value (if already known)
        slots: Vec<(PlaceholderKind, usize, Option<i32>)>,
    },
    Data(DataWidth, Vec<DataItem>),
    Fill {
        count: usize,
        fill: Option<Expr>,
        default: u8,
    },
    Org(u16),
}

#[derive(Debug)]
struct Planned {
    loc: Location,
    address: u32,
    scope: Option<usize>,
    size: usize,
    item: Item,
}

/// State carried from line to line in pass 1.
struct Pass1 {
    address: u32,
    build: BuildInfo,
    symbols: Symbols,
    scope: Option<usize>,
    scopes_opened: usize,
    target: Target,
    allow_undocumented: bool,
    planned: Vec<Planned>,
    fixups: Vec<FixupRecord>,
    addresses: Vec<(Location, u16)>,
    errors: Vec<(Location, Error)>,
}

impl Pass1 {
    fn new(config: &Config, build: BuildInfo) -> Self {
        let mut symbols = Symbols::new();
        for (name, value) in &config.defines {
            // names are unique keys of the map, so this cannot clash
            let _ = symbols.define(name, None, SymbolKind::Constant, *value, Location::default());
        }
        Pass1 {
            address: config.start_address as u32,
            build,
            symbols,
            scope: None,
            scopes_opened: 0,
            target: Target::Bin,
            allow_undocumented: config.allow_undocumented,
            planned: vec![],
            fixups: vec![],
            addresses: vec![],
            errors: vec![],
        }
    }

    fn ctx(&self) -> Scoped<'_> {
        Scoped {
            symbols: &self.symbols,
            scope: self.scope,
            address: self.address as u16,
        }
    }

    /// Values that decide addresses must be known when the line is reached.
    fn resolve_now(&self, expr: &Expr) -> Result<i32, Error> {
        expr.eval_strict(&self.ctx())
    }

    fn resolve_count(&self, expr: &Expr) -> Result<usize, Error> {
        let n = self.resolve_now(expr)?;
        if n > 0x10000 {
            return Err(Error::OperandOutOfRange(n as i64, PlaceholderKind::Imm16));
        }
        usize::try_from(n).map_err(|_| Error::ArithmeticError(format!("negative count {n}")))
    }

    fn resolve_address(&self, expr: &Expr) -> Result<u16, Error> {
        let v = self.resolve_now(expr)?;
        u16::try_from(v).map_err(|_| Error::OperandOutOfRange(v as i64, PlaceholderKind::Imm16))
    }

    fn step(&mut self, line: &Line) -> Result<(), Error> {
        // 0x10000 once the code has filled the top of memory
        let address = self.address;
        let here = address as u16;
        self.addresses.push((line.loc, here));

        if let Some(label) = &line.label {
            let scope = if label.global { None } else { self.scope };
            match &line.stmt {
                Some(Stmt::Equ(expr)) => {
                    // a local defined further down may still shadow a global
                    let value = if self.scope.is_some() && !expr.symbols().is_empty() {
                        Evaluated::Unresolved(expr.clone())
                    } else {
                        expr.eval(&self.ctx(), Strictness::Tolerant)?
                    };
                    match value {
                        Evaluated::Value(v) => self.symbols.define(
                            &label.name,
                            scope,
                            SymbolKind::Constant,
                            v,
                            line.loc,
                        )?,
                        Evaluated::Unresolved(expr) => self.symbols.define_pending(
                            &label.name,
                            scope,
                            expr,
                            here,
                            line.loc,
                        )?,
                    }
                }
                _ => self.symbols.define(
                    &label.name,
                    scope,
                    SymbolKind::Label,
                    address as i32,
                    line.loc,
                )?,
            }
        }

        let item = match &line.stmt {
            None | Some(Stmt::Equ(_)) => return Ok(()),
            Some(Stmt::Instruction { mnemonic, operands }) => {
                let found = match_variant(mnemonic, operands, &self.ctx(), self.allow_undocumented)?;
                let mut bound = found.operands.into_iter();
                let mut slots = vec![];
                let mut offset = 0;
                for byte in &found.variant.opcode {
                    if let OpcodeByte::Placeholder(kind) = byte {
                        let operand = bound.next().ok_or_else(|| {
                            Error::AmbiguousEncoding(found.variant.spelling(mnemonic))
                        })?;
                        let value = if operand.expr.symbols().is_empty() {
                            Some(operand.expr.eval_strict(&self.ctx())?)
                        } else {
                            self.fixups.push(FixupRecord {
                                line: self.planned.len(),
                                offset,
                                kind: *kind,
                                expr: operand.expr,
                            });
                            None
                        };
                        slots.push((*kind, offset, value));
                    }
                    offset += byte.width();
                }
                Item::Instruction {
                    mnemonic: mnemonic.clone(),
                    variant: found.variant,
                    slots,
                }
            }
            Some(Stmt::Data(width, items)) => Item::Data(*width, items.clone()),
            Some(Stmt::Org(expr)) => Item::Org(self.resolve_address(expr)?),
            Some(Stmt::Code { address, .. }) => match address {
                Some(expr) => Item::Org(self.resolve_address(expr)?),
                None => return Ok(()),
            },
            Some(Stmt::Align { boundary, fill }) => {
                let n = self.resolve_count(boundary)?;
                if n == 0 {
                    return Err(Error::ArithmeticError("alignment of 0".to_string()));
                }
                Item::Fill {
                    count: (n - address as usize % n) % n,
                    fill: fill.clone(),
                    default: self.target.fill(),
                }
            }
            Some(Stmt::Fill { count, fill }) => Item::Fill {
                count: self.resolve_count(count)?,
                fill: fill.clone(),
                default: self.target.fill(),
            },
            Some(Stmt::Local) => {
                if self.scope.is_some() {
                    return Err(Error::SyntaxError("#local blocks cannot nest".to_string()));
                }
                self.scope = Some(self.scopes_opened);
                self.scopes_opened += 1;
                return Ok(());
            }
            Some(Stmt::EndLocal) => {
                if self.scope.take().is_none() {
                    return Err(Error::SyntaxError("#endlocal without #local".to_string()));
                }
                return Ok(());
            }
            Some(Stmt::Target(target)) => {
                self.target = *target;
                return Ok(());
            }
        };

        let size = item_size(&item, line.loc, &self.build);
        let end = address + size as u32;
        if size > 0 && end > 0x10000 {
            return Err(Error::OperandOutOfRange(
                end as i64 - 1,
                PlaceholderKind::Imm16,
            ));
        }
        self.address = match item {
            Item::Org(addr) => addr as u32,
            _ => end,
        };
        self.planned.push(Planned {
            loc: line.loc,
            address,
            scope: self.scope,
            size,
            item,
        });
        Ok(())
    }

    fn finish(mut self) -> Self {
        let pending = self.symbols.resolve_pending();
        self.errors.extend(pending);
        self
    }
}

fn item_size(item: &Item, loc: Location, build: &BuildInfo) -> usize {
    match item {
        Item::Instruction { variant, .. } => variant.byte_count(),
        Item::Data(width, items) => items
            .iter()
            .map(|item| match item {
                DataItem::Expr(_) => width.size(),
                DataItem::Text(bytes, _) => bytes.len(),
                DataItem::Predefined(name) => build.text(*name, loc).len(),
            })
            .sum(),
        Item::Fill { count, .. } => *count,
        Item::Org(_) => 0,
    }
}

// ----------------------------------------------------------------------------
// Pass 2: emission
// ----------------------------------------------------------------------------

fn pass2(
    start: u16,
    planned: &[Planned],
    fixups: &[FixupRecord],
    symbols: &Symbols,
    build: &BuildInfo,
) -> (ProgramImage, Vec<(Location, Error)>) {
    let mut image = ProgramImage::new();
    let mut errors = vec![];
    let mut fixups = fixups.iter().peekable();
    let mut address = start as u32;

    for (idx, line) in planned.iter().enumerate() {
        let mut line_fixups = vec![];
        while let Some(fixup) = fixups.next_if(|f| f.line == idx) {
            line_fixups.push(fixup);
        }

        if address != line.address {
            errors.push((
                line.loc,
                Error::AmbiguousEncoding(format!(
                    "line starts at {:04X} in pass 2 but {:04X} in pass 1",
                    address, line.address
                )),
            ));
        }

        let ctx = Scoped {
            symbols,
            scope: line.scope,
            address: line.address as u16,
        };
        match encode(line, &line_fixups, &ctx, build) {
            Ok(bytes) if bytes.len() == line.size => image.emit(line.loc, line.address as u16, &bytes),
            Ok(bytes) => errors.push((
                line.loc,
                Error::AmbiguousEncoding(format!(
                    "{} bytes planned, {} encoded",
                    line.size,
                    bytes.len()
                )),
            )),
            Err(err) => errors.push((line.loc, err)),
        }

        address = match line.item {
            Item::Org(addr) => addr as u32,
            _ => line.address + line.size as u32,
        };
    }
    (image, errors)
}

fn encode(
    line: &Planned,
    fixups: &[&FixupRecord],
    ctx: &Scoped,
    build: &BuildInfo,
) -> Result<Vec<u8>, Error> {
    match &line.item {
        Item::Instruction {
            mnemonic,
            variant,
            slots,
        } => {
            let mut bytes: Vec<u8> = variant
                .opcode
                .iter()
                .flat_map(|byte| match byte {
                    OpcodeByte::Byte(b) => vec![*b],
                    OpcodeByte::Placeholder(kind) => vec![0; kind.width()],
                })
                .collect();
            let next = line.address + line.size as u32;
            for (kind, offset, value) in slots {
                if let Some(v) = value {
                    put(&mut bytes[*offset..], *kind, *v, next)?;
                }
            }
            for fixup in fixups {
                let v = fixup.expr.eval_strict(ctx)?;
                put(&mut bytes[fixup.offset..], fixup.kind, v, next)?;
            }
            tracing::trace!("{:04X}: {} {:02X?}", line.address, variant.spelling(mnemonic), bytes);
            Ok(bytes)
        }
        Item::Data(width, items) => {
            let mut bytes = vec![];
            for item in items {
                match item {
                    DataItem::Expr(expr) => {
                        let v = expr.eval_strict(ctx)?;
                        match width {
                            DataWidth::Byte => bytes.push(byte_value(v)?),
                            DataWidth::Word => {
                                check(v, PlaceholderKind::Imm16)?;
                                bytes.extend((v as u16).to_le_bytes());
                            }
                            DataWidth::Long => bytes.extend((v as u32).to_le_bytes()),
                        }
                    }
                    DataItem::Text(text, adjust) => {
                        bytes.extend_from_slice(text);
                        if let Some((op, expr)) = adjust {
                            let last = bytes.last_mut().ok_or_else(|| {
                                Error::SyntaxError("empty string cannot be adjusted".to_string())
                            })?;
                            *last = byte_value(apply(*op, *last, expr, ctx)?)?;
                        }
                    }
                    DataItem::Predefined(name) => bytes.extend(build.text(*name, line.loc)),
                }
            }
            Ok(bytes)
        }
        Item::Fill {
            count,
            fill,
            default,
        } => {
            let byte = match fill {
                Some(expr) => byte_value(expr.eval_strict(ctx)?)?,
                None => *default,
            };
            Ok(vec![byte; *count])
        }
        Item::Org(_) => Ok(vec![]),
    }
}

fn apply(op: BinaryOp, last: u8, expr: &Expr, ctx: &dyn EvalContext) -> Result<i32, Error> {
    Expr::Binary(op, Box::new(Expr::Number(last as i32)), Box::new(expr.clone())).eval_strict(ctx)
}

fn check(value: i32, kind: PlaceholderKind) -> Result<(), Error> {
    if kind.range().contains(&value) {
        Ok(())
    } else {
        Err(Error::OperandOutOfRange(value as i64, kind))
    }
}

fn byte_value(value: i32) -> Result<u8, Error> {
    check(value, PlaceholderKind::Imm8)?;
    Ok(value as u8)
}

/// Writes an operand into its slot. `next` is the address following the
/// instruction, the base of relative branches.
fn put(slot: &mut [u8], kind: PlaceholderKind, value: i32, next: u32) -> Result<(), Error> {
    match kind {
        PlaceholderKind::Imm8 | PlaceholderKind::Disp8 => {
            check(value, kind)?;
            slot[0] = value as u8;
        }
        PlaceholderKind::Imm16 => {
            check(value, kind)?;
            slot[..2].copy_from_slice(&(value as u16).to_le_bytes());
        }
        PlaceholderKind::RelOffset => {
            let offset = value as i64 - next as i64;
            if !(-128..=127).contains(&offset) {
                return Err(Error::BranchOutOfRange(offset));
            }
            slot[0] = offset as i8 as u8;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn bytes(src: &str) -> Vec<u8> {
        match Assembler::new(Config::default()).assemble_str(src) {
            Ok(asm) => asm.image.bytes().to_vec(),
            Err(diags) => panic!("{diags:#?}"),
        }
    }

    fn kinds(src: &str) -> Vec<(usize, ErrorKind)> {
        match Assembler::new(Config::default()).assemble_str(src) {
            Ok(_) => vec![],
            Err(diags) => diags.iter().map(|d| (d.line, d.kind)).collect(),
        }
    }

    #[test]
    fn fixups_are_recorded_for_forward_references() {
        let mut pass1 = Pass1::new(&Config::default(), BuildInfo::new(&[], 0));
        for (idx, raw) in ["  jp later", "  nop", "later: ret"].iter().enumerate() {
            let line = Line::parse(
                Location {
                    file: 0,
                    line: idx + 1,
                },
                raw,
            )
            .unwrap();
            pass1.step(&line).unwrap();
        }
        assert_eq!(pass1.fixups.len(), 1);
        assert_eq!(pass1.fixups[0].line, 0);
        assert_eq!(pass1.fixups[0].offset, 1);
        assert_eq!(pass1.fixups[0].kind, PlaceholderKind::Imm16);
        assert_eq!(pass1.symbols.get_val("later"), Some(4));
    }

    #[test]
    fn build_stamp() {
        assert_eq!(civil_date(0), (1970, 1, 1));
        assert_eq!(civil_date(951_782_400 / 86400), (2000, 2, 29));
        let build = BuildInfo::new(&[SourceFile::new("a.z80", "")], 1_700_000_000);
        assert_eq!(build.date, "2023-11-14");
        assert_eq!(build.time, "22:13:20");
        let loc = Location { file: 0, line: 12 };
        assert_eq!(build.text(Predefined::File, loc), b"a.z80");
        assert_eq!(build.text(Predefined::Line, loc), b"12");
    }

    #[test]
    fn relative_offsets() {
        assert_eq!(bytes("  org 0x100\n  jr $"), vec![0x18, 0xFE]);
        assert_eq!(bytes("  org 0x100\n  djnz next\nnext: nop"), vec![0x10, 0x00, 0x00]);
    }

    #[test]
    fn put_ranges() {
        let mut slot = [0u8; 2];
        assert!(put(&mut slot, PlaceholderKind::Imm8, 255, 0).is_ok());
        assert!(put(&mut slot, PlaceholderKind::Imm8, -128, 0).is_ok());
        assert_eq!(slot[0], 0x80);
        assert!(matches!(
            put(&mut slot, PlaceholderKind::Imm8, 256, 0),
            Err(Error::OperandOutOfRange(256, PlaceholderKind::Imm8))
        ));
        assert!(put(&mut slot, PlaceholderKind::Imm16, -32768, 0).is_ok());
        assert_eq!(slot, [0x00, 0x80]);
        assert!(put(&mut slot, PlaceholderKind::Imm16, 65536, 0).is_err());
        assert!(matches!(
            put(&mut slot, PlaceholderKind::RelOffset, 0x200, 0x100),
            Err(Error::BranchOutOfRange(256))
        ));
    }

    #[test]
    fn pass1_errors_stop_before_emission() {
        assert_eq!(
            kinds("  frob\n  ld a,\"x\n  nop"),
            vec![(1, ErrorKind::UnknownMnemonic), (2, ErrorKind::LexError)]
        );
    }

    #[test]
    fn pass2_errors_are_collected() {
        assert_eq!(
            kinds("  ld a,300\n  nop\n  jp nowhere"),
            vec![(1, ErrorKind::OperandOutOfRange), (3, ErrorKind::UndefinedSymbol)]
        );
    }

    #[test]
    fn local_blocks() {
        let src = "\
#local
loop: djnz loop
#endlocal
#local
loop: djnz loop
#endlocal";
        assert_eq!(bytes(src), vec![0x10, 0xFE, 0x10, 0xFE]);
        assert_eq!(
            kinds("#local\n#local"),
            vec![(2, ErrorKind::SyntaxError)]
        );
        assert_eq!(kinds("#endlocal"), vec![(1, ErrorKind::SyntaxError)]);
    }

    #[test]
    fn predefined_symbols() {
        let mut config = Config::default();
        config.defines.insert("PORT".to_string(), 0x10);
        config.start_address = 0x8000;
        let asm = Assembler::new(config)
            .assemble_str("  out (PORT),a\nhere: jp here")
            .unwrap();
        assert_eq!(asm.image.bytes(), &[0xD3, 0x10, 0xC3, 0x02, 0x80]);
        assert_eq!(asm.symbols.get_val("here"), Some(0x8002));
    }
}
