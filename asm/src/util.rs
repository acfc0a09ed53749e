use crate::assembler::{Assembly, SourceFile};
use crate::symbol::{SymbolKind, Symbols};
use color_print::cformat;

const BYTES_PER_ROW: usize = 4;

/// Listing rows: `[ADDR] BYTES | line: source`, with a header per file.
pub fn dump(files: &[SourceFile], asm: &Assembly) -> Vec<String> {
    let mut rows = vec![];
    let mut current_file = None;

    for &(loc, address) in &asm.addresses {
        if current_file != Some(loc.file) {
            current_file = Some(loc.file);
            let path = files.get(loc.file).map_or("", |f| f.name.as_str());
            rows.push(format!(
                "{}+------[{}]{}",
                "-".repeat(19),
                path,
                "-".repeat(45usize.saturating_sub(path.len()))
            ));
        }

        let source = files
            .get(loc.file)
            .and_then(|f| f.text.lines().nth(loc.line - 1))
            .unwrap_or("");
        let bytes = asm.image.line_bytes(loc).unwrap_or(&[]);
        let mut chunks = bytes.chunks(BYTES_PER_ROW);

        let first = chunks.next().map(hex).unwrap_or_default();
        rows.push(cformat!(
            "[<c>{:04X}</>] {:<11} | {:>4}: {}",
            address,
            first,
            loc.line,
            source
        ));
        for (idx, chunk) in chunks.enumerate() {
            let at = address.wrapping_add(((idx + 1) * BYTES_PER_ROW) as u16);
            rows.push(cformat!("[<c>{:04X}</>] {:<11} |", at, hex(chunk)));
        }
    }
    rows.push(format!("{}+{}", "-".repeat(19), "-".repeat(53)));
    rows
}

pub fn print_dump(files: &[SourceFile], asm: &Assembly) {
    for row in dump(files, asm) {
        println!("{row}");
    }
}

pub fn print_symbols(symbols: &Symbols) {
    for sym in symbols.iter() {
        let value = sym
            .value
            .map(|v| format!("{:04X}", v as u16))
            .unwrap_or_else(|| "????".to_string());
        let name = match sym.kind {
            SymbolKind::Label => cformat!("<g>{}:</>", sym.name),
            SymbolKind::Constant => cformat!("<y>#{}</>", sym.name),
        };
        let scope = sym
            .scope
            .map(|s| format!(" (local {s})"))
            .unwrap_or_default();
        match sym.defined_at.line {
            0 => println!("{value} {name}{scope}  predefined"),
            line => println!("{value} {name}{scope}  line {line}"),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
