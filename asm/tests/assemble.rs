use z80asm::{Assembler, Config, ErrorKind, SourceFile};

fn assemble(config: Config, code: &str) -> Result<Vec<u8>, Vec<(usize, ErrorKind)>> {
    println!("{code}");
    match Assembler::new(config).assemble_str(code) {
        Ok(asm) => {
            println!("  => {:02X?}", asm.image.bytes());
            Ok(asm.image.bytes().to_vec())
        }
        Err(diags) => {
            for diag in &diags {
                println!("  {}: {} {}", diag.line, diag.kind, diag.message);
            }
            Err(diags.iter().map(|d| (d.line, d.kind)).collect())
        }
    }
}

fn case(code: &str, expects: &[u8]) {
    assert_eq!(assemble(Config::default(), code), Ok(expects.to_vec()));
}

fn fails(code: &str, expects: &[(usize, ErrorKind)]) {
    assert_eq!(assemble(Config::default(), code), Err(expects.to_vec()));
}

#[test]
fn immediates() {
    case("  ld hl,0x1234", &[0x21, 0x34, 0x12]);
    case("  ld bc,-1", &[0x01, 0xFF, 0xFF]);
    case("  ld a,-1", &[0x3E, 0xFF]);
    case("  ld a,'A'", &[0x3E, 0x41]);
    case("  LD A,0FFH", &[0x3E, 0xFF]);
    case("  ld a,%1010 | 1", &[0x3E, 0x0B]);
    case("  ld de,1 << 8 + 2", &[0x11, 0x00, 0x04]);
    case("  out (0x10),a", &[0xD3, 0x10]);
    fails("  ld a,256", &[(1, ErrorKind::OperandOutOfRange)]);
    fails("  ld a,-129", &[(1, ErrorKind::OperandOutOfRange)]);
    fails("  ld hl,0x10000", &[(1, ErrorKind::OperandOutOfRange)]);
}

#[test]
fn relative_branch_limits() {
    case("  org 0x100\n  jr $+129", &[0x18, 0x7F]);
    case("  org 0x100\n  jr $-126", &[0x18, 0x80]);
    case("  org 0x100\n  jr nz,$+2", &[0x20, 0x00]);
    fails("  org 0x100\n  jr $+130", &[(2, ErrorKind::BranchOutOfRange)]);
    fails("  org 0x100\n  jr $-127", &[(2, ErrorKind::BranchOutOfRange)]);
}

#[test]
fn forward_references() {
    case("  jp end\n  nop\nend: halt", &[0xC3, 0x04, 0x00, 0x00, 0x76]);
    case(
        "loop: djnz loop\n  jr done\n  nop\ndone:",
        &[0x10, 0xFE, 0x18, 0x01, 0x00],
    );
    case(
        "  ld a,SIZE\nSIZE equ END-START\nSTART: nop\nEND:",
        &[0x3E, 0x01, 0x00],
    );
}

#[test]
fn first_match_tie_breaks() {
    case("  ld (0x1234),hl", &[0x22, 0x34, 0x12]);
    case("  ld a,b", &[0x78]);
    case("  ld b", &[0x78]);
    case("  neg", &[0xED, 0x44]);
    case("  im 1", &[0xED, 0x56]);
}

#[test]
fn undocumented_gate() {
    case("  ld ixh,5", &[0xDD, 0x26, 0x05]);
    case("  sll b", &[0xCB, 0x30]);
    case("  out (c),0", &[0xED, 0x71]);

    let strict = Config {
        allow_undocumented: false,
        ..Config::default()
    };
    assert_eq!(
        assemble(strict.clone(), "  ld ixh,5"),
        Err(vec![(1, ErrorKind::UndocumentedOpcodeRejected)])
    );
    assert_eq!(
        assemble(strict.clone(), "  rlc (ix+1),b"),
        Err(vec![(1, ErrorKind::UndocumentedOpcodeRejected)])
    );
    assert_eq!(assemble(strict, "  ld ix,5"), Ok(vec![0xDD, 0x21, 0x05, 0x00]));
}

#[test]
fn indexed_addressing() {
    case("  rlc (ix+0x56)", &[0xDD, 0xCB, 0x56, 0x06]);
    case("  bit 7,(iy+1)", &[0xFD, 0xCB, 0x01, 0x7E]);
    case("  ld a,(ix-5)", &[0xDD, 0x7E, 0xFB]);
    case("  ld (iy),a", &[0xFD, 0x77, 0x00]);
    case("  ld (ix+2),0x40", &[0xDD, 0x36, 0x02, 0x40]);
    case("  jp (ix)", &[0xDD, 0xE9]);
    fails("  ld a,(ix+300)", &[(1, ErrorKind::OperandOutOfRange)]);
}

#[test]
fn miscellaneous_forms() {
    case("  ex af,af'", &[0x08]);
    case("  rst 38h", &[0xFF]);
    case("  jp nv,0x1234", &[0xE2, 0x34, 0x12]);
    case("  ld hl,bc", &[0x60, 0x69]);
    case("  ld (hl),de", &[0x73, 0x23, 0x72, 0x2B]);
}

#[test]
fn symbols() {
    case("foo equ 6\n  ld a,foo", &[0x3E, 0x06]);
    case("foo: .equ $ + 2\n  jp foo", &[0xC3, 0x02, 0x00]);
    case("x:\nx: nop", &[0x00]);
    case("Loop: nop\nloop: nop\n  jp Loop", &[0x00, 0x00, 0xC3, 0x00, 0x00]);
    fails("a1: nop\na1: nop", &[(2, ErrorKind::DuplicateSymbol)]);
    fails("k equ 1\nk equ 2", &[(2, ErrorKind::DuplicateSymbol)]);
    fails("  jp nowhere", &[(1, ErrorKind::UndefinedSymbol)]);
    fails("  ds later\nlater:", &[(1, ErrorKind::UndefinedSymbol)]);
    fails(
        "first equ second\nsecond equ first",
        &[(1, ErrorKind::UndefinedSymbol), (2, ErrorKind::UndefinedSymbol)],
    );
}

#[test]
fn local_blocks() {
    // a forward local shadows the global of the same name
    case(
        "skip: nop\n#local\n  jr skip\n  nop\nskip: halt\n#endlocal",
        &[0x00, 0x18, 0x01, 0x00, 0x76],
    );
    case(
        "skip: nop\n#local\n  jp skip\n  nop\nskip: halt\n#endlocal",
        &[0x00, 0xC3, 0x05, 0x00, 0x00, 0x76],
    );
    case(
        "val equ 1\n#local\n  ld a,val\nval equ 2\n#endlocal\n  ld a,val",
        &[0x3E, 0x02, 0x3E, 0x01],
    );
    case(
        "size equ 1\n#local\nn equ size\n  ld a,n\nsize equ 5\n#endlocal",
        &[0x3E, 0x05],
    );
    // outside the block only globals are visible
    case(
        "#local\nentry:: ld a,1\nhelper: ret\n#endlocal\n  call entry",
        &[0x3E, 0x01, 0xC9, 0xCD, 0x00, 0x00],
    );
    fails(
        "#local\nhelper: ret\n#endlocal\n  call helper",
        &[(4, ErrorKind::UndefinedSymbol)],
    );
}

#[test]
fn end_of_memory() {
    case("  org 0xFFFE\n  ld a,1", &[0x3E, 0x01]);
    case("  org 0xFFFF\n  nop\nend:\n  org 0\n  halt", &[0x00, 0x76]);
    fails("  org 0xFFFF\n  ld hl,0", &[(2, ErrorKind::OperandOutOfRange)]);
    fails("  org 0xFFFF\n  nop\n  nop", &[(3, ErrorKind::OperandOutOfRange)]);
    fails("  org 0xFFF0\n  ds 0x20", &[(2, ErrorKind::OperandOutOfRange)]);
}

#[test]
fn code_segments() {
    case("#code FOO\n  jp $", &[0xC3, 0x00, 0x00]);
    case("#code FOO, 0x4000\n  jp $", &[0xC3, 0x00, 0x40]);
    case("#code FOO, 0x4000, 0x100\n  jp $", &[0xC3, 0x00, 0x40]);
    case("  org 0x8000\nstart: jp start", &[0xC3, 0x00, 0x80]);
    fails("#include \"lib.z80\"", &[(1, ErrorKind::UnknownDirective)]);
}

#[test]
fn data_directives() {
    case("  db 1,2,0xFF", &[0x01, 0x02, 0xFF]);
    case("  .byte \"AB\"+0x80,1", &[0x41, 0xC2, 0x01]);
    case("  defm 'hi'", &[b'h', b'i']);
    case("  dw 0x1234, $", &[0x34, 0x12, 0x00, 0x00]);
    case("  nop\n  dw $", &[0x00, 0x01, 0x00]);
    case("  .long 0x12345678", &[0x78, 0x56, 0x34, 0x12]);
    case("  ds 3", &[0x00, 0x00, 0x00]);
    case("  ds 2, 0xAA", &[0xAA, 0xAA]);
    case("#target rom\n  ds 2", &[0xFF, 0xFF]);
    case("  nop\n  align 4\n  halt", &[0x00, 0x00, 0x00, 0x00, 0x76]);
    fails("  db 300", &[(1, ErrorKind::OperandOutOfRange)]);
    fails("  align 0", &[(1, ErrorKind::ArithmeticError)]);
    fails("  ds -1", &[(1, ErrorKind::ArithmeticError)]);
}

#[test]
fn predefined_names() {
    // 2023-11-14 22:13:20 UTC
    let assembler = Assembler::new(Config::default()).with_timestamp(1_700_000_000);
    let asm = assembler.assemble_str("  db __date__\n  db __TIME__, 0").unwrap();
    assert_eq!(asm.image.bytes(), b"2023-11-1422:13:20\0");

    let files = [SourceFile::new("boot.z80", "  nop\n  db __file__, ':', __line__\nend: jp end")];
    let asm = assembler.assemble(&files).unwrap();
    let mut expects = vec![0x00];
    expects.extend(b"boot.z80:2");
    expects.extend([0xC3, 0x0B, 0x00]);
    assert_eq!(asm.image.bytes(), &expects[..]);

    fails("  dw __date__", &[(1, ErrorKind::UndefinedSymbol)]);
}

#[test]
fn line_errors() {
    fails("  frob a", &[(1, ErrorKind::UnknownMnemonic)]);
    fails("  nop\n  ld a,b,c", &[(2, ErrorKind::NoMatchingVariant)]);
    fails("  ld a,@", &[(1, ErrorKind::LexError)]);
    fails("  ld a,1/0", &[(1, ErrorKind::ArithmeticError)]);
    // pass 2 keeps going after a bad line
    fails(
        "  ld a,300\n  nop\n  jp nowhere",
        &[(1, ErrorKind::OperandOutOfRange), (3, ErrorKind::UndefinedSymbol)],
    );
}

#[test]
fn configuration() {
    let mut config = Config {
        start_address: 0x8000,
        ..Config::default()
    };
    config.defines.insert("PORT".to_string(), 0xFE);
    assert_eq!(
        assemble(config, "  out (PORT),a\nhere: jr here"),
        Ok(vec![0xD3, 0xFE, 0x18, 0xFE])
    );
}

#[test]
fn multiple_files() {
    let files = [
        SourceFile::new("main.z80", "  call helper\n  halt"),
        SourceFile::new("lib.z80", "helper: ret\n  jp missing"),
    ];
    let diags = Assembler::new(Config::default())
        .assemble(&files)
        .unwrap_err();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].file, "lib.z80");
    assert_eq!(diags[0].line, 2);

    let files = [
        SourceFile::new("main.z80", "  call helper\n  halt"),
        SourceFile::new("lib.z80", "helper: ret"),
    ];
    let asm = Assembler::new(Config::default()).assemble(&files).unwrap();
    assert_eq!(asm.image.bytes(), &[0xCD, 0x04, 0x00, 0x76, 0xC9]);
    assert_eq!(asm.symbols.get_val("helper"), Some(4));
}

#[test]
fn deterministic() {
    let code = "start: ld hl,data\n  ld b,4\nloop: djnz loop\n  jp start\ndata: db \"xyz\"";
    let first = assemble(Config::default(), code);
    let second = assemble(Config::default(), code);
    assert!(first.is_ok());
    assert_eq!(first, second);
}
