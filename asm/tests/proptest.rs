//! Property-based tests for the lexer, expression evaluator and assembler.
//!
//! Inputs are either arbitrary ASCII (the pipeline must report, never panic)
//! or drawn from a pool of well-formed Z80 lines.

use proptest::prelude::*;
use z80asm::{parse_expr, tokenize, Assembler, Config, EvalContext};

// ── Strategies ──────────────────────────────────────────────

/// Arbitrary printable-ish ASCII, possibly spanning several lines.
fn arb_asm_input() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('\0', '\x7f'), 0..200)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Well-formed lines that assemble on their own.
fn valid_z80_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "  nop",
        "  halt",
        "  di",
        "  ei",
        "  exx",
        "  ex af,af'",
        "  ex de,hl",
        "  ld a,b",
        "  ld a,0x42",
        "  ld hl,0x1234",
        "  ld (hl),a",
        "  ld a,(ix+3)",
        "  ld (iy-2),0",
        "  ld sp,hl",
        "  add a,c",
        "  adc hl,de",
        "  sbc a,(hl)",
        "  and 0x0F",
        "  or a",
        "  xor a",
        "  cp 10",
        "  inc bc",
        "  dec (ix+1)",
        "  rlca",
        "  rrc d",
        "  sla (hl)",
        "  bit 3,a",
        "  set 7,(iy+4)",
        "  res 0,h",
        "  push af",
        "  pop ix",
        "  jr $",
        "  djnz $",
        "  jp (hl)",
        "  jp nz,0x8000",
        "  call 0x0038",
        "  ret z",
        "  rst 0x10",
        "  out (0xFE),a",
        "  in a,(c)",
        "  ldir",
        "  neg",
        "  im 2",
        "  db 1,2,3",
        "  dw $",
        "  ds 2",
    ])
}

struct Nothing;

impl EvalContext for Nothing {
    fn lookup(&self, _: &str) -> Option<i32> {
        None
    }

    fn current_address(&self) -> u16 {
        0
    }
}

fn eval(text: &str) -> i32 {
    let tokens = tokenize(text).unwrap();
    let (expr, used) = parse_expr(&tokens).unwrap();
    assert_eq!(used, tokens.len(), "`{text}`");
    expr.eval_strict(&Nothing).unwrap()
}

// ── Properties ──────────────────────────────────────────────

proptest! {
    #[test]
    fn tokenize_never_panics(input in arb_asm_input()) {
        for line in input.lines() {
            let _ = tokenize(line);
        }
    }

    #[test]
    fn assemble_never_panics(input in arb_asm_input()) {
        let _ = Assembler::new(Config::default()).assemble_str(&input);
    }

    #[test]
    fn valid_programs_assemble(lines in prop::collection::vec(valid_z80_line(), 1..30)) {
        let code = lines.join("\n");
        let asm = Assembler::new(Config::default()).assemble_str(&code);
        prop_assert!(asm.is_ok(), "{:?}", asm.err());
    }

    #[test]
    fn assembly_is_deterministic(lines in prop::collection::vec(valid_z80_line(), 1..30)) {
        let code = lines.join("\n");
        let assembler = Assembler::new(Config::default());
        let first = assembler.assemble_str(&code).map(|a| a.image.bytes().to_vec()).ok();
        let second = assembler.assemble_str(&code).map(|a| a.image.bytes().to_vec()).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn load_immediate(n in 0u8..=255) {
        let asm = Assembler::new(Config::default())
            .assemble_str(&format!("  ld a,{n}"))
            .unwrap();
        prop_assert_eq!(asm.image.bytes(), &[0x3E, n][..]);
    }

    #[test]
    fn relative_jump_to_self(origin in 0u16..0xFF00) {
        let asm = Assembler::new(Config::default())
            .assemble_str(&format!("  org {origin}\n  jr $"))
            .unwrap();
        prop_assert_eq!(asm.image.bytes(), &[0x18, 0xFE][..]);
    }

    #[test]
    fn arithmetic_matches_reference(a in 0i32..10000, b in 0i32..10000) {
        prop_assert_eq!(eval(&format!("{a} + {b}")), a + b);
        prop_assert_eq!(eval(&format!("{a} - {b}")), a - b);
        prop_assert_eq!(eval(&format!("{a} * {b}")), a * b);
        prop_assert_eq!(eval(&format!("{a} & {b}")), a & b);
        prop_assert_eq!(eval(&format!("{a} | {b}")), a | b);
        prop_assert_eq!(eval(&format!("{a} ^ {b}")), a ^ b);
        prop_assert_eq!(eval(&format!("{a} + {b} * 2")), a + b * 2);
        prop_assert_eq!(eval(&format!("({a} + {b}) * 2")), (a + b) * 2);
        prop_assert_eq!(eval(&format!("-{a}")), -a);
    }
}
