use clap::Parser;
use color_print::{cformat, cprintln};
use indexmap::IndexMap;
use std::io::Write;
use std::process::ExitCode;
use tracing::Level;
use z80asm::{parse_define, parse_value, Assembler, Config, Diagnostic, Error, SourceFile};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input files, assembled in order as one program
    #[clap(default_value = "main.z80")]
    input: Vec<String>,

    /// Output file
    #[clap(short, long, default_value = "out.bin")]
    output: String,

    /// Dump assembly listing
    #[clap(short, long)]
    dump: bool,

    /// Print the symbol table
    #[clap(long)]
    symbols: bool,

    /// Print diagnostics as JSON
    #[clap(long)]
    json: bool,

    /// YAML configuration file
    #[clap(long)]
    config: Option<String>,

    /// Reject undocumented instructions
    #[clap(long)]
    no_undocumented: bool,

    /// Address of the first line (0x8000, $8000, 8000h or decimal)
    #[clap(long, value_parser = origin)]
    origin: Option<u16>,

    /// Pre-defined symbol, NAME=value (repeatable)
    #[clap(short = 'D', value_name = "NAME=value", value_parser = define)]
    define: Vec<(String, i32)>,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[clap(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn origin(s: &str) -> Result<u16, String> {
    let value = parse_value(s).map_err(|e| e.to_string())?;
    u16::try_from(value).map_err(|_| format!("address {s} does not fit in 16 bits"))
}

fn define(s: &str) -> Result<(String, i32), String> {
    parse_define(s).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            cprintln!("<r,s>error</>: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn configure(args: &Args) -> Result<Config, Error> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.no_undocumented {
        config.allow_undocumented = false;
    }
    if let Some(origin) = args.origin {
        config.start_address = origin;
    }
    for (name, value) in &args.define {
        config.defines.insert(name.clone(), *value);
    }
    Ok(config)
}

/// Ok(false) when the source had errors.
fn run(args: &Args) -> Result<bool, Error> {
    let config = configure(args)?;
    let quiet = args.json;
    if !quiet {
        println!("Z80 Assembler");
        println!("1. Read Files");
    }

    let mut files = vec![];
    for path in &args.input {
        if !quiet {
            println!("  < {}", path);
        }
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileOpen(path.clone(), e),
            _ => Error::FileRead(path.clone(), e),
        })?;
        files.push(SourceFile::new(path.clone(), text));
    }

    if !quiet {
        println!("2. Assemble");
    }
    let mut assembler = Assembler::new(config);
    if let Some(secs) = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        assembler = assembler.with_timestamp(secs);
    }
    let asm = match assembler.assemble(&files) {
        Ok(asm) => asm,
        Err(diags) => {
            report(args, &files, &diags);
            return Ok(false);
        }
    };

    if !quiet {
        println!("3. Write Binary");
        println!("  > {}", &args.output);
    }
    let mut file = std::fs::File::create(&args.output)
        .map_err(|e| Error::FileCreate(args.output.clone(), e))?;
    file.write_all(asm.image.bytes())
        .map_err(|e| Error::FileWrite(args.output.clone(), e))?;

    if args.json {
        report(args, &files, &[]);
    } else {
        println!("{}", cformat!("  <g>{} bytes</>", asm.image.len()));
    }
    if args.dump {
        z80asm::print_dump(&files, &asm);
    }
    if args.symbols {
        z80asm::print_symbols(&asm.symbols);
    }
    Ok(true)
}

fn report(args: &Args, files: &[SourceFile], diags: &[Diagnostic]) {
    if args.json {
        match serde_json::to_string_pretty(diags) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!("{e}"),
        }
        return;
    }
    let sources: IndexMap<String, Vec<String>> = files
        .iter()
        .map(|f| (f.name.clone(), f.text.lines().map(str::to_string).collect()))
        .collect();
    for diag in diags {
        diag.print_diag(&sources);
    }
}
