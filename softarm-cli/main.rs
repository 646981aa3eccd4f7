use std::borrow::Cow;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use softarm::asm::assemble;
use softarm::ast::Reg;
use softarm::sim::{SimConfig, Simulator};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command
}
#[derive(Subcommand)]
enum Command {
    /// Parses a program and reports any errors without executing it.
    Check {
        input: PathBuf,
    },
    /// Executes a program and prints the machine state it halts with.
    Run {
        input: PathBuf,
        /// The number of 32-bit words in the memory window.
        #[arg(long, default_value_t = 256)]
        mem_words: usize,
        /// The physical address of the first word of the memory window.
        #[arg(long, default_value_t = 0x2000_0000)]
        mem_base: u32,
    },
}

struct SourceMetadata<'fp> {
    name: Cow<'fp, str>,
    src: Source<String>
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Args { cmd } = Args::parse();

    let result = match cmd {
        Command::Check { input } => cmd_check(&input),
        Command::Run { input, mem_words, mem_base } => {
            cmd_run(&input, SimConfig { mem_words, mem_base })
        },
    };

    match result {
        Ok(_)  => ExitCode::SUCCESS,
        Err(e) => e,
    }
}

fn cmd_check(input: &Path) -> Result<(), ExitCode> {
    let src = handle_read(input, std::fs::read_to_string)?;

    let meta = SourceMetadata {
        name: input.to_string_lossy(),
        src: Source::from(src.clone())
    };

    match assemble(&src) {
        Ok(program) => {
            println!("{}: {} operation(s)", input.display(), program.len());
            Ok(())
        }
        Err(e) => {
            report_error(e, &meta).unwrap();
            Err(ExitCode::FAILURE)
        }
    }
}

fn cmd_run(input: &Path, config: SimConfig) -> Result<(), ExitCode> {
    let src = handle_read(input, std::fs::read_to_string)?;

    let meta = SourceMetadata {
        name: input.to_string_lossy(),
        src: Source::from(src.clone())
    };
    macro_rules! handle {
        ($e:expr) => {
            match $e {
                Ok(t) => t,
                Err(e) => {
                    report_error(e, &meta).unwrap();
                    return Err(ExitCode::FAILURE);
                }
            }
        }
    }

    let program = handle!(assemble(&src));
    let mut sim = Simulator::with_config(program, config);
    handle!(sim.run());

    for n in 0..16u8 {
        let reg = Reg::new(n);
        let value = sim.reg_file().get(reg).unwrap();
        println!("{reg:>3} = {value:#010X} ({})", value as i32);
    }
    println!("CPSR: {}", sim.cpsr());

    Ok(())
}

fn handle_read<'p, T>(input: &'p Path, read: impl FnOnce(&'p Path) -> std::io::Result<T>) -> Result<T, ExitCode> {
    read(input)
        .map_err(|e| {
            Report::<Range<usize>>::build(ReportKind::Error, (), 0)
                .with_message(format!("{}: {e}", input.display()))
                .finish()
                .eprint(Source::from(""))
                .unwrap();

            ExitCode::FAILURE
        })
}

fn report_error<E: softarm::err::Error>(err: E, meta: &SourceMetadata) -> std::io::Result<()> {
    let mut colors = ColorGenerator::new();

    match err.span() {
        Some(span) => {
            let mut report = Report::build(ReportKind::Error, &*meta.name, span.start)
                .with_message(&err);

            report = report.with_label({
                let mut label = Label::new((&*meta.name, span))
                    .with_color(colors.next());

                if let Some(help) = err.help() {
                    label = label.with_message(help);
                }

                label
            });

            report
                .finish()
                .eprint((&*meta.name, meta.src.clone()))
        },
        None => {
            let mut report = Report::build(ReportKind::Error, &*meta.name, 0)
                .with_message(&err);

            if let Some(help) = err.help() {
                report = report
                    .with_label(Label::new((&*meta.name, 0..0)))
                    .with_help(help)
            };

            report
                .finish()
                .eprint((&*meta.name, Source::from("")))
        },
    }
}
