use std::{path::PathBuf, process::exit};

use argh::FromArgs;
use tracing_subscriber::EnvFilter;

use quartz::{ast::Root, Error, Lexer, Parser, ScopeStack, SourceFile, TypeRegistry};

/// CLI options
#[derive(FromArgs)]
struct Opts {
    #[argh(subcommand)]
    cmd: Cmd,
}

/// Command
#[derive(FromArgs)]
#[argh(subcommand)]
enum Cmd {
    Check(CheckCmd),
    Dump(DumpCmd),
}

/// Parse a source file and report the result
#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
struct CheckCmd {
    /// source file
    #[argh(positional)]
    source: PathBuf,
}

/// Print the AST of a source file
#[derive(FromArgs)]
#[argh(subcommand, name = "dump")]
struct DumpCmd {
    /// source file
    #[argh(positional)]
    source: PathBuf,
    #[argh(switch, description = "also print the token stream")]
    tokens: bool,
}

fn front_end(path: &PathBuf, dump_tokens: bool) -> Result<Root, String> {
    let mut source = SourceFile::open(path).map_err(|e| Error::from(e).to_string())?;

    let result = (|| -> Result<Root, Error> {
        let tokens = Lexer::new(&mut source).lex()?;

        if dump_tokens {
            for token in &tokens {
                println!("{:>4}:{:<4} {}", token.pos.line, token.pos.column, token.kind);
            }
        }

        let mut types = TypeRegistry::default();
        let mut scopes = ScopeStack::default();

        Parser::new(tokens, &mut types, &mut scopes).parse()
    })();

    result.map_err(|e| e.report(&source))
}

fn cmd(opts: Opts) -> Result<(), String> {
    match opts.cmd {
        Cmd::Check(CheckCmd { source }) => {
            let root = front_end(&source, false)?;
            println!("ok: {} declarations", root.decls.len());
        }
        Cmd::Dump(DumpCmd { source, tokens }) => {
            let root = front_end(&source, tokens)?;
            println!("{root:#?}");
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = argh::from_env();

    if let Err(report) = cmd(opts) {
        eprintln!("{report}");
        exit(1);
    }
}
