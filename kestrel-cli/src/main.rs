//! Entrypoint for CLI
use std::{env, error::Error};

use kestrel_bytecode::Vm;
use kestrel_compiler::{check, generate, optimize};
use kestrel_interp::interpret;
use log::info;

mod demos;

static USAGE: &str = r#"
usage: kestrel CMD [DEMO]

commands:
    list    List the built-in demo programs
    check   Report semantic diagnostics for the demo
    build   Compile the demo and print the artifact listing
    run     Compile the demo and execute it on the reference VM
    eval    Evaluate the demo with the tree walking interpreter

examples:
    kestrel build sum
    kestrel run records
    kestrel eval mutual
"#;

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::List) => {
            for name in demos::NAMES {
                println!("{}", name);
            }
        }
        Some(Cmd::Check { demo }) => run_check(&demo)?,
        Some(Cmd::Build { demo }) => run_build(&demo)?,
        Some(Cmd::Run { demo }) => run_vm(&demo)?,
        Some(Cmd::Eval { demo }) => run_eval(&demo)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn load_demo(name: &str) -> Result<kestrel_tree::Tree, Box<dyn Error>> {
    demos::build(name).ok_or_else(|| format!("unknown demo '{}'; try: kestrel list", name).into())
}

fn run_check(demo: &str) -> Result<(), Box<dyn Error>> {
    let tree = load_demo(demo)?;
    let diagnostics = check(&tree);
    if diagnostics.is_empty() {
        println!("no diagnostics");
    } else {
        for diagnostic in &diagnostics {
            println!("{}", diagnostic);
        }
    }
    Ok(())
}

fn run_build(demo: &str) -> Result<(), Box<dyn Error>> {
    let mut tree = load_demo(demo)?;

    let diagnostics = check(&tree);
    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }

    optimize(&mut tree);
    info!("optimization pass complete");

    let artifact = generate(&tree)?;
    print!("{}", artifact);
    Ok(())
}

fn run_vm(demo: &str) -> Result<(), Box<dyn Error>> {
    let mut tree = load_demo(demo)?;

    let diagnostics = check(&tree);
    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }

    optimize(&mut tree);
    let artifact = generate(&tree)?;

    let mut vm = Vm::new(&artifact);
    vm.run_entry()?;
    print!("{}", vm.output());
    Ok(())
}

fn run_eval(demo: &str) -> Result<(), Box<dyn Error>> {
    let tree = load_demo(demo)?;
    let output = interpret(&tree)?;
    print!("{}", output);
    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next()?.as_str() {
        "list" => Some(Cmd::List),
        "check" => Some(Cmd::Check { demo: args.next()? }),
        "build" => Some(Cmd::Build { demo: args.next()? }),
        "run" => Some(Cmd::Run { demo: args.next()? }),
        "eval" => Some(Cmd::Eval { demo: args.next()? }),
        _ => None,
    }
}

fn print_usage() {
    println!("Kestrel compiler");
    println!("{USAGE}");
}

enum Cmd {
    /// List demo programs
    List,
    /// Semantic check only
    Check { demo: String },
    /// Compile and show the artifact
    Build { demo: String },
    /// Compile and execute on the VM
    Run { demo: String },
    /// Tree walking interpreter
    Eval { demo: String },
}
