//! Command-line front end over the named demo programs in [`demos`]. There
//! is no textual query language to parse here — each demo already is a
//! small Rust program built against the plugin constructors, and this
//! binary only elaborates, dumps, folds, or traces it.

mod demos;

use std::collections::HashMap;

use clap::{Parser, Subcommand};
use warpgraph_core::app;
use warpgraph_eval::{defaults, fold, fold_with_tracer, FoldOptions, PrintTracer};
use warpgraph_plugins::all_defaults;

#[derive(Parser)]
#[command(name = "warpgraph", about = "Content-addressed DAG kernel for tagless-final DSLs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available demo programs.
    List,
    /// Elaborate a demo and print its normalized graph as JSON.
    Dump {
        demo: String,
    },
    /// Elaborate and fold a demo, printing the resulting value.
    Run {
        demo: String,
    },
    /// Like `run`, but print every trampoline transition as it happens.
    Trace {
        demo: String,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::List => list(),
        Command::Dump { demo } => dump(&demo),
        Command::Run { demo } => run(&demo),
        Command::Trace { demo } => trace(&demo),
    }
}

fn list() {
    for demo in demos::all() {
        println!("{:<16} {}", demo.name, demo.description);
    }
}

fn find_demo_or_exit(name: &str) -> demos::Demo {
    demos::find(name).unwrap_or_else(|| {
        eprintln!("error: no such demo `{name}` (see `warpgraph list`)");
        std::process::exit(1);
    })
}

fn dump(name: &str) {
    let demo = find_demo_or_exit(name);
    let registry = warpgraph_core::Registry::compose(&warpgraph_plugins::all_plugins()).expect("reference plugin bundle always composes");
    let expr = (demo.build)(&registry);
    let n = match app(&expr, &registry) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let json = serde_json::to_string_pretty(&n).expect("NExpr always serializes");
    println!("{json}");
}

fn run(name: &str) {
    let demo = find_demo_or_exit(name);
    let registry = warpgraph_core::Registry::compose(&warpgraph_plugins::all_plugins()).expect("reference plugin bundle always composes");
    let expr = (demo.build)(&registry);
    let n = match app(&expr, &registry) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let interpreter = defaults(&all_defaults(), HashMap::new()).expect("reference plugin bundle always covers its own kinds");
    match fold(&n, &interpreter, &FoldOptions::default()) {
        Ok(value) => println!("{value:?}"),
        Err(e) => {
            eprintln!("fold error: {e}");
            std::process::exit(3);
        }
    }
}

fn trace(name: &str) {
    let demo = find_demo_or_exit(name);
    let registry = warpgraph_core::Registry::compose(&warpgraph_plugins::all_plugins()).expect("reference plugin bundle always composes");
    let expr = (demo.build)(&registry);
    let n = match app(&expr, &registry) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let interpreter = defaults(&all_defaults(), HashMap::new()).expect("reference plugin bundle always covers its own kinds");
    let mut tracer = PrintTracer;
    match fold_with_tracer(&n, &interpreter, &FoldOptions::default(), &mut tracer) {
        Ok(value) => println!("=> {value:?}"),
        Err(e) => {
            eprintln!("fold error: {e}");
            std::process::exit(3);
        }
    }
}
