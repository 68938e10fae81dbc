use std::path::PathBuf;

use apn_term::{
    config::{self, EngineConfig},
    parse_boolean, parse_pattern, parse_term,
    solver::{check_predicate_sat, solve_inequality, SolverContext},
    transition::{CompiledTransition, ParseCache},
    type_checker::{
        annotate_net, auto_annotate_types, capitalize_type_names, infer_variable_types,
        ElementKind, TypeMap,
    },
    Binding, BoolExpr, Error, InternalResult, Net, TypeTag, Value,
};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "apn-term.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a term, or a guard with --guard
    Eval {
        expr: String,
        #[arg(long)]
        guard: bool,
        /// Variable binding such as `x=3` or `p=(1, 'a')`
        #[arg(short, long = "bind")]
        bindings: Vec<String>,
    },
    /// Check whether a guard is satisfiable for its unbound variables
    Check {
        guard: String,
        #[arg(short, long = "bind")]
        bindings: Vec<String>,
    },
    /// Enumerate integer solutions of an equation or inequality such as `x + 2 == 5`
    Solve {
        constraint: String,
        #[arg(short, long)]
        max_models: Option<usize>,
    },
    /// Match a pattern against a token value
    Match { pattern: String, value: String },
    /// Add `:Type` annotations to the variables of an expression
    Annotate {
        expr: String,
        /// Known type such as `x=Int`
        #[arg(short, long = "type")]
        types: Vec<String>,
        /// Type for variables without a known type
        #[arg(long)]
        default: Option<TypeTag>,
        /// Replace existing annotations
        #[arg(long)]
        overwrite: bool,
    },
    /// Add inferred type annotations to a whole net file and print it
    AnnotateNet { net: PathBuf },
    /// Print inferred variable types of a transition or arc
    Types {
        net: PathBuf,
        id: String,
        #[arg(long, default_value = "transition")]
        kind: ElementKind,
    },
    /// Fire a transition once and print the resulting marking
    Fire { net: PathBuf, transition: String },
}

fn parse_bindings(raw: &[String]) -> InternalResult<Binding> {
    let mut binding = Binding::new();
    for entry in raw {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::internal(format!("binding must look like name=value: {}", entry)))?;
        binding.insert(name.trim().to_string(), value.trim().parse::<Value>()?);
    }
    Ok(binding)
}

fn print_json<T: serde::Serialize>(value: &T) -> InternalResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Error::internal(format!("Failed to render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

async fn run(cli: &Cli) -> InternalResult<()> {
    let config: EngineConfig = if cli.config.exists() {
        config::from_file(&cli.config)?
    } else {
        EngineConfig::default()
    };
    config.validate()?;
    info!("config loaded.");
    debug!("config: {:?}", config);

    match &cli.command {
        Command::Eval {
            expr,
            guard,
            bindings,
        } => {
            let binding = parse_bindings(bindings)?;
            if *guard {
                let parsed = parse_boolean(expr)?;
                println!("{}", Value::Bool(apn_term::eval_bool(&parsed, &binding)?));
            } else {
                let parsed = parse_term(expr)?;
                println!("{}", apn_term::eval_term(&parsed, &binding)?);
            }
        }
        Command::Check { guard, bindings } => {
            let binding = parse_bindings(bindings)?;
            let parsed = parse_boolean(guard)?;
            let context = SolverContext::from_config(config.solver.clone()).await?;
            let sat = check_predicate_sat(&context, &parsed, &binding).await?;
            println!("{}", if sat { "sat" } else { "unsat" });
        }
        Command::Solve {
            constraint,
            max_models,
        } => {
            let BoolExpr::Cmp { op, left, right } = parse_boolean(constraint)? else {
                return Err(Error::internal(format!(
                    "expected a single comparison such as `x + 2 == 5`: {}",
                    constraint
                )));
            };
            let context = SolverContext::from_config(config.solver.clone()).await?;
            let max = max_models.unwrap_or(config.solver.max_models);
            let outcome = solve_inequality(&context, &left, &right, op, max).await?;
            if !outcome.is_exact() {
                eprintln!("warning: solver failed, solutions are placeholders");
            }
            for solution in &outcome.solutions {
                let parts: Vec<String> = solution
                    .iter()
                    .map(|(name, value)| format!("{} = {}", name, value))
                    .collect();
                println!("{}", parts.join(", "));
            }
            if outcome.has_more {
                println!("...");
            }
        }
        Command::Match { pattern, value } => {
            let pattern = parse_pattern(pattern)?;
            let value: Value = value.parse()?;
            match apn_term::match_pattern(&pattern, &value) {
                Some(binding) => print_json(&binding)?,
                None => println!("no match"),
            }
        }
        Command::Annotate {
            expr,
            types,
            default,
            overwrite,
        } => {
            let mut known = TypeMap::new();
            for entry in types {
                let (name, tag) = entry
                    .split_once('=')
                    .ok_or_else(|| Error::internal(format!("type must look like name=Type: {}", entry)))?;
                let tag: TypeTag = tag
                    .trim()
                    .parse()
                    .map_err(|_| Error::internal(format!("unknown type: {}", tag)))?;
                known.insert(name.trim().to_string(), tag);
            }
            println!(
                "{}",
                auto_annotate_types(&capitalize_type_names(expr), &known, *default, *overwrite)
            );
        }
        Command::AnnotateNet { net } => {
            let net = Net::load(net)?;
            print_json(&annotate_net(&net))?;
        }
        Command::Types { net, id, kind } => {
            let net = Net::load(net)?;
            print_json(&infer_variable_types(*kind, id, &net))?;
        }
        Command::Fire { net, transition } => {
            let mut net = Net::load(net)?;
            let context = SolverContext::from_config(config.solver.clone()).await?;
            let compiled = CompiledTransition::compile(&net, transition, ParseCache::global())?;
            let mut marking = net.marking();
            let enabling = compiled
                .find_enabling_binding(
                    &marking,
                    Some(&context),
                    config.simulation.max_tokens_per_place,
                )
                .await?
                .ok_or_else(|| Error::internal(format!("transition {} is not enabled", transition)))?;
            let firing = compiled.fire(&enabling, Some(&context)).await?;
            firing.apply(&mut marking);
            net.set_marking(&marking);
            print_json(&net)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
