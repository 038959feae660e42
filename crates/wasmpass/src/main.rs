use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wasmpass::types::ValType;
use wasmpass::{compile, CompileOptions, Imports, InstanceConfig, Value};

/// wasmpass: single-pass WebAssembly validator and interpreter.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input WebAssembly binary (.wasm), or text (.wat)
    input: PathBuf,

    /// Call an exported function; remaining arguments are its parameters
    #[arg(long, value_name = "EXPORT")]
    invoke: Option<String>,

    /// Parameters for --invoke
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Print the translated bytecode of every function
    #[arg(long)]
    dump: bool,

    /// Reject memories declaring more than this many pages
    #[arg(long, default_value_t = default_max_pages())]
    max_pages: u32,

    /// Emit loads/stores in place instead of through shared accessors
    #[arg(long)]
    no_accessors: bool,

    /// Nested call limit before trapping
    #[arg(long, default_value_t = InstanceConfig::default().max_call_depth)]
    max_call_depth: usize,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn default_max_pages() -> u32 {
    CompileOptions::default().max_memory_pages
}

fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_arg(text: &str, ty: ValType) -> Result<Value> {
    let context = || format!("invalid {ty} argument `{text}`");
    Ok(match ty {
        ValType::I32 => Value::I32(
            text.parse::<i32>()
                .or_else(|_| text.parse::<u32>().map(|v| v as i32))
                .with_context(context)?,
        ),
        ValType::I64 => Value::I64(
            text.parse::<i64>()
                .or_else(|_| text.parse::<u64>().map(|v| v as i64))
                .with_context(context)?,
        ),
        ValType::F32 => Value::F32(text.parse().with_context(context)?),
        ValType::F64 => Value::F64(text.parse().with_context(context)?),
        ValType::FuncRef | ValType::ExternRef if text == "null" => Value::default_for(ty),
        ValType::ExternRef => Value::ExternRef(Some(text.parse().with_context(context)?)),
        ValType::FuncRef => bail!("funcref arguments other than `null` are not supported"),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let raw =
        fs::read(&cli.input).with_context(|| format!("failed to read {}", cli.input.display()))?;
    let bytes = if cli.input.extension().is_some_and(|e| e == "wat") {
        wat::parse_bytes(&raw)
            .with_context(|| format!("failed to parse {}", cli.input.display()))?
            .into_owned()
    } else {
        raw
    };

    let options = CompileOptions {
        max_memory_pages: cli.max_pages,
        memory_accessors: !cli.no_accessors,
    };
    let module = compile(&bytes, &options).context("validation failed")?;
    info!(
        functions = module.functions().len(),
        accessors = module.accessors().len(),
        "{} is valid",
        cli.input.display()
    );

    if cli.dump {
        for func in module.functions() {
            print!("{func}");
        }
    }

    let Some(name) = cli.invoke.as_deref() else {
        return Ok(());
    };
    let config = InstanceConfig {
        max_call_depth: cli.max_call_depth,
    };
    let instance = module
        .instantiate_with(&Imports::new(), &config)
        .context("instantiation failed")?;
    let func = instance
        .export(name)
        .and_then(|e| e.into_func())
        .ok_or_else(|| anyhow!("no exported function named `{name}`"))?;
    let params = &func.ty().params;
    if params.len() != cli.args.len() {
        bail!(
            "`{name}` takes {} argument(s), {} given",
            params.len(),
            cli.args.len()
        );
    }
    let args = cli
        .args
        .iter()
        .zip(params)
        .map(|(text, &ty)| parse_arg(text, ty))
        .collect::<Result<Vec<_>>>()?;
    let results = func
        .call(&args)
        .with_context(|| format!("`{name}` failed"))?;
    for value in results {
        println!("{value}");
    }
    Ok(())
}
