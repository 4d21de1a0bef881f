// shapecast command-line tool
//
// Works on schema snapshot files (JSON produced by `SchemaSnapshot`): checks
// input documents against them, builds documents from dotted-path tokens,
// and seals or opens persistence envelopes.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use shapecast::cli::{CliConfig, CliOutcome, CliParser};
use shapecast::codec::json;
use shapecast::{
    Envelope, MapperConfig, SchemaMapper, SchemaRegistry, SchemaSnapshot, StructType, Target, TypeDescriptor,
    UnknownFields,
};

/// check, build and persist documents against shapecast schema snapshots
#[derive(Parser, Debug)]
#[command(name = "shapecast", version)]
struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the field tree of a schema snapshot
    Describe(SchemaArgs),
    /// parse a JSON document against a schema and print it with defaults filled in
    Check(CheckArgs),
    /// build a document from dotted-path tokens (`module.layers=32`, `verbose`, `@base`)
    Set(SetArgs),
    /// wrap a JSON document in a persistence envelope
    Seal(CheckArgs),
    /// unwrap a persistence envelope and print its document
    Open(OpenArgs),
}

#[derive(Args, Debug, Clone)]
struct SchemaArgs {
    /// schema snapshot file
    #[arg(long, short)]
    schema: PathBuf,

    /// drop unknown keys instead of rejecting them
    #[arg(long, default_value_t = false)]
    lenient: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// input JSON document
    #[arg(long, short)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct SetArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// assignments, flags and includes
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[derive(Args, Debug)]
struct OpenArgs {
    /// envelope file
    #[arg(long, short)]
    envelope: PathBuf,

    /// schema snapshots to register before opening named envelopes
    #[arg(long, short)]
    schema: Vec<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = CommandLineInterface::parse();
    match cli.cmd {
        Command::Describe(args) => describe(&args),
        Command::Check(args) => check(&args),
        Command::Set(args) => set(&args),
        Command::Seal(args) => seal(&args),
        Command::Open(args) => open(&args),
    }
}

fn load_schema(path: &Path) -> Result<(SchemaSnapshot, TypeDescriptor)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading schema {}", path.display()))?;
    let snapshot = SchemaSnapshot::from_json_str(&text)?;
    let descriptor = snapshot.restore()?;
    if descriptor.as_struct().is_none() {
        bail!("schema {} describes {}, not a structure", path.display(), descriptor);
    }
    info!(schema = %path.display(), nodes = snapshot.nodes.len(), "loaded schema");
    Ok((snapshot, descriptor))
}

fn root_struct(descriptor: &TypeDescriptor) -> Result<&StructType> {
    descriptor
        .as_struct()
        .map(|st| st.as_ref())
        .context("schema root is not a structure")
}

fn mapper(args: &SchemaArgs) -> SchemaMapper {
    SchemaMapper::with_config(MapperConfig {
        unknown_fields: unknown_fields(args),
        target: Target::JsonSafe,
    })
}

fn unknown_fields(args: &SchemaArgs) -> UnknownFields {
    if args.lenient {
        UnknownFields::Lenient
    } else {
        UnknownFields::Strict
    }
}

fn describe(args: &SchemaArgs) -> Result<()> {
    let (snapshot, descriptor) = load_schema(&args.schema)?;
    let parser = CliParser::with_config(
        &descriptor,
        CliConfig { program: "shapecast set".to_string(), ..CliConfig::default() },
    )?;
    println!("fingerprint: {}", snapshot.fingerprint()?);
    print!("{}", parser.help());
    Ok(())
}

fn check(args: &CheckArgs) -> Result<()> {
    let (_, descriptor) = load_schema(&args.schema.schema)?;
    let st = root_struct(&descriptor)?;
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading input {}", args.input.display()))?;
    let value = mapper(&args.schema).parse(st, &json::from_str(&text)?)?;
    let encoded = st.to_target(&value, Target::JsonSafe)?;
    println!("{}", serde_json::to_string_pretty(&json::to_json(&encoded)?)?);
    Ok(())
}

fn set(args: &SetArgs) -> Result<()> {
    let (_, descriptor) = load_schema(&args.schema.schema)?;
    let st = root_struct(&descriptor)?;
    let parser = CliParser::with_config(
        &descriptor,
        CliConfig {
            unknown_fields: unknown_fields(&args.schema),
            program: "shapecast set".to_string(),
            ..CliConfig::default()
        },
    )?;
    match parser.parse_value(&args.tokens)? {
        CliOutcome::Help(text) => print!("{text}"),
        CliOutcome::Parsed(value) => {
            let encoded = st.to_target(&value, Target::JsonSafe)?;
            println!("{}", serde_json::to_string_pretty(&json::to_json(&encoded)?)?);
        }
    }
    Ok(())
}

fn seal(args: &CheckArgs) -> Result<()> {
    let (_, descriptor) = load_schema(&args.schema.schema)?;
    let st = root_struct(&descriptor)?;
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading input {}", args.input.display()))?;
    let value = mapper(&args.schema).parse(st, &json::from_str(&text)?)?;
    println!("{}", Envelope::seal(st, &value)?.to_json_string()?);
    Ok(())
}

fn open(args: &OpenArgs) -> Result<()> {
    let registry = SchemaRegistry::new();
    for path in &args.schema {
        let (_, descriptor) = load_schema(path)?;
        if let Some(st) = descriptor.as_struct() {
            if st.name().is_some() {
                registry.register(st.clone())?;
            }
        }
    }

    let text = std::fs::read_to_string(&args.envelope)
        .with_context(|| format!("reading envelope {}", args.envelope.display()))?;
    let (st, value) = Envelope::from_json_str(&text)?.open(&registry)?;
    let encoded = st.to_target(&value, Target::JsonSafe)?;
    println!("{}", serde_json::to_string_pretty(&json::to_json(&encoded)?)?);
    Ok(())
}
