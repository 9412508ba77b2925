use std::fs;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Map, Value};

use dirstore_sdk::{Directory, CONTEXT_CLASS};
use dirstore_store::StoreConfig;
use dirstore_types::{AttrValue, Attributes, Binding, Name};

use crate::cli::*;

/// Objects are stored as compact JSON text.
type Namespace = Directory<String>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    if matches!(cli.command, Command::Init) {
        fs::create_dir_all(&config.root)
            .with_context(|| format!("creating {}", config.root.display()))?;
    }
    let root: Namespace = Directory::open(config.clone())
        .with_context(|| format!("opening namespace at {}", config.root.display()))?;
    let format = cli.format;

    match cli.command {
        Command::Init => cmd_init(&root, &config, format),
        Command::Bind(args) => cmd_bind(&root, args, false),
        Command::Rebind(args) => cmd_bind(&root, args, true),
        Command::Lookup(args) => cmd_lookup(&root, &args.name, format),
        Command::Attrs(args) => cmd_attrs(&root, &args.name, format),
        Command::Ls(args) => cmd_ls(&root, args.name.as_deref().unwrap_or(""), format),
        Command::Mkdir(args) => cmd_mkdir(&root, args),
        Command::Unbind(args) => {
            root.unbind(&parse_name(&args.name)?)?;
            println!("{} Unbound {}", "✓".green(), args.name.bold());
            Ok(())
        }
        Command::Rmdir(args) => {
            root.destroy_subcontext(&parse_name(&args.name)?)?;
            println!("{} Removed context {}", "✓".green(), args.name.bold());
            Ok(())
        }
        Command::Mv(args) => {
            root.rename(&parse_name(&args.src)?, &parse_name(&args.dst)?)?;
            println!("{} Renamed {} → {}", "✓".green(), args.src.bold(), args.dst.bold());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_toml_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

fn cmd_init(root: &Namespace, config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let attributes = root.attributes(&Name::root())?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "root": root.store().root(), "attributes": attributes_json(&attributes) })
        ),
        OutputFormat::Text => {
            println!(
                "{} Initialized namespace in {}",
                "✓".green().bold(),
                root.store().root().display().to_string().bold()
            );
            println!("  Cache size: {}", config.cache_size);
        }
    }
    Ok(())
}

fn cmd_bind(root: &Namespace, args: BindArgs, overwrite: bool) -> anyhow::Result<()> {
    let name = parse_name(&args.name)?;
    let object = normalize_json(&args.json)?;
    let attributes = attributes_from(&args.attrs)?;
    if overwrite {
        root.rebind(&name, object, attributes)?;
        println!("{} Rebound {}", "✓".green(), args.name.bold());
    } else {
        root.bind(&name, object, attributes)?;
        println!("{} Bound {}", "✓".green(), args.name.bold());
    }
    Ok(())
}

fn cmd_lookup(root: &Namespace, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let binding = root.lookup(&parse_name(name)?)?;
    match (binding, format) {
        (Binding::Context, OutputFormat::Json) => {
            println!("{}", json!({ "name": name, "context": true }))
        }
        (Binding::Context, OutputFormat::Text) => println!("{}", "<context>".cyan()),
        (Binding::Object(text), OutputFormat::Json) => {
            let object: Value = serde_json::from_str(&text).context("stored object is not JSON")?;
            println!("{}", json!({ "name": name, "object": object }));
        }
        (Binding::Object(text), OutputFormat::Text) => {
            let object: Value = serde_json::from_str(&text).context("stored object is not JSON")?;
            println!("{}", serde_json::to_string_pretty(&object)?);
        }
    }
    Ok(())
}

fn cmd_attrs(root: &Namespace, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let attributes = root.attributes(&parse_name(name)?)?;
    match format {
        OutputFormat::Json => println!("{}", attributes_json(&attributes)),
        OutputFormat::Text => {
            for (id, values) in attributes.iter() {
                let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
                println!("{}: {}", id.bold(), joined.join(", "));
            }
        }
    }
    Ok(())
}

fn cmd_ls(root: &Namespace, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let children = root.list(&parse_name(name)?)?;
    match format {
        OutputFormat::Json => {
            let entries: Vec<Value> = children
                .iter()
                .map(|(child, class)| json!({ "name": child, "classname": class }))
                .collect();
            println!("{}", Value::Array(entries));
        }
        OutputFormat::Text => {
            if children.is_empty() {
                println!("{}", "(empty)".dimmed());
            }
            for (child, class) in &children {
                let class = class.as_deref().unwrap_or("?");
                if class == CONTEXT_CLASS {
                    println!("{}/", child.blue().bold());
                } else {
                    println!("{}  {}", child, class.dimmed());
                }
            }
        }
    }
    Ok(())
}

fn cmd_mkdir(root: &Namespace, args: MkdirArgs) -> anyhow::Result<()> {
    let name = parse_name(&args.name)?;
    let attributes = attributes_from(&args.attrs)?;
    root.create_subcontext(&name, attributes)?;
    println!("{} Created context {}", "✓".green(), args.name.bold());
    Ok(())
}

// ---- Argument helpers ----

fn parse_name(s: &str) -> anyhow::Result<Name> {
    Name::parse(s).with_context(|| format!("invalid name {s:?}"))
}

/// Parse `KEY=VALUE`. Integers and booleans keep their type.
fn parse_attribute(s: &str) -> anyhow::Result<(String, AttrValue)> {
    let Some((key, raw)) = s.split_once('=') else {
        bail!("attribute {s:?} is not KEY=VALUE");
    };
    if key.is_empty() {
        bail!("attribute {s:?} has an empty key");
    }
    let value = if let Ok(i) = raw.parse::<i64>() {
        AttrValue::Int(i)
    } else if let Ok(b) = raw.parse::<bool>() {
        AttrValue::Bool(b)
    } else {
        AttrValue::Str(raw.to_string())
    };
    Ok((key.to_string(), value))
}

/// Repeated keys accumulate values.
fn attributes_from(args: &[String]) -> anyhow::Result<Attributes> {
    let mut attributes = Attributes::new();
    for arg in args {
        let (key, value) = parse_attribute(arg)?;
        attributes.add(key, value);
    }
    Ok(attributes)
}

fn normalize_json(text: &str) -> anyhow::Result<String> {
    let value: Value = serde_json::from_str(text).context("object must be a JSON document")?;
    Ok(value.to_string())
}

fn attributes_json(attributes: &Attributes) -> Value {
    let mut map = Map::new();
    for (id, values) in attributes.iter() {
        let values = values.iter().map(attr_value_json).collect();
        map.insert(id.to_string(), Value::Array(values));
    }
    Value::Object(map)
}

fn attr_value_json(value: &AttrValue) -> Value {
    match value {
        AttrValue::Str(s) => json!(s),
        AttrValue::Int(i) => json!(i),
        AttrValue::Bool(b) => json!(b),
        AttrValue::Bytes(bytes) => json!(bytes),
    }
}
