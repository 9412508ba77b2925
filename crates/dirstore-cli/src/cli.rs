use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dirstore",
    about = "Hierarchical object and attribute store on a plain directory tree",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Namespace root directory (overrides the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the namespace root and its attribute bundle
    Init,
    /// Bind a JSON object at an unbound name
    Bind(BindArgs),
    /// Bind a JSON object, replacing any object already there
    Rebind(BindArgs),
    /// Print the object bound at a name
    Lookup(NameArgs),
    /// Print the attribute bundle of a name
    Attrs(NameArgs),
    /// List the children of a context
    Ls(LsArgs),
    /// Create a context and any missing parents
    Mkdir(MkdirArgs),
    /// Remove an object
    Unbind(NameArgs),
    /// Remove a context and everything below it
    Rmdir(NameArgs),
    /// Rename a name within its context
    Mv(MvArgs),
}

#[derive(Args)]
pub struct BindArgs {
    pub name: String,
    /// Object as a JSON document
    pub json: String,
    /// Attribute to store with the object (repeatable)
    #[arg(short = 'a', long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,
}

#[derive(Args)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Args)]
pub struct LsArgs {
    /// Context to list (default: the root)
    pub name: Option<String>,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub name: String,
    #[arg(short = 'a', long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,
}

#[derive(Args)]
pub struct MvArgs {
    pub src: String,
    pub dst: String,
}
