use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "panoply", version, about)]
pub struct Args {
    /// Path to config.toml (overrides PANOPLY_CONFIG and XDG default)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Host manifest to aggregate from (overrides panoply.host_manifest)
    #[arg(long, global = true)]
    pub host: Option<PathBuf>,

    /// Log at debug level unless PANOPLY_LOG says otherwise
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the modules eligible for aggregation
    Modules {
        /// Also list modules dropped by platform and toolkit gates
        #[arg(long, default_value_t = false)]
        all: bool,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Aggregate and print every symbol with the module it came from
    Symbols(SymbolsArgs),

    /// Show deprecated modules, or the deprecated names of one module
    Deprecated {
        /// Version to query (defaults to the host's)
        #[arg(long = "at")]
        version: Option<String>,

        #[arg(long)]
        module: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Run an isolated public-name probe for one module
    Probe {
        module: String,

        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Probe command; `{module}` is replaced by the module id
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Regenerate the public-names table for the host version (TOML on stdout)
    Generate {
        /// Deduce through an isolated probe command instead of the live host
        #[arg(last = true)]
        probe: Vec<String>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct SymbolsArgs {
    /// Realize every value up front
    #[arg(long, default_value_t = false)]
    pub eager: bool,

    /// Give a module priority 1 (repeatable)
    #[arg(long = "prioritize", value_name = "MODULE")]
    pub prioritize: Vec<String>,

    /// Leave a module out (repeatable)
    #[arg(long, value_name = "MODULE")]
    pub ignore: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub include_deprecated: bool,

    /// Keep names that shadow the host's builtins
    #[arg(long, default_value_t = false)]
    pub no_protect: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}
