use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{rc::Rc, sync::Arc, time::Duration};

use panoply::{
    Aggregator, Config, ContextEnv, HostRuntime, HostVersion, IsolatedProbe, ManifestHost, MergeOptions,
    ModuleEnumerator, ModuleRegistry, Priorities, StaticData,
};

mod cli;
mod report;

use cli::{Args, Command, SymbolsArgs};

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let mut ctx = ContextEnv::new();
    let config_path = ctx.locate_config(args.config.as_deref())?;
    let cfg = Config::load_or_default(config_path.as_deref())?;

    // Probing needs no host.
    if let Command::Probe {
        module,
        timeout_secs,
        command,
    } = &args.command
    {
        let Some((program, rest)) = command.split_first() else {
            bail!("probe needs a command after `--`");
        };
        let probe = IsolatedProbe::new(program.as_str(), rest.iter().cloned())
            .with_timeout(Duration::from_secs(*timeout_secs));
        let names = probe
            .run(module)
            .with_context(|| format!("probe failed for {module}"))?;
        print!("{}", report::probe_report(module, &names));
        return Ok(());
    }

    let host = Rc::new(load_host(&args, &cfg)?);
    let registry = ModuleRegistry::new(host.as_ref(), ctx.platform(), ctx.toolkit_available(), &cfg.registry)?;
    let data = match &cfg.panoply.data_dir {
        Some(dir) => Arc::new(
            StaticData::load_from_dir(dir)
                .with_context(|| format!("failed to load static data from {}", dir.display()))?,
        ),
        None => StaticData::builtin()?,
    };

    let mut aggregator = Aggregator::with_parts(host.clone(), registry, data);
    if let Some(version) = cfg.panoply.host_version {
        aggregator = aggregator.with_version(version);
    }

    let out = match &args.command {
        Command::Modules { all, format } => report::modules_report(&aggregator, *all, *format)?,
        Command::Symbols(sym) => {
            let options = merge_options(&cfg.merge, sym);
            let merged = aggregator.merge_tracked(
                aggregator.candidate_modules(&options),
                &options.priorities,
                &options,
            )?;
            report::symbols_report(&filtered(&aggregator, merged, &options), sym.format)?
        }
        Command::Deprecated {
            version,
            module,
            format,
        } => {
            let version = match version {
                Some(v) => HostVersion::parse(v)?,
                None => aggregator.version(),
            };
            report::deprecated_report(&aggregator, version, module.as_deref(), *format)?
        }
        Command::Generate { probe } => {
            let probe = match probe.split_first() {
                Some((program, rest)) => Some(IsolatedProbe::new(program.as_str(), rest.iter().cloned())),
                None => None,
            };
            let table = panoply::generate_public_names(host.as_ref(), aggregator.registry(), probe.as_ref())?;
            panoply::render_table(aggregator.version(), &table)?
        }
        Command::Probe { .. } => unreachable!("handled above"),
    };

    print!("{out}");
    tracing::debug!(loads = host.load_count(), "done");
    Ok(())
}

fn load_host(args: &Args, cfg: &Config) -> Result<ManifestHost> {
    let Some(path) = args.host.as_ref().or(cfg.panoply.host_manifest.as_ref()) else {
        bail!("no host manifest: pass --host or set panoply.host_manifest in config.toml");
    };
    let host = ManifestHost::load_from_path(path)
        .with_context(|| format!("failed to load host manifest: {}", path.display()))?;
    tracing::debug!(version = %host.version(), modules = host.list().len(), "host loaded");
    Ok(host)
}

fn merge_options(base: &MergeOptions, sym: &SymbolsArgs) -> MergeOptions {
    let mut options = base.clone();
    if sym.eager {
        options.lazy = false;
    }
    if sym.include_deprecated {
        options.include_deprecated = true;
    }
    if sym.no_protect {
        options.protect_reserved_names = false;
    }
    if !sym.prioritize.is_empty() {
        options.priorities = Priorities::listed(sym.prioritize.iter().cloned());
    }
    options.ignore.extend(sym.ignore.iter().cloned());
    options
}

/// Drop what `import_into` would refuse to bind.
fn filtered(agg: &Aggregator, mut merged: panoply::Merged, options: &MergeOptions) -> panoply::Merged {
    let reserved = &agg.data().reserved;
    merged.table.retain(|name, _| {
        panoply::is_identifier(name, reserved) && !(options.protect_reserved_names && reserved.is_protected(name))
    });
    merged.origins.retain(|name, _| merged.table.contains_key(name));
    merged
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("PANOPLY_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("panoply=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
