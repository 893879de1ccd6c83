use anyhow::Result;
use std::collections::BTreeSet;

use panoply::{Aggregator, Binding, HostVersion, Merged};

use crate::cli::Format;

pub fn modules_report(agg: &Aggregator, all: bool, format: Format) -> Result<String> {
    let aggregatable = agg.registry().aggregatable();
    let listed: BTreeSet<String> = if all {
        agg.registry().known()
    } else {
        aggregatable.clone()
    };

    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&listed)? + "\n");
    }

    let mut out = String::new();
    out.push_str(&format!("panoply modules (host {})\n", agg.version()));
    out.push_str("=========================\n");
    for id in &listed {
        let marker = if aggregatable.contains(id) { " " } else { "-" };
        out.push_str(&format!("{marker} {id}\n"));
    }
    out.push_str(&format!(
        "\n{} listed, {} aggregatable\n",
        listed.len(),
        aggregatable.len()
    ));
    Ok(out)
}

pub fn symbols_report(merged: &Merged, format: Format) -> Result<String> {
    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&merged.origins)? + "\n");
    }

    let width = merged.table.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();

    for (name, binding) in &merged.table {
        let origin = merged.origins.get(name).map(String::as_str).unwrap_or("?");
        out.push_str(&format!("{name:<width$}  {origin}{}\n", describe(binding)));
    }
    out.push_str(&format!("\n{} symbols\n", merged.table.len()));
    Ok(out)
}

fn describe(binding: &Binding) -> String {
    match binding.peek() {
        Some(value) => format!("  {value:?}"),
        None if binding.is_realized() => "  (unavailable)".to_string(),
        None => String::new(),
    }
}

pub fn deprecated_report(
    agg: &Aggregator,
    version: HostVersion,
    module: Option<&str>,
    format: Format,
) -> Result<String> {
    let (title, items) = match module {
        Some(m) => (
            format!("deprecated names of {m} as of {version}"),
            agg.deprecated_names_strict(m, Some(version))?,
        ),
        None => (
            format!("deprecated modules as of {version}"),
            agg.deprecated_modules(Some(version)),
        ),
    };

    if format == Format::Json {
        let doc = serde_json::json!({ "version": version.to_string(), "items": items });
        return Ok(serde_json::to_string_pretty(&doc)? + "\n");
    }

    let mut out = String::new();
    out.push_str(&title);
    out.push('\n');
    out.push_str(&"=".repeat(title.len()));
    out.push('\n');
    for item in &items {
        out.push_str(&format!("  - {item}\n"));
    }
    if items.is_empty() {
        out.push_str("  (none)\n");
    }
    Ok(out)
}

pub fn probe_report(module: &str, names: &[String]) -> String {
    let mut out = format!("{module}: {} public names\n", names.len());
    for name in names {
        out.push_str(&format!("  {name}\n"));
    }
    out
}
