//! Command line front end.
//!
//! Usage:
//!   micro-sandbox exec <file.js> [--name app] [--key 1] [--single-mode]
//!   micro-sandbox runtime <manifest.json> [--root DIR | --base-url URL]

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::{json, Map, Value};
use url::Url;

use micro_sandbox::fetch::{DirFetch, Fetch, FetchConfig, HttpFetch};
use micro_sandbox::runner::ds::value::JsValue;
use micro_sandbox::runner::std_lib::json::to_json;
use micro_sandbox::{DependencyBag, HostWindow, Runtime, RuntimeLoader, Sandbox, SandboxProps};

#[derive(Parser)]
#[command(name = "micro-sandbox")]
#[command(author, version, about = "Run micro-frontend scripts in isolated sandboxes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Source {
    /// Serve relative URLs from this directory
    #[arg(long, conflicts_with = "base_url")]
    root: Option<PathBuf>,

    /// Resolve relative URLs against this base and fetch them over HTTP
    #[arg(long)]
    base_url: Option<Url>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file inside a sandbox
    Exec {
        /// Path to the script
        file: PathBuf,

        /// Module name
        #[arg(long, default_value = "app")]
        name: String,

        /// Instance key
        #[arg(long, default_value = "")]
        key: String,

        /// Write globals through to the host window
        #[arg(long)]
        single_mode: bool,

        /// Runtime manifest whose globals are injected first
        #[arg(long)]
        runtime: Option<String>,

        /// Advance the host clock by this many milliseconds before exiting
        #[arg(long, default_value = "0")]
        advance: u64,

        #[command(flatten)]
        source: Source,
    },

    /// Load a runtime manifest and print the globals it provides
    Runtime {
        /// Manifest URL or path
        manifest: String,

        #[command(flatten)]
        source: Source,
    },
}

fn fetch_for(source: &Source, fallback_root: &Path) -> Rc<dyn Fetch> {
    match (&source.root, &source.base_url) {
        (_, Some(base)) => Rc::new(HttpFetch::new(
            FetchConfig::default().with_base_url(base.clone()),
        )),
        (Some(root), None) => Rc::new(DirFetch::new(root.clone())),
        (None, None) => Rc::new(DirFetch::new(fallback_root)),
    }
}

fn value_to_json(value: &JsValue) -> Value {
    to_json(value, &mut vec![]).ok().flatten().unwrap_or(Value::Null)
}

fn bag_to_json(bag: &DependencyBag) -> Value {
    let map: Map<String, Value> = bag
        .iter()
        .map(|(key, value)| (key.clone(), value_to_json(value)))
        .collect();
    Value::Object(map)
}

async fn exec(
    file: PathBuf,
    props: SandboxProps,
    runtime: Option<String>,
    advance: u64,
    source: Source,
) -> Result<Value> {
    let code = std::fs::read_to_string(&file)
        .with_context(|| format!("could not read {}", file.display()))?;
    let parent = file.parent().unwrap_or(Path::new(".")).to_path_buf();
    let host = HostWindow::with_fetch(fetch_for(&source, &parent));

    let injections = match runtime {
        Some(manifest) => RuntimeLoader::new(&host)
            .parse_runtime(&Runtime::Manifest(manifest))
            .await?,
        None => None,
    };

    let sandbox = Sandbox::new(&host, props);
    sandbox.create_context(injections)?;
    let result = sandbox.run(&code)?;
    host.settle().await;
    if advance > 0 {
        host.advance(advance);
        host.settle().await;
    }
    info!("ran {} in sandbox {}", file.display(), sandbox.id());

    let output = json!({
        "result": value_to_json(&result),
        "added": bag_to_json(&sandbox.added_properties()),
        "overwritten": sandbox.original_values().keys().cloned().collect::<Vec<String>>(),
        "body": host.document().inner_html(host.document().body()),
    });
    sandbox.clear();
    Ok(output)
}

async fn runtime(manifest: String, source: Source) -> Result<Value> {
    let host = HostWindow::with_fetch(fetch_for(&source, Path::new(".")));
    let loader = RuntimeLoader::new(&host);
    let deps = loader
        .parse_runtime(&Runtime::Manifest(manifest))
        .await?
        .unwrap_or_default();
    Ok(bag_to_json(&deps))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let output = match cli.command {
        Command::Exec {
            file,
            name,
            key,
            single_mode,
            runtime: manifest,
            advance,
            source,
        } => {
            let props = SandboxProps::new(name).key(key).multi_mode(!single_mode);
            exec(file, props, manifest, advance, source).await?
        }
        Command::Runtime { manifest, source } => runtime(manifest, source).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
