//! wheel-matrix CLI
//!
//! Entry point for the `wheel-matrix` command-line tool.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use wheel_matrix::{
    Arch, BuildContext, BuildMatrix, BuildOptions, BuildSelection, ConfigResolver, EffectiveConfig, Platform,
    ProjectConfig,
};

#[derive(Parser)]
#[command(name = "wheel-matrix")]
#[command(about = "Resolve per-identifier wheel build configuration", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Project config file (pyproject.toml or standalone TOML)
    #[arg(long, short = 'c', default_value = "pyproject.toml")]
    config: PathBuf,

    /// Skip the built-in defaults layer
    #[arg(long)]
    no_defaults: bool,
}

#[derive(Args)]
struct MatrixArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Target platform (default: host platform)
    #[arg(long, short = 'p')]
    platform: Option<String>,

    /// Interpreter tags (comma-separated, e.g. "cp39,cp310")
    #[arg(long, value_delimiter = ',')]
    interpreters: Option<Vec<String>>,

    /// Architectures (comma-separated, e.g. "x86_64,i686")
    #[arg(long, value_delimiter = ',')]
    archs: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration for one build context
    Resolve {
        #[command(flatten)]
        config: ConfigArgs,

        /// Target platform (linux, windows, macos)
        #[arg(long, short = 'p')]
        platform: String,

        /// Interpreter tag (e.g. cp38)
        #[arg(long, short = 'i')]
        interpreter: String,

        /// CPU architecture (e.g. x86_64, i686, AMD64, arm64)
        #[arg(long, short = 'a')]
        arch: String,

        /// Fail if the config has no table for the platform
        #[arg(long)]
        require_platform: bool,

        /// Output in human-readable format instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// List identifiers that will be built
    Identifiers {
        #[command(flatten)]
        matrix: MatrixArgs,
    },

    /// Print the build plan for a platform as JSON
    Plan {
        #[command(flatten)]
        matrix: MatrixArgs,
    },

    /// Check that the config loads and resolves for every default context
    Verify {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = wheel_matrix::logging::init(cli.verbose) {
        eprintln!("Warning: could not initialize logging: {}", e);
    }

    match cli.command {
        Commands::Resolve {
            config,
            platform,
            interpreter,
            arch,
            require_platform,
            human,
        } => run_resolve(&config, &platform, &interpreter, &arch, require_platform, human),
        Commands::Identifiers { matrix } => run_identifiers(&matrix),
        Commands::Plan { matrix } => run_plan(&matrix),
        Commands::Verify { config } => run_verify(&config),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load_resolver(args: &ConfigArgs) -> ConfigResolver {
    let project = load_project(&args.config);
    let resolver = ConfigResolver::from_project(&project).unwrap_or_else(|e| fail(e));
    if args.no_defaults {
        resolver
    } else {
        resolver.with_builtin_defaults()
    }
}

fn load_project(path: &Path) -> ProjectConfig {
    debug!(path = %path.display(), "loading project config");
    ProjectConfig::from_file(path).unwrap_or_else(|e| fail(format!("{}: {}", path.display(), e)))
}

fn build_matrix(args: &MatrixArgs) -> BuildMatrix {
    let platform = match &args.platform {
        Some(p) => p.parse::<Platform>().unwrap_or_else(|e| fail(e)),
        None => Platform::current().unwrap_or_else(|| fail("host platform is not supported; pass --platform")),
    };

    let mut matrix = BuildMatrix::for_platform(platform);
    if let Some(interpreters) = &args.interpreters {
        matrix = matrix.with_interpreters(interpreters.clone());
    }
    if let Some(archs) = &args.archs {
        let parsed: Vec<Arch> = archs
            .iter()
            .map(|a| a.parse::<Arch>().unwrap_or_else(|e| fail(e)))
            .collect();
        matrix = matrix.with_archs(parsed);
    }
    matrix
}

fn run_resolve(args: &ConfigArgs, platform: &str, interpreter: &str, arch: &str, require_platform: bool, human: bool) {
    let context = BuildContext::parse(platform, interpreter, arch).unwrap_or_else(|e| fail(e));
    let resolver = load_resolver(args).require_platform(require_platform);
    let effective = resolver.resolve(&context).unwrap_or_else(|e| fail(e));

    if human {
        print_human(&effective);
    } else {
        match effective.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => fail(format!("Error serializing output: {}", e)),
        }
    }
}

fn print_human(effective: &EffectiveConfig) {
    println!("{}", effective.identifier);
    println!();
    println!("  Layers:");
    for layer in &effective.layers {
        println!("    {}", layer);
    }
    println!();
    println!("  Options:");
    for (key, value) in effective.config.iter() {
        let rendered = serde_json::to_string(value).unwrap_or_default();
        match effective.origin(key) {
            Some(origin) => println!("    {} = {}  ({})", key, rendered, origin),
            None => println!("    {} = {}", key, rendered),
        }
    }
    if let Ok(digest) = effective.digest() {
        println!();
        println!("  Digest: {}", digest);
    }
}

fn run_identifiers(args: &MatrixArgs) {
    let resolver = load_resolver(&args.config);
    let matrix = build_matrix(args);
    let contexts = matrix.contexts().unwrap_or_else(|e| fail(e));

    let mut built = 0usize;
    for (context, result) in contexts.iter().zip(resolver.resolve_all(&contexts)) {
        let effective = result.unwrap_or_else(|e| fail(e));
        let options = BuildOptions::from_effective(&effective)
            .unwrap_or_else(|e| fail(format!("{}: {}", context, e)));
        if BuildSelection::from_options(&options).should_build(context.identifier()) {
            println!("{}", context);
            built += 1;
        }
    }
    info!(platform = %matrix.platform, built, total = contexts.len(), "identifiers listed");
}

fn run_plan(args: &MatrixArgs) {
    let resolver = load_resolver(&args.config);
    let plan = build_matrix(args).plan(&resolver).unwrap_or_else(|e| fail(e));
    match plan.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("Error serializing output: {}", e)),
    }
}

fn run_verify(args: &ConfigArgs) {
    let resolver = load_resolver(args);

    let mut checked = 0usize;
    for platform in Platform::ALL {
        let plan = BuildMatrix::for_platform(platform)
            .plan(&resolver)
            .unwrap_or_else(|e| fail(format!("{}: {}", platform, e)));
        checked += plan.entries.len();
    }

    println!("Configuration valid: {}", args.config.display());
    println!("  Override rules: {}", resolver.rule_count());
    println!("  Contexts checked: {}", checked);
}
