//! `formforge` command-line interface.
//!
//! ```bash
//! formforge generate specs/*.yaml -o generated_forms
//! formforge validate specs/customer.yaml
//! formforge types
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use formforge_core::{load_str, split_forms, KnownForms, Message};
use formforge_engine::{FormGenerator, GeneratorConfig};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "formforge")]
#[command(version)]
#[command(about = "Generate form definitions from declarative specifications", long_about = None)]
struct Cli {
    /// Treat references to unknown forms as errors
    #[arg(long, global = true, env = "FORMFORGE_STRICT_REFS")]
    strict_refs: bool,

    /// Directories whose form files (yaml, yml, json, csv) name known forms
    #[arg(long, global = true, env = "FORMFORGE_KNOWN_FORMS_DIR", value_delimiter = ',')]
    known_forms_dir: Vec<PathBuf>,

    /// Log output format
    #[arg(long, global = true, env = "FORMFORGE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one JSON document per form
    Generate {
        /// Specification files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, env = "FORMFORGE_OUTPUT", default_value = "generated_forms")]
        output: PathBuf,
    },
    /// Validate specifications without generating
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the registered field types
    Types {
        /// Print the catalogue as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the specifications had problems that were reported.
fn run(cli: Cli) -> Result<bool> {
    let mut config = if cli.strict_refs {
        GeneratorConfig::strict()
    } else {
        GeneratorConfig::default()
    };
    if !cli.known_forms_dir.is_empty() {
        let known = KnownForms::from_directories(&cli.known_forms_dir)
            .context("failed to read known forms directory")?;
        config = config.with_known_forms(known.iter());
    }
    let generator = FormGenerator::new().with_config(config);

    match cli.command {
        Commands::Generate { files, output } => generate(&generator, &files, &output),
        Commands::Validate { files } => validate(&generator, &files),
        Commands::Types { json } => {
            types(&generator, json)?;
            Ok(true)
        }
    }
}

fn load_trees(files: &[PathBuf]) -> Result<Vec<(PathBuf, Value)>> {
    let mut trees = Vec::new();
    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let tree = load_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        trees.extend(split_forms(tree).into_iter().map(|tree| (path.clone(), tree)));
    }
    Ok(trees)
}

fn print_message(prefix: &str, message: &Message) {
    eprintln!("  {prefix} {message}");
    if let Some(fix) = &message.fix {
        eprintln!("      fix: {fix}");
    }
}

fn generate(generator: &FormGenerator, files: &[PathBuf], output: &Path) -> Result<bool> {
    let loaded = load_trees(files)?;
    let trees: Vec<Value> = loaded.iter().map(|(_, tree)| tree.clone()).collect();
    let results = generator.generate_batch(&trees);

    let mut failed = false;
    for ((path, _), result) in loaded.iter().zip(&results) {
        if let Err(err) = result {
            failed = true;
            eprintln!("{}: {err}", path.display());
            for line in err.messages() {
                eprintln!("  error: {line}");
            }
        }
    }
    if failed {
        return Ok(false);
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut written = 0usize;
    for documents in results.into_iter().flatten() {
        for (form_id, document) in documents {
            let path = output.join(format!("{form_id}.json"));
            let text = serde_json::to_string_pretty(&document)
                .context("failed to serialize form document")?;
            std::fs::write(&path, text + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(form_id = %form_id, path = %path.display(), "wrote form");
            written += 1;
        }
    }
    println!("Generated {written} form(s) in {}", output.display());
    Ok(true)
}

fn validate(generator: &FormGenerator, files: &[PathBuf]) -> Result<bool> {
    let mut all_valid = true;
    for (path, tree) in load_trees(files)? {
        let form_id = tree.pointer("/form/id").and_then(Value::as_str).unwrap_or("?").to_string();
        let structural = generator.validate(&tree);
        let semantic = generator.validate_semantic(&tree).err().unwrap_or_default();
        let valid = structural.is_valid() && semantic.is_valid();
        all_valid &= valid;

        let status = if valid { "ok" } else { "invalid" };
        println!("{} [{form_id}]: {status}", path.display());
        for message in structural.errors.iter().chain(&semantic.errors) {
            print_message("error:", message);
        }
        for message in &structural.warnings {
            print_message("warning:", message);
        }
    }
    Ok(all_valid)
}

fn types(generator: &FormGenerator, json: bool) -> Result<()> {
    let catalogue = generator.registry().describe();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&catalogue).context("failed to serialize type catalogue")?
        );
        return Ok(());
    }
    for info in catalogue {
        let required = if info.required_attributes.is_empty() {
            String::new()
        } else {
            format!(" (requires: {})", info.required_attributes.join(", "))
        };
        let tier = info.tier.to_string();
        println!("{:<18} {tier:<10} {}{required}", info.type_key, info.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use formforge_engine::ReferencePolicy;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn strict_flag_selects_strict_policy() {
        let cli = Cli::parse_from(["formforge", "--strict-refs", "validate", "a.yaml"]);
        assert!(cli.strict_refs);
        assert_eq!(GeneratorConfig::strict().reference_policy, ReferencePolicy::Strict);
    }

    #[test]
    fn generate_writes_one_file_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("order.yaml");
        std::fs::write(
            &spec,
            "\
form: {id: order, name: Order}
fields:
  - {id: lines, label: Lines, type: formGrid, formId: order_line, columns: [{id: sku, label: SKU}]}
",
        )
        .unwrap();
        let out = dir.path().join("out");
        assert!(generate(&FormGenerator::new(), &[spec], &out).unwrap());
        assert!(out.join("order.json").exists());
        assert!(out.join("order_line.json").exists());
    }

    #[test]
    fn invalid_spec_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("bad.yaml");
        let text = "form: {id: bad, name: Bad}\nfields:\n  - {id: r, label: R, type: radio}\n";
        std::fs::write(&spec, text).unwrap();
        let out = dir.path().join("out");
        assert!(!generate(&FormGenerator::new(), &[spec], &out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn colliding_form_ids_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.yaml");
        let second = dir.path().join("b.yaml");
        let spec = |name: &str, id: &str| {
            format!(
                "form: {{id: same, name: {name}}}\n\
                 fields:\n  - {{id: {id}, label: {id}, type: textField}}\n"
            )
        };
        std::fs::write(&first, spec("First", "a")).unwrap();
        std::fs::write(&second, spec("Second", "b")).unwrap();
        let out = dir.path().join("out");
        assert!(!generate(&FormGenerator::new(), &[first, second], &out).unwrap());
        assert!(!out.exists());
    }
}
