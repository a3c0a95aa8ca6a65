use crate::error::{CompilerError, Result};
use crate::{Diagnostics, Severity};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

// --- BUILD ---
pub fn handle_build_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input = matches.get_one::<String>("input").unwrap();
    let input_path = absolute(input)?;
    let output_path = resolve_output(cli, matches.get_one::<String>("output"), &input_path);

    let compiler = cli.session();
    let start = Instant::now();
    let result = compiler.transform(&input_path)?;

    report_diagnostics(input, &result.unit.diagnostics);
    report_diagnostics(input, &result.diagnostics);

    fs::write(&output_path, format!("{}\n", result.ast))?;
    println!(
        "✅ Built {} -> {} ({:.2?})",
        input,
        output_path.display(),
        start.elapsed()
    );

    if let Some(exports_path) = matches.get_one::<String>("exports") {
        let json = serde_json::to_string_pretty(&result.exports).map_err(|e| {
            CompilerError::InvalidFormat {
                message: format!("export map serialization: {}", e),
            }
        })?;
        fs::write(exports_path, json)?;
        println!("   Exports: {}", exports_path);
    }

    Ok(())
}

// --- BUNDLE ---
pub fn handle_bundle_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let entries: Vec<PathBuf> = matches
        .get_many::<String>("entries")
        .unwrap()
        .map(|entry| absolute(entry))
        .collect::<Result<_>>()?;
    let output_path = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| match cli.output_directory() {
            Some(dir) => Path::new(dir).join("bundle.css"),
            None => PathBuf::from("bundle.css"),
        });

    let compiler = cli.session();
    let start = Instant::now();
    let css = compiler.bundle(&entries)?;

    fs::write(&output_path, format!("{}\n", css))?;
    println!(
        "✅ Bundled {} entries -> {} ({:.2?})",
        entries.len(),
        output_path.display(),
        start.elapsed()
    );

    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input = matches.get_one::<String>("input").unwrap();
    let root = absolute(input)?;

    let files: Vec<PathBuf> = if root.is_dir() {
        let mut walker = WalkDir::new(&root);
        if !matches.get_flag("recursive") {
            walker = walker.max_depth(1);
        }
        walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| crate::utils::is_styling_path(path))
            .collect()
    } else {
        vec![root]
    };

    if files.is_empty() {
        println!("No stylesheets found in {}", input);
        return Ok(());
    }

    let compiler = cli.session();
    let mut error_files = 0usize;
    for path in &files {
        let unit = compiler.process(path)?;
        report_diagnostics(&path.display().to_string(), &unit.diagnostics);
        if unit.diagnostics.has_errors() {
            error_files += 1;
        }
    }

    if error_files > 0 {
        return Err(CompilerError::InvalidFormat {
            message: format!(
                "check failed: {} of {} stylesheet(s) with errors",
                error_files,
                files.len()
            ),
        });
    }
    println!("✅ Checked {} stylesheet(s), no errors", files.len());
    Ok(())
}

/// Namespace derivation and import resolution need an absolute identity.
fn absolute(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn resolve_output(cli: &super::Cli, explicit: Option<&String>, input: &Path) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(path),
        None => {
            let default = input.with_extension("out.css");
            match cli.output_directory() {
                Some(dir) => Path::new(dir).join(default.file_name().unwrap_or_default()),
                None => default,
            }
        }
    }
}

fn report_diagnostics(file: &str, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        let severity = match diagnostic.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!(
            "{}: {}:{}: {}",
            severity, file, diagnostic.line, diagnostic.message
        );
    }
}
