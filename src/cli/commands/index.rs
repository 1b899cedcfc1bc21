//! Index command - load files or directories into the index.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::config::Settings;
use crate::processor::DocumentProcessor;

/// Arguments for the index command.
pub struct IndexArgs {
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    pub progress: bool,
}

/// Run the index command.
pub fn run(args: IndexArgs, config: &Settings) {
    let IndexArgs {
        file,
        dir,
        extensions,
        progress,
    } = args;

    if file.is_none() && dir.is_none() {
        eprintln!("Error: nothing to index");
        eprintln!();
        eprintln!("Usage:");
        eprintln!("  docseek index --file <PATH>");
        eprintln!("  docseek index --dir <DIR> [--ext .pdf .docx ...]");
        std::process::exit(1);
    }

    let mut index = super::open_index(config);
    let mut processor = DocumentProcessor::from_settings(&mut index, config);

    if let Some(file) = file {
        let outcome = processor.process_file(&file);
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing result: {e}"),
        }
        if !outcome.is_success() {
            std::process::exit(1);
        }
        return;
    }

    let Some(dir) = dir else {
        return;
    };
    if !dir.is_dir() {
        eprintln!("Error: {} is not a directory", dir.display());
        std::process::exit(1);
    }

    let extensions = extensions.or_else(|| Some(config.loader.extensions.clone()));
    let bar = progress.then(progress_bar);
    let outcomes = processor.process_directory_with_progress(
        &dir,
        extensions.as_deref(),
        |done, total| {
            if let Some(bar) = &bar {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            }
        },
    );
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    println!("Processed {} files", outcomes.len());
    if failed > 0 {
        println!("Errors: {failed} files failed");
    }
    println!("Documents in index: {}", processor.document_count());
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} files ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}
