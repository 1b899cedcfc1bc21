//! Count, get, delete and reset commands.

use std::io::Write;

use crate::config::Settings;

pub fn run_count(config: &Settings) {
    let index = super::open_index(config);
    println!("Documents in index: {}", index.count());
}

pub fn run_get(id: &str, config: &Settings) {
    let index = super::open_index(config);
    match index.get(id) {
        Ok(Some(document)) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&document).unwrap_or_default()
            );
        }
        Ok(None) => {
            eprintln!("Document not found: {id}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn run_delete(id: &str, config: &Settings) {
    let mut index = super::open_index(config);
    match index.delete(id) {
        Ok(true) => println!("Deleted {id}"),
        Ok(false) => {
            eprintln!("Document not found: {id}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn run_reset(yes: bool, config: &Settings) {
    let mut index = super::open_index(config);
    let count = index.count();

    if !yes && !confirm(&format!("Remove all {count} documents from the index?")) {
        println!("Aborted");
        return;
    }

    match index.reset() {
        Ok(()) => println!("Removed {count} documents"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
