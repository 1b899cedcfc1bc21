//! `init` and `config` commands.

use crate::config::{ConfigSource, Settings};

/// Write `.docseek/settings.toml` with default settings.
pub fn run_init(force: bool) {
    match Settings::init_config_file(force) {
        Ok(path) => {
            println!("Wrote default settings to {}", path.display());
            println!(
                "Documents will be indexed under {}",
                Settings::default().collection_path().display()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Print where the settings came from, then the effective values as TOML.
pub fn run_config(settings: &Settings, source: &ConfigSource) {
    match render_config(settings, source) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("Error: cannot render settings: {e}");
            std::process::exit(1);
        }
    }
}

/// Effective settings as TOML, headed by comments naming their source.
fn render_config(settings: &Settings, source: &ConfigSource) -> Result<String, toml::ser::Error> {
    let body = toml::to_string_pretty(settings)?;
    Ok(format!(
        "# Source: {source}\n\
         # DOCSEEK_* and legacy environment variables override file values\n\n\
         {body}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_config_names_source() {
        let mut settings = Settings::default();
        settings.collection = "contracts".to_string();
        let source = ConfigSource::File(PathBuf::from("/work/.docseek/settings.toml"));

        let text = render_config(&settings, &source).unwrap();
        assert!(text.starts_with("# Source: /work/.docseek/settings.toml\n"));

        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.collection, "contracts");
        assert_eq!(parsed.server.port, settings.server.port);
    }

    #[test]
    fn test_render_config_without_file() {
        let text = render_config(&Settings::default(), &ConfigSource::Defaults).unwrap();
        assert!(text.starts_with("# Source: built-in defaults"));
    }
}
