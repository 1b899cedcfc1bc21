//! Search command.

use crate::config::Settings;
use crate::store::{Filter, SearchRequest};
use crate::utils::truncate_chars;

const PREVIEW_CHARS: usize = 200;

/// Arguments for the search command.
pub struct SearchArgs {
    pub query: String,
    pub count: usize,
    pub types: Option<Vec<String>>,
    pub json: bool,
}

pub fn run(args: SearchArgs, config: &Settings) {
    let index = super::open_index(config);

    let filter = args
        .types
        .filter(|types| !types.is_empty())
        .map(|types| Filter::kind_in(types.as_slice()));
    let request = SearchRequest::new(args.query.as_str(), args.count)
        .with_filter(filter)
        .with_min_score(config.semantic_search.threshold);

    let hits = match index.search(&request) {
        Ok(hits) => hits,
        Err(e) => {
            eprintln!("Search failed: {e}");
            std::process::exit(1);
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&hits).unwrap_or_default()
        );
        return;
    }

    if hits.is_empty() {
        println!("No results found for '{}'", args.query);
        return;
    }

    println!("Found {} result(s) for '{}':", hits.len(), args.query);
    for (i, hit) in hits.iter().enumerate() {
        let source = hit
            .metadata
            .get("file_path")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!();
        println!("{}. {source} (score: {:.3})", i + 1, hit.score);
        println!("   id: {}", hit.id);
        let preview = truncate_chars(&hit.content, PREVIEW_CHARS).replace('\n', " ");
        println!("   {preview}");
    }
}
