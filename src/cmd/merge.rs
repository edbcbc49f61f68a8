use std::path::PathBuf;

use clap::Args;

use chatblocks::config::Config;
use chatblocks::conversations::{self, ConversationItem};

use crate::args::FormatArgs;
use crate::cmd;
use crate::cmd::detect::print_conversations;

#[derive(Args)]
pub struct MergeArgs {
    /// Known conversations (JSON array or `{"items": [...]}`)
    existing: PathBuf,

    /// Newly received conversations, same shapes ("-" for stdin)
    incoming: PathBuf,

    /// Fuzzy filter over conversation titles
    #[arg(short = 'q', long)]
    query: Option<String>,

    #[command(flatten)]
    format: FormatArgs,
}

pub fn run(args: MergeArgs, config: &Config) -> Result<(), String> {
    let format = args.format.resolve();
    let existing = parse_items(&cmd::read_input(&args.existing)?)
        .map_err(|e| format!("{}: {}", args.existing.display(), e))?;
    let incoming = parse_items(&cmd::read_input(&args.incoming)?)
        .map_err(|e| format!("{}: {}", args.incoming.display(), e))?;

    let merged = conversations::merge(&existing, &incoming);
    let query = args.query.as_deref().unwrap_or("");
    let shown = conversations::filter_suggestions(query, &merged);
    print_conversations(&shown, &config.platforms.chatgpt_base_url, format, config)
}

/// Items of a bare array or of an endpoint response. Malformed entries are skipped.
fn parse_items(text: &str) -> Result<Vec<ConversationItem>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    let items = match &value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => match map.get("items") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Err("expected an \"items\" array".to_string()),
        },
        _ => return Err("expected an array of conversations".to_string()),
    };
    Ok(items
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items_shapes() {
        let cases = vec![
            (r#"[{"id":"a"},{"id":"b","title":null}]"#, Some(2)),
            (r#"{"items":[{"id":"a"}],"total":1}"#, Some(1)),
            (r#"{"items":[{"id":"a"}, 42]}"#, Some(1)),
            ("", Some(0)),
            (r#"{"total":1}"#, None),
            ("not json", None),
        ];
        for (input, want) in cases {
            let got = parse_items(input).ok().map(|items| items.len());
            assert_eq!(got, want, "parse_items({:?}) = {:?}, want {:?}", input, got, want);
        }
    }
}
