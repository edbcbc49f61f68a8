use std::fs;
use std::path::PathBuf;

use clap::Args;

use chatblocks::Platform;

#[derive(Args)]
pub struct InsertArgs {
    /// Markdown file (created if missing)
    file: PathBuf,

    /// Platform of the new block
    #[arg(short = 'p', long)]
    platform: Platform,

    /// Insert before this 0-based line (default: append)
    #[arg(short = 'l', long, value_name = "N")]
    line: Option<usize>,
}

/// Insert an empty block: ```` ```smart-<platform> ```` plus its closing fence.
pub fn run(args: InsertArgs) -> Result<(), String> {
    let text = if args.file.exists() {
        fs::read_to_string(&args.file)
            .map_err(|e| format!("failed to read {}: {}", args.file.display(), e))?
    } else {
        String::new()
    };

    let (updated, at) = insert_block(&text, args.platform, args.line);
    fs::write(&args.file, updated)
        .map_err(|e| format!("failed to write {}: {}", args.file.display(), e))?;

    println!(
        "Inserted ```{} block at line {} of {}",
        args.platform.fence_tag(),
        at,
        args.file.display()
    );
    Ok(())
}

/// Returns the new text and the line of the opening fence.
fn insert_block(text: &str, platform: Platform, line: Option<usize>) -> (String, usize) {
    let mut lines: Vec<String> = if text.is_empty() {
        Vec::new()
    } else {
        text.strip_suffix('\n').unwrap_or(text).split('\n').map(String::from).collect()
    };

    let at = line.unwrap_or(lines.len()).min(lines.len());
    lines.insert(at, "```".to_string());
    lines.insert(at, format!("```{}", platform.fence_tag()));

    let mut updated = lines.join("\n");
    updated.push('\n');
    (updated, at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_block() {
        let cases = vec![
            ("", None, "```smart-claude\n```\n", 0),
            ("# Notes\n", None, "# Notes\n```smart-claude\n```\n", 1),
            ("# Notes\ntext", Some(1), "# Notes\n```smart-claude\n```\ntext\n", 1),
            ("a\nb\n", Some(99), "a\nb\n```smart-claude\n```\n", 2),
        ];
        for (text, line, want, want_at) in cases {
            let (got, at) = insert_block(text, Platform::Claude, line);
            assert_eq!(got, want, "insert_block({:?}, {:?}) = {:?}, want {:?}", text, line, got, want);
            assert_eq!(at, want_at);
        }
    }
}
