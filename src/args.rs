//! Shared CLI argument structs for consistent flag definitions across commands.
//!
//! Use `#[command(flatten)]` to include them in command-specific Args structs.

use std::path::PathBuf;

use clap::Args;

use chatblocks::Platform;
use chatblocks::fence::CodeblockRegion;
use chatblocks::output::OutputFormat;

// ============================================================================
// FormatArgs - Output format flags
// ============================================================================

/// Common output format flags.
///
/// Provides consistent --format/-f and --json flags across commands.
/// Use `resolve()` to get the effective format with TTY auto-detection.
#[derive(Args, Clone, Debug, Default)]
pub struct FormatArgs {
    /// Output format (auto-detects TTY for pretty vs plain)
    #[arg(short = 'f', long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Output as JSON (shorthand for --format=json)
    #[arg(long, conflicts_with = "format", global = true)]
    pub json: bool,
}

impl FormatArgs {
    /// Resolve the effective output format.
    ///
    /// Handles --json shorthand and applies TTY auto-detection for pretty mode.
    pub fn resolve(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format.resolve()
        }
    }
}

// ============================================================================
// BlockArgs - Which block of which file
// ============================================================================

/// Selects one fenced block in a markdown file.
#[derive(Args, Clone, Debug)]
pub struct BlockArgs {
    /// Markdown file holding the block
    pub file: PathBuf,

    /// Platform of the block (default: first smart-* block in the file)
    #[arg(short = 'p', long)]
    pub platform: Option<Platform>,

    /// Any line inside the block, 0-based (needed when the file has several blocks of the platform)
    #[arg(short = 'l', long, value_name = "N")]
    pub line: Option<usize>,
}

impl BlockArgs {
    /// Region hint handed to the boundary resolver.
    pub fn region_hint(&self) -> Option<CodeblockRegion> {
        self.line.map(CodeblockRegion::at_line)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_json_shorthand() {
        let args = FormatArgs {
            json: true,
            ..Default::default()
        };
        assert_eq!(args.resolve(), OutputFormat::Json);

        let args = FormatArgs {
            format: OutputFormat::Yaml,
            json: false,
        };
        assert_eq!(args.resolve(), OutputFormat::Yaml);
    }

    #[test]
    fn test_region_hint() {
        let args = BlockArgs {
            file: PathBuf::from("notes.md"),
            platform: None,
            line: Some(7),
        };
        assert_eq!(args.region_hint(), Some(CodeblockRegion::at_line(7)));

        let args = BlockArgs { line: None, ..args };
        assert_eq!(args.region_hint(), None);
    }
}
