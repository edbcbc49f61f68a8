pub mod activate;
pub mod add;
pub mod classify;
pub mod config_cmd;
pub mod detect;
pub mod done;
pub mod insert;
pub mod links;
pub mod merge;
pub mod prefix;
pub mod replay;

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use chatblocks::Platform;
use chatblocks::browser::HeadlessBrowser;
use chatblocks::config::{self, Config};
use chatblocks::document::Document;
use chatblocks::fence::{self, CodeblockRegion};
use chatblocks::session::ThreadSession;

use crate::args::BlockArgs;

/// Read a file, or stdin for "-".
pub fn read_input(path: &Path) -> Result<String, String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
        return Ok(text);
    }
    fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))
}

/// Explicit `--platform`, else the first smart-* block in the text.
pub fn resolve_platform(block: &BlockArgs, text: &str) -> Result<Platform, String> {
    if let Some(platform) = block.platform {
        return Ok(platform);
    }
    fence::detect_platforms(text).first().copied().ok_or_else(|| {
        format!(
            "no smart-* codeblock in {}\nInsert one with 'chatblocks insert {} --platform <name>'",
            block.file.display(),
            block.file.display()
        )
    })
}

/// Resolve the block `block` points at, or explain why it is ambiguous.
pub fn resolve_region(
    block: &BlockArgs,
    text: &str,
    platform: Platform,
) -> Result<CodeblockRegion, String> {
    let tag = platform.fence_tag();
    let blocks = fence::find_blocks(text, tag);
    match (blocks.as_slice(), block.region_hint()) {
        ([], _) => Err(format!("no ```{} codeblock in {}", tag, block.file.display())),
        ([only], _) => Ok(*only),
        (many, None) => Err(format!(
            "{} has {} ```{} codeblocks; pick one with --line",
            block.file.display(),
            many.len(),
            tag
        )),
        (_, Some(hint)) => {
            let region = fence::find_boundaries(text, tag, hint);
            if region.is_valid() {
                Ok(region)
            } else {
                Err(format!(
                    "line {} of {} is not inside a ```{} codeblock",
                    hint.start,
                    block.file.display(),
                    tag
                ))
            }
        }
    }
}

/// Build a session over `document` for the selected block.
pub fn open_session<D: Document>(
    block: &BlockArgs,
    document: D,
    config: &Config,
) -> Result<ThreadSession<D, HeadlessBrowser>, String> {
    open_session_with(block, document, config, None)
}

/// Like `open_session`, with a debounce window from the command line that
/// beats both `CHATBLOCKS_DEBOUNCE_MS` and the config file.
pub fn open_session_with<D: Document>(
    block: &BlockArgs,
    document: D,
    config: &Config,
    debounce: Option<Duration>,
) -> Result<ThreadSession<D, HeadlessBrowser>, String> {
    let text = document.read().map_err(|e| e.to_string())?;
    let platform = resolve_platform(block, &text)?;
    let region = resolve_region(block, &text, platform)?;

    let mut options = config::session_options(config, platform);
    options.region = region;
    if debounce.is_some() {
        options.debounce = debounce;
    }

    let mut session = ThreadSession::new(platform, document, HeadlessBrowser::new(), options);
    session.build();
    Ok(session)
}

/// Print session notices on stderr unless quiet.
pub fn print_notices(notices: &[String], config: &Config) {
    if config::is_quiet(config) {
        return;
    }
    for notice in notices {
        eprintln!("{}", notice.dimmed());
    }
}
