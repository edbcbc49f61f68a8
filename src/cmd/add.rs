use clap::Args;
use colored::Colorize;

use chatblocks::config::Config;
use chatblocks::document::FileDocument;
use chatblocks::normalize::normalize_url;
use chatblocks::output;

use crate::args::BlockArgs;
use crate::cmd;

#[derive(Args)]
pub struct AddArgs {
    #[command(flatten)]
    block: BlockArgs,

    /// Thread URL to save
    url: String,
}

pub fn run(args: AddArgs, config: &Config) -> Result<(), String> {
    let url = args.url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!("not a link: {}", args.url));
    }

    let mut session = cmd::open_session(&args.block, FileDocument::new(&args.block.file), config)?;
    let platform = session.platform();
    let is_thread = chatblocks::classify::is_thread_link(url, platform);

    let added = session.add_thread(url);
    let notices = session.take_notices();
    if notices.iter().any(|n| n.starts_with("Could not")) {
        return Err(notices.join("\n"));
    }
    cmd::print_notices(&notices, config);

    let saved = normalize_url(url);
    if added {
        println!("{} {}", "Saved:".green(), output::style_url(&saved));
    } else {
        println!("{} {}", "Already saved:".dimmed(), output::style_url(&saved));
    }
    if !is_thread {
        eprintln!(
            "{}",
            format!("Warning: not a recognized {} thread link", platform.label()).yellow()
        );
    }
    Ok(())
}
