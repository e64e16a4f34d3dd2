//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use site_mirror::ConfigOverrides;

/// Mirror a website's pages and static assets to local disk.
///
/// Starting from the index page, every same-site page link is followed and
/// the stylesheets, scripts and images each page references are saved under
/// the output directory with the site's URL layout. Files already present
/// are left alone, so an interrupted run can simply be started again.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Base URL of the site to mirror (overrides `site_url` in the config file)
    #[arg(value_name = "SITE_URL")]
    pub site_url: Option<String>,

    /// JSON config file; command-line flags take precedence over its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Page fetched first, relative to the site URL [default: index.html]
    #[arg(long = "index", value_name = "PATH")]
    pub index_path: Option<String>,

    /// Directory the mirror is written into [default: mirror]
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Proxy URL tried first for every request, with direct fallback
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Maximum concurrent fetches (1-100) [default: 5]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// HTTP connect timeout in seconds (1-3600) [default: 30]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP read timeout in seconds (1-3600) [default: 300]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Values to lay over the config file.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            site_url: self.site_url.clone(),
            index_path: self.index_path.clone(),
            save_dir: self.output.clone(),
            proxy: self.proxy.clone(),
            concurrency: self.concurrency.map(usize::from),
            connect_timeout_secs: self.connect_timeout,
            read_timeout_secs: self.read_timeout,
        }
    }
}
