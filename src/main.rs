use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use ms_crawler::{
    browser_controller::{BrowserController, BrowserOptions},
    driver::Timings,
    runner::{Runner, RunnerOptions},
    types::SortMethod,
    utils::{init_logger, LINK_INDEX_FILE},
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "ModelScope organization dataset crawler", long_about = None)]
struct Args {
    /// Listing order: synthesis, downloads, likes or updated
    #[arg(short = 's', long, default_value = "downloads")]
    sort_method: String,
    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,
    /// JSON file mapping organization ids to their listing page
    #[arg(
        short = 't',
        long,
        default_value = "./organization_links/model_scope_organization_links.json"
    )]
    targets: PathBuf,
    /// Directory for the link index, results and screenshots
    #[arg(short = 'o', long, default_value = "result/modelscope")]
    output_dir: PathBuf,
    /// File name of the link index checkpoint inside the output directory
    #[arg(long, default_value = LINK_INDEX_FILE)]
    link_index_file: String,
    /// Directory for the log file
    #[arg(long, default_value = "./logs/MS")]
    log_dir: PathBuf,
    /// Rewrite the result files every n datasets, 0 writes them only at the end
    #[arg(short = 'f', long, default_value_t = 1)]
    flush_every: usize,
    /// Skip datasets already present in an existing details file
    #[arg(short = 'r', long)]
    resume: bool,
    /// Maximum time the browser will wait for an event before timing out
    #[arg(long, default_value_t = 45)]
    browser_timeout: u64,
    #[arg(long, default_value_t = 1920)]
    window_width: u32,
    #[arg(long, default_value_t = 1080)]
    window_height: u32,
    /// Seconds to wait after opening a listing page
    #[arg(long, default_value_t = 5)]
    listing_settle: u64,
    /// Seconds to wait after opening the dataset tab and choosing the order
    #[arg(long, default_value_t = 3)]
    menu_settle: u64,
    /// Seconds to wait after moving to the next listing page
    #[arg(long, default_value_t = 3)]
    page_settle: u64,
    /// Seconds to wait after opening a dataset page
    #[arg(long, default_value_t = 4)]
    detail_settle: u64,
    /// Seconds to wait after opening a feedback page
    #[arg(long, default_value_t = 1)]
    feedback_settle: u64,
    /// Seconds to wait after opening a paper
    #[arg(long, default_value_t = 8)]
    paper_settle: u64,
    /// Seconds to wait for the sort option to appear
    #[arg(long, default_value_t = 10)]
    sort_option_timeout: u64,
    /// Seconds to wait for the pagination control to appear
    #[arg(long, default_value_t = 2)]
    pagination_timeout: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logger(&args.log_dir, "info")?;
    info!("start crawling MS dataset info");

    let sort_method: SortMethod = args.sort_method.parse()?;
    let secs = Duration::from_secs;
    let timings = Timings {
        listing_settle: secs(args.listing_settle),
        menu_settle: secs(args.menu_settle),
        page_settle: secs(args.page_settle),
        detail_settle: secs(args.detail_settle),
        feedback_settle: secs(args.feedback_settle),
        paper_settle: secs(args.paper_settle),
        sort_option_timeout: secs(args.sort_option_timeout),
        pagination_timeout: secs(args.pagination_timeout),
    };

    debug!("starting crawler with {:#?}", args.clone());

    let options = RunnerOptions::default_builder()
        .sort_method(sort_method)
        .target_path(args.targets)
        .base_save_path(args.output_dir)
        .link_index_file(args.link_index_file)
        .flush_every(args.flush_every)
        .resume(args.resume)
        .timings(timings)
        .build()?;

    let browser = BrowserController::new(&BrowserOptions {
        headless: !args.headed,
        window_size: (args.window_width, args.window_height),
        timeout: secs(args.browser_timeout),
    })
    .context("could not start chrome")?;

    let mut runner = Runner::new(browser, options)?;
    let report = runner.run()?;

    println!(
        "Finish: {} datasets harvested, {} failed (see exception_links.json)",
        report.records_harvested, report.links_failed
    );
    if !report.failed_organizations.is_empty() {
        println!(
            "Organizations not crawled: {}",
            report.failed_organizations.join(", ")
        );
    }
    Ok(())
}
