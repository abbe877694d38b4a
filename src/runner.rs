use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    driver::{PageDriver, Timings},
    harvester::DetailHarvester,
    locators::Locators,
    paginator::ListingPaginator,
    store::{read_details, read_link_index, read_targets, write_json},
    types::{CrawlTarget, DatasetDetails, LinkIndex, ListingItem, RunReport, RunStage, SortMethod},
    utils::{dataset_path_segments, DETAILS_FILE, EXCEPTIONS_FILE, LINK_INDEX_FILE, SCREENSHOT_DIR},
};

pub struct Runner<D: PageDriver> {
    driver: D,
    locators: Locators,
    options: RunnerOptions,
    stage: RunStage,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunnerOptions {
    // dropdown order applied to every listing
    #[builder(default = "SortMethod::Downloads")]
    sort_method: SortMethod,
    // json file mapping organization ids to listing urls
    #[builder(default = "self.default_target_path()")]
    target_path: PathBuf,
    // directory receiving the checkpoints, results and screenshots
    #[builder(default = "self.default_base_save_path()")]
    base_save_path: PathBuf,
    #[builder(default = "LINK_INDEX_FILE.into()")]
    link_index_file: String,
    // rewrite the result files every n links, 0 only writes them at the end
    #[builder(default = "1")]
    flush_every: usize,
    // skip links already present in an existing details file
    #[builder(default = "false")]
    resume: bool,
    #[builder(default)]
    timings: Timings,
}

impl RunnerOptions {
    pub fn default_builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }

    pub fn link_index_path(&self) -> PathBuf {
        self.base_save_path.join(&self.link_index_file)
    }

    pub fn details_path(&self) -> PathBuf {
        self.base_save_path.join(DETAILS_FILE)
    }

    pub fn exceptions_path(&self) -> PathBuf {
        self.base_save_path.join(EXCEPTIONS_FILE)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.base_save_path.join(SCREENSHOT_DIR)
    }
}

impl RunnerOptionsBuilder {
    fn default_target_path(&self) -> PathBuf {
        PathBuf::from("./organization_links/model_scope_organization_links.json")
    }
    fn default_base_save_path(&self) -> PathBuf {
        PathBuf::from("result/modelscope")
    }
}

impl<D: PageDriver> Runner<D> {
    pub fn new(driver: D, options: RunnerOptions) -> anyhow::Result<Self> {
        let screenshot_dir = options.screenshot_dir();
        fs::create_dir_all(&screenshot_dir).context(format!(
            "could not create screenshot dir {:?}",
            screenshot_dir
        ))?;

        Ok(Runner {
            driver,
            locators: Locators::new(options.sort_method),
            options,
            stage: RunStage::NotStarted,
        })
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn run(&mut self) -> anyhow::Result<RunReport> {
        let mut report = RunReport::default();

        self.enter(RunStage::LoadingTargets);
        let targets = read_targets(&self.options.target_path)?;
        info!("loaded {} crawl targets", targets.len());

        let index = self.link_index(&targets, &mut report)?;
        report.links_discovered = index.values().map(|e| e.len()).sum();

        self.enter(RunStage::HarvestingDetails);
        let (details, exceptions) = self.harvest_all(&index, &mut report)?;

        self.enter(RunStage::PersistingResults);
        self.persist_results(&details, &exceptions)?;

        self.enter(RunStage::Done);
        info!(
            "run finished: {} organizations crawled, {} failed, {} links ({} duplicates), \
             {} harvested, {} skipped, {} failed",
            report.organizations_crawled,
            report.organizations_failed,
            report.links_discovered,
            report.links_duplicated,
            report.records_harvested,
            report.links_skipped,
            report.links_failed
        );
        if !report.failed_organizations.is_empty() {
            warn!(
                "organizations {:?} are missing from {:?}, delete it to crawl them again",
                report.failed_organizations,
                self.options.link_index_path()
            );
        }
        Ok(report)
    }

    /// Loads the link index checkpoint, or crawls every listing to build it.
    pub fn link_index(
        &mut self,
        targets: &[CrawlTarget],
        report: &mut RunReport,
    ) -> anyhow::Result<LinkIndex> {
        let path = self.options.link_index_path();
        if path.exists() {
            info!("link index {:?} exists, skipping link discovery", path);
            return read_link_index(&path);
        }

        self.enter(RunStage::DiscoveringLinks);
        let index = self.discover_all(targets, report);

        self.enter(RunStage::PersistingIndex);
        write_json(&path, &index)?;
        Ok(index)
    }

    fn discover_all(&self, targets: &[CrawlTarget], report: &mut RunReport) -> LinkIndex {
        let paginator = ListingPaginator::new(&self.driver, &self.locators, &self.options.timings);
        let mut index = LinkIndex::new();

        for (i, target) in targets.iter().enumerate() {
            if target.url().is_none() {
                debug!("no listing url for {}, skipping", target.organization_id);
                continue;
            }
            match paginator.discover_links(target) {
                Ok(entry) => {
                    report.organizations_crawled += 1;
                    index.insert(target.organization_id.clone(), entry);
                }
                Err(e) => {
                    report.organizations_failed += 1;
                    report
                        .failed_organizations
                        .push(target.organization_id.clone());
                    error!(
                        "error: {:#}, when crawling organization {} ({}) datasets",
                        e, i, target.organization_id
                    );
                }
            }
        }

        info!("finish crawling all datasets");
        index
    }

    fn harvest_all(
        &self,
        index: &LinkIndex,
        report: &mut RunReport,
    ) -> anyhow::Result<(DatasetDetails, Vec<String>)> {
        let details_path = self.options.details_path();
        let mut details = if self.options.resume && details_path.exists() {
            read_details(&details_path)?
        } else {
            DatasetDetails::new()
        };
        let mut exceptions: Vec<String> = vec![];

        // a card can show up on two pages when the listing shifts mid-crawl
        let mut seen = HashSet::new();
        let items = index
            .values()
            .flat_map(|e| e.items())
            .filter(|item| {
                let first = seen.insert(item.link.as_str());
                if !first {
                    debug!("{} listed more than once, harvesting it once", item.link);
                    report.links_duplicated += 1;
                }
                first
            })
            .collect::<Vec<&ListingItem>>();
        let total = items.len();
        info!("total dataset: {}", total);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );

        let screenshot_dir = self.options.screenshot_dir();
        let harvester = DetailHarvester::new(
            &self.driver,
            &self.locators,
            &self.options.timings,
            &screenshot_dir,
        );

        for (i, item) in items.into_iter().enumerate() {
            pb.inc(1);
            if self.options.resume && Self::already_harvested(&details, &item.link) {
                debug!("{} already harvested, skipping", item.link);
                report.links_skipped += 1;
                continue;
            }

            pb.set_message(item.link.clone());
            info!("[{}/{}] {}", i + 1, total, item.link);
            match harvester.harvest_one(item) {
                Ok(record) => {
                    report.records_harvested += 1;
                    details
                        .entry(record.organization.clone())
                        .or_default()
                        .insert(record.dataset_name.clone(), record);
                }
                Err(e) => {
                    report.links_failed += 1;
                    exceptions.push(item.link.clone());
                    error!("error: {:#}, when crawling dataset {} ({})", e, i, item.link);
                }
            }

            let flush_every = self.options.flush_every;
            if flush_every > 0 && (i + 1) % flush_every == 0 {
                self.persist_results(&details, &exceptions)?;
            }
        }
        pb.finish_with_message("done");

        Ok((details, exceptions))
    }

    fn already_harvested(details: &DatasetDetails, link: &str) -> bool {
        match dataset_path_segments(link) {
            Ok((org, name)) => details
                .get(&org)
                .map(|datasets| datasets.contains_key(&name))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn persist_results(
        &self,
        details: &DatasetDetails,
        exceptions: &[String],
    ) -> anyhow::Result<()> {
        write_json(&self.options.details_path(), details)?;
        write_json(&self.options.exceptions_path(), &exceptions)?;
        Ok(())
    }

    fn enter(&mut self, stage: RunStage) {
        info!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }
}
