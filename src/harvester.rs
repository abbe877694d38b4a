use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::{
    driver::{settle, PageDriver, Timings},
    locators::Locators,
    types::{DatasetRecord, ListingItem},
    utils::{
        dataset_path_segments, date_only, feedback_link, find_paper_link, parse_related_info,
        recorded_path, strip_license_prefix,
    },
};

pub struct DetailHarvester<'a, D: PageDriver> {
    driver: &'a D,
    locators: &'a Locators,
    timings: &'a Timings,
    screenshot_dir: &'a Path,
}

impl<'a, D: PageDriver> DetailHarvester<'a, D> {
    pub fn new(
        driver: &'a D,
        locators: &'a Locators,
        timings: &'a Timings,
        screenshot_dir: &'a Path,
    ) -> Self {
        DetailHarvester {
            driver,
            locators,
            timings,
            screenshot_dir,
        }
    }

    pub fn harvest_one(&self, item: &ListingItem) -> anyhow::Result<DatasetRecord> {
        let link = item.link.as_str();
        self.driver
            .navigate(link)
            .context(format!("could not open dataset page {}", link))?;
        settle(self.timings.detail_settle);

        let (organization, dataset_name) = dataset_path_segments(link)?;
        info!("getting dataset details: {}", link);

        let screenshot = self.screenshot_path(&format!("{}.png", dataset_name));
        self.driver
            .screenshot(&screenshot)
            .context(format!("could not capture screenshot for {}", link))?;

        let l = self.locators;
        let dataset_license = strip_license_prefix(
            &self.driver.text(&l.license).context("could not read license")?,
        );
        let related_info = parse_related_info(
            &self
                .driver
                .text(&l.related_info)
                .context("could not read related info")?,
        );
        let introduction = self
            .driver
            .text(&l.introduction)
            .context("could not read introduction")?;
        let paper_link = find_paper_link(&introduction);

        let feedback = feedback_link(link);
        self.driver
            .navigate(&feedback)
            .context(format!("could not open feedback page {}", feedback))?;
        settle(self.timings.feedback_settle);
        let community_activities = self
            .driver
            .text(&l.community_activities)
            .context("could not read community activities")?;

        let paper_screenshot = match &paper_link {
            Some(paper) => match self.capture_paper(paper, &dataset_name) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(
                        "could not capture paper {} for {}, keeping the record: {:#}",
                        paper, link, e
                    );
                    None
                }
            },
            None => {
                info!("no paper link for {}", link);
                None
            }
        };

        info!("got dataset: {}, dataset name: {}", link, dataset_name);
        Ok(DatasetRecord {
            organization,
            dataset_name,
            dataset_license,
            related_info,
            introduction,
            community_activities,
            dataset_screenshot_save_path: recorded_path(&screenshot),
            paper_screenshot_save_path: paper_screenshot
                .map(|p| recorded_path(&p))
                .unwrap_or_default(),
            paper_link: paper_link.unwrap_or_default(),
            download_num: item.download_num.clone(),
            like_num: item.like_num.clone(),
            last_update_time: date_only(&item.last_update_time),
            link: link.into(),
        })
    }

    fn capture_paper(&self, paper: &str, dataset_name: &str) -> anyhow::Result<PathBuf> {
        info!("getting paper screenshot: {}", paper);
        self.driver.navigate(paper)?;
        settle(self.timings.paper_settle);
        let path = self.screenshot_path(&format!("{}_pdf.png", dataset_name));
        self.driver.screenshot(&path)?;
        Ok(path)
    }

    fn screenshot_path(&self, file_name: &str) -> PathBuf {
        self.screenshot_dir.join(file_name)
    }
}
