use anyhow::Context;

use crate::{
    driver::{settle, PageDriver, Timings},
    locators::Locators,
    types::{CrawlError, CrawlTarget, LinkIndexEntry, ListingItem},
    utils::{normalize_link, EMPTY_LISTING_MARKER},
};

pub struct ListingPaginator<'a, D: PageDriver> {
    driver: &'a D,
    locators: &'a Locators,
    timings: &'a Timings,
}

impl<'a, D: PageDriver> ListingPaginator<'a, D> {
    pub fn new(driver: &'a D, locators: &'a Locators, timings: &'a Timings) -> Self {
        ListingPaginator {
            driver,
            locators,
            timings,
        }
    }

    /// Collects every dataset card an organization lists, page by page.
    ///
    /// An error means the organization could not be crawled at all; a page
    /// that fails after the first one is logged and skipped.
    pub fn discover_links(&self, target: &CrawlTarget) -> anyhow::Result<LinkIndexEntry> {
        let mut entry = LinkIndexEntry::new();
        let org = &target.organization_id;
        let url = match target.url() {
            Some(u) => u,
            None => return Ok(entry),
        };

        info!("start crawling {} datasets", org);
        self.driver
            .navigate(url)
            .context(format!("could not open listing page {}", url))?;
        settle(self.timings.listing_settle);

        self.select_sort_method()?;

        let items = self.driver.texts(&self.locators.dataset_items)?;
        info!("current page has {} datasets", items.len());
        if items.is_empty() || items.iter().any(|t| t.contains(EMPTY_LISTING_MARKER)) {
            info!("no dataset found for {}", org);
            return Ok(entry);
        }
        entry.append(self.extract(url, items.len())?);

        if let Err(e) = self
            .driver
            .wait_for(&self.locators.pagination, self.timings.pagination_timeout)
        {
            debug!("no pagination control: {}", e);
            info!("only one page, finish crawling {} datasets", org);
            return Ok(entry);
        }

        let total = self.total_pages()?;
        info!("total page: {}", total);
        // page 1 has already been read
        for page in 2..=total {
            match self.next_page(url) {
                Ok(items) => entry.append(items),
                Err(e) => {
                    error!(
                        "error: {:#}, when crawling page {} dataset, current index: {}",
                        e, page, org
                    )
                }
            }
        }

        info!("finish crawling {} datasets, {} found", org, entry.len());
        Ok(entry)
    }

    fn select_sort_method(&self) -> anyhow::Result<()> {
        let locators = self.locators;
        self.driver
            .click(&locators.dataset_tab)
            .context("could not open dataset tab")?;
        settle(self.timings.menu_settle);
        self.driver
            .click(&locators.sort_menu)
            .context("could not open sort menu")?;

        let chosen = self
            .driver
            .wait_for(&locators.sort_option, self.timings.sort_option_timeout)
            .and_then(|_| self.driver.click(&locators.sort_option));
        if let Err(e) = chosen {
            debug!("sort option lookup failed: {}", e);
            return Err(CrawlError::SortMethodNotFound(locators.sort_method.label().into()).into());
        }
        settle(self.timings.menu_settle);
        Ok(())
    }

    fn total_pages(&self) -> anyhow::Result<usize> {
        let title = self
            .driver
            .attribute(&self.locators.total_page, "title")
            .context("could not read total page count")?;

        let total = title.as_deref().and_then(|t| t.trim().parse::<usize>().ok());
        match total {
            Some(total) => Ok(total),
            None => Err(CrawlError::InvalidPageCount(title).into()),
        }
    }

    fn next_page(&self, url: &str) -> anyhow::Result<Vec<ListingItem>> {
        self.driver.click(&self.locators.next_page)?;
        settle(self.timings.page_settle);
        let items = self.driver.texts(&self.locators.dataset_items)?;
        info!("current page datasets have: {}", items.len());
        self.extract(url, items.len())
    }

    // every card must yield exactly one value per field
    fn extract(&self, url: &str, items: usize) -> anyhow::Result<Vec<ListingItem>> {
        let l = self.locators;
        // hrefs come back as written in the dom, often relative to the listing
        let links = self
            .driver
            .attributes(&l.item_link, "href")?
            .into_iter()
            .flatten()
            .filter_map(|href| normalize_link(url, &href))
            .collect::<Vec<String>>();
        let update_times = self.driver.texts(&l.item_update_time)?;
        let downloads = self.driver.texts(&l.item_download_num)?;
        let likes = self.driver.texts(&l.item_like_num)?;

        if [links.len(), update_times.len(), downloads.len(), likes.len()]
            .iter()
            .any(|n| *n != items)
        {
            return Err(CrawlError::ElementCountMismatch {
                items,
                links: links.len(),
                update_times: update_times.len(),
                downloads: downloads.len(),
                likes: likes.len(),
            }
            .into());
        }
        debug!("dataset_links: {:?}", links);

        Ok(itertools::izip!(links, update_times, downloads, likes)
            .map(|(link, last_update_time, download_num, like_num)| ListingItem {
                link,
                last_update_time,
                download_num,
                like_num,
            })
            .collect())
    }
}
