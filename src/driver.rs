use std::{path::Path, thread::sleep, time::Duration};

use crate::locators::Locator;

/// What the crawl needs from a browser.
///
/// Every call operates on the page the driver is currently showing.
pub trait PageDriver {
    fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// Inner text of the first element matched by `locator`.
    fn text(&self, locator: &Locator) -> anyhow::Result<String>;

    /// Attribute of the first element matched by `locator`, `None` if the
    /// element exists without it.
    fn attribute(&self, locator: &Locator, name: &str) -> anyhow::Result<Option<String>>;

    /// Inner text of every matched element; empty when nothing matches.
    fn texts(&self, locator: &Locator) -> anyhow::Result<Vec<String>>;

    fn attributes(&self, locator: &Locator, name: &str) -> anyhow::Result<Vec<Option<String>>>;

    fn click(&self, locator: &Locator) -> anyhow::Result<()>;

    /// Blocks until `locator` matches an element or `timeout` elapses.
    fn wait_for(&self, locator: &Locator, timeout: Duration) -> anyhow::Result<()>;

    fn screenshot(&self, path: &Path) -> anyhow::Result<()>;
}

pub fn settle(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    debug!("sleeping for {:?}", delay);
    sleep(delay);
}

/// Fixed pauses stand in for readiness signals the site does not expose;
/// the two timeouts bound the explicit waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub listing_settle: Duration,
    pub menu_settle: Duration,
    pub page_settle: Duration,
    pub detail_settle: Duration,
    pub feedback_settle: Duration,
    pub paper_settle: Duration,
    pub sort_option_timeout: Duration,
    pub pagination_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            listing_settle: Duration::from_secs(5),
            menu_settle: Duration::from_secs(3),
            page_settle: Duration::from_secs(3),
            detail_settle: Duration::from_secs(4),
            feedback_settle: Duration::from_secs(1),
            paper_settle: Duration::from_secs(8),
            sort_option_timeout: Duration::from_secs(10),
            pagination_timeout: Duration::from_secs(2),
        }
    }
}

impl Timings {
    pub fn immediate() -> Self {
        Timings {
            listing_settle: Duration::ZERO,
            menu_settle: Duration::ZERO,
            page_settle: Duration::ZERO,
            detail_settle: Duration::ZERO,
            feedback_settle: Duration::ZERO,
            paper_settle: Duration::ZERO,
            sort_option_timeout: Duration::ZERO,
            pagination_timeout: Duration::ZERO,
        }
    }
}
