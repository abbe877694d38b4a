use std::{
    fs,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{
    browser::default_executable, util::Wait, Browser, Element, LaunchOptions, Tab,
};
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::{driver::PageDriver, locators::Locator};

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    // default wait for every cdp call, and idle time before chrome exits
    pub timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        BrowserOptions {
            headless: true,
            window_size: (1920, 1080),
            timeout: Duration::from_secs(45),
        }
    }
}

/// One chrome process driving a single tab.
pub struct BrowserController {
    browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserController {
    pub fn new(options: &BrowserOptions) -> Result<Self> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let executable = default_executable().map_err(|e| anyhow!("{}", e))?;
        let launch = LaunchOptions::default_builder()
            .path(Some(executable))
            .headless(options.headless)
            .window_size(Some(options.window_size))
            .idle_browser_timeout(options.timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("could not build launch options: {}", e))?;
        let browser = Browser::new(launch).context("browser launching error")?;
        let tab = browser.new_tab().context("could not create new tab")?;
        tab.set_default_timeout(options.timeout);

        debug!(
            "browser launched (headless: {}, window: {:?})",
            options.headless, options.window_size
        );
        Ok(BrowserController { browser, tab })
    }

    fn elements(&self, locator: &Locator) -> Vec<Element<'_>> {
        match self.tab.find_elements_by_xpath(locator.xpath()) {
            Ok(elems) => elems,
            Err(e) => {
                debug!(
                    "no elements for {} on {}: {}",
                    locator,
                    self.tab.get_url(),
                    e
                );
                vec![]
            }
        }
    }

    fn element(&self, locator: &Locator) -> Result<Element<'_>> {
        self.tab
            .find_element_by_xpath(locator.xpath())
            .context(format!("could not find {} on {}", locator, self.tab.get_url()))
    }

    pub fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => pid,
            None => return false,
        };
        let mut s = System::new();
        s.refresh_processes();
        if let Some(process) = s.process(Pid::from_u32(pid)) {
            debug!("killing process with id {}", pid);
            return process.kill();
        }
        false
    }
}

// rendered with a non-empty box and not hidden by css
const IS_VISIBLE: &str = "function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none';
}";

fn is_visible(element: &Element) -> bool {
    match element.call_js_fn(IS_VISIBLE, vec![], false) {
        Ok(res) => res.value.and_then(|v| v.as_bool()).unwrap_or(false),
        Err(e) => {
            debug!("could not check visibility: {}", e);
            false
        }
    }
}

fn attribute_of(element: &Element, name: &str) -> Result<Option<String>> {
    let attrs = element
        .get_attributes()
        .context("could not get element attributes")?
        .unwrap_or_default();
    // attributes come back as a flat [name, value, name, value, ...] list
    Ok(attrs
        .chunks(2)
        .find(|pair| pair.len() == 2 && pair[0] == name)
        .map(|pair| pair[1].clone()))
}

impl PageDriver for BrowserController {
    fn navigate(&self, url: &str) -> Result<()> {
        let nv = match self.tab.navigate_to(url) {
            Ok(t) => t,
            Err(e) => {
                error!("could not navigate to {} with error {}", url, e);
                self.tab.navigate_to(url)?
            }
        };
        if let Err(e) = nv.wait_until_navigated() {
            // we wait one more timeout
            warn!("error waiting for navigation, retrying {}", e);
            nv.wait_until_navigated()?;
        }
        Ok(())
    }

    fn text(&self, locator: &Locator) -> Result<String> {
        self.element(locator)?
            .get_inner_text()
            .context(format!("could not read text of {}", locator))
    }

    fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        attribute_of(&self.element(locator)?, name)
    }

    fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.elements(locator)
            .iter()
            .map(|e| {
                e.get_inner_text()
                    .context(format!("could not read text of {}", locator))
            })
            .collect()
    }

    fn attributes(&self, locator: &Locator, name: &str) -> Result<Vec<Option<String>>> {
        self.elements(locator)
            .iter()
            .map(|e| attribute_of(e, name))
            .collect()
    }

    fn click(&self, locator: &Locator) -> Result<()> {
        self.element(locator)?
            .click()
            .context(format!("could not click {}", locator))?;
        Ok(())
    }

    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let element = self
            .tab
            .wait_for_xpath_with_custom_timeout(locator.xpath(), timeout)
            .context(format!("{} did not show up within {:?}", locator, timeout))?;
        Wait::with_timeout(timeout.saturating_sub(start.elapsed()))
            .until(|| is_visible(&element).then_some(()))
            .context(format!("{} is not visible after {:?}", locator, timeout))?;
        Ok(())
    }

    fn screenshot(&self, path: &Path) -> Result<()> {
        debug!("taking screenshot of {}", self.tab.get_url());
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .context(format!(
                "screenshot for {} could not be captured",
                self.tab.get_url()
            ))?;
        fs::write(path, png).context(format!("could not save screenshot to {:?}", path))?;
        Ok(())
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}
