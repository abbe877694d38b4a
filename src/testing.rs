//! Scripted stand-in for a browser, used by the unit tests.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::anyhow;

use crate::{
    driver::PageDriver,
    locators::{Locator, Locators},
    types::ListingItem,
    utils::feedback_link,
};

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    text: String,
    attrs: HashMap<String, String>,
}

impl FakeNode {
    pub fn text(text: &str) -> Self {
        FakeNode {
            text: text.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn attr(name: &str, value: &str) -> Self {
        FakeNode::default().with_attr(name, value)
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

// page 0 answers on every page of a url
type Key = (String, usize, String);

#[derive(Default)]
struct State {
    url: String,
    page: usize,
    nodes: HashMap<Key, Vec<FakeNode>>,
    pagers: HashSet<String>,
    broken_urls: HashSet<String>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    screenshots: Vec<PathBuf>,
    watched: Vec<PathBuf>,
    // (url, file, content) captured when the url was first opened
    file_snapshots: Vec<(String, PathBuf, Option<String>)>,
}

#[derive(Default)]
pub struct FakeDriver {
    state: RefCell<State>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, locator: &Locator, nodes: Vec<FakeNode>) -> Self {
        self.on_page(url, 0, locator, nodes)
    }

    pub fn on_page(self, url: &str, page: usize, locator: &Locator, nodes: Vec<FakeNode>) -> Self {
        self.state
            .borrow_mut()
            .nodes
            .insert((url.into(), page, locator.xpath().into()), nodes);
        self
    }

    /// Clicking `locator` moves the current url to its next page.
    pub fn pager(self, locator: &Locator) -> Self {
        self.state.borrow_mut().pagers.insert(locator.xpath().into());
        self
    }

    pub fn broken(self, url: &str) -> Self {
        self.state.borrow_mut().broken_urls.insert(url.into());
        self
    }

    /// Dataset tab, sort menu and sort option of a listing page.
    pub fn listing_controls(self, url: &str, l: &Locators) -> Self {
        self.on(url, &l.dataset_tab, vec![FakeNode::text("数据集")])
            .on(url, &l.sort_menu, vec![FakeNode::text("排序")])
            .on(url, &l.sort_option, vec![FakeNode::text(l.sort_method.label())])
    }

    pub fn listing_page(self, url: &str, page: usize, l: &Locators, items: &[ListingItem]) -> Self {
        let texts = |f: fn(&ListingItem) -> String| -> Vec<FakeNode> {
            items.iter().map(|i| FakeNode::text(&f(i))).collect()
        };
        self.on_page(url, page, &l.dataset_items, texts(|i| i.link.clone()))
            .on_page(
                url,
                page,
                &l.item_link,
                items.iter().map(|i| FakeNode::attr("href", &i.link)).collect(),
            )
            .on_page(url, page, &l.item_update_time, texts(|i| i.last_update_time.clone()))
            .on_page(url, page, &l.item_download_num, texts(|i| i.download_num.clone()))
            .on_page(url, page, &l.item_like_num, texts(|i| i.like_num.clone()))
    }

    pub fn pagination(self, url: &str, l: &Locators, total: &str) -> Self {
        self.on(url, &l.pagination, vec![FakeNode::default()])
            .on(url, &l.total_page, vec![FakeNode::attr("title", total)])
            .on(url, &l.next_page, vec![FakeNode::default()])
            .pager(&l.next_page)
    }

    /// A complete detail page plus its feedback sub-page.
    pub fn detail_page(self, link: &str, l: &Locators, license: &str, introduction: &str) -> Self {
        self.on(link, &l.license, vec![FakeNode::text(license)])
            .on(link, &l.related_info, vec![FakeNode::text("数据集大小：12MB")])
            .on(link, &l.introduction, vec![FakeNode::text(introduction)])
            .on(
                &feedback_link(link),
                &l.community_activities,
                vec![FakeNode::text("0 个讨论")],
            )
    }

    /// Records the content of `path` every time a new url is opened.
    pub fn watch(self, path: &Path) -> Self {
        self.state.borrow_mut().watched.push(path.to_path_buf());
        self
    }

    /// Content of a watched file at the moment `url` was first opened,
    /// `None` when the file did not exist yet.
    pub fn file_at(&self, url: &str, path: &Path) -> Option<String> {
        self.state
            .borrow()
            .file_snapshots
            .iter()
            .find(|(u, p, _)| u == url && p == path)
            .and_then(|(_, _, content)| content.clone())
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.borrow().screenshots.clone()
    }

    fn nodes(&self, locator: &Locator) -> Vec<FakeNode> {
        let state = self.state.borrow();
        let xpath = locator.xpath().to_string();
        state
            .nodes
            .get(&(state.url.clone(), state.page, xpath.clone()))
            .or_else(|| state.nodes.get(&(state.url.clone(), 0, xpath)))
            .cloned()
            .unwrap_or_default()
    }

    fn first(&self, locator: &Locator) -> anyhow::Result<FakeNode> {
        self.nodes(locator).into_iter().next().ok_or_else(|| {
            anyhow!(
                "no element found for {} on {}",
                locator,
                self.state.borrow().url
            )
        })
    }
}

impl PageDriver for FakeDriver {
    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.navigations.iter().any(|n| n == url) {
            let snapshots = state
                .watched
                .iter()
                .map(|p| (url.to_string(), p.clone(), fs::read_to_string(p).ok()))
                .collect::<Vec<_>>();
            state.file_snapshots.extend(snapshots);
        }
        state.navigations.push(url.into());
        if state.broken_urls.contains(url) {
            return Err(anyhow!("could not navigate to {}", url));
        }
        state.url = url.into();
        state.page = 1;
        Ok(())
    }

    fn text(&self, locator: &Locator) -> anyhow::Result<String> {
        Ok(self.first(locator)?.text)
    }

    fn attribute(&self, locator: &Locator, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.first(locator)?.attrs.get(name).cloned())
    }

    fn texts(&self, locator: &Locator) -> anyhow::Result<Vec<String>> {
        Ok(self.nodes(locator).into_iter().map(|n| n.text).collect())
    }

    fn attributes(&self, locator: &Locator, name: &str) -> anyhow::Result<Vec<Option<String>>> {
        Ok(self
            .nodes(locator)
            .into_iter()
            .map(|n| n.attrs.get(name).cloned())
            .collect())
    }

    fn click(&self, locator: &Locator) -> anyhow::Result<()> {
        self.first(locator)?;
        let mut state = self.state.borrow_mut();
        state.clicks.push(locator.name().into());
        if state.pagers.contains(locator.xpath()) {
            state.page += 1;
        }
        Ok(())
    }

    fn wait_for(&self, locator: &Locator, _timeout: Duration) -> anyhow::Result<()> {
        self.first(locator).map(|_| ())
    }

    fn screenshot(&self, path: &Path) -> anyhow::Result<()> {
        self.state.borrow_mut().screenshots.push(path.to_path_buf());
        Ok(())
    }
}
