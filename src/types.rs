use std::{fmt::Display, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("sort_method_not_found: {0}")]
    SortMethodNotFound(String),
    #[error("unknown_sort_method: {0}")]
    UnknownSortMethod(String),
    #[error("element_count_mismatch: {items} items, {links} links, {update_times} update times, {downloads} downloads, {likes} likes")]
    ElementCountMismatch {
        items: usize,
        links: usize,
        update_times: usize,
        downloads: usize,
        likes: usize,
    },
    #[error("invalid_page_count: {0:?}")]
    InvalidPageCount(Option<String>),
    #[error("invalid_dataset_link: {0}")]
    InvalidDatasetLink(String),
    #[error("unequal_index_columns: {links} links, {update_times} update times, {downloads} downloads, {likes} likes")]
    UnequalIndexColumns {
        links: usize,
        update_times: usize,
        downloads: usize,
        likes: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    Synthesis,
    Downloads,
    Likes,
    Updated,
}

impl SortMethod {
    // labels as rendered by the sort dropdown
    pub fn label(&self) -> &'static str {
        match self {
            SortMethod::Synthesis => "综合排序",
            SortMethod::Downloads => "下载量排序",
            SortMethod::Likes => "收藏量排序",
            SortMethod::Updated => "最近更新",
        }
    }
}

impl FromStr for SortMethod {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synthesis" | "relevance" => Ok(SortMethod::Synthesis),
            "downloads" => Ok(SortMethod::Downloads),
            "likes" => Ok(SortMethod::Likes),
            "updated" | "recency" => Ok(SortMethod::Updated),
            _ => Err(CrawlError::UnknownSortMethod(s.into())),
        }
    }
}

impl Display for SortMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SortMethod::Synthesis => "synthesis",
            SortMethod::Downloads => "downloads",
            SortMethod::Likes => "likes",
            SortMethod::Updated => "updated",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub organization_id: String,
    pub listing_url: Option<String>,
}

impl CrawlTarget {
    pub fn new(organization_id: &str, listing_url: Option<&str>) -> Self {
        CrawlTarget {
            organization_id: organization_id.into(),
            listing_url: listing_url.map(String::from),
        }
    }

    // an empty or missing url means the organization is skipped
    pub fn url(&self) -> Option<&str> {
        match self.listing_url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => Some(u),
            _ => None,
        }
    }
}

/// One dataset card as seen on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub link: String,
    pub last_update_time: String,
    pub download_num: String,
    pub like_num: String,
}

/// Links and summary stats collected for one organization.
///
/// Stored row-wise so the four serialized columns can never drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LinkIndexColumns", into = "LinkIndexColumns")]
pub struct LinkIndexEntry {
    items: Vec<ListingItem>,
}

impl LinkIndexEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, page: Vec<ListingItem>) {
        self.items.extend(page);
    }

    pub fn items(&self) -> &[ListingItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn columns(&self) -> LinkIndexColumns {
        self.clone().into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkIndexColumns {
    pub dataset_links: Vec<String>,
    pub dataset_last_update_time: Vec<String>,
    pub dataset_download_num: Vec<String>,
    pub dataset_like_num: Vec<String>,
}

impl From<LinkIndexEntry> for LinkIndexColumns {
    fn from(entry: LinkIndexEntry) -> Self {
        let mut cols = LinkIndexColumns::default();
        for item in entry.items {
            cols.dataset_links.push(item.link);
            cols.dataset_last_update_time.push(item.last_update_time);
            cols.dataset_download_num.push(item.download_num);
            cols.dataset_like_num.push(item.like_num);
        }
        cols
    }
}

impl TryFrom<LinkIndexColumns> for LinkIndexEntry {
    type Error = CrawlError;

    fn try_from(cols: LinkIndexColumns) -> Result<Self, Self::Error> {
        let links = cols.dataset_links.len();
        if cols.dataset_last_update_time.len() != links
            || cols.dataset_download_num.len() != links
            || cols.dataset_like_num.len() != links
        {
            return Err(CrawlError::UnequalIndexColumns {
                links,
                update_times: cols.dataset_last_update_time.len(),
                downloads: cols.dataset_download_num.len(),
                likes: cols.dataset_like_num.len(),
            });
        }

        let items = itertools::izip!(
            cols.dataset_links,
            cols.dataset_last_update_time,
            cols.dataset_download_num,
            cols.dataset_like_num
        )
        .map(|(link, last_update_time, download_num, like_num)| ListingItem {
            link,
            last_update_time,
            download_num,
            like_num,
        })
        .collect();

        Ok(LinkIndexEntry { items })
    }
}

pub type LinkIndex = IndexMap<String, LinkIndexEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub organization: String,
    pub dataset_name: String,
    pub dataset_license: String,
    pub related_info: IndexMap<String, String>,
    pub introduction: String,
    pub community_activities: String,
    pub dataset_screenshot_save_path: String,
    pub paper_screenshot_save_path: String,
    #[serde(default)]
    pub paper_link: String,
    pub download_num: String,
    pub like_num: String,
    pub last_update_time: String,
    pub link: String,
}

pub type DatasetDetails = IndexMap<String, IndexMap<String, DatasetRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    NotStarted,
    LoadingTargets,
    DiscoveringLinks,
    PersistingIndex,
    HarvestingDetails,
    PersistingResults,
    Done,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub organizations_crawled: usize,
    pub organizations_failed: usize,
    pub failed_organizations: Vec<String>,
    pub links_discovered: usize,
    pub records_harvested: usize,
    pub links_skipped: usize,
    pub links_duplicated: usize,
    pub links_failed: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    fn item(n: usize) -> ListingItem {
        ListingItem {
            link: format!("https://modelscope.cn/datasets/org/d{}", n),
            last_update_time: format!("2024-11-0{} 10:00", n),
            download_num: format!("{}", n * 10),
            like_num: format!("{}", n),
        }
    }

    #[test]
    fn sort_method_from_config() {
        assert_eq!("downloads".parse::<SortMethod>().unwrap(), SortMethod::Downloads);
        assert_eq!("relevance".parse::<SortMethod>().unwrap(), SortMethod::Synthesis);
        assert_eq!("Recency".parse::<SortMethod>().unwrap(), SortMethod::Updated);
        assert!(matches!(
            "stars".parse::<SortMethod>(),
            Err(CrawlError::UnknownSortMethod(_))
        ));
        assert_eq!(SortMethod::Likes.label(), "收藏量排序");
    }

    #[test]
    fn empty_listing_url_is_skipped() {
        assert_eq!(CrawlTarget::new("a", None).url(), None);
        assert_eq!(CrawlTarget::new("a", Some("  ")).url(), None);
        assert_eq!(
            CrawlTarget::new("a", Some("https://x")).url(),
            Some("https://x")
        );
    }

    #[test]
    fn entry_serializes_as_equal_columns() {
        let mut entry = LinkIndexEntry::new();
        entry.append(vec![item(1), item(2)]);
        entry.append(vec![item(3)]);

        let v = serde_json::to_value(&entry).unwrap();
        for key in [
            "dataset_links",
            "dataset_last_update_time",
            "dataset_download_num",
            "dataset_like_num",
        ] {
            assert_eq!(v[key].as_array().unwrap().len(), 3);
        }
        assert_eq!(v["dataset_like_num"][2], "3");

        let back: LinkIndexEntry = serde_json::from_value(v).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn unequal_columns_are_rejected() {
        let raw = r#"{
            "dataset_links": ["a", "b"],
            "dataset_last_update_time": ["t"],
            "dataset_download_num": ["1", "2"],
            "dataset_like_num": ["1", "2"]
        }"#;
        let res = serde_json::from_str::<LinkIndexEntry>(raw);
        assert!(res.is_err());
    }
}
