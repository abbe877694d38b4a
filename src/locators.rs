use std::fmt::Display;

use crate::types::SortMethod;

/// A named XPath expression pointing at one (or a list of) page element(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    name: &'static str,
    xpath: String,
}

impl Locator {
    pub fn new(name: &'static str, xpath: &str) -> Self {
        Locator {
            name,
            xpath: xpath.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    /// Resolves `relative` against every element matched by this locator.
    pub fn child(&self, name: &'static str, relative: &str) -> Locator {
        Locator {
            name,
            xpath: format!("{}/{}", self.xpath, relative),
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.xpath)
    }
}

const DATASET_TAB: &str = r#"//*[@id="normal_tab_dataset"]"#;
const DETAIL_ROOT: &str = r#"//*[@id="root"]/div/div/main/div[1]/div[1]/div[1]/div/div"#;
const DETAIL_BOTTOM: &str = r#"//*[@id="modelDetail_bottom"]/div/div"#;

/// Every element the crawler touches, for both page templates.
///
/// Layout changes on the site should only ever require edits here.
#[derive(Debug, Clone)]
pub struct Locators {
    pub sort_method: SortMethod,
    // listing page
    pub dataset_tab: Locator,
    pub sort_menu: Locator,
    pub sort_option: Locator,
    pub dataset_items: Locator,
    pub item_link: Locator,
    pub item_update_time: Locator,
    pub item_download_num: Locator,
    pub item_like_num: Locator,
    pub pagination: Locator,
    pub next_page: Locator,
    pub total_page: Locator,
    // detail page
    pub license: Locator,
    pub related_info: Locator,
    pub introduction: Locator,
    // feedback sub-page
    pub community_activities: Locator,
}

impl Locators {
    pub fn new(sort_method: SortMethod) -> Self {
        let dataset_items = Locator::new(
            "dataset_items",
            &format!("{}/div/div[3]/div/div/div/div[1]/div", DATASET_TAB),
        );
        let pagination = Locator::new(
            "pagination",
            &format!("{}/div/div[3]/div/div/div/div[2]/ul", DATASET_TAB),
        );

        Locators {
            sort_method,
            dataset_tab: Locator::new(
                "dataset_tab",
                r#"//*[@id="organization_rightContent"]/div/div/div[1]/div/div[4]"#,
            ),
            sort_menu: Locator::new(
                "sort_menu",
                &format!("{}/div/div[2]/div[2]/div/span[2]", DATASET_TAB),
            ),
            sort_option: Locator::new(
                "sort_option",
                &format!("//div[text()='{}']", sort_method.label()),
            ),
            item_link: dataset_items.child("item_link", "descendant::a[1]"),
            item_update_time: dataset_items
                .child("item_update_time", "a/div/div[2]/div[2]/div[1]"),
            item_download_num: dataset_items
                .child("item_download_num", "a/div/div[2]/div[2]/div[2]"),
            item_like_num: dataset_items.child("item_like_num", "a/div/div[2]/div[2]/div[3]"),
            next_page: pagination.child("next_page", "li[last()-1]"),
            total_page: pagination.child("total_page", "li[last()-2]"),
            dataset_items,
            pagination,
            license: Locator::new("license", &format!("{}/div[2]/div/div/span", DETAIL_ROOT)),
            related_info: Locator::new("related_info", &format!("{}/div[3]/div[1]", DETAIL_ROOT)),
            introduction: Locator::new("introduction", &format!("{}[1]", DETAIL_BOTTOM)),
            community_activities: Locator::new(
                "community_activities",
                &format!("{}/div[2]/div[1]/div", DETAIL_BOTTOM),
            ),
        }
    }
}
