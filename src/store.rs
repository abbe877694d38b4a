use std::{fs, path::Path};

use anyhow::Context;
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};

use crate::types::{CrawlTarget, DatasetDetails, LinkIndex};

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).context(format!("could not read {:?}", path))?;
    let value = serde_json::from_str(&raw).context(format!("could not parse {:?}", path))?;
    Ok(value)
}

/// Writes through a sibling temp file so readers never see a partial file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("could not create dir {:?}", parent))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let data = serde_json::to_vec(value).context(format!("could not serialize {:?}", path))?;
    fs::write(&tmp, data).context(format!("could not write {:?}", tmp))?;
    fs::rename(&tmp, path).context(format!("could not move {:?} to {:?}", tmp, path))?;
    debug!("saved {:?}", path);
    Ok(())
}

/// Organization ids mapped to their listing page, in file order.
pub fn read_targets(path: &Path) -> anyhow::Result<Vec<CrawlTarget>> {
    let raw: IndexMap<String, Option<String>> =
        read_json(path).context("could not load crawl targets")?;

    Ok(raw
        .into_iter()
        .map(|(organization_id, listing_url)| CrawlTarget {
            organization_id,
            listing_url,
        })
        .collect())
}

pub fn read_link_index(path: &Path) -> anyhow::Result<LinkIndex> {
    read_json(path).context("could not load link index")
}

pub fn read_details(path: &Path) -> anyhow::Result<DatasetDetails> {
    read_json(path).context("could not load dataset details")
}
