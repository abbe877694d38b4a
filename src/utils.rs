use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::Path,
};

use anyhow::Context;
use chrono::Local;
use env_logger::{Env, Target};
use indexmap::IndexMap;
use regex::Regex;
use url::Url;

use crate::types::CrawlError;

pub const LICENSE_PREFIXES: [&str; 2] = ["开源协议：", "开源协议:"];
pub const EMPTY_LISTING_MARKER: &str = "无数据集";
pub const SCREENSHOT_DIR: &str = "modelscope_dataset_info_screenshots";
pub const LINK_INDEX_FILE: &str = "organization_datasets_links.json";
pub const DETAILS_FILE: &str = "dataset_details.json";
pub const EXCEPTIONS_FILE: &str = "exception_links.json";
pub const LOG_FILE: &str = "MS_crawl_log.log";

lazy_static! {
    static ref ARXIV_LINK: Regex =
        Regex::new(r"(?i)https?://(?:www\.)?arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}(?:v\d+)?)")
            .unwrap();
    static ref PDF_LINK: Regex = Regex::new(r#"(?i)https?://[^\s<>"'()\[\]]+?\.pdf\b"#).unwrap();
}

pub fn extract_arxiv_link(text: &str) -> Option<String> {
    ARXIV_LINK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|id| format!("https://arxiv.org/pdf/{}", id.as_str()))
}

pub fn extract_pdf_link(text: &str) -> Option<String> {
    PDF_LINK.find(text).map(|m| m.as_str().to_string())
}

/// An arxiv link wins over any other pdf link in the same text.
pub fn find_paper_link(text: &str) -> Option<String> {
    extract_arxiv_link(text).or_else(|| extract_pdf_link(text))
}

pub fn strip_license_prefix(license: &str) -> String {
    let license = license.trim();
    for prefix in LICENSE_PREFIXES {
        if let Some(rest) = license.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    license.to_string()
}

/// Parses `label: value` lines. A label on its own line takes the next line
/// as its value.
pub fn parse_related_info(text: &str) -> IndexMap<String, String> {
    let mut info = IndexMap::new();
    let mut pending: Option<String> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let split = line
            .split_once('：')
            .or_else(|| line.split_once(':'))
            // urls carry colons of their own
            .filter(|(k, _)| {
                !k.is_empty() && !k.contains("//") && !k.ends_with("http") && !k.ends_with("https")
            });

        match (pending.take(), split) {
            (Some(key), None) => {
                info.insert(key, line.to_string());
            }
            (Some(key), Some((k, v))) => {
                info.insert(key, String::new());
                insert_pair(&mut info, &mut pending, k, v);
            }
            (None, Some((k, v))) => insert_pair(&mut info, &mut pending, k, v),
            (None, None) => pending = Some(line.to_string()),
        }
    }
    if let Some(key) = pending {
        info.insert(key, String::new());
    }
    info
}

fn insert_pair(
    info: &mut IndexMap<String, String>,
    pending: &mut Option<String>,
    key: &str,
    value: &str,
) {
    let (key, value) = (key.trim(), value.trim());
    if value.is_empty() {
        *pending = Some(key.to_string());
    } else {
        info.insert(key.to_string(), value.to_string());
    }
}

/// `2024-11-21 09:04` becomes `2024-11-21`.
pub fn date_only(time: &str) -> String {
    time.split_whitespace().next().unwrap_or("").to_string()
}

/// Organization and dataset name: the last two path segments of a dataset link.
pub fn dataset_path_segments(link: &str) -> anyhow::Result<(String, String)> {
    let url = Url::parse(link).context(format!("dataset link is invalid {}", link))?;
    let segments = url
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect::<Vec<&str>>())
        .unwrap_or_default();

    if segments.len() < 2 {
        return Err(CrawlError::InvalidDatasetLink(link.into()).into());
    }
    let decode = |s: &str| -> anyhow::Result<String> {
        Ok(urlencoding::decode(s)
            .context(format!("could not decode path segment {}", s))?
            .into_owned())
    };

    Ok((
        decode(segments[segments.len() - 2])?,
        decode(segments[segments.len() - 1])?,
    ))
}

/// Resolves a card `href` against the page it was found on, dropping the
/// fragment. `None` when the href cannot be turned into a url.
pub fn normalize_link(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let mut url = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => Url::parse(base_url).ok()?.join(href).ok()?,
    };
    url.set_fragment(None);
    Some(url.to_string())
}

/// The path as recorded in the results: relative to the working directory
/// when it lies below it, as given otherwise.
pub fn recorded_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

pub fn feedback_link(link: &str) -> String {
    format!("{}/feedback", link.trim_end_matches('/'))
}

struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Sends log lines to stderr and to `<log_dir>/MS_crawl_log.log`.
pub fn init_logger(log_dir: &Path, default_level: &str) -> anyhow::Result<()> {
    fs::create_dir_all(log_dir).context(format!("could not create log dir {:?}", log_dir))?;
    let path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .context(format!("could not open log file {:?}", path))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {}[line:{}] - {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .context("could not initialise logger")?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arxiv_link_wins_over_pdf_link() {
        let intro = "Paper: https://example.org/files/report.pdf and \
                     see also https://arxiv.org/abs/2311.01234v2 for details";
        assert_eq!(
            find_paper_link(intro).unwrap(),
            "https://arxiv.org/pdf/2311.01234v2"
        );
    }

    #[test]
    fn falls_back_to_pdf_link() {
        let intro = "下载论文 (https://example.org/papers/dataset.pdf) 即可";
        assert_eq!(
            find_paper_link(intro).unwrap(),
            "https://example.org/papers/dataset.pdf"
        );
        assert_eq!(find_paper_link("no links here"), None);
    }

    #[test]
    fn arxiv_pdf_form_is_kept() {
        assert_eq!(
            extract_arxiv_link("http://arxiv.org/pdf/2401.00001").unwrap(),
            "https://arxiv.org/pdf/2401.00001"
        );
    }

    #[test]
    fn license_prefix_is_stripped() {
        assert_eq!(strip_license_prefix("开源协议：MIT"), "MIT");
        assert_eq!(strip_license_prefix(" 开源协议: Apache License 2.0 "), "Apache License 2.0");
        assert_eq!(strip_license_prefix("CC-BY-4.0"), "CC-BY-4.0");
    }

    #[test]
    fn related_info_pairs() {
        let text = "数据集大小：1.2GB\n任务类型\n文本分类\n语言: 中文\n主页：https://example.com/x\n标签";
        let info = parse_related_info(text);
        assert_eq!(info.get("数据集大小").unwrap(), "1.2GB");
        assert_eq!(info.get("任务类型").unwrap(), "文本分类");
        assert_eq!(info.get("语言").unwrap(), "中文");
        assert_eq!(info.get("主页").unwrap(), "https://example.com/x");
        assert_eq!(info.get("标签").unwrap(), "");
        assert_eq!(info.len(), 5);
    }

    #[test]
    fn date_is_truncated() {
        assert_eq!(date_only("2024-11-21 09:04:11"), "2024-11-21");
        assert_eq!(date_only(""), "");
    }

    #[test]
    fn segments_from_link() {
        let (org, name) =
            dataset_path_segments("https://modelscope.cn/datasets/AI-ModelScope/alpaca-gpt4-data-zh/")
                .unwrap();
        assert_eq!(org, "AI-ModelScope");
        assert_eq!(name, "alpaca-gpt4-data-zh");

        let (_, name) =
            dataset_path_segments("https://modelscope.cn/datasets/org/%E4%B8%AD%E6%96%87").unwrap();
        assert_eq!(name, "中文");

        let err = dataset_path_segments("https://modelscope.cn/only").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CrawlError>(),
            Some(CrawlError::InvalidDatasetLink(_))
        ));
    }

    #[test]
    fn relative_card_links_are_resolved() {
        let base = "https://modelscope.cn/organization/acme?tab=dataset";
        assert_eq!(
            normalize_link(base, "/datasets/acme/poems").unwrap(),
            "https://modelscope.cn/datasets/acme/poems"
        );
        assert_eq!(
            normalize_link(base, "https://modelscope.cn/datasets/acme/poems#readme").unwrap(),
            "https://modelscope.cn/datasets/acme/poems"
        );
        assert_eq!(normalize_link("not a url", "/datasets/acme/poems"), None);
    }

    #[test]
    fn recorded_paths_are_relative_to_the_working_dir() {
        let cwd = std::env::current_dir().unwrap();
        let shot = cwd.join("result").join("shot.png");
        let expected = Path::new("result").join("shot.png");
        assert_eq!(recorded_path(&shot), expected.display().to_string());
        assert_eq!(recorded_path(Path::new("out/shot.png")), "out/shot.png");
    }

    #[test]
    fn feedback_sub_page() {
        assert_eq!(feedback_link("https://x/datasets/a/b/"), "https://x/datasets/a/b/feedback");
    }
}
