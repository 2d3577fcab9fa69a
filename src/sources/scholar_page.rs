//! Parsing of rendered Google Scholar pages.
//!
//! Everything here works on HTML strings so it can be tested without a
//! browser. [`GoogleScholarSource`](super::GoogleScholarSource) feeds it the
//! DOM of the live session.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use super::BlockKind;

/// Result-type badges Scholar prefixes to titles
static BADGES: OnceLock<Regex> = OnceLock::new();

fn badge_pattern() -> &'static Regex {
    BADGES.get_or_init(|| {
        Regex::new(r"\[(?:PDF|HTML|BOOK|B|CITATION|C)\]").expect("badge pattern is valid")
    })
}

/// One result block scraped from a Scholar result page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScholarHit {
    pub title: String,
    /// Landing page, empty for citation-only results
    pub url: String,
    pub snippet: String,
    pub authors: Vec<String>,
    /// Free-text venue/year/publisher line
    pub venue: Option<String>,
    pub pdf_url: Option<String>,
}

/// Build the result page URL for `keywords`, with optional year bounds
pub fn build_search_url(
    base: &str,
    keywords: &str,
    start_year: Option<i32>,
    end_year: Option<i32>,
) -> String {
    let terms = keywords
        .split_whitespace()
        .map(|t| urlencoding::encode(t).into_owned())
        .collect::<Vec<_>>()
        .join("+");

    let mut url = format!("{}?hl=en&q={}", base, terms);
    if let Some(year) = start_year {
        url.push_str(&format!("&as_ylo={}", year));
    }
    if let Some(year) = end_year {
        url.push_str(&format!("&as_yhi={}", year));
    }
    url
}

/// Interstitial wording, matched only on pages without result markup
const RATE_LIMIT_TEXT: &[&str] = &[
    "unusual traffic",
    "our systems have detected",
    "too many requests",
];
const CAPTCHA_TEXT: &[&str] = &["not a robot"];

fn matches_any(document: &Html, selectors: &str) -> bool {
    Selector::parse(selectors)
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

/// Detect an anti-bot interstitial in a rendered page.
///
/// A page carrying `div.gs_ri` results is never blocked, whatever its
/// snippets say. Otherwise the page structure decides, and the interstitial
/// wording is only consulted as a last resort.
pub fn detect_block(html: &str) -> Option<BlockKind> {
    let document = Html::parse_document(html);
    if matches_any(&document, "div.gs_ri") {
        return None;
    }

    if matches_any(
        &document,
        r#"form[action*="/sorry/"], a[href*="/sorry/index"], link[href*="/sorry/index"]"#,
    ) {
        return Some(BlockKind::RateLimited);
    }
    if matches_any(
        &document,
        r#"#gs_captcha_ccl, form#captcha-form, div.g-recaptcha, script[src*="recaptcha/api"], iframe[src*="recaptcha"]"#,
    ) {
        return Some(BlockKind::Captcha);
    }

    let text = document.root_element().text().collect::<String>().to_lowercase();
    if RATE_LIMIT_TEXT.iter().any(|marker| text.contains(marker)) {
        return Some(BlockKind::RateLimited);
    }
    if CAPTCHA_TEXT.iter().any(|marker| text.contains(marker)) {
        return Some(BlockKind::Captcha);
    }

    None
}

/// Whether the page contains result markup
pub fn has_results(html: &str) -> bool {
    matches_any(&Html::parse_document(html), "div.gs_ri")
}

/// Parse up to `limit` results.
///
/// A result whose markup cannot be read is skipped; the others are kept.
pub fn parse_results(html: &str, limit: usize) -> Vec<ScholarHit> {
    let document = Html::parse_document(html);
    let Ok(result_selector) = Selector::parse("div.gs_ri") else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for (index, result) in document.select(&result_selector).enumerate() {
        if hits.len() >= limit {
            break;
        }
        match parse_hit(&result) {
            Some(hit) => hits.push(hit),
            None => tracing::debug!(index, "Skipping unreadable Scholar result"),
        }
    }
    hits
}

fn parse_hit(result: &ElementRef) -> Option<ScholarHit> {
    let title_selector = Selector::parse("h3.gs_rt").ok()?;
    let link_selector = Selector::parse("h3.gs_rt a[href]").ok()?;
    let snippet_selector = Selector::parse("div.gs_rs").ok()?;
    let author_selector = Selector::parse("div.gs_a").ok()?;

    let title_elem = result.select(&title_selector).next()?;
    let title = strip_badges(&element_text(&title_elem));
    if title.is_empty() {
        return None;
    }

    let url = result
        .select(&link_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default()
        .to_string();

    let snippet = result
        .select(&snippet_selector)
        .next()
        .map(|s| element_text(&s))
        .unwrap_or_default();

    let (authors, venue) = result
        .select(&author_selector)
        .next()
        .map(|a| split_author_line(&element_text(&a)))
        .unwrap_or_default();

    // PDF side links live next to `gs_ri` in the enclosing `gs_r` block.
    let container = result.parent().and_then(ElementRef::wrap).unwrap_or(*result);
    let pdf_url = pdf_from_dom(&container).or_else(|| infer_pdf_url(&url));

    Some(ScholarHit {
        title,
        url,
        snippet,
        authors,
        venue,
        pdf_url,
    })
}

fn element_text(elem: &ElementRef) -> String {
    elem.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove `[PDF]`-style badges from a result title
pub fn strip_badges(title: &str) -> String {
    badge_pattern()
        .replace_all(title, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a `gs_a` line into authors and the venue remainder.
///
/// Only the part before the first `" - "` holds authors; without the
/// delimiter there are no authors.
pub fn split_author_line(line: &str) -> (Vec<String>, Option<String>) {
    let line = line.replace('\u{a0}', " ");
    let Some((names, rest)) = line.split_once(" - ") else {
        return (Vec::new(), None);
    };

    let authors = names
        .split(',')
        .map(|name| name.trim().trim_matches('…').trim_end_matches("...").trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    let venue = Some(rest.trim().to_string()).filter(|v| !v.is_empty());
    (authors, venue)
}

/// Find an explicit PDF link inside a result block
pub fn pdf_from_dom(container: &ElementRef) -> Option<String> {
    let side_selector = Selector::parse("div.gs_ggs a[href], div.gs_or_ggsm a[href]").ok()?;
    let any_link = Selector::parse("a[href]").ok()?;

    if let Some(href) = container
        .select(&side_selector)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.starts_with("http"))
    {
        return Some(href.to_string());
    }

    container
        .select(&any_link)
        .find(|a| {
            let href = a.value().attr("href").unwrap_or_default();
            let text = a.text().collect::<String>().to_lowercase();
            href.starts_with("http")
                && (text.contains("pdf") || href.to_lowercase().ends_with(".pdf"))
        })
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Derive a PDF URL from a landing page on a host with a known layout
pub fn infer_pdf_url(landing: &str) -> Option<String> {
    let mut url = Url::parse(landing).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").to_string();
    let path = url.path().to_string();

    match host.as_str() {
        "arxiv.org" => {
            let id = path.strip_prefix("/abs/").filter(|id| !id.is_empty())?;
            Some(format!("https://arxiv.org/pdf/{}", id))
        }
        "openreview.net" if path == "/forum" => {
            let id = url
                .query_pairs()
                .find(|(key, _)| key == "id")
                .map(|(_, value)| value.into_owned())?;
            Some(format!("https://openreview.net/pdf?id={}", id))
        }
        "aclanthology.org" => {
            let id = path.trim_matches('/');
            if id.is_empty() || id.contains('/') {
                return None;
            }
            if id.ends_with(".pdf") {
                return Some(landing.to_string());
            }
            Some(format!("https://aclanthology.org/{}.pdf", id))
        }
        "proceedings.neurips.cc" if path.contains("/hash/") => {
            let file = path.replacen("/hash/", "/file/", 1);
            let file = if let Some(stem) = file.strip_suffix("-Abstract-Conference.html") {
                format!("{}-Paper-Conference.pdf", stem)
            } else {
                format!("{}-Paper.pdf", file.strip_suffix("-Abstract.html")?)
            };
            url.set_path(&file);
            url.set_query(None);
            Some(url.to_string())
        }
        _ => None,
    }
}

/// Hosts whose landing pages expose the full abstract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstractHost {
    Arxiv,
    OpenReview,
    AclAnthology,
}

impl AbstractHost {
    pub fn from_url(landing: &str) -> Option<Self> {
        let url = Url::parse(landing).ok()?;
        let host = url.host_str()?;
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

        if matches("arxiv.org") {
            Some(Self::Arxiv)
        } else if matches("openreview.net") {
            Some(Self::OpenReview)
        } else if matches("aclanthology.org") {
            Some(Self::AclAnthology)
        } else {
            None
        }
    }

    fn selectors(&self) -> &'static [&'static str] {
        match self {
            Self::Arxiv => &["blockquote.abstract"],
            Self::OpenReview => &[
                "meta[name=\"citation_abstract\"]",
                "div.note-content-value",
                "span.note-content-value",
            ],
            Self::AclAnthology => &["div.acl-abstract span", "div.acl-abstract"],
        }
    }
}

/// Whether a snippet looks truncated enough to be worth a second fetch
pub fn needs_full_abstract(snippet: &str, min_chars: usize) -> bool {
    let snippet = snippet.trim();
    snippet.chars().count() < min_chars || snippet.ends_with('…') || snippet.ends_with("...")
}

/// Pull the abstract out of a landing page served by `host`
pub fn extract_full_abstract(html: &str, host: AbstractHost) -> Option<String> {
    let document = Html::parse_document(html);

    for raw in host.selectors() {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let Some(elem) = document.select(&selector).next() else {
            continue;
        };

        let text = match elem.value().attr("content") {
            Some(content) => content.split_whitespace().collect::<Vec<_>>().join(" "),
            None => element_text(&elem),
        };
        let text = text
            .strip_prefix("Abstract:")
            .or_else(|| text.strip_prefix("Abstract"))
            .unwrap_or(&text)
            .trim()
            .to_string();

        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"<html><body><div id="gs_res_ccl_mid">
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ggs gs_fl"><div class="gs_ggsd"><div class="gs_or_ggsm">
      <a href="https://arxiv.org/pdf/1706.03762"><span class="gs_ctg2">[PDF]</span> arxiv.org</a>
    </div></div></div>
    <div class="gs_ri">
      <h3 class="gs_rt"><span class="gs_ctg2">[PDF]</span> <a href="https://arxiv.org/abs/1706.03762">Attention is all
        you need</a></h3>
      <div class="gs_a">A Vaswani, N Shazeer, N Parmar&hellip;&nbsp;- Advances in neural information processing systems, 2017 - proceedings.neurips.cc</div>
      <div class="gs_rs">The dominant sequence transduction models are based on complex recurrent &hellip;</div>
    </div>
  </div>
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ri">
      <h3 class="gs_rt"><span class="gs_ctu"><span class="gs_ct1">[CITATION]</span></span> Deep learning</h3>
      <div class="gs_a">Y LeCun</div>
    </div>
  </div>
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ri">
      <h3 class="gs_rt"><a href="https://openreview.net/forum?id=XYZ">Graph Attention Networks</a></h3>
      <div class="gs_a">P Veličković, G Cucurull - arXiv preprint, 2017 - openreview.net</div>
      <div class="gs_rs">Short.</div>
    </div>
  </div>
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ri"><h3 class="gs_rt"><span>[HTML]</span></h3></div>
  </div>
</div></body></html>"#;

    #[test]
    fn test_parse_results() {
        let hits = parse_results(RESULTS, 10);
        assert_eq!(hits.len(), 3);

        let first = &hits[0];
        assert_eq!(first.title, "Attention is all you need");
        assert_eq!(first.url, "https://arxiv.org/abs/1706.03762");
        assert_eq!(first.authors, vec!["A Vaswani", "N Shazeer", "N Parmar"]);
        assert_eq!(
            first.venue.as_deref(),
            Some("Advances in neural information processing systems, 2017 - proceedings.neurips.cc")
        );
        assert_eq!(first.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1706.03762"));
        assert!(first.snippet.ends_with('…'));

        let citation = &hits[1];
        assert_eq!(citation.title, "Deep learning");
        assert!(citation.url.is_empty());
        assert!(citation.authors.is_empty());
        assert!(citation.pdf_url.is_none());

        assert_eq!(
            hits[2].pdf_url.as_deref(),
            Some("https://openreview.net/pdf?id=XYZ")
        );
    }

    #[test]
    fn test_parse_results_respects_limit() {
        assert_eq!(parse_results(RESULTS, 1).len(), 1);
        assert!(parse_results(RESULTS, 0).is_empty());
    }

    #[test]
    fn test_detect_block() {
        assert_eq!(detect_block(RESULTS), None);
        assert!(has_results(RESULTS));

        let sorry = "<html><body>Our systems have detected unusual traffic from your computer network.</body></html>";
        assert_eq!(detect_block(sorry), Some(BlockKind::RateLimited));
        assert!(!has_results(sorry));

        let captcha = r#"<html><body><div id="gs_captcha_ccl"><div class="g-recaptcha"></div></div></body></html>"#;
        assert_eq!(detect_block(captcha), Some(BlockKind::Captcha));

        let sorry_form = r#"<html><body><form id="captcha-form" action="https://www.google.com/sorry/index"><input name="q"></form></body></html>"#;
        assert_eq!(detect_block(sorry_form), Some(BlockKind::RateLimited));

        let robot = "<html><body><p>Please show you're not a robot</p></body></html>";
        assert_eq!(detect_block(robot), Some(BlockKind::Captcha));
    }

    #[test]
    fn test_marker_words_in_results_are_not_a_block() {
        let page = r#"<html><body><div class="gs_r gs_or">
          <div class="gs_ri">
            <h3 class="gs_rt"><a href="https://example.com/ids">Too Many Requests: Detecting Floods</a></h3>
            <div class="gs_a">J Doe - Security, 2021</div>
            <div class="gs_rs">We flag unusual traffic in enterprise networks and prove the detector is not a robot&hellip;</div>
          </div>
        </div></body></html>"#;

        assert!(has_results(page));
        assert_eq!(detect_block(page), None);
        assert_eq!(parse_results(page, 10).len(), 1);
    }

    #[test]
    fn test_strip_badges() {
        assert_eq!(strip_badges("[PDF] [HTML] Title here"), "Title here");
        assert_eq!(strip_badges("[B][C] Book"), "Book");
        assert_eq!(strip_badges("Plain [Draft] title"), "Plain [Draft] title");
    }

    #[test]
    fn test_split_author_line() {
        let (authors, venue) = split_author_line("J Smith, K Lee… - Nature, 2020 - nature.com");
        assert_eq!(authors, vec!["J Smith", "K Lee"]);
        assert_eq!(venue.as_deref(), Some("Nature, 2020 - nature.com"));

        let (authors, venue) = split_author_line("J Smith, K Lee");
        assert!(authors.is_empty());
        assert!(venue.is_none());
    }

    #[test]
    fn test_infer_pdf_url() {
        assert_eq!(
            infer_pdf_url("https://arxiv.org/abs/2301.00001v2").as_deref(),
            Some("https://arxiv.org/pdf/2301.00001v2")
        );
        assert_eq!(
            infer_pdf_url("https://openreview.net/forum?id=abc&noteId=def").as_deref(),
            Some("https://openreview.net/pdf?id=abc")
        );
        assert_eq!(
            infer_pdf_url("https://aclanthology.org/2023.acl-long.1/").as_deref(),
            Some("https://aclanthology.org/2023.acl-long.1.pdf")
        );
        assert_eq!(
            infer_pdf_url(
                "https://proceedings.neurips.cc/paper/2017/hash/3f5ee243-Abstract.html"
            )
            .as_deref(),
            Some("https://proceedings.neurips.cc/paper/2017/file/3f5ee243-Paper.pdf")
        );
        assert_eq!(infer_pdf_url("https://arxiv.org/abs/"), None);
        assert_eq!(infer_pdf_url("https://example.com/paper"), None);
        assert_eq!(infer_pdf_url("not a url"), None);
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url(
            "https://scholar.google.com/scholar",
            "graph  neural nets",
            Some(2020),
            Some(2023),
        );
        assert_eq!(
            url,
            "https://scholar.google.com/scholar?hl=en&q=graph+neural+nets&as_ylo=2020&as_yhi=2023"
        );

        let url = build_search_url("https://s.test/scholar", "c++ & rust", None, None);
        assert_eq!(url, "https://s.test/scholar?hl=en&q=c%2B%2B+%26+rust");
    }

    #[test]
    fn test_abstract_hosts() {
        assert_eq!(
            AbstractHost::from_url("https://arxiv.org/abs/1"),
            Some(AbstractHost::Arxiv)
        );
        assert_eq!(
            AbstractHost::from_url("https://www.aclanthology.org/x/"),
            Some(AbstractHost::AclAnthology)
        );
        assert_eq!(AbstractHost::from_url("https://notarxiv.org/abs/1"), None);

        let arxiv = r#"<blockquote class="abstract mathjax"><span class="descriptor">Abstract:</span> We propose a new
            architecture.</blockquote>"#;
        assert_eq!(
            extract_full_abstract(arxiv, AbstractHost::Arxiv).as_deref(),
            Some("We propose a new architecture.")
        );

        let openreview = r#"<html><head><meta name="citation_abstract" content="Full  text."></head></html>"#;
        assert_eq!(
            extract_full_abstract(openreview, AbstractHost::OpenReview).as_deref(),
            Some("Full text.")
        );
        assert_eq!(extract_full_abstract("<p>none</p>", AbstractHost::AclAnthology), None);
    }

    #[test]
    fn test_needs_full_abstract() {
        assert!(needs_full_abstract("short", 200));
        assert!(needs_full_abstract(&format!("{}...", "x".repeat(300)), 10));
        assert!(needs_full_abstract(&format!("{}…", "x".repeat(300)), 10));
        assert!(!needs_full_abstract(&"x".repeat(300), 200));
    }
}
