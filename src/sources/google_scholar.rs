//! Google Scholar research source implementation.
//!
//! Google Scholar has no public API and serves rate-limit and CAPTCHA pages
//! to obvious machine clients. This source therefore renders result pages in
//! a real browser and, when such a page shows up, polls it for a bounded time
//! so that a human at the visible browser window can clear it.
//!
//! A session moves through [`SessionState`]s:
//!
//! ```text
//! Init -> Navigated -> [Blocked(kind) -> Unblocked | TimedOut] -> Parsing -> Released
//! ```
//!
//! `Released` is reached on every path, including launch-after errors.

use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::browser::{BrowserLauncher, BrowserSession};
use super::scholar_page::{
    build_search_url, detect_block, extract_full_abstract, has_results, needs_full_abstract,
    parse_results, AbstractHost, ScholarHit,
};
use crate::config::{MaxResults, ScholarConfig};
use crate::models::{Paper, PaperBuilder, SearchQuery, SourceId, ABSTRACT_UNAVAILABLE};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// Kind of anti-bot page Scholar put in front of the results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// "Unusual traffic" interstitial
    RateLimited,
    Captcha,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::RateLimited => write!(f, "rate-limit"),
            BlockKind::Captcha => write!(f, "CAPTCHA"),
        }
    }
}

/// Lifecycle of one browser session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Navigated,
    Blocked(BlockKind),
    Unblocked,
    TimedOut,
    Parsing,
    Released,
}

/// Result of [`wait_for_clearance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The block is gone and results are present; carries the page HTML
    Cleared(String),
    TimedOut,
}

/// Poll the session until the block page is gone and results are rendered.
///
/// Returns no later than `ceiling + poll` after being called.
pub async fn wait_for_clearance(
    session: &mut dyn BrowserSession,
    kind: BlockKind,
    ceiling: Duration,
    poll: Duration,
) -> WaitOutcome {
    let deadline = Instant::now() + ceiling;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::TimedOut;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;

        match tokio::time::timeout(poll, session.content()).await {
            Ok(Ok(html)) => {
                if detect_block(&html).is_none() && has_results(&html) {
                    return WaitOutcome::Cleared(html);
                }
                tracing::trace!(%kind, "Still blocked");
            }
            Ok(Err(e)) => tracing::debug!("Failed to read page while blocked: {}", e),
            Err(_) => tracing::debug!("Reading the page took longer than {:?}", poll),
        }
    }
}

fn advance(state: &mut SessionState, next: SessionState) {
    tracing::trace!(from = ?state, to = ?next, "Scholar session");
    *state = next;
}

/// Google Scholar research source
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    launcher: Arc<dyn BrowserLauncher>,
    config: ScholarConfig,
    max_results: MaxResults,
}

impl GoogleScholarSource {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        config: ScholarConfig,
        max_results: MaxResults,
    ) -> Self {
        Self {
            launcher,
            config,
            max_results,
        }
    }

    async fn settle(&self) {
        let (lo, hi) = (self.config.settle_min_ms, self.config.settle_max_ms);
        let delay = rand::thread_rng().gen_range(lo.min(hi)..=lo.max(hi));
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        state: &mut SessionState,
    ) -> Result<Vec<Paper>, SourceError> {
        session.navigate(url).await?;
        advance(state, SessionState::Navigated);

        self.settle().await;
        let mut html = session.content().await?;

        if let Some(kind) = detect_block(&html) {
            advance(state, SessionState::Blocked(kind));
            tracing::warn!(
                "Google Scholar is showing a {} page; waiting up to {}s for it to be solved in the browser window",
                kind,
                self.config.block_wait_secs
            );

            match wait_for_clearance(
                session,
                kind,
                self.config.block_wait(),
                self.config.poll_interval(),
            )
            .await
            {
                WaitOutcome::Cleared(page) => {
                    advance(state, SessionState::Unblocked);
                    tracing::info!("Google Scholar {} page cleared", kind);
                    html = page;
                }
                WaitOutcome::TimedOut => {
                    advance(state, SessionState::TimedOut);
                    return Err(SourceError::Blocked(kind));
                }
            }
        }

        advance(state, SessionState::Parsing);
        let hits = parse_results(&html, self.max_results.get());
        tracing::debug!(count = hits.len(), "Parsed Google Scholar results");

        let mut papers = Vec::with_capacity(hits.len());
        for hit in hits {
            papers.push(self.to_paper(session, hit).await);
        }
        Ok(papers)
    }

    async fn to_paper(&self, session: &mut dyn BrowserSession, hit: ScholarHit) -> Paper {
        let mut abstract_text = hit.snippet;

        if needs_full_abstract(&abstract_text, self.config.abstract_min_chars) {
            if let Some(host) = AbstractHost::from_url(&hit.url) {
                if let Some(full) = fetch_abstract(session, &hit.url, host).await {
                    if full.chars().count() > abstract_text.chars().count() {
                        abstract_text = full;
                    }
                }
            }
        }

        if abstract_text.trim().is_empty() {
            abstract_text = ABSTRACT_UNAVAILABLE.to_string();
        }

        PaperBuilder::new(hit.title, hit.url, SourceId::GoogleScholar)
            .authors(hit.authors)
            .abstract_text(abstract_text)
            .published(hit.venue)
            .pdf_url(hit.pdf_url)
            .build()
    }
}

/// Load `url` in a secondary tab and extract its abstract.
///
/// The tab is closed and the main tab refocused whatever happens.
async fn fetch_abstract(
    session: &mut dyn BrowserSession,
    url: &str,
    host: AbstractHost,
) -> Option<String> {
    let html = match session.open_tab(url).await {
        Ok(mut tab) => {
            let html = tab.content().await;
            if let Err(e) = tab.close().await {
                tracing::debug!("Failed to close abstract tab: {}", e);
            }
            html
        }
        Err(e) => Err(e),
    };

    if let Err(e) = session.focus_main().await {
        tracing::debug!("Failed to refocus main tab: {}", e);
    }

    match html {
        Ok(html) => extract_full_abstract(&html, host),
        Err(e) => {
            tracing::debug!(%url, "Failed to fetch full abstract: {}", e);
            None
        }
    }
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn id(&self) -> SourceId {
        SourceId::GoogleScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PDF_LINKS | SourceCapabilities::BROWSER
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError> {
        let url = build_search_url(
            &self.config.base_url,
            &query.keywords,
            query.start_year(),
            query.end_year(),
        );

        let mut state = SessionState::Init;
        let mut session = self.launcher.launch().await?;

        let result = self.run(session.as_mut(), &url, &mut state).await;

        if let Err(e) = session.close().await {
            tracing::debug!("Failed to close browser: {}", e);
        }
        advance(&mut state, SessionState::Released);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::browser::BrowserTab;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CAPTCHA: &str =
        r#"<html><body><form id="captcha-form"><div class="g-recaptcha"></div></form></body></html>"#;

    const RESULTS: &str = r#"<html><body>
      <div class="gs_r gs_or">
        <div class="gs_ri">
          <h3 class="gs_rt"><a href="https://arxiv.org/abs/2401.00001">Short Snippet Paper</a></h3>
          <div class="gs_a">A Author, B Author - arXiv, 2024 - arxiv.org</div>
          <div class="gs_rs">Too short &hellip;</div>
        </div>
      </div>
      <div class="gs_r gs_or">
        <div class="gs_ri">
          <h3 class="gs_rt"><a href="https://example.com/p2">Second Paper</a></h3>
          <div class="gs_a">C Author - Some Venue, 2023</div>
        </div>
      </div>
    </body></html>"#;

    const ARXIV_ABS: &str = r#"<html><body><blockquote class="abstract">Abstract: A much longer abstract recovered from the landing page of the paper.</blockquote></body></html>"#;

    #[derive(Default)]
    struct Script {
        pages: Vec<String>,
        reads: AtomicUsize,
        tab_page: Option<String>,
        fail_navigation: bool,
        fail_launch: bool,
        closed: AtomicBool,
        tabs_opened: AtomicUsize,
        tabs_closed: AtomicUsize,
        refocused: AtomicUsize,
        navigated: Mutex<Option<String>>,
    }

    #[derive(Clone)]
    struct ScriptedLauncher(Arc<Script>);

    impl fmt::Debug for ScriptedLauncher {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("ScriptedLauncher")
        }
    }

    #[async_trait]
    impl BrowserLauncher for ScriptedLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, SourceError> {
            if self.0.fail_launch {
                return Err(SourceError::Browser("no chrome".to_string()));
            }
            Ok(Box::new(ScriptedSession(Arc::clone(&self.0))))
        }
    }

    struct ScriptedSession(Arc<Script>);

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(&mut self, url: &str) -> Result<(), SourceError> {
            *self.0.navigated.lock().unwrap() = Some(url.to_string());
            if self.0.fail_navigation {
                return Err(SourceError::Browser("navigation failed".to_string()));
            }
            Ok(())
        }

        async fn content(&mut self) -> Result<String, SourceError> {
            let i = self.0.reads.fetch_add(1, Ordering::SeqCst);
            let last = self.0.pages.len() - 1;
            Ok(self.0.pages[i.min(last)].clone())
        }

        async fn open_tab(&mut self, _url: &str) -> Result<Box<dyn BrowserTab>, SourceError> {
            self.0.tabs_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedTab(Arc::clone(&self.0))))
        }

        async fn focus_main(&mut self) -> Result<(), SourceError> {
            self.0.refocused.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<(), SourceError> {
            self.0.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedTab(Arc<Script>);

    #[async_trait]
    impl BrowserTab for ScriptedTab {
        async fn content(&mut self) -> Result<String, SourceError> {
            self.0
                .tab_page
                .clone()
                .ok_or_else(|| SourceError::Browser("tab crashed".to_string()))
        }

        async fn close(self: Box<Self>) -> Result<(), SourceError> {
            self.0.tabs_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> ScholarConfig {
        ScholarConfig {
            base_url: "https://scholar.test/scholar".to_string(),
            block_wait_secs: 1,
            poll_interval_ms: 100,
            settle_min_ms: 0,
            settle_max_ms: 0,
            ..ScholarConfig::default()
        }
    }

    fn source(script: &Arc<Script>, max: usize) -> GoogleScholarSource {
        GoogleScholarSource::new(
            Arc::new(ScriptedLauncher(Arc::clone(script))),
            fast_config(),
            MaxResults::new(max),
        )
    }

    #[tokio::test]
    async fn test_wait_times_out_within_bound() {
        let script = Arc::new(Script {
            pages: vec![CAPTCHA.to_string()],
            ..Script::default()
        });
        let mut session = ScriptedSession(Arc::clone(&script));

        let ceiling = Duration::from_millis(200);
        let poll = Duration::from_millis(50);
        let started = std::time::Instant::now();
        let outcome = wait_for_clearance(&mut session, BlockKind::Captcha, ceiling, poll).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(elapsed >= ceiling);
        // Allow scheduler slack on top of the one-poll bound.
        assert!(elapsed < ceiling + poll + Duration::from_millis(100));
        assert!(script.reads.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_wait_clears_early() {
        let script = Arc::new(Script {
            pages: vec![CAPTCHA.to_string(), RESULTS.to_string()],
            ..Script::default()
        });
        let mut session = ScriptedSession(Arc::clone(&script));

        let started = std::time::Instant::now();
        let outcome = wait_for_clearance(
            &mut session,
            BlockKind::RateLimited,
            Duration::from_secs(5),
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(outcome, WaitOutcome::Cleared(ref html) if html.contains("gs_ri")));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_blocked_search_gives_up_and_releases_browser() {
        let script = Arc::new(Script {
            pages: vec![CAPTCHA.to_string()],
            ..Script::default()
        });
        let source = source(&script, 10);

        let result = source.try_search(&SearchQuery::new("graph")).await;
        assert!(matches!(result, Err(SourceError::Blocked(BlockKind::Captcha))));
        assert!(script.closed.load(Ordering::SeqCst));

        assert!(source.search(&SearchQuery::new("graph")).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_recovers_abstract_and_cleans_up_tabs() {
        let script = Arc::new(Script {
            pages: vec![RESULTS.to_string()],
            tab_page: Some(ARXIV_ABS.to_string()),
            ..Script::default()
        });
        let source = source(&script, 10);

        let query = SearchQuery::new("graph nets")
            .start_date(chrono::NaiveDate::from_ymd_opt(2020, 1, 1));
        let papers = source.try_search(&query).await.unwrap();

        assert_eq!(
            script.navigated.lock().unwrap().as_deref(),
            Some("https://scholar.test/scholar?hl=en&q=graph+nets&as_ylo=2020")
        );
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert!(first.r#abstract.starts_with("A much longer abstract"));
        assert_eq!(first.authors, vec!["A Author", "B Author"]);
        assert_eq!(first.published.as_deref(), Some("arXiv, 2024 - arxiv.org"));
        assert_eq!(first.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2401.00001"));
        assert_eq!(first.source, SourceId::GoogleScholar);

        // example.com has no known abstract markup, so only one tab is opened.
        assert_eq!(papers[1].r#abstract, ABSTRACT_UNAVAILABLE);
        assert_eq!(script.tabs_opened.load(Ordering::SeqCst), 1);
        assert_eq!(script.tabs_closed.load(Ordering::SeqCst), 1);
        assert_eq!(script.refocused.load(Ordering::SeqCst), 1);
        assert!(script.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_security_results_are_parsed_without_waiting() {
        let page = r#"<html><body><div class="gs_r gs_or">
          <div class="gs_ri">
            <h3 class="gs_rt"><a href="https://example.com/ids">Anomaly Detection for Enterprise Networks</a></h3>
            <div class="gs_a">J Doe - Security, 2021</div>
            <div class="gs_rs">We flag unusual traffic in enterprise networks long before our systems have detected an intrusion.</div>
          </div>
        </div></body></html>"#;
        let script = Arc::new(Script {
            pages: vec![page.to_string()],
            ..Script::default()
        });

        let started = std::time::Instant::now();
        let papers = source(&script, 10)
            .try_search(&SearchQuery::new("network intrusion"))
            .await
            .unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Anomaly Detection for Enterprise Networks");
        assert_eq!(script.reads.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_failed_tab_keeps_snippet_and_closes_tab() {
        let script = Arc::new(Script {
            pages: vec![RESULTS.to_string()],
            tab_page: None,
            ..Script::default()
        });
        let papers = source(&script, 1).try_search(&SearchQuery::new("x")).await.unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].r#abstract, "Too short …");
        assert_eq!(script.tabs_opened.load(Ordering::SeqCst), 1);
        assert_eq!(script.tabs_closed.load(Ordering::SeqCst), 1);
        assert_eq!(script.refocused.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_still_releases_browser() {
        let script = Arc::new(Script {
            pages: vec![RESULTS.to_string()],
            fail_navigation: true,
            ..Script::default()
        });
        let result = source(&script, 10).try_search(&SearchQuery::new("x")).await;

        assert!(matches!(result, Err(SourceError::Browser(_))));
        assert!(script.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_launch_failure_yields_empty() {
        let script = Arc::new(Script {
            pages: vec![RESULTS.to_string()],
            fail_launch: true,
            ..Script::default()
        });
        assert!(source(&script, 10).search(&SearchQuery::new("x")).await.is_empty());
    }

    #[test]
    fn test_block_kind_display() {
        assert_eq!(BlockKind::Captcha.to_string(), "CAPTCHA");
        assert_eq!(BlockKind::RateLimited.to_string(), "rate-limit");
    }
}
