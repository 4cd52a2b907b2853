//! Registry client: drives the single browser session against the arrest and
//! debtor pages, submitting identifiers one at a time and normalizing the
//! rendered tables.
//!
//! The session is a shared, exclusively-owned resource for the duration of
//! one run. Submissions are strictly sequential: the underlying page has a
//! single mutable form and table, so there is nothing to parallelize.

pub mod spec;
pub mod submit;
pub mod table;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::WaitBounds;
use crate::core::types::{snapshot_hash, Iin, LookupError, RawTable, RecordSet};
use crate::scraping::browser_manager;

use self::spec::{PageSpec, ARRESTS, DEBTORS};
use self::submit::{SubmitWatch, TableProbe, WaitOutcome, WaitPlan};

/// Quote a CSS selector (or class name) for safe embedding in an evaluated
/// script.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

pub struct RegistryClient {
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    bounds: WaitBounds,
}

impl RegistryClient {
    /// Start the browser session. Failure here is fatal to the whole run and
    /// surfaced immediately with the underlying cause.
    pub async fn launch(headless: bool, bounds: WaitBounds) -> Result<Self, LookupError> {
        let (browser, handler) = browser_manager::launch_session(headless)
            .await
            .map_err(LookupError::SessionInit)?;
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(LookupError::SessionInit(anyhow!(
                    "failed to open page: {}",
                    e
                )));
            }
        };
        Ok(Self {
            browser: Some(browser),
            page,
            handler,
            bounds,
        })
    }

    /// One normalized record set over the arrest / encumbrance register:
    /// one boolean-flag row per identifier that had data.
    pub async fn arrests(&self, iins: &[Iin]) -> Result<RecordSet, LookupError> {
        self.lookup(iins, &ARRESTS).await
    }

    /// One normalized record set over the debtor register: one row per
    /// (identifier, source row) pair.
    pub async fn debtors(&self, iins: &[Iin]) -> Result<RecordSet, LookupError> {
        self.lookup(iins, &DEBTORS).await
    }

    /// Release the browser session.
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
        }
        self.handler.abort();
    }

    async fn lookup(&self, iins: &[Iin], page_spec: &PageSpec) -> Result<RecordSet, LookupError> {
        self.run(iins, page_spec)
            .await
            .map_err(LookupError::Automation)
    }

    async fn run(&self, iins: &[Iin], spec: &PageSpec) -> Result<RecordSet> {
        self.navigate(spec).await?;

        let plan = WaitPlan::new(spec.wait, &self.bounds);
        let probe = CdpProbe {
            page: &self.page,
            spec,
        };

        let mut sets = Vec::new();
        for iin in iins {
            info!("{}: querying IIN {}", spec.name, iin);

            let baseline = snapshot_hash(probe.snapshot().await?.as_ref());
            self.submit_iin(iin, spec).await?;

            let mut watch = SubmitWatch::new(baseline, plan);
            watch.submitted();
            match watch.resolve(&probe).await? {
                WaitOutcome::Empty => {
                    warn!("{}: no data for IIN {} (not-found notice)", spec.name, iin);
                    continue;
                }
                WaitOutcome::TimedOut => {
                    warn!(
                        "{}: no data for IIN {} (no table update within {:?})",
                        spec.name, iin, plan.submit_timeout
                    );
                    continue;
                }
                WaitOutcome::Changed(_) => {}
            }

            let Some(raw) = submit::await_rows(&plan, &probe).await? else {
                warn!(
                    "{}: no rows for IIN {} within {:?}",
                    spec.name, iin, plan.table_timeout
                );
                continue;
            };

            let records = table::normalize(&raw, spec, iin);
            if records.is_empty() {
                warn!("{}: empty table for IIN {}", spec.name, iin);
                continue;
            }
            sets.push(records);
        }

        let mut out = RecordSet::concat(sets);
        out.retain_non_empty_rows();
        Ok(out)
    }

    async fn navigate(&self, spec: &PageSpec) -> Result<()> {
        let url = Url::parse(spec.url).with_context(|| format!("invalid page url {}", spec.url))?;
        info!("🌐 Navigating to {}", url);
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| anyhow!("failed to navigate to {}: {}", spec.url, e))?;
        // The page is a Vue SPA; give it a bounded settle before touching the form.
        browser_manager::wait_until_ready(&self.page, 1000, 15_000)
            .await
            .ok();
        Ok(())
    }

    /// Close a "nothing found" notice left over from the previous query so
    /// it cannot satisfy the wait for the current one.
    async fn dismiss_stale_notice(&self, spec: &PageSpec) -> Result<()> {
        let script = format!(
            r#"(() => {{
    const close = document.querySelector({close});
    if (close && close.offsetParent !== null) {{ close.click(); return true; }}
    return false;
}})()"#,
            close = js_string(spec.notice_close_sel)
        );
        let dismissed = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("failed to probe stale notice: {}", e))?
            .into_value::<bool>()
            .unwrap_or(false);
        if dismissed {
            debug!("{}: dismissed stale not-found notice", spec.name);
        }
        Ok(())
    }

    async fn submit_iin(&self, iin: &Iin, spec: &PageSpec) -> Result<()> {
        let input = self
            .page
            .find_element(spec.input_sel)
            .await
            .map_err(|e| anyhow!("IIN input not found ({}): {}", spec.input_sel, e))?;
        input
            .click()
            .await
            .map_err(|e| anyhow!("failed to focus IIN input: {}", e))?;

        // Clear programmatically and dispatch an input event; a native clear
        // leaves Vue's bound model holding the previous identifier.
        let clear = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    el.value = '';
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    return true;
}})()"#,
            sel = js_string(spec.input_sel)
        );
        let cleared = self
            .page
            .evaluate(clear)
            .await
            .map_err(|e| anyhow!("failed to clear IIN input: {}", e))?
            .into_value::<bool>()
            .unwrap_or(false);
        if !cleared {
            return Err(anyhow!("IIN input vanished while clearing"));
        }
        sleep(Duration::from_millis(50)).await;

        self.dismiss_stale_notice(spec).await?;

        input
            .type_str(iin.as_str())
            .await
            .map_err(|e| anyhow!("failed to type IIN: {}", e))?;
        // Input debounce before the button enables.
        sleep(Duration::from_millis(100)).await;

        let submit = self
            .page
            .find_element(spec.submit_sel)
            .await
            .map_err(|e| anyhow!("submit control not found ({}): {}", spec.submit_sel, e))?;
        submit
            .click()
            .await
            .map_err(|e| anyhow!("failed to click submit: {}", e))?;
        Ok(())
    }
}

impl Drop for RegistryClient {
    fn drop(&mut self) {
        // Best-effort cleanup. Drop cannot await; if we're inside a tokio
        // runtime, spawn a task to close the browser so no zombie Chromium
        // process is left behind.
        self.handler.abort();
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let _ = browser.close().await;
        });
    }
}

/// Live-DOM probe: captures the wrapper's outer HTML over CDP and parses it
/// with the offline table parser, so the browser path and the fixture tests
/// exercise the same extraction code.
struct CdpProbe<'a> {
    page: &'a Page,
    spec: &'a PageSpec,
}

#[async_trait]
impl TableProbe for CdpProbe<'_> {
    async fn snapshot(&self) -> Result<Option<RawTable>> {
        let script = format!(
            r#"(() => {{
    const wrap = document.getElementsByClassName({cls})[0];
    return wrap ? wrap.outerHTML : null;
}})()"#,
            cls = js_string(self.spec.table_wrapper_cls)
        );
        let html: Option<String> = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("table snapshot failed: {}", e))?
            .into_value()
            .unwrap_or(None);
        Ok(html.as_deref().and_then(table::parse_table))
    }

    async fn notice_visible(&self) -> Result<bool> {
        let script = format!(
            r#"(() => {{
    const notice = document.querySelector({sel});
    return !!(notice && notice.offsetParent !== null);
}})()"#,
            sel = js_string(self.spec.notice_sel)
        );
        Ok(self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("notice probe failed: {}", e))?
            .into_value::<bool>()
            .unwrap_or(false))
    }
}
