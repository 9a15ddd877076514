//! Chrome DevTools Protocol engine adapter.
//!
//! Only compiled with the `chromium` feature; the rest of the crate depends on
//! the traits in [`super`], never on this module.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, PrintToPdfParams, Viewport,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{BoundingBox, CaptureFormat, EngineError, EngineFactory, EnginePage, RenderingEngine};

/// Launches a headless Chromium and drives its CDP event loop on a spawned task.
#[derive(Debug, Default)]
pub struct ChromiumFactory;

#[async_trait]
impl EngineFactory for ChromiumFactory {
    async fn launch(&self) -> Result<Arc<dyn RenderingEngine>, EngineError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(EngineError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| EngineError::Launch(err.to_string()))?;
        let event_loop = tokio::spawn(async move { while handler.next().await.is_some() {} });
        debug!("launched headless chromium");
        Ok(Arc::new(ChromiumEngine { browser: Mutex::new(browser), event_loop }))
    }
}

struct ChromiumEngine {
    browser: Mutex<Browser>,
    event_loop: JoinHandle<()>,
}

#[async_trait]
impl RenderingEngine for ChromiumEngine {
    async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| EngineError::Load(err.to_string()))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(|err| EngineError::Launch(err.to_string()))?;
        let _ = browser.wait().await;
        self.event_loop.abort();
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn eval_json<T>(&self, expression: String) -> Result<T, EngineError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|err| EngineError::Evaluate(err.to_string()))?;
        result.into_value::<T>().map_err(|err| EngineError::Evaluate(err.to_string()))
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

#[derive(Debug, Deserialize)]
struct RawBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[async_trait]
impl EnginePage for ChromiumPage {
    async fn set_content(&mut self, html: &str) -> Result<(), EngineError> {
        self.page
            .set_content(html)
            .await
            .map_err(|err| EngineError::Load(err.to_string()))?;
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool, EngineError> {
        self.eval_json(format!(
            "document.querySelector({sel}) !== null",
            sel = js_string(selector)
        ))
        .await
    }

    async fn element_text(&self, selector: &str) -> Result<Option<String>, EngineError> {
        self.eval_json(format!(
            "(() => {{ const el = document.querySelector({sel}); \
             return el ? el.textContent : null; }})()",
            sel = js_string(selector)
        ))
        .await
    }

    async fn element_outer_html(&self, selector: &str) -> Result<Option<String>, EngineError> {
        self.eval_json(format!(
            "(() => {{ const el = document.querySelector({sel}); \
             return el ? el.outerHTML : null; }})()",
            sel = js_string(selector)
        ))
        .await
    }

    async fn element_bounding_box(
        &self,
        selector: &str,
    ) -> Result<Option<BoundingBox>, EngineError> {
        let raw: Option<RawBox> = self
            .eval_json(format!(
                "(() => {{ const el = document.querySelector({sel}); \
                 if (!el) return null; const r = el.getBoundingClientRect(); \
                 return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()",
                sel = js_string(selector)
            ))
            .await?;
        Ok(raw.map(|r| BoundingBox { x: r.x, y: r.y, width: r.width, height: r.height }))
    }

    async fn screenshot(
        &self,
        clip: BoundingBox,
        format: CaptureFormat,
    ) -> Result<Vec<u8>, EngineError> {
        let mut builder = ScreenshotParams::builder()
            .format(match format {
                CaptureFormat::Png => CaptureScreenshotFormat::Png,
                CaptureFormat::Jpeg { .. } => CaptureScreenshotFormat::Jpeg,
            })
            .clip(Viewport {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            });
        if let CaptureFormat::Jpeg { quality } = format {
            builder = builder.quality(i64::from(quality));
        }
        self.page
            .screenshot(builder.build())
            .await
            .map_err(|err| EngineError::Capture(err.to_string()))
    }

    async fn pdf(&self) -> Result<Vec<u8>, EngineError> {
        let params = PrintToPdfParams { print_background: Some(true), ..Default::default() };
        self.page.pdf(params).await.map_err(|err| EngineError::Capture(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|err| EngineError::Load(err.to_string()))?;
        Ok(())
    }
}
