//! W3C WebDriver client over plain HTTP.
//!
//! Works against chromedriver, geckodriver, or a Selenium hub. Only the
//! handful of commands the agent needs are implemented.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::{debug, info};

use storyfeed_shared::{BrowserConfig, Result, StoryFeedError};

use super::session::{BrowserSession, SessionFactory};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Commands such as page loads can block for a long time.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Opens sessions on a WebDriver endpoint.
pub struct WebDriverFactory {
    client: Client,
    endpoint: String,
    capabilities: Value,
}

impl WebDriverFactory {
    pub fn new(config: &BrowserConfig, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .map_err(|e| StoryFeedError::Browser(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
            capabilities: capabilities(config, user_agent),
        })
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let url = format!("{}/session", self.endpoint);
        let value = command(&self.client, Method::POST, &url, Some(&self.capabilities)).await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| StoryFeedError::Browser("new session response has no sessionId".into()))?
            .to_string();

        info!(session_id = %id, endpoint = %self.endpoint, "webdriver session opened");
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{id}", self.endpoint),
            id,
        }))
    }
}

/// `capabilities.alwaysMatch` for a new session request.
fn capabilities(config: &BrowserConfig, user_agent: &str) -> Value {
    let always_match = match config.browser_name.as_str() {
        "firefox" => {
            let mut args = vec![
                format!("--width={}", config.window_width),
                format!("--height={}", config.window_height),
            ];
            if config.headless {
                args.push("-headless".into());
            }
            json!({
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": args,
                    "prefs": { "general.useragent.override": user_agent },
                },
            })
        }
        name => {
            let mut args = vec![
                format!("--window-size={},{}", config.window_width, config.window_height),
                format!("--user-agent={user_agent}"),
            ];
            if config.headless {
                args.push("--headless=new".into());
            }
            json!({
                "browserName": name,
                "goog:chromeOptions": { "args": args },
            })
        }
    };
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live WebDriver session.
pub struct WebDriverSession {
    client: Client,
    session_url: String,
    id: String,
}

impl WebDriverSession {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{path}", self.session_url);
        command(&self.client, Method::POST, &url, Some(&body)).await
    }

    /// Resolve a CSS selector to a WebDriver element id.
    async fn find_element(&self, css: &str) -> Result<String> {
        let value = self
            .post("element", json!({ "using": "css selector", "value": css }))
            .await?;
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| StoryFeedError::Browser(format!("no element reference for {css:?}")))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(session_id = %self.id, url, "navigate");
        self.post("url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        self.post("execute/sync", json!({ "script": script, "args": [] }))
            .await?;
        Ok(())
    }

    async fn fill(&self, css: &str, text: &str) -> Result<()> {
        let element = self.find_element(css).await?;
        self.post(&format!("element/{element}/value"), json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn click(&self, css: &str) -> Result<()> {
        let element = self.find_element(css).await?;
        self.post(&format!("element/{element}/click"), json!({}))
            .await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        let url = format!("{}/source", self.session_url);
        let value = command(&self.client, Method::GET, &url, None).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| StoryFeedError::Browser("page source is not a string".into()))
    }

    async fn close(&self) -> Result<()> {
        command(&self.client, Method::DELETE, &self.session_url, None).await?;
        info!(session_id = %self.id, "webdriver session closed");
        Ok(())
    }
}

/// Send one WebDriver command and unwrap its `value`.
async fn command(client: &Client, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| StoryFeedError::Browser(format!("{url}: {e}")))?;
    let status = response.status();
    let mut payload: Value = response
        .json()
        .await
        .map_err(|e| StoryFeedError::Browser(format!("{url}: invalid response: {e}")))?;

    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    if !status.is_success() {
        let kind = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(StoryFeedError::Browser(format!("{kind}: {message} (HTTP {status})")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> BrowserConfig {
        BrowserConfig {
            webdriver_url: server.uri(),
            ..BrowserConfig::default()
        }
    }

    async fn mount_new_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(body_partial_json(json!({
                "capabilities": { "alwaysMatch": { "browserName": "chrome" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { "sessionId": "abc123", "capabilities": {} }
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn null_value() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "value": null }))
    }

    #[test]
    fn chrome_capabilities_carry_window_and_agent() {
        let caps = capabilities(&BrowserConfig::default(), "TestAgent/1.0");
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        let args: Vec<&str> = args.iter().filter_map(Value::as_str).collect();
        assert!(args.contains(&"--window-size=1920,1080"));
        assert!(args.contains(&"--user-agent=TestAgent/1.0"));
        assert!(args.contains(&"--headless=new"));
    }

    #[test]
    fn firefox_capabilities() {
        let config = BrowserConfig {
            browser_name: "firefox".into(),
            headless: false,
            ..BrowserConfig::default()
        };
        let caps = capabilities(&config, "TestAgent/1.0");
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "firefox");
        assert_eq!(
            always["moz:firefoxOptions"]["prefs"]["general.useragent.override"],
            "TestAgent/1.0"
        );
        assert!(
            !always["moz:firefoxOptions"]["args"]
                .as_array()
                .unwrap()
                .contains(&json!("-headless"))
        );
    }

    #[tokio::test]
    async fn navigate_and_read_source() {
        let server = MockServer::start().await;
        mount_new_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/url"))
            .and(body_partial_json(json!({ "url": "https://www.example.com/topic/Rust" })))
            .respond_with(null_value())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/execute/sync"))
            .and(body_partial_json(json!({ "args": [] })))
            .respond_with(null_value())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/abc123/source"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "value": "<html></html>" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/abc123"))
            .respond_with(null_value())
            .expect(1)
            .mount(&server)
            .await;

        let factory = WebDriverFactory::new(&config(&server), "TestAgent/1.0").unwrap();
        let session = factory.open().await.unwrap();
        session.navigate("https://www.example.com/topic/Rust").await.unwrap();
        session.execute_script("return 1;").await.unwrap();
        assert_eq!(session.page_source().await.unwrap(), "<html></html>");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn fill_and_click_resolve_elements() {
        let server = MockServer::start().await;
        mount_new_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/element"))
            .and(body_partial_json(json!({ "using": "css selector" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { ELEMENT_KEY: "el-1" }
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/element/el-1/value"))
            .and(body_partial_json(json!({ "text": "jane@example.com" })))
            .respond_with(null_value())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/element/el-1/click"))
            .respond_with(null_value())
            .expect(1)
            .mount(&server)
            .await;

        let factory = WebDriverFactory::new(&config(&server), "TestAgent/1.0").unwrap();
        let session = factory.open().await.unwrap();
        session
            .fill("input[name=email]", "jane@example.com")
            .await
            .unwrap();
        session.click("input[type=submit]").await.unwrap();
    }

    #[tokio::test]
    async fn webdriver_errors_surface_as_browser_errors() {
        let server = MockServer::start().await;
        mount_new_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/element"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": { "error": "no such element", "message": "Unable to locate element" }
            })))
            .mount(&server)
            .await;

        let factory = WebDriverFactory::new(&config(&server), "TestAgent/1.0").unwrap();
        let session = factory.open().await.unwrap();
        let err = session.click("#missing").await.unwrap_err();
        match err {
            StoryFeedError::Browser(msg) => assert!(msg.contains("no such element"), "{msg}"),
            other => panic!("expected Browser error, got {other:?}"),
        }
    }
}
