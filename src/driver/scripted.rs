//! In-memory driver for unit tests.

use super::traits::BrowserDriver;
use crate::error::HarnessError;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Element {
    displayed: bool,
    texts: Vec<String>,
    value: String,
}

/// Bot simulation wired to a send button: clicking it reads the input value,
/// clears it, and appends the responder's reply to the reply selector.
struct Bot {
    input: String,
    send: String,
    replies: String,
    responder: Responder,
}

#[derive(Default)]
struct State {
    elements: HashMap<String, Element>,
    title: String,
    url: String,
    session_alive: bool,
    clicks: Vec<String>,
    screenshots: Vec<String>,
    console: Vec<String>,
    scripts: HashMap<String, serde_json::Value>,
}

pub struct ScriptedDriver {
    state: Mutex<State>,
    bot: Mutex<Option<Bot>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                title: "Chat".to_string(),
                url: "about:blank".to_string(),
                session_alive: true,
                ..Default::default()
            }),
            bot: Mutex::new(None),
        }
    }

    pub fn with_element(self, selector: &str, displayed: bool, texts: &[&str]) -> Self {
        self.set_element(selector, displayed, texts);
        self
    }

    pub fn set_element(&self, selector: &str, displayed: bool, texts: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.elements.insert(
            selector.to_string(),
            Element {
                displayed,
                texts: texts.iter().map(|t| t.to_string()).collect(),
                value: String::new(),
            },
        );
    }

    pub fn set_displayed(&self, selector: &str, displayed: bool) {
        let mut state = self.state.lock().unwrap();
        state
            .elements
            .entry(selector.to_string())
            .or_default()
            .displayed = displayed;
    }

    pub fn push_text(&self, selector: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        let el = state.elements.entry(selector.to_string()).or_default();
        el.displayed = true;
        el.texts.push(text.to_string());
    }

    pub fn set_script_result(&self, script: &str, value: serde_json::Value) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(script.to_string(), value);
    }

    pub fn set_title(&self, title: &str) {
        self.state.lock().unwrap().title = title.to_string();
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    pub fn push_console(&self, line: &str) {
        self.state.lock().unwrap().console.push(line.to_string());
    }

    pub fn kill_session(&self) {
        self.state.lock().unwrap().session_alive = false;
    }

    pub fn with_bot(
        self,
        input: &str,
        send: &str,
        replies: &str,
        responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        *self.bot.lock().unwrap() = Some(Bot {
            input: input.to_string(),
            send: send.to_string(),
            replies: replies.to_string(),
            responder: Box::new(responder),
        });
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn screenshots(&self) -> Vec<String> {
        self.state.lock().unwrap().screenshots.clone()
    }

    fn check_alive(&self) -> Result<()> {
        if self.state.lock().unwrap().session_alive {
            Ok(())
        } else {
            Err(HarnessError::SessionLost("scripted session closed".into()).into())
        }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    fn browser_name(&self) -> &str {
        "scripted"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.check_alive()?;
        self.state.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn is_displayed(&self, selector: &str) -> Result<bool> {
        self.check_alive()?;
        let state = self.state.lock().unwrap();
        Ok(state.elements.get(selector).map_or(false, |e| e.displayed))
    }

    async fn get_text(&self, selector: &str) -> Result<String> {
        self.check_alive()?;
        let state = self.state.lock().unwrap();
        state
            .elements
            .get(selector)
            .map(|e| {
                if e.value.is_empty() {
                    e.texts.first().cloned().unwrap_or_default()
                } else {
                    e.value.clone()
                }
            })
            .ok_or_else(|| HarnessError::element_not_found(selector).into())
    }

    async fn get_texts(&self, selector: &str) -> Result<Vec<String>> {
        self.check_alive()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .elements
            .get(selector)
            .map(|e| e.texts.clone())
            .unwrap_or_default())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.check_alive()?;
        {
            let mut state = self.state.lock().unwrap();
            if !state.elements.get(selector).map_or(false, |e| e.displayed) {
                return Err(HarnessError::element_not_found(selector).into());
            }
            state.clicks.push(selector.to_string());
        }

        let bot = self.bot.lock().unwrap();
        if let Some(bot) = bot.as_ref().filter(|b| b.send == selector) {
            let mut state = self.state.lock().unwrap();
            let message = state
                .elements
                .get_mut(&bot.input)
                .map(|e| std::mem::take(&mut e.value))
                .unwrap_or_default();
            if let Some(reply) = (bot.responder)(&message) {
                let el = state.elements.entry(bot.replies.clone()).or_default();
                el.displayed = true;
                el.texts.push(reply);
            }
        }
        Ok(())
    }

    async fn set_value(&self, selector: &str, text: &str) -> Result<()> {
        self.check_alive()?;
        let mut state = self.state.lock().unwrap();
        match state.elements.get_mut(selector) {
            Some(el) if el.displayed => {
                el.value = text.to_string();
                Ok(())
            }
            _ => Err(HarnessError::element_not_found(selector).into()),
        }
    }

    async fn save_screenshot(&self, path: &Path) -> Result<()> {
        self.check_alive()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // PNG signature plus padding is enough for size accounting.
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(64, 0);
        std::fs::write(path, bytes)?;
        self.state
            .lock()
            .unwrap()
            .screenshots
            .push(path.display().to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        self.check_alive()?;
        Ok(self.state.lock().unwrap().title.clone())
    }

    async fn url(&self) -> Result<String> {
        self.check_alive()?;
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn execute(&self, script: &str) -> Result<serde_json::Value> {
        self.check_alive()?;
        let state = self.state.lock().unwrap();
        state
            .scripts
            .get(script)
            .cloned()
            .ok_or_else(|| HarnessError::JavaScript(format!("no result for script: {}", script)).into())
    }

    async fn console_logs(&self) -> Result<Vec<String>> {
        self.check_alive()?;
        Ok(self.state.lock().unwrap().console.clone())
    }

    async fn close(&self) -> Result<()> {
        self.kill_session();
        Ok(())
    }
}
