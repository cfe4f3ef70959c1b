pub mod context;
pub mod conversation;
pub mod events;
pub mod executor;
pub mod retry;
pub mod state;
pub mod wait;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use context::SessionContext;
pub use conversation::{ConversationOptions, ConversationOutcome, ConversationRunner};
pub use events::*;
pub use executor::{PlannedConversation, SuiteExecutor};
pub use retry::{execute_with_retry, Backoff, RetryPolicy};
pub use state::*;

use crate::driver::{BrowserDriver, BrowserType, PlaywrightDriver, WebDriverConfig};
use crate::parser::{load_conversation_file, load_scenarios};
use crate::utils::Config;
use crate::widget::{ChatWidget, SelectorChatWidget};

/// Files this crate writes into its output directory
const REPORT_FILES: &[&str] = &["results.json", "error-report.json", "screenshot-report.json"];

fn is_data_file(path: &Path) -> bool {
    let is_report = path
        .file_name()
        .map_or(false, |name| REPORT_FILES.iter().any(|r| name == *r));
    !is_report
        && path
            .extension()
            .map_or(false, |ext| ext == "json" || ext == "csv")
}

fn suite_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "suite".to_string())
}

/// Conversation files under `path`, sorted for a stable run order
pub fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_data_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

/// Load one file into planned conversations.
///
/// `.csv` files are scenario tables; anything else is read as conversation JSON.
pub fn load_file(path: &Path) -> Result<Vec<PlannedConversation>> {
    let suite = suite_name(path);
    let source = path.display().to_string();

    let is_csv = path.extension().map_or(false, |ext| ext == "csv");
    if is_csv {
        load_scenarios(path)?
            .iter()
            .enumerate()
            .map(|(row, scenario)| {
                let script = scenario
                    .to_script()
                    .with_context(|| format!("{}: invalid scenario on row {}", source, row + 1))?;
                Ok(PlannedConversation {
                    script,
                    suite: suite.clone(),
                    source: source.clone(),
                    reply_timeout: scenario.timeout.map(Duration::from_millis),
                })
            })
            .collect()
    } else {
        Ok(load_conversation_file(path)?
            .into_iter()
            .map(|script| PlannedConversation {
                script,
                suite: suite.clone(),
                source: source.clone(),
                reply_timeout: None,
            })
            .collect())
    }
}

/// Every conversation reachable from `path`, in run order
pub fn load_plan(path: &Path) -> Result<Vec<PlannedConversation>> {
    let mut planned = Vec::new();
    for file in collect_files(path)? {
        planned.extend(load_file(&file)?);
    }
    Ok(planned)
}

/// Load and check scripts without a browser
///
/// # Returns
/// Conversation count per file
pub fn validate_path(path: &Path) -> Result<Vec<(PathBuf, usize)>> {
    let mut counts = Vec::new();
    for file in collect_files(path)? {
        let planned = load_file(&file)?;
        log::debug!("{}: {} conversation(s)", file.display(), planned.len());
        counts.push((file, planned.len()));
    }
    Ok(counts)
}

/// Run every conversation under `path` in one browser session
pub async fn run_path(path: &Path, config: &Config) -> Result<TestSummary> {
    let planned = load_plan(path)?;
    if planned.is_empty() {
        println!("{} No conversations found.", "ℹ".blue());
        return Ok(TestSummary::default());
    }

    let driver: Arc<dyn BrowserDriver> = Arc::new(
        PlaywrightDriver::launch(WebDriverConfig {
            browser_type: BrowserType::parse(&config.browser),
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
        })
        .await?,
    );

    let widget: Arc<dyn ChatWidget> = Arc::new(
        SelectorChatWidget::new(driver.clone(), config.selector_catalog(), config.entry_url())
            .with_timeouts(config.widget_timeouts()),
    );

    let mut context = SessionContext::new(&config.output_dir, config.retry_policy())?;
    context.screenshot_on_failure = config.screenshot_on_failure;

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let options = ConversationOptions {
        reply_timeout: Duration::from_millis(config.reply_timeout_ms),
        poll_interval: Duration::from_millis(config.poll_interval_ms),
    };
    let mut executor = SuiteExecutor::new(
        driver.clone(),
        widget,
        context,
        emitter,
        options,
        config.continue_on_failure,
    );

    executor.run_all(&planned).await;
    let summary = executor.finish().await;

    if let Err(e) = driver.close().await {
        log::warn!("Failed to close browser: {:#}", e);
    }

    // Dropping the executor closes the channel and ends the listener
    drop(executor);
    let _ = listener.await;

    let summary = summary?;
    println!(
        "\n{} Reports saved to: {}",
        "📄".blue(),
        config.output_dir.display().to_string().cyan()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONVO: &str = r#"[
        {"name": "greeting", "convo": [
            {"sender": "me", "messageText": "hi"},
            {"sender": "bot", "messageText": "hello|hi"}
        ]},
        {"name": "billing", "convo": [
            {"sender": "me", "messageText": "my bill"},
            {"sender": "bot", "messageText": "bill", "matching": "contains"}
        ]}
    ]"#;

    #[test]
    fn test_load_plan_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.json"), CONVO).unwrap();
        std::fs::write(
            dir.path().join("nested").join("b.csv"),
            "scenario,user_input,expected_response,timeout\nupgrade,Can I upgrade?,upgrade,4000\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("results.json"), "{}").unwrap();

        let plan = load_plan(dir.path()).unwrap();
        let names: Vec<&str> = plan.iter().map(|p| p.script.name()).collect();
        assert_eq!(names, vec!["greeting", "billing", "upgrade"]);
        assert_eq!(plan[0].suite, "a");
        assert_eq!(plan[2].suite, "b");
        assert_eq!(plan[2].reply_timeout, Some(Duration::from_millis(4000)));
        assert_eq!(plan[0].reply_timeout, None);
    }

    #[test]
    fn test_validate_reports_bad_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.json");
        std::fs::write(
            &file,
            r#"{"name": "bad", "convo": [{"sender": "bot", "messageText": "(oops"}]}"#,
        )
        .unwrap();

        let err = validate_path(&file).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid pattern"), "{:#}", err);
    }

    #[test]
    fn test_validate_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), CONVO).unwrap();
        let counts = validate_path(dir.path()).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].1, 2);
    }

    #[test]
    fn test_missing_path() {
        assert!(collect_files(Path::new("/definitely/not/here")).is_err());
    }
}
