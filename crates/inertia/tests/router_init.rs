mod common;

use anyhow::Result;
use common::{harness_with, inertia_response, object, page, started, url};
use inertia::platform::memory::MemoryBrowser;
use inertia::platform::{HistoryStore as _, Location as _, NavigationType};
use inertia::{RouterConfig, ScrollRegion, VisitError, VisitOptions};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const MARKER: &str = "inertiaLocationVisit";

fn login_state() -> Map<String, Value> {
    object(json!({
        "component": "Auth/Login",
        "url": "https://app.test/login",
        "props": {},
        "rememberedState": { "form": { "email": "ada@example.test" } },
        "scrollRegions": [{ "top": 120.0, "left": 0.0 }],
    }))
}

#[tokio::test]
async fn a_fresh_load_keeps_the_browser_hash() -> Result<()> {
    let browser = MemoryBrowser::new(url("/users#section"));
    let harness = harness_with(
        page("Users/Index", "/users"),
        Arc::clone(&browser),
        RouterConfig::default(),
    );
    harness.router.init().await?;

    assert_eq!(harness.router.page().url, "https://app.test/users#section");
    let swaps = harness.swapper.swaps();
    assert_eq!(swaps.len(), 1);
    assert!(swaps[0].preserve_state);
    assert_eq!(harness.events.count("navigate Users/Index"), 1);
    assert_eq!(harness.scroll.calls(), ["reset Users/Index"]);
    assert_eq!(browser.history_len(), 1);
    let state = browser.state().expect("entry holds the page");
    assert_eq!(state.get("component"), Some(&json!("Users/Index")));
    Ok(())
}

#[tokio::test]
async fn back_forward_restores_the_stored_page() -> Result<()> {
    let stored = page("Users/Show", "/users/1")
        .with_prop("user", json!({ "name": "Ada" }))
        .with_version("v1");
    let browser = MemoryBrowser::with_history_state(
        url("/users/1"),
        NavigationType::BackForward,
        object(serde_json::to_value(&stored)?),
    );
    let bootstrapped = page("Users/Show", "/users/1")
        .with_prop("user", json!({ "name": "Grace" }))
        .with_version("v2");
    let harness = harness_with(bootstrapped, Arc::clone(&browser), RouterConfig::default());
    harness.router.init().await?;

    let current = harness.router.page();
    assert_eq!(current.props.get("user"), Some(&json!({ "name": "Ada" })));
    assert_eq!(current.version.as_deref(), Some("v2"));
    assert_eq!(harness.scroll.calls(), ["restore Users/Show"]);
    assert_eq!(harness.events.count("navigate Users/Show"), 1);
    assert_eq!(browser.history_len(), 1);
    Ok(())
}

#[tokio::test]
async fn back_forward_without_a_version_drops_the_stored_one() -> Result<()> {
    let stored = page("Users/Show", "/users/1").with_version("v1");
    let browser = MemoryBrowser::with_history_state(
        url("/users/1"),
        NavigationType::BackForward,
        object(serde_json::to_value(&stored)?),
    );
    let harness = harness_with(
        page("Users/Show", "/users/1"),
        Arc::clone(&browser),
        RouterConfig::default(),
    );
    harness.router.init().await?;

    assert_eq!(harness.router.page().version, None);
    let state = browser.state().expect("entry holds the page");
    assert!(!state.contains_key("version"));
    Ok(())
}

#[tokio::test]
async fn a_location_visit_marker_restores_state_and_scroll() -> Result<()> {
    let browser = MemoryBrowser::with_history_state(
        url("/login#form"),
        NavigationType::Navigate,
        login_state(),
    )
    .with_session_item(MARKER, r#"{"preserveScroll":true}"#);
    let harness = harness_with(
        page("Auth/Login", "/login"),
        Arc::clone(&browser),
        RouterConfig::default(),
    );
    harness.router.init().await?;

    assert_eq!(browser.session_item(MARKER), None);
    let current = harness.router.page();
    assert_eq!(current.url, "https://app.test/login#form");
    assert_eq!(
        current.remembered_state,
        object(json!({ "form": { "email": "ada@example.test" } }))
    );
    assert_eq!(
        current.scroll_regions,
        [ScrollRegion {
            top: 120.0,
            left: 0.0
        }]
    );
    assert_eq!(harness.scroll.calls(), ["restore Auth/Login"]);
    assert_eq!(harness.events.count("navigate Auth/Login"), 1);
    Ok(())
}

#[tokio::test]
async fn a_malformed_marker_is_consumed_without_preserving_scroll() -> Result<()> {
    let browser = MemoryBrowser::new(url("/login")).with_session_item(MARKER, "{not json");
    let harness = harness_with(
        page("Auth/Login", "/login"),
        Arc::clone(&browser),
        RouterConfig::default(),
    );
    harness.router.init().await?;

    assert_eq!(browser.session_item(MARKER), None);
    assert_eq!(harness.scroll.calls(), ["reset Auth/Login"]);
    Ok(())
}

#[tokio::test]
async fn a_reload_clears_remembered_state() -> Result<()> {
    let browser =
        MemoryBrowser::with_history_state(url("/login"), NavigationType::Reload, login_state())
            .with_session_item(MARKER, r#"{"preserveScroll":false}"#);
    let harness = harness_with(
        page("Auth/Login", "/login"),
        browser,
        RouterConfig::default(),
    );
    harness.router.init().await?;

    assert!(harness.router.page().remembered_state.is_empty());
    assert_eq!(harness.router.restore("form"), None);
    Ok(())
}

#[tokio::test]
async fn a_reload_can_keep_remembered_state() -> Result<()> {
    let browser =
        MemoryBrowser::with_history_state(url("/login"), NavigationType::Reload, login_state())
            .with_session_item(MARKER, r#"{"preserveScroll":false}"#);
    let harness = harness_with(
        page("Auth/Login", "/login"),
        browser,
        RouterConfig::default().with_clear_remembered_state_on_reload(false),
    );
    harness.router.init().await?;

    assert_eq!(
        harness.router.restore("form"),
        Some(json!({ "email": "ada@example.test" }))
    );
    Ok(())
}

#[tokio::test]
async fn a_custom_marker_key_is_honoured() -> Result<()> {
    let browser = MemoryBrowser::new(url("/login")).with_session_item("redirect", "{}");
    let harness = harness_with(
        page("Auth/Login", "/login"),
        Arc::clone(&browser),
        RouterConfig::default().with_location_visit_key("redirect"),
    );
    harness.router.init().await?;

    assert_eq!(browser.session_item("redirect"), None);
    Ok(())
}

#[tokio::test]
async fn popstate_without_state_reattaches_the_hash() -> Result<()> {
    let harness = started(page("Users/Index", "/users")).await?;
    harness.browser.assign(&url("/users#top"))?;

    harness.router.handle_popstate(harness.browser.state()).await?;

    assert_eq!(harness.router.page().url, "https://app.test/users#top");
    let state = harness.browser.state().expect("entry now holds the page");
    assert_eq!(state.get("url"), Some(&json!("https://app.test/users#top")));
    assert_eq!(
        harness.scroll.calls().last().map(String::as_str),
        Some("reset Users/Index")
    );
    assert_eq!(harness.swapper.swaps().len(), 1);
    Ok(())
}

#[tokio::test]
async fn popstate_with_state_swaps_the_stored_page() -> Result<()> {
    let mut harness = started(page("Users/Index", "/users")).await?;
    let task = harness
        .router
        .visit("/users/1", VisitOptions::new())?
        .expect("visit dispatched");
    harness
        .exchanges
        .next()
        .await
        .respond(inertia_response(&page("Users/Show", "/users/1")));
    task.settled().await?;
    assert_eq!(harness.browser.history_len(), 2);

    assert!(harness.browser.back());
    harness.router.handle_popstate(harness.browser.state()).await?;

    assert_eq!(harness.router.page().component, "Users/Index");
    let swap = harness.swapper.last().expect("page swapped");
    assert_eq!(swap.component, "Users/Index");
    assert!(!swap.preserve_state);
    assert_eq!(harness.browser.history_len(), 2);
    assert_eq!(harness.browser.href(), url("/users"));
    assert_eq!(harness.events.count("navigate Users/Index"), 2);
    assert_eq!(
        harness.scroll.calls().last().map(String::as_str),
        Some("restore Users/Index")
    );
    Ok(())
}

#[tokio::test]
async fn popstate_with_a_foreign_state_is_an_error() -> Result<()> {
    let harness = started(page("Users/Index", "/users")).await?;

    let outcome = harness
        .router
        .handle_popstate(Some(object(json!({ "scroll": 10 }))))
        .await;
    assert!(matches!(outcome, Err(VisitError::Json(_))));
    assert_eq!(harness.router.page().component, "Users/Index");
    Ok(())
}
