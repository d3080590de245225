mod common;

use anyhow::Result;
use common::{eventually, page, started};
use inertia::platform::HistoryStore as _;
use inertia::{ScrollRegion, SetOptions, SetOutcome, VisitError};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn a_newer_set_supersedes_one_waiting_on_its_component() -> Result<()> {
    let harness = started(page("Home", "/home")).await?;
    let gate = harness.resolver.gate("Reports");
    let router = harness.router.clone();
    let slow = tokio::spawn(async move {
        router
            .store()
            .set(page("Reports", "/reports"), SetOptions::default())
            .await
    });
    let watched = harness.router.clone();
    eventually(move || watched.store().generation() == 2).await;

    let fast = harness
        .router
        .store()
        .set(page("Settings", "/settings"), SetOptions::default())
        .await?;
    assert_eq!(fast, SetOutcome::Applied);

    gate.notify_one();
    assert_eq!(slow.await??, SetOutcome::Superseded);
    assert_eq!(harness.router.page().component, "Settings");
    let swapped: Vec<String> = harness
        .swapper
        .swaps()
        .into_iter()
        .map(|swap| swap.component)
        .collect();
    assert_eq!(swapped, ["Home", "Settings"]);
    assert_eq!(harness.browser.history_len(), 2);
    assert_eq!(harness.events.count_prefix("navigate Reports"), 0);
    Ok(())
}

#[tokio::test]
async fn a_failed_resolution_does_not_supersede_an_older_set() -> Result<()> {
    let harness = started(page("Home", "/home")).await?;
    let gate = harness.resolver.gate("Reports");
    let router = harness.router.clone();
    let slow = tokio::spawn(async move {
        router
            .store()
            .set(page("Reports", "/reports"), SetOptions::default())
            .await
    });
    let watched = harness.router.clone();
    eventually(move || watched.store().generation() == 2).await;

    let failed = harness
        .router
        .store()
        .set(page("Missing", "/missing"), SetOptions::default())
        .await;
    assert!(matches!(failed, Err(VisitError::ComponentResolution { .. })));
    assert_eq!(harness.router.store().generation(), 2);

    gate.notify_one();
    assert_eq!(slow.await??, SetOutcome::Applied);
    assert_eq!(harness.router.page().component, "Reports");
    assert_eq!(harness.events.count("navigate Reports"), 1);
    Ok(())
}

#[tokio::test]
async fn a_new_url_pushes_and_the_same_url_replaces() -> Result<()> {
    let harness = started(page("Home", "/home")).await?;
    let store = harness.router.store();

    store.set(page("About", "/about"), SetOptions::default()).await?;
    assert_eq!(harness.browser.history_len(), 2);
    assert_eq!(harness.events.count("navigate About"), 1);
    assert_eq!(
        harness.scroll.calls().last().map(String::as_str),
        Some("reset About")
    );

    let scroll_calls = harness.scroll.calls().len();
    let options = SetOptions {
        preserve_scroll: true,
        ..SetOptions::default()
    };
    store
        .set(page("About", "/about#team").with_prop("team", json!([])), options)
        .await?;
    assert_eq!(harness.browser.history_len(), 2);
    assert_eq!(harness.events.count("navigate About"), 1);
    assert_eq!(harness.scroll.calls().len(), scroll_calls);

    let options = SetOptions {
        replace: true,
        ..SetOptions::default()
    };
    store.set(page("Contact", "/contact"), options).await?;
    assert_eq!(harness.browser.history_len(), 2);
    assert_eq!(harness.events.count("navigate Contact"), 0);
    let state = harness.browser.state().expect("entry holds the page");
    assert_eq!(state.get("component"), Some(&json!("Contact")));
    Ok(())
}

#[tokio::test]
async fn a_failed_resolution_leaves_the_page_alone() -> Result<()> {
    let harness = started(page("Home", "/home")).await?;

    let outcome = harness
        .router
        .store()
        .set(page("Missing", "/missing"), SetOptions::default())
        .await;

    assert!(matches!(
        outcome,
        Err(VisitError::ComponentResolution { ref component, .. }) if component == "Missing"
    ));
    assert_eq!(harness.router.page().component, "Home");
    assert_eq!(harness.browser.history_len(), 1);
    Ok(())
}

#[tokio::test]
async fn in_place_mutators_touch_only_the_current_page() -> Result<()> {
    let harness = started(page("Home", "/home")).await?;
    let store = harness.router.store();

    store.set_url_hash("#intro");
    store.set_url_hash("#outro");
    store.set_url_hash("");
    assert_eq!(store.get().url, "https://app.test/home#intro");

    store.remember(common::object(json!({ "tab": "billing" })));
    store.set_scroll_regions(vec![ScrollRegion {
        top: 40.0,
        left: 0.0,
    }]);
    let current = store.get();
    assert_eq!(current.remembered_state.get("tab"), Some(&json!("billing")));
    assert_eq!(current.scroll_regions.len(), 1);

    assert!(store.is_the_same(&page("Home", "/elsewhere")));
    assert!(!store.is_the_same(&page("About", "/home")));
    assert_eq!(harness.swapper.swaps().len(), 1);
    Ok(())
}
