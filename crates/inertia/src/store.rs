//! The single authoritative current page.

use crate::error::VisitError;
use crate::events::{EventBus, GlobalEvent};
use crate::history::History;
use crate::href::{href_to_url, is_same_url_without_hash};
use crate::page::{Page, ScrollRegion};
use crate::platform::{
    ComponentHandle, ComponentResolver, Location, Platform, ScrollKeeper, Swap, ViewSwapper,
};
use crate::sync::lock;
use log::debug;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// How [`PageStore::set`] applies a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub replace: bool,
    pub preserve_scroll: bool,
    pub preserve_state: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    /// A newer `set` started while this one was suspended; nothing was
    /// committed.
    Superseded,
}

#[derive(Debug)]
struct Slot {
    page: Page,
    generation: u64,
}

/// Owner of the current [`Page`].
///
/// Every call to [`PageStore::set`] takes a new generation. Once a call
/// resumes from component resolution or the swap and finds a newer generation,
/// it stops without touching the current page.
pub struct PageStore {
    slot: Mutex<Slot>,
    resolver: Arc<dyn ComponentResolver>,
    swapper: Arc<dyn ViewSwapper>,
    history: History,
    location: Arc<dyn Location>,
    scroll: Arc<dyn ScrollKeeper>,
    events: Arc<EventBus>,
}

impl PageStore {
    pub fn new(
        initial: Page,
        platform: &Platform,
        history: History,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            slot: Mutex::new(Slot {
                page: initial,
                generation: 0,
            }),
            resolver: Arc::clone(&platform.resolver),
            swapper: Arc::clone(&platform.swapper),
            history,
            location: Arc::clone(&platform.location),
            scroll: Arc::clone(&platform.scroll),
            events,
        }
    }

    /// Resolve, record in history, swap and commit `page`.
    ///
    /// History gets a replaced entry when `options.replace` is set or the
    /// page URL equals the browser URL ignoring the hash, and a pushed one
    /// otherwise. Scroll is reset unless preserved. `navigate` fires for
    /// pushed entries only.
    ///
    /// # Errors
    /// Propagates failures of the resolver, the history store and the swap.
    pub async fn set(&self, page: Page, options: SetOptions) -> Result<SetOutcome, VisitError> {
        let generation = self.next_generation();
        let component = self.resolve_for(generation, &page.component).await?;
        if !self.is_current(generation) {
            debug!("page {} superseded during component resolution", page.url);
            return Ok(SetOutcome::Superseded);
        }

        let location = self.location.href();
        let url = href_to_url(&page.url, &location)?;
        let replace = options.replace || is_same_url_without_hash(&url, &location);
        if replace {
            self.history.replace_page(&page, Some(&url))?;
        } else {
            self.history.push_page(&page, &url)?;
        }

        self.swapper
            .swap(Swap {
                component,
                page: &page,
                preserve_state: options.preserve_state,
            })
            .await
            .map_err(VisitError::Swap)?;

        if !self.commit(generation, &page) {
            debug!("page {} superseded during swap", page.url);
            return Ok(SetOutcome::Superseded);
        }
        if !options.preserve_scroll {
            self.scroll.reset(&page);
        }
        if !replace {
            self.events.fire(&GlobalEvent::Navigate(&page));
        }
        Ok(SetOutcome::Applied)
    }

    /// Swap `page` in without touching history. Used for back/forward
    /// traversals whose entry already holds the page.
    ///
    /// # Errors
    /// Propagates failures of the resolver and the swap.
    pub async fn swap_in(
        &self,
        page: &Page,
        preserve_state: bool,
    ) -> Result<SetOutcome, VisitError> {
        let generation = self.next_generation();
        let component = self.resolve_for(generation, &page.component).await?;
        if !self.is_current(generation) {
            return Ok(SetOutcome::Superseded);
        }
        self.swapper
            .swap(Swap {
                component,
                page,
                preserve_state,
            })
            .await
            .map_err(VisitError::Swap)?;
        if self.commit(generation, page) {
            Ok(SetOutcome::Applied)
        } else {
            Ok(SetOutcome::Superseded)
        }
    }

    pub fn get(&self) -> Page {
        lock(&self.slot).page.clone()
    }

    pub fn component(&self) -> String {
        lock(&self.slot).page.component.clone()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.slot).generation
    }

    /// Whether `page` renders the same component as the current page.
    pub fn is_the_same(&self, page: &Page) -> bool {
        lock(&self.slot).page.component == page.component
    }

    /// Append `hash` to the current URL unless it already carries one.
    pub fn set_url_hash(&self, hash: &str) {
        let mut slot = lock(&self.slot);
        if !hash.is_empty() && !slot.page.url.contains('#') {
            slot.page.url.push_str(hash);
        }
    }

    pub fn remember(&self, state: Map<String, Value>) {
        lock(&self.slot).page.remembered_state = state;
    }

    pub fn set_scroll_regions(&self, regions: Vec<ScrollRegion>) {
        lock(&self.slot).page.scroll_regions = regions;
    }

    pub(crate) fn set_url(&self, url: String) {
        lock(&self.slot).page.url = url;
    }

    /// # Errors
    /// Returns [`VisitError::ComponentResolution`] when the resolver fails.
    pub async fn resolve(&self, component: &str) -> Result<ComponentHandle, VisitError> {
        self.resolver
            .resolve(component)
            .await
            .map_err(|source| VisitError::ComponentResolution {
                component: component.to_owned(),
                source,
            })
    }

    /// Resolve on behalf of `generation`. A failed resolution gives the
    /// generation back so an older `set` still in flight can commit.
    async fn resolve_for(
        &self,
        generation: u64,
        component: &str,
    ) -> Result<ComponentHandle, VisitError> {
        let resolved = self.resolve(component).await;
        if resolved.is_err() {
            let mut slot = lock(&self.slot);
            if slot.generation == generation {
                slot.generation -= 1;
            }
        }
        resolved
    }

    fn next_generation(&self) -> u64 {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.slot).generation == generation
    }

    fn commit(&self, generation: u64, page: &Page) -> bool {
        let mut slot = lock(&self.slot);
        if slot.generation != generation {
            return false;
        }
        slot.page = page.clone();
        true
    }
}
