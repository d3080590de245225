//! Classification and application of a completed exchange.

use crate::error::VisitError;
use crate::events::GlobalEvent;
use crate::href::{href_to_url, is_same_url_without_hash, set_hash_if_same_url};
use crate::http::{HttpResponse, STATUS_CONFLICT, X_INERTIA_LOCATION};
use crate::location_visit::LocationVisit;
use crate::page::{Errors, Page};
use crate::request::Request;
use crate::router::{Router, RouterCore};
use crate::store::{SetOptions, SetOutcome};
use crate::visit::VisitOptions;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;

/// What a response did to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The page was committed and `success` fired.
    Applied,
    /// The page was dropped because a newer navigation owns the store.
    Discarded,
    /// The page was committed and carried validation errors.
    ValidationErrors,
    /// The server asked for a full browser navigation.
    LocationVisit,
    /// The server did not speak the page protocol.
    Invalid,
}

pub(crate) struct Response<'req> {
    request: &'req Request,
    core: &'req Arc<RouterCore>,
    response: HttpResponse,
}

impl<'req> Response<'req> {
    pub(crate) const fn new(
        request: &'req Request,
        core: &'req Arc<RouterCore>,
        response: HttpResponse,
    ) -> Self {
        Self {
            request,
            core,
            response,
        }
    }

    pub(crate) async fn handle(self) -> Result<ResponseOutcome, VisitError> {
        if !self.response.is_protocol() {
            return Ok(self.handle_non_protocol());
        }

        let page: Page = serde_json::from_slice(&self.response.body)?;
        let params = self.request.params();
        if !params.is_partial() {
            self.core.polls.clear();
        }
        if !self.should_set_page(&page) {
            debug!(
                "discarding {} response: navigated away from {}",
                page.component,
                self.request.originating().component
            );
            return Ok(ResponseOutcome::Discarded);
        }

        let deferred = page.deferred();
        if self.set_page(page).await? == SetOutcome::Superseded {
            return Ok(ResponseOutcome::Discarded);
        }

        let current = self.core.store.get();
        let errors = current.errors();
        if !errors.is_empty() {
            let scoped = self.scoped_errors(errors);
            if let Some(on_error) = &params.callbacks().on_error {
                on_error(&scoped);
            }
            self.core.events.fire(&GlobalEvent::Error(&scoped));
            return Ok(ResponseOutcome::ValidationErrors);
        }

        if !params.is_partial() {
            self.load_deferred(deferred);
        }
        if let Some(on_success) = &params.callbacks().on_success {
            on_success(&current);
        }
        self.core.events.fire(&GlobalEvent::Success(&current));
        Ok(ResponseOutcome::Applied)
    }

    /// Synchronous visits always apply. An asynchronous one applies when its
    /// response redirected to another component, or when nothing replaced
    /// the originating component in the meantime.
    fn should_set_page(&self, page: &Page) -> bool {
        if !self.request.params().is_async() {
            return true;
        }
        let originating = &self.request.originating().component;
        page.component != *originating || *originating == self.core.store.component()
    }

    async fn set_page(&self, mut page: Page) -> Result<SetOutcome, VisitError> {
        let params = self.request.params();
        let visit = params.visit();
        let current = self.core.store.get();
        let same_component = page.component == current.component;

        if params.is_partial() && same_component {
            let mut props = current.props;
            props.extend(page.props);
            page.props = props;
        }

        let preserve_scroll = visit.preserve_scroll.resolve(&page);
        let preserve_state = visit.preserve_state.resolve(&page);

        if preserve_state
            && same_component
            && let Some(remembered) = self.core.history.remembered_state()
        {
            page.remembered_state = remembered;
        }

        let mut url = href_to_url(&page.url, &self.core.platform.location.href())?;
        set_hash_if_same_url(&visit.url, &mut url);
        page.url = url.to_string();

        self.core
            .store
            .set(
                page,
                SetOptions {
                    replace: visit.replace,
                    preserve_scroll,
                    preserve_state,
                },
            )
            .await
    }

    fn scoped_errors(&self, errors: Errors) -> Errors {
        let Some(bag) = self.request.params().visit().error_bag.as_deref() else {
            return errors;
        };
        match errors.get(bag) {
            Some(Value::Object(scoped)) => scoped.clone(),
            Some(_) | None => Errors::new(),
        }
    }

    /// One asynchronous `only` reload per deferred group.
    fn load_deferred(&self, deferred: impl IntoIterator<Item = (String, Vec<String>)>) {
        let router = Router::from_core(Arc::clone(self.core));
        for (group, props) in deferred {
            debug!("loading deferred group {group}: {}", props.join(","));
            let options = VisitOptions::new().only(props).asynchronous(true);
            if let Err(error) = router.reload(options) {
                warn!("deferred group {group} could not be requested: {error}");
            }
        }
    }

    fn handle_non_protocol(self) -> ResponseOutcome {
        if self.response.status == STATUS_CONFLICT
            && let Some(location) = self.response.header(X_INERTIA_LOCATION)
        {
            return self.location_visit(location);
        }
        if self.core.events.fire(&GlobalEvent::Invalid(&self.response)) {
            self.core
                .platform
                .invalid_view
                .show(&self.response.body_text());
        }
        ResponseOutcome::Invalid
    }

    /// Leave the page protocol for a full browser navigation.
    ///
    /// A browser that refuses the redirect is logged, never surfaced as an
    /// exception.
    fn location_visit(&self, href: &str) -> ResponseOutcome {
        if let Err(error) = self.navigate_away(href) {
            warn!("location visit to {href} failed: {error}");
        }
        ResponseOutcome::LocationVisit
    }

    fn navigate_away(&self, href: &str) -> Result<(), VisitError> {
        let platform = &self.core.platform;
        let visit = self.request.params().visit();
        let current = platform.location.href();
        let mut url = href_to_url(href, &current)?;
        set_hash_if_same_url(&visit.url, &mut url);

        LocationVisit {
            preserve_scroll: visit.preserve_scroll.is_literally_true(),
        }
        .store(platform.session.as_ref(), &self.core.config.location_visit_key)?;

        let same_document = is_same_url_without_hash(&current, &url);
        info!("location visit to {url}");
        platform.location.assign(&url).map_err(VisitError::Browser)?;
        if same_document {
            platform.location.reload().map_err(VisitError::Browser)?;
        }
        Ok(())
    }
}
