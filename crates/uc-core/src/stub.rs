//! Instrumented in-memory engine for tests.
//!
//! Records every handle it creates and destroys, and can be told to fail at
//! any step of bootstrap or of a rating query.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::engine::{Engine, EngineResult};
use crate::error::EngineError;
use crate::types::{
    ActivationEndpoint, CategorySetVersion, Credentials, DatabaseAccess, Encoding, Language,
    RateFlags,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Resource {
    Attributes,
    Categories,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Init,
    SessionCreated,
    Activated,
    DatabaseLoaded,
    SessionDestroyed,
    Created(Resource, u64),
    Destroyed(Resource, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FailAt {
    Init,
    CreateSession,
    Activate,
    LoadDatabase,
    CreateAttributes,
    CreateCategories,
    ClearCategories,
    CreateUrl,
    Parse,
    Rate,
    Count,
    ToArray,
    ToString,
}

pub(crate) struct StubSession;

pub(crate) struct StubAttributes {
    id: u64,
    reputation: Option<i32>,
}

pub(crate) struct StubCategories {
    id: u64,
    entries: Vec<(u32, String)>,
}

pub(crate) struct StubUrl {
    id: u64,
    raw: Option<String>,
}

pub(crate) struct StubEngine {
    ratings: HashMap<String, Vec<(u32, String)>>,
    bad_urls: HashSet<String>,
    failures: HashSet<FailAt>,
    activation_detail: String,
    reputation: Option<i32>,
    sentinel: Option<String>,
    overreport_array: bool,
    reported_count: Option<usize>,
    reported_required: Option<usize>,
    render_residue: bool,
    invalid_utf8: bool,
    next_id: Cell<u64>,
    events: Rc<RefCell<Vec<Event>>>,
}

impl StubEngine {
    pub(crate) fn new() -> Self {
        Self {
            ratings: HashMap::new(),
            bad_urls: HashSet::new(),
            failures: HashSet::new(),
            activation_detail: "invalid serial".to_string(),
            reputation: None,
            sentinel: None,
            overreport_array: false,
            reported_count: None,
            reported_required: None,
            render_residue: false,
            invalid_utf8: false,
            next_id: Cell::new(1),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub(crate) fn with_rating(mut self, url: &str, categories: &[(u32, &str)]) -> Self {
        let entries = categories
            .iter()
            .map(|(code, name)| (*code, name.to_string()))
            .collect();
        self.ratings.insert(url.to_string(), entries);
        self
    }

    pub(crate) fn with_bad_url(mut self, url: &str) -> Self {
        self.bad_urls.insert(url.to_string());
        self
    }

    pub(crate) fn fail_at(mut self, step: FailAt) -> Self {
        self.failures.insert(step);
        self
    }

    pub(crate) fn with_activation_detail(mut self, detail: &str) -> Self {
        self.activation_detail = detail.to_string();
        self
    }

    pub(crate) fn with_reputation(mut self, reputation: i32) -> Self {
        self.reputation = Some(reputation);
        self
    }

    pub(crate) fn with_uncategorized_sentinel(mut self, sentinel: &str) -> Self {
        self.sentinel = Some(sentinel.to_string());
        self
    }

    pub(crate) fn with_overreported_array(mut self) -> Self {
        self.overreport_array = true;
        self
    }

    /// Answer every count request with `count`.
    pub(crate) fn with_reported_count(mut self, count: usize) -> Self {
        self.reported_count = Some(count);
        self
    }

    /// Answer every array request with `BufferTooSmall { required }`.
    pub(crate) fn with_reported_required(mut self, required: usize) -> Self {
        self.reported_required = Some(required);
        self
    }

    pub(crate) fn with_render_residue(mut self) -> Self {
        self.render_residue = true;
        self
    }

    pub(crate) fn with_invalid_utf8(mut self) -> Self {
        self.invalid_utf8 = true;
        self
    }

    pub(crate) fn events(&self) -> Rc<RefCell<Vec<Event>>> {
        Rc::clone(&self.events)
    }

    fn check(&self, step: FailAt) -> EngineResult<()> {
        if self.failures.contains(&step) {
            Err(EngineError::failed(format!("injected failure at {:?}", step)))
        } else {
            Ok(())
        }
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn create(&self, step: FailAt, resource: Resource) -> EngineResult<u64> {
        self.check(step)?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.record(Event::Created(resource, id));
        Ok(id)
    }
}

impl Engine for StubEngine {
    type Session = StubSession;
    type Attributes = StubAttributes;
    type Categories = StubCategories;
    type Url = StubUrl;

    fn init(&self) -> EngineResult<()> {
        self.check(FailAt::Init)?;
        self.record(Event::Init);
        Ok(())
    }

    fn create_session(&self, _credentials: &Credentials) -> EngineResult<StubSession> {
        self.check(FailAt::CreateSession)?;
        self.record(Event::SessionCreated);
        Ok(StubSession)
    }

    fn activate(
        &self,
        _session: &mut StubSession,
        _endpoint: &ActivationEndpoint,
    ) -> EngineResult<()> {
        if self.failures.contains(&FailAt::Activate) {
            return Err(EngineError::Failed(self.activation_detail.clone()));
        }
        self.record(Event::Activated);
        Ok(())
    }

    fn load_database(
        &self,
        _session: &mut StubSession,
        _path: &Path,
        _access: DatabaseAccess,
        _version: CategorySetVersion,
    ) -> EngineResult<()> {
        self.check(FailAt::LoadDatabase)?;
        self.record(Event::DatabaseLoaded);
        Ok(())
    }

    fn destroy_session(&self, _session: StubSession) {
        self.record(Event::SessionDestroyed);
    }

    fn create_attributes(&self, _session: &StubSession) -> EngineResult<StubAttributes> {
        let id = self.create(FailAt::CreateAttributes, Resource::Attributes)?;
        Ok(StubAttributes {
            id,
            reputation: None,
        })
    }

    fn destroy_attributes(&self, _session: &StubSession, attributes: StubAttributes) {
        self.record(Event::Destroyed(Resource::Attributes, attributes.id));
    }

    fn create_categories(&self, _session: &StubSession) -> EngineResult<StubCategories> {
        let id = self.create(FailAt::CreateCategories, Resource::Categories)?;
        // Pretend the object came from a pool and still holds stale entries.
        Ok(StubCategories {
            id,
            entries: vec![(99, "Stale".to_string())],
        })
    }

    fn clear_categories(
        &self,
        _session: &StubSession,
        categories: &mut StubCategories,
    ) -> EngineResult<()> {
        self.check(FailAt::ClearCategories)?;
        categories.entries.clear();
        Ok(())
    }

    fn destroy_categories(&self, _session: &StubSession, categories: StubCategories) {
        self.record(Event::Destroyed(Resource::Categories, categories.id));
    }

    fn create_url(&self, _session: &StubSession) -> EngineResult<StubUrl> {
        let id = self.create(FailAt::CreateUrl, Resource::Url)?;
        Ok(StubUrl { id, raw: None })
    }

    fn parse_url(
        &self,
        _session: &StubSession,
        raw: &str,
        _host_header: Option<&str>,
        url: &mut StubUrl,
    ) -> EngineResult<()> {
        self.check(FailAt::Parse)?;
        if self.bad_urls.contains(raw) {
            return Err(EngineError::failed(format!("cannot parse '{}'", raw)));
        }
        url.raw = Some(raw.to_string());
        Ok(())
    }

    fn destroy_url(&self, _session: &StubSession, url: StubUrl) {
        self.record(Event::Destroyed(Resource::Url, url.id));
    }

    fn rate(
        &self,
        _session: &StubSession,
        url: &StubUrl,
        attributes: &mut StubAttributes,
        categories: &mut StubCategories,
        _flags: RateFlags,
        _version: CategorySetVersion,
        _session_id: u32,
        _user_agent: Option<&str>,
    ) -> EngineResult<()> {
        self.check(FailAt::Rate)?;
        let raw = url.raw.as_deref().ok_or_else(|| EngineError::failed("url not parsed"))?;
        if let Some(entries) = self.ratings.get(raw) {
            categories.entries.extend(entries.iter().cloned());
            attributes.reputation = self.reputation;
        }
        Ok(())
    }

    fn category_count(
        &self,
        _session: &StubSession,
        categories: &StubCategories,
    ) -> EngineResult<usize> {
        self.check(FailAt::Count)?;
        Ok(self.reported_count.unwrap_or(categories.entries.len()))
    }

    fn categories_to_array(
        &self,
        _session: &StubSession,
        categories: &StubCategories,
        out: &mut [u32],
    ) -> EngineResult<usize> {
        self.check(FailAt::ToArray)?;
        if let Some(required) = self.reported_required {
            return Err(EngineError::BufferTooSmall { required });
        }
        let required = categories.entries.len();
        if required > out.len() {
            return Err(EngineError::BufferTooSmall { required });
        }
        for (slot, (code, _)) in out.iter_mut().zip(&categories.entries) {
            *slot = *code;
        }
        if self.overreport_array {
            Ok(out.len() + 5)
        } else {
            Ok(required)
        }
    }

    fn categories_to_string(
        &self,
        _session: &StubSession,
        categories: &StubCategories,
        _language: Language,
        _encoding: Encoding,
        delimiter: &str,
        out: &mut [u8],
    ) -> EngineResult<usize> {
        self.check(FailAt::ToString)?;

        let mut bytes = if self.invalid_utf8 {
            vec![0xff, 0xfe, 0xfd]
        } else {
            let names: Vec<&str> = categories.entries.iter().map(|(_, n)| n.as_str()).collect();
            let joined = names.join(delimiter);
            match &self.sentinel {
                Some(sentinel) if joined.is_empty() => sentinel.clone().into_bytes(),
                _ => joined.into_bytes(),
            }
        };
        if self.render_residue {
            bytes.extend_from_slice(b"\0xx");
        }

        if bytes.len() > out.len() {
            return Err(EngineError::BufferTooSmall {
                required: bytes.len(),
            });
        }
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn reputation(&self, _session: &StubSession, attributes: &StubAttributes) -> EngineResult<i32> {
        attributes
            .reputation
            .ok_or_else(|| EngineError::failed("no reputation recorded"))
    }
}
