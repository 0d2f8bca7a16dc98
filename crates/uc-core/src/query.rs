//! Rating query protocol
//!
//! A query acquires its own attribute set, category set and parsed URL,
//! rates the URL, then extracts the category codes and the rendered category
//! names. Every handle is held by a scoped guard, so whatever step fails the
//! handles acquired so far are released exactly once, in reverse order of
//! acquisition, before the query returns.

use log::{debug, error, log, warn, Level};

use crate::engine::Engine;
use crate::error::{EngineError, QueryError, QueryStep};
use crate::guard::Scoped;
use crate::session::EngineSession;
use crate::types::{CategorySetVersion, Encoding, Language, RateFlags};

/// Size of the buffer category names are rendered into.
pub const MAX_RENDERED_LEN: usize = 4000;

/// Largest category code array a query allocates. Every rendered category
/// takes at least one name byte and a delimiter.
pub const MAX_CATEGORY_CODES: usize = MAX_RENDERED_LEN / 2;

/// Separator placed between rendered category names.
pub const DEFAULT_DELIMITER: &str = ",";

/// Categories a URL was rated into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch {
    /// Category names joined by [`DEFAULT_DELIMITER`]
    pub rendered: String,
    /// Category names, in engine order
    pub names: Vec<String>,
    /// Numeric category codes, in engine order
    pub codes: Vec<u32>,
    /// Web reputation score, when the engine reports one
    pub reputation: Option<i32>,
}

/// Outcome of a rating query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rating {
    /// The URL belongs to at least one category.
    Categorized(CategoryMatch),
    /// The engine rated the URL and found no category.
    Uncategorized,
    /// The engine could not parse the URL.
    ParseError(EngineError),
    /// An engine failure ended the query.
    EngineError(QueryError),
}

impl Rating {
    pub fn is_categorized(&self) -> bool {
        matches!(self, Self::Categorized(_))
    }

    /// Rendered category names, or `""` for every other outcome.
    pub fn rendered(&self) -> &str {
        match self {
            Self::Categorized(m) => &m.rendered,
            _ => "",
        }
    }

    pub fn into_rendered(self) -> String {
        match self {
            Self::Categorized(m) => m.rendered,
            _ => String::new(),
        }
    }

    /// Short status label.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Categorized(_) => "categorized",
            Self::Uncategorized => "uncategorized",
            Self::ParseError(_) => "parse-error",
            Self::EngineError(_) => "engine-error",
        }
    }
}

impl<E: Engine> EngineSession<E> {
    /// Rate a single URL.
    ///
    /// `verbosity` only controls diagnostics: at 1 uncategorized URLs are
    /// reported at info level, at 2 categorized ones are as well.
    pub fn rate(&self, url: &str, verbosity: u8) -> Rating {
        let rating = match self.run_query(url) {
            Ok(rating) => rating,
            Err(err) => Rating::EngineError(err),
        };

        match &rating {
            Rating::Categorized(m) => log!(
                verbosity_level(verbosity, 2),
                "url '{}' is categorized as '{}'",
                url,
                m.rendered
            ),
            Rating::Uncategorized => {
                log!(verbosity_level(verbosity, 1), "url '{}' is uncategorized", url)
            }
            Rating::ParseError(err) => {
                log!(verbosity_level(verbosity, 1), "failed to parse url '{}': {}", url, err)
            }
            Rating::EngineError(err) if err.step == QueryStep::Render => {
                error!("rating '{}' aborted: {}", url, err)
            }
            Rating::EngineError(err) => warn!("rating '{}' aborted: {}", url, err),
        }

        rating
    }

    /// Rate a single URL and return only the rendered category names.
    ///
    /// The result is empty when the URL is uncategorized or the query failed.
    pub fn classify(&self, url: &str, verbosity: u8) -> String {
        self.rate(url, verbosity).into_rendered()
    }

    fn run_query(&self, raw: &str) -> Result<Rating, QueryError> {
        let engine = &self.engine;
        let session = self.handle();

        let mut attributes =
            Scoped::acquire(engine, session, E::create_attributes, E::destroy_attributes)
                .map_err(|e| QueryError::new(QueryStep::AcquireAttributes, e))?;

        let mut categories =
            Scoped::acquire(engine, session, E::create_categories, E::destroy_categories)
                .map_err(|e| QueryError::new(QueryStep::AcquireCategories, e))?;
        engine
            .clear_categories(session, &mut *categories)
            .map_err(|e| QueryError::new(QueryStep::ClearCategories, e))?;

        let mut url = Scoped::acquire(engine, session, E::create_url, E::destroy_url)
            .map_err(|e| QueryError::new(QueryStep::AcquireUrl, e))?;

        if let Err(err) = engine.parse_url(session, raw, None, &mut *url) {
            return Ok(Rating::ParseError(err));
        }

        engine
            .rate(
                session,
                &*url,
                &mut *attributes,
                &mut *categories,
                RateFlags::empty(),
                CategorySetVersion::Loaded,
                0,
                None,
            )
            .map_err(|e| QueryError::new(QueryStep::Rate, e))?;

        let reputation = engine.reputation(session, &*attributes).ok();
        let codes = self.category_codes(&*categories);
        let rendered = self.render(&*categories)?;

        if rendered.len() <= 1 {
            return Ok(Rating::Uncategorized);
        }

        let names: Vec<String> = rendered
            .split(DEFAULT_DELIMITER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        // Delimiters and whitespace only.
        if names.is_empty() {
            return Ok(Rating::Uncategorized);
        }

        Ok(Rating::Categorized(CategoryMatch {
            rendered,
            names,
            codes,
            reputation,
        }))
    }

    /// Extract numeric category codes. Failures here never end the query.
    fn category_codes(&self, categories: &E::Categories) -> Vec<u32> {
        let session = self.handle();

        let count = match self.engine.category_count(session, categories) {
            Ok(count) => count,
            Err(err) => {
                warn!("failed to get category count: {err}");
                0
            }
        };

        let mut codes = vec![0u32; count.min(MAX_CATEGORY_CODES).saturating_add(1)];
        let written = match self.engine.categories_to_array(session, categories, &mut codes) {
            Ok(written) => written,
            Err(EngineError::BufferTooSmall { required }) if required > MAX_CATEGORY_CODES => {
                warn!(
                    "engine asked for {} category codes, more than the limit of {}",
                    required, MAX_CATEGORY_CODES
                );
                0
            }
            // The count was stale or missing; size from the engine's answer once.
            Err(EngineError::BufferTooSmall { required }) => {
                debug!("category array of {} too small, retrying with {}", codes.len(), required);
                codes = vec![0u32; required];
                match self.engine.categories_to_array(session, categories, &mut codes) {
                    Ok(written) => written,
                    Err(err) => {
                        warn!("failed to get category code array: {err}");
                        0
                    }
                }
            }
            Err(err) => {
                warn!("failed to get category code array: {err}");
                0
            }
        };

        codes.truncate(written.min(codes.len()));
        codes
    }

    /// Render category names into a bounded buffer.
    fn render(&self, categories: &E::Categories) -> Result<String, QueryError> {
        let mut buf = vec![0u8; MAX_RENDERED_LEN];
        let len = self
            .engine
            .categories_to_string(
                self.handle(),
                categories,
                Language::English,
                Encoding::Utf8,
                DEFAULT_DELIMITER,
                &mut buf,
            )
            .map_err(|e| QueryError::new(QueryStep::Render, e))?;

        // Anything after a NUL is residue, not output.
        let len = len.min(buf.len());
        let end = buf[..len].iter().position(|&b| b == 0).unwrap_or(len);
        buf.truncate(end);

        String::from_utf8(buf).map_err(|_| {
            QueryError::new(
                QueryStep::Render,
                EngineError::failed("rendered categories are not valid UTF-8"),
            )
        })
    }
}

fn verbosity_level(verbosity: u8, threshold: u8) -> Level {
    if verbosity >= threshold {
        Level::Info
    } else {
        Level::Debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{bootstrap, SessionConfig};
    use crate::stub::{Event, FailAt, Resource, StubEngine};

    fn session_with(engine: StubEngine) -> EngineSession<StubEngine> {
        bootstrap(engine, SessionConfig::new("SF6S-HH37-G34G-X75H")).expect("bootstrap should succeed")
    }

    fn news_engine() -> StubEngine {
        StubEngine::new().with_rating("www.example.com", &[(7, "News"), (19, "Business")])
    }

    /// (created, destroyed) events for per-query resources, in order.
    fn query_events(engine: &StubEngine) -> Vec<Event> {
        engine
            .events()
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Created(..) | Event::Destroyed(..)))
            .cloned()
            .collect()
    }

    #[test]
    fn test_classify_categorized() {
        let session = session_with(news_engine());
        assert_eq!(session.classify("www.example.com", 0), "News,Business");
    }

    #[test]
    fn test_rate_categorized_details() {
        let session = session_with(news_engine().with_reputation(25));

        match session.rate("www.example.com", 2) {
            Rating::Categorized(m) => {
                assert_eq!(m.names, vec!["News".to_string(), "Business".to_string()]);
                assert_eq!(m.codes, vec![7, 19]);
                assert_eq!(m.reputation, Some(25));
            }
            other => panic!("unexpected rating: {:?}", other),
        }
    }

    #[test]
    fn test_categorized_names_are_non_empty() {
        let session = session_with(news_engine());
        let rendered = session.classify("www.example.com", 0);
        assert!(!rendered.is_empty());
        assert!(rendered.split(DEFAULT_DELIMITER).all(|name| !name.is_empty()));
    }

    #[test]
    fn test_zero_categories_is_uncategorized() {
        let session = session_with(news_engine());
        assert_eq!(session.rate("unknown.example.org", 1), Rating::Uncategorized);
        assert_eq!(session.classify("unknown.example.org", 0), "");
    }

    #[test]
    fn test_single_byte_sentinel_is_uncategorized() {
        let session = session_with(
            StubEngine::new()
                .with_rating("parked.example.net", &[])
                .with_uncategorized_sentinel("-"),
        );
        assert_eq!(session.rate("parked.example.net", 0), Rating::Uncategorized);
        assert_eq!(session.classify("parked.example.net", 0).len(), 0);
    }

    #[test]
    fn test_parse_failure_releases_everything_once() {
        let engine = news_engine().with_bad_url("bad url??");
        let session = session_with(engine);

        let rating = session.rate("bad url??", 0);
        assert!(matches!(rating, Rating::ParseError(_)));
        assert_eq!(session.classify("bad url??", 0), "");

        let events = query_events(session.engine());
        // Two queries, each creating and destroying one of every resource.
        for resource in [Resource::Attributes, Resource::Categories, Resource::Url] {
            let created = events
                .iter()
                .filter(|e| matches!(e, Event::Created(r, _) if *r == resource))
                .count();
            let destroyed = events
                .iter()
                .filter(|e| matches!(e, Event::Destroyed(r, _) if *r == resource))
                .count();
            assert_eq!(created, 2, "{:?} created", resource);
            assert_eq!(destroyed, 2, "{:?} destroyed", resource);
        }
    }

    #[test]
    fn test_teardown_at_every_failure_point() {
        use Resource::{Attributes, Categories, Url};

        let cases: &[(FailAt, &[Resource])] = &[
            (FailAt::CreateAttributes, &[]),
            (FailAt::CreateCategories, &[Attributes]),
            (FailAt::ClearCategories, &[Attributes, Categories]),
            (FailAt::CreateUrl, &[Attributes, Categories]),
            (FailAt::Parse, &[Attributes, Categories, Url]),
            (FailAt::Rate, &[Attributes, Categories, Url]),
            (FailAt::Count, &[Attributes, Categories, Url]),
            (FailAt::ToArray, &[Attributes, Categories, Url]),
            (FailAt::ToString, &[Attributes, Categories, Url]),
        ];

        for (fail_at, acquired) in cases {
            let session = session_with(news_engine().fail_at(*fail_at));
            let _ = session.rate("www.example.com", 0);

            let events = query_events(session.engine());
            let created: Vec<_> = events
                .iter()
                .filter_map(|e| match e {
                    Event::Created(r, id) => Some((*r, *id)),
                    _ => None,
                })
                .collect();
            let mut destroyed: Vec<_> = events
                .iter()
                .filter_map(|e| match e {
                    Event::Destroyed(r, id) => Some((*r, *id)),
                    _ => None,
                })
                .collect();

            let kinds: Vec<_> = created.iter().map(|(r, _)| *r).collect();
            assert_eq!(kinds.as_slice(), *acquired, "acquired at {:?}", fail_at);

            // Released in reverse order of acquisition, each exactly once.
            destroyed.reverse();
            assert_eq!(destroyed, created, "released at {:?}", fail_at);
        }
    }

    #[test]
    fn test_failure_outcomes() {
        let session = session_with(news_engine().fail_at(FailAt::CreateUrl));
        match session.rate("www.example.com", 0) {
            Rating::EngineError(err) => {
                assert_eq!(err.step, QueryStep::AcquireUrl);
                assert!(err.is_setup());
            }
            other => panic!("unexpected rating: {:?}", other),
        }

        let session = session_with(news_engine().fail_at(FailAt::Rate));
        match session.rate("www.example.com", 0) {
            Rating::EngineError(err) => assert_eq!(err.step, QueryStep::Rate),
            other => panic!("unexpected rating: {:?}", other),
        }

        let session = session_with(news_engine().fail_at(FailAt::ToString));
        match session.rate("www.example.com", 0) {
            Rating::EngineError(err) => assert_eq!(err.step, QueryStep::Render),
            other => panic!("unexpected rating: {:?}", other),
        }
    }

    #[test]
    fn test_count_and_array_failures_are_soft() {
        let session = session_with(news_engine().fail_at(FailAt::Count));
        match session.rate("www.example.com", 0) {
            Rating::Categorized(m) => {
                assert_eq!(m.rendered, "News,Business");
                // The retry after the undersized array recovers every code.
                assert_eq!(m.codes, vec![7, 19]);
            }
            other => panic!("unexpected rating: {:?}", other),
        }

        let session = session_with(news_engine().fail_at(FailAt::ToArray));
        match session.rate("www.example.com", 0) {
            Rating::Categorized(m) => {
                assert_eq!(m.rendered, "News,Business");
                assert!(m.codes.is_empty());
            }
            other => panic!("unexpected rating: {:?}", other),
        }
    }

    #[test]
    fn test_overreported_array_length_is_clamped() {
        let session = session_with(news_engine().with_overreported_array());
        match session.rate("www.example.com", 0) {
            Rating::Categorized(m) => assert_eq!(m.codes, vec![7, 19, 0]),
            other => panic!("unexpected rating: {:?}", other),
        }
    }

    #[test]
    fn test_huge_reported_count_is_bounded() {
        let session = session_with(news_engine().with_reported_count(usize::MAX));
        match session.rate("www.example.com", 0) {
            Rating::Categorized(m) => {
                assert_eq!(m.rendered, "News,Business");
                assert_eq!(m.codes, vec![7, 19]);
            }
            other => panic!("unexpected rating: {:?}", other),
        }
    }

    #[test]
    fn test_huge_required_size_skips_retry() {
        let session = session_with(news_engine().with_reported_required(usize::MAX));
        match session.rate("www.example.com", 0) {
            Rating::Categorized(m) => {
                assert_eq!(m.rendered, "News,Business");
                assert!(m.codes.is_empty());
            }
            other => panic!("unexpected rating: {:?}", other),
        }

        let session =
            session_with(news_engine().with_reported_required(MAX_CATEGORY_CODES + 1));
        assert_eq!(session.classify("www.example.com", 0), "News,Business");
    }

    #[test]
    fn test_delimiters_only_is_uncategorized() {
        for sentinel in [",,", " ,", ", , "] {
            let session = session_with(
                StubEngine::new()
                    .with_rating("parked.example.net", &[])
                    .with_uncategorized_sentinel(sentinel),
            );
            assert_eq!(session.rate("parked.example.net", 0), Rating::Uncategorized);
            assert_eq!(session.classify("parked.example.net", 0), "");
        }
    }

    #[test]
    fn test_render_residue_after_nul_is_ignored() {
        let session = session_with(news_engine().with_render_residue());
        assert_eq!(session.classify("www.example.com", 0), "News,Business");
    }

    #[test]
    fn test_invalid_utf8_rendering_is_render_error() {
        let session = session_with(news_engine().with_invalid_utf8());
        match session.rate("www.example.com", 0) {
            Rating::EngineError(err) => assert_eq!(err.step, QueryStep::Render),
            other => panic!("unexpected rating: {:?}", other),
        }
    }

    #[test]
    fn test_query_context_never_reused() {
        let session = session_with(
            news_engine().with_rating("www.example.org", &[(3, "Education")]),
        );

        session.classify("www.example.com", 0);
        session.classify("www.example.org", 0);
        session.classify("www.example.net", 0);

        let ids: Vec<u64> = query_events(session.engine())
            .iter()
            .filter_map(|e| match e {
                Event::Created(_, id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 9);

        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_session_survives_failed_queries() {
        let session = session_with(news_engine().with_bad_url("::"));
        assert!(matches!(session.rate("::", 0), Rating::ParseError(_)));
        assert_eq!(session.classify("www.example.com", 0), "News,Business");

        let destroyed = session
            .engine()
            .events()
            .borrow()
            .iter()
            .filter(|e| **e == Event::SessionDestroyed)
            .count();
        assert_eq!(destroyed, 0);
    }

    #[test]
    fn test_rating_accessors() {
        assert_eq!(Rating::Uncategorized.rendered(), "");
        assert_eq!(Rating::Uncategorized.status(), "uncategorized");
        assert_eq!(
            Rating::ParseError(EngineError::failed("bad")).status(),
            "parse-error"
        );
        assert!(!Rating::Uncategorized.is_categorized());
    }
}
