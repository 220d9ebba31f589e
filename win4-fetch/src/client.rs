use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{truncate_body, FetchError};
use crate::normalize::RawDrawRecord;

/// Estimation utilisée quand les métadonnées ne donnent pas de nombre de lignes.
pub const FALLBACK_ESTIMATE: u64 = 50_000;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub trait Transport {
    /// Une requête GET ; seules les erreurs réseau remontent en `Err`.
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        app_token: Option<&str>,
    ) -> Result<HttpResponse, FetchError>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        app_token: Option<&str>,
    ) -> Result<HttpResponse, FetchError> {
        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json");
        if let Some(token) = app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request.send().map_err(|e| FetchError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }

    /// base * 2^attempt, plafonné à `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

enum RetryState {
    Attempt(u32),
    Backoff { attempt: u32, error: FetchError },
    Done(String),
    Failed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageTermination {
    /// S'arrête sur une page vide (robuste aux pages courtes non finales)
    #[default]
    EmptyPage,
    /// S'arrête dès qu'une page contient moins de lignes que demandé
    ShortPage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub select: Option<String>,
    pub order: String,
    pub where_clause: Option<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            select: None,
            order: "draw_date DESC".to_string(),
            where_clause: None,
        }
    }
}

impl PageQuery {
    pub fn since(date: NaiveDate) -> Self {
        Self {
            where_clause: Some(format!("draw_date >= '{}'", date.format("%Y-%m-%d"))),
            ..Self::default()
        }
    }

    fn params(&self, offset: usize, limit: usize) -> Vec<(String, String)> {
        let mut params = vec![
            ("$limit".to_string(), limit.to_string()),
            ("$offset".to_string(), offset.to_string()),
            ("$order".to_string(), self.order.clone()),
        ];
        if let Some(select) = &self.select {
            params.push(("$select".to_string(), select.clone()));
        }
        if let Some(clause) = &self.where_clause {
            params.push(("$where".to_string(), clause.clone()));
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Freshness {
    pub data_updated: Option<DateTime<Utc>>,
    pub rows_updated: Option<DateTime<Utc>>,
    pub metadata_updated: Option<DateTime<Utc>>,
}

fn timestamp_field(metadata: &Value, key: &str) -> Option<DateTime<Utc>> {
    metadata
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

pub struct FetchClient<T: Transport = ReqwestTransport> {
    config: ApiConfig,
    transport: T,
    retry: RetryPolicy,
    termination: PageTermination,
}

impl FetchClient<ReqwestTransport> {
    pub fn new(config: ApiConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> FetchClient<T> {
    pub fn with_transport(config: ApiConfig, transport: T) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            config,
            transport,
            retry,
            termination: PageTermination::default(),
        }
    }

    pub fn with_termination(mut self, termination: PageTermination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn failure(&self, attempt: u32, error: FetchError) -> RetryState {
        if !error.is_transient() {
            return RetryState::Failed(error);
        }
        if attempt + 1 >= self.retry.max_attempts {
            return RetryState::Failed(FetchError::RetriesExhausted {
                attempts: attempt + 1,
                last: Box::new(error),
            });
        }
        RetryState::Backoff { attempt, error }
    }

    /// GET avec reprise bornée sur 429/5xx/erreur réseau.
    fn get_with_retry(&self, url: &str, query: &[(String, String)]) -> Result<String, FetchError> {
        let token = self.config.app_token.as_deref();
        let mut state = RetryState::Attempt(0);
        loop {
            state = match state {
                RetryState::Attempt(attempt) => match self.transport.get(url, query, token) {
                    Ok(resp) if (200..300).contains(&resp.status) => RetryState::Done(resp.body),
                    Ok(resp) => {
                        let error = FetchError::Status {
                            url: url.to_string(),
                            status: resp.status,
                            body: truncate_body(&resp.body),
                        };
                        self.failure(attempt, error)
                    }
                    Err(error) => self.failure(attempt, error),
                },
                RetryState::Backoff { attempt, error } => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Tentative {}/{} échouée ({}), nouvel essai dans {:?}",
                        attempt + 1,
                        self.retry.max_attempts,
                        error,
                        delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    RetryState::Attempt(attempt + 1)
                }
                RetryState::Done(body) => return Ok(body),
                RetryState::Failed(error) => return Err(error),
            };
        }
    }

    pub fn metadata(&self) -> Result<Value, FetchError> {
        let body = self.get_with_retry(&self.config.metadata_url(), &[])?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Nombre de lignes approximatif, pour l'affichage de progression uniquement.
    pub fn estimated_count(&self) -> u64 {
        match self.metadata() {
            Ok(meta) => meta
                .get("rowCount")
                .and_then(Value::as_u64)
                .unwrap_or(FALLBACK_ESTIMATE),
            Err(e) => {
                warn!("Métadonnées indisponibles ({}), estimation par défaut", e);
                FALLBACK_ESTIMATE
            }
        }
    }

    pub fn freshness(&self) -> Result<Freshness, FetchError> {
        let meta = self.metadata()?;
        Ok(Freshness {
            data_updated: timestamp_field(&meta, "dataUpdatedAt"),
            rows_updated: timestamp_field(&meta, "rowsUpdatedAt"),
            metadata_updated: timestamp_field(&meta, "viewLastModified"),
        })
    }

    pub fn fetch_page(
        &self,
        query: &PageQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawDrawRecord>, FetchError> {
        let params = query.params(offset, limit);
        let body = self.get_with_retry(&self.config.resource_url(), &params)?;
        let records: Vec<RawDrawRecord> = serde_json::from_str(&body)?;
        debug!("Page offset={} : {} lignes", offset, records.len());
        Ok(records)
    }

    fn paginate(
        &self,
        query: &PageQuery,
        chunk_size: usize,
        estimated_total: u64,
        mut on_progress: Option<&mut dyn FnMut(usize, u64)>,
    ) -> Result<Vec<RawDrawRecord>, FetchError> {
        let chunk_size = chunk_size.max(1);
        let throttle = Duration::from_millis(self.config.throttle_ms);
        let mut all_records = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = self.fetch_page(query, offset, chunk_size)?;
            let received = page.len();
            if received == 0 {
                break;
            }

            all_records.extend(page);
            offset += received;

            if let Some(callback) = on_progress.as_deref_mut() {
                callback(all_records.len(), estimated_total);
            }

            if self.termination == PageTermination::ShortPage && received < chunk_size {
                break;
            }
            if !throttle.is_zero() {
                std::thread::sleep(throttle);
            }
        }

        info!("{} enregistrements récupérés", all_records.len());
        Ok(all_records)
    }

    /// Toutes les lignes du jeu de données, page par page.
    pub fn fetch_all(
        &self,
        query: &PageQuery,
        chunk_size: usize,
        on_progress: Option<&mut dyn FnMut(usize, u64)>,
    ) -> Result<Vec<RawDrawRecord>, FetchError> {
        let estimated_total = if on_progress.is_some() {
            self.estimated_count()
        } else {
            0
        };
        self.paginate(query, chunk_size, estimated_total, on_progress)
    }

    /// Tirages des `days` derniers jours (≈ 2 tirages par jour pour l'estimation).
    pub fn fetch_recent(
        &self,
        days: u32,
        today: NaiveDate,
        on_progress: Option<&mut dyn FnMut(usize, u64)>,
    ) -> Result<Vec<RawDrawRecord>, FetchError> {
        // au-delà du calendrier, tout l'historique
        let query = match today.checked_sub_days(chrono::Days::new(u64::from(days))) {
            Some(cutoff) => PageQuery::since(cutoff),
            None => PageQuery::default(),
        };
        self.paginate(&query, self.config.chunk_size, u64::from(days) * 2, on_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        pages: RefCell<VecDeque<Result<HttpResponse, FetchError>>>,
        metadata: Option<String>,
        calls: RefCell<Vec<Vec<(String, String)>>>,
    }

    impl ScriptedTransport {
        fn new(pages: Vec<Result<HttpResponse, FetchError>>) -> Self {
            Self {
                pages: RefCell::new(pages.into()),
                metadata: None,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn with_metadata(mut self, body: &str) -> Self {
            self.metadata = Some(body.to_string());
            self
        }

        fn page_calls(&self) -> usize {
            self.calls.borrow().len()
        }

        fn offsets(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|q| q.iter().find(|(k, _)| k == "$offset").map(|(_, v)| v.clone()))
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(
            &self,
            url: &str,
            query: &[(String, String)],
            _app_token: Option<&str>,
        ) -> Result<HttpResponse, FetchError> {
            if url.contains("/api/views/") {
                return Ok(match &self.metadata {
                    Some(body) => ok(body),
                    None => HttpResponse { status: 404, body: "not found".into() },
                });
            }
            self.calls.borrow_mut().push(query.to_vec());
            self.pages
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(ok("[]")))
        }
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse { status: 200, body: body.to_string() }
    }

    fn status(code: u16) -> Result<HttpResponse, FetchError> {
        Ok(HttpResponse { status: code, body: "upstream says no".into() })
    }

    fn page(n: usize) -> Result<HttpResponse, FetchError> {
        let rows: Vec<String> = (0..n)
            .map(|i| {
                format!(
                    r#"{{"draw_date":"2024-01-{:02}T00:00:00.000","midday_win_4":"{:04}","evening_win_4":"{:04}"}}"#,
                    i % 28 + 1,
                    i,
                    9999 - i
                )
            })
            .collect();
        Ok(ok(&format!("[{}]", rows.join(","))))
    }

    fn client(transport: ScriptedTransport) -> FetchClient<ScriptedTransport> {
        let config = ApiConfig {
            retry_delay_ms: 0,
            ..ApiConfig::default()
        };
        FetchClient::with_transport(config, transport)
    }

    #[test]
    fn test_paginates_until_empty_page() {
        let transport = ScriptedTransport::new(vec![page(3), page(3), page(2), page(0)]);
        let client = client(transport);
        let records = client.fetch_all(&PageQuery::default(), 3, None).unwrap();

        assert_eq!(records.len(), 8);
        assert_eq!(client.transport.page_calls(), 4);
        // le court non final ne stoppe pas la boucle ; l'offset avance du nombre reçu
        assert_eq!(client.transport.offsets(), vec!["0", "3", "6", "8"]);
    }

    #[test]
    fn test_short_page_termination() {
        let transport = ScriptedTransport::new(vec![page(3), page(2), page(3)]);
        let client = client(transport).with_termination(PageTermination::ShortPage);
        let records = client.fetch_all(&PageQuery::default(), 3, None).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(client.transport.page_calls(), 2);
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let transport = ScriptedTransport::new(vec![
            status(503),
            Err(FetchError::Network("connexion réinitialisée".into())),
            page(2),
            status(429),
            page(1),
            page(0),
        ]);
        let client = client(transport);
        let records = client.fetch_all(&PageQuery::default(), 2, None).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(client.transport.page_calls(), 6);
    }

    #[test]
    fn test_retry_cap_raises_fetch_error() {
        let transport = ScriptedTransport::new(vec![status(500), status(502), status(503), page(1)]);
        let client = client(transport);
        let err = client.fetch_all(&PageQuery::default(), 10, None).unwrap_err();

        match err {
            FetchError::RetriesExhausted { attempts, ref last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(**last, FetchError::Status { status: 503, .. }));
            }
            other => panic!("erreur inattendue : {other:?}"),
        }
        assert_eq!(client.transport.page_calls(), 3);
    }

    #[test]
    fn test_non_transient_fails_immediately() {
        let transport = ScriptedTransport::new(vec![status(404), page(1)]);
        let client = client(transport);
        let err = client.fetch_all(&PageQuery::default(), 10, None).unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(matches!(err, FetchError::Status { .. }));
        assert_eq!(client.transport.page_calls(), 1);
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let transport = ScriptedTransport::new(vec![Ok(ok("<html>"))]);
        let client = client(transport);
        let err = client.fetch_all(&PageQuery::default(), 10, None).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_progress_is_observational() {
        let transport = ScriptedTransport::new(vec![page(2), page(2), page(0)])
            .with_metadata(r#"{"rowCount": 4}"#);
        let client = client(transport);

        let mut seen = Vec::new();
        let mut on_progress = |fetched: usize, total: u64| seen.push((fetched, total));
        let records = client
            .fetch_all(&PageQuery::default(), 2, Some(&mut on_progress))
            .unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(seen, vec![(2, 4), (4, 4)]);
    }

    #[test]
    fn test_estimate_never_stops_pagination() {
        // estimation trop basse : la boucle continue jusqu'à la page vide
        let transport = ScriptedTransport::new(vec![page(2), page(2), page(2), page(0)])
            .with_metadata(r#"{"rowCount": 1}"#);
        let client = client(transport);
        let mut on_progress = |_: usize, _: u64| {};
        let records = client
            .fetch_all(&PageQuery::default(), 2, Some(&mut on_progress))
            .unwrap();
        assert_eq!(records.len(), 6);
    }

    #[test]
    fn test_estimated_count_fallback() {
        let client = client(ScriptedTransport::new(vec![]));
        assert_eq!(client.estimated_count(), FALLBACK_ESTIMATE);
    }

    #[test]
    fn test_freshness_from_metadata() {
        let transport = ScriptedTransport::new(vec![])
            .with_metadata(r#"{"dataUpdatedAt": 1704067200, "rowsUpdatedAt": 1704067200}"#);
        let freshness = client(transport).freshness().unwrap();
        assert_eq!(
            freshness.data_updated.map(|d| d.date_naive()),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert!(freshness.metadata_updated.is_none());
    }

    #[test]
    fn test_fetch_recent_uses_where_clause() {
        let transport = ScriptedTransport::new(vec![page(1), page(0)]);
        let client = client(transport);
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        client.fetch_recent(30, today, None).unwrap();

        let calls = client.transport.calls.borrow();
        let clause = calls[0].iter().find(|(k, _)| k == "$where").map(|(_, v)| v.as_str());
        assert_eq!(clause, Some("draw_date >= '2024-03-01'"));
    }

    #[test]
    fn test_fetch_recent_beyond_calendar_fetches_everything() {
        let transport = ScriptedTransport::new(vec![page(1), page(0)]);
        let client = client(transport);
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        client.fetch_recent(u32::MAX, today, None).unwrap();

        let calls = client.transport.calls.borrow();
        assert!(calls[0].iter().all(|(k, _)| k != "$where"));
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
        };
        let delays: Vec<u64> = (0..7).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 20, 20]);
        assert_eq!(policy.delay_for(64), Duration::from_secs(20));
    }

    #[test]
    fn test_query_params() {
        let query = PageQuery {
            select: Some("draw_date,midday_win_4".into()),
            ..PageQuery::default()
        };
        let params = query.params(20, 10);
        assert!(params.contains(&("$limit".to_string(), "10".to_string())));
        assert!(params.contains(&("$offset".to_string(), "20".to_string())));
        assert!(params.contains(&("$select".to_string(), "draw_date,midday_win_4".to_string())));
        assert!(!params.iter().any(|(k, _)| k == "$where"));
    }
}
