use crate::config::BackendConfig;
use crate::driver;
use futures_util::StreamExt;
use scholarstream_core::status::SseBuffer;
use scholarstream_core::{
    ChatReply, ChatRequest, Error, EventSink, IngestStats, PaperRecord, ProcessPdfReply, Result,
    StatusUpdate, Step,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub year_filter: String,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scholarstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::NotConfigured(format!("http client: {e}")))?;
        Ok(Self::with_http(http, config))
    }

    pub fn with_http(http: reqwest::Client, config: BackendConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn search_request(&self, query: &str, year_filter: Option<&str>) -> SearchRequest {
        SearchRequest {
            query: query.trim().to_string(),
            year_filter: year_filter
                .map(str::trim)
                .unwrap_or(self.config.year_filter.as_str())
                .to_string(),
        }
    }

    /// POST `/stream_search` and fold the NDJSON body into `sink`.
    ///
    /// `on_step` runs after every applied (or skipped) line with the sink in
    /// its updated state. On a transport failure the error is returned and
    /// everything merged so far stays in `sink`.
    #[tracing::instrument(skip_all, fields(query = %req.query, year_filter = %req.year_filter))]
    pub async fn stream_search<T, F>(
        &self,
        req: &SearchRequest,
        sink: &mut T,
        on_step: F,
    ) -> Result<IngestStats>
    where
        T: EventSink,
        F: FnMut(&Step, &T),
    {
        let url = self.config.endpoint("stream_search")?;
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .json(req)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let resp = ensure_success(resp).await?;
        tracing::debug!("search stream opened");
        driver::drive(resp.bytes_stream(), sink, on_step).await
    }

    #[tracing::instrument(skip_all, fields(chat_id = ?req.chat_id))]
    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatReply> {
        if req.message.trim().is_empty() {
            return Err(Error::InvalidInput("Message is required".to_string()));
        }
        let url = self.config.endpoint("chat")?;
        let resp = self
            .http
            .post(url)
            .timeout(self.config.timeout())
            .json(req)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        json_body(resp).await
    }

    /// Ask the backend to download a paper's PDF and open a chat about it.
    #[tracing::instrument(skip(self))]
    pub async fn process_pdf(&self, pdf_url: &str) -> Result<ProcessPdfReply> {
        let pdf_url = pdf_url.trim();
        if pdf_url.is_empty() {
            return Err(Error::InvalidInput("PDF URL is required".to_string()));
        }
        let mut url = self.config.endpoint("process-pdf")?;
        url.query_pairs_mut().append_pair("url", pdf_url);
        let resp = self
            .http
            .get(url)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        json_body(resp).await
    }

    pub async fn generate_timeline(&self, papers: &[PaperRecord]) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            timeline: Option<String>,
        }
        let r: Resp = self.analysis("generate_timeline", papers).await?;
        r.timeline
            .ok_or_else(|| Error::Backend("backend returned no timeline".to_string()))
    }

    pub async fn generate_future_work(&self, papers: &[PaperRecord]) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            future_work: Option<String>,
        }
        let r: Resp = self.analysis("generate_future_work", papers).await?;
        r.future_work
            .ok_or_else(|| Error::Backend("backend returned no future work".to_string()))
    }

    #[tracing::instrument(skip(self, papers), fields(papers = papers.len()))]
    async fn analysis<T: serde::de::DeserializeOwned>(
        &self,
        route: &str,
        papers: &[PaperRecord],
    ) -> Result<T> {
        #[derive(Serialize)]
        struct Req<'a> {
            papers: &'a [PaperRecord],
        }
        let url = self.config.endpoint(route)?;
        let resp = self
            .http
            .post(url)
            .timeout(self.config.timeout())
            .json(&Req { papers })
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        json_body(resp).await
    }

    /// Look up one record by id for re-display. `Ok(None)` when the backend
    /// does not know the id.
    pub async fn paper(&self, paper_id: &str) -> Result<Option<PaperRecord>> {
        let mut url = self.config.endpoint("paper")?;
        url.path_segments_mut()
            .map_err(|_| Error::NotConfigured("base url cannot carry a path".to_string()))?
            .push(paper_id);
        let resp = self
            .http
            .get(url)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: serde_json::Value = json_body(resp).await?;
        PaperRecord::from_value(raw)
            .map(Some)
            .ok_or_else(|| Error::Decode(format!("paper {paper_id:?}: no usable paper_id")))
    }

    /// Follow `/status` and report every update. Stops after `limit` status
    /// messages (heartbeats do not count) or when the server closes the
    /// stream. Returns the number of status messages seen.
    pub async fn follow_status<F>(&self, limit: Option<usize>, mut on_update: F) -> Result<usize>
    where
        F: FnMut(&StatusUpdate),
    {
        if limit == Some(0) {
            return Ok(0);
        }
        let url = self.config.endpoint("status")?;
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let resp = ensure_success(resp).await?;

        let mut sse = SseBuffer::new();
        let mut seen = 0usize;
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::Transport(e.to_string()))?;
            for u in sse.push(&chunk) {
                on_update(&u);
                if matches!(u, StatusUpdate::Status(_)) {
                    seen += 1;
                    if limit.is_some_and(|n| seen >= n) {
                        return Ok(seen);
                    }
                }
            }
        }
        Ok(seen)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    Err(error_from(resp).await)
}

async fn error_from(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    if let Ok(ErrorBody { error: Some(msg) }) = serde_json::from_str::<ErrorBody>(&text) {
        return Error::Backend(msg);
    }
    let message: String = text.trim().chars().take(200).collect();
    tracing::error!(status, "backend request failed");
    Error::Http { status, message }
}

async fn json_body<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let resp = ensure_success(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| Error::Decode(e.to_string()))
}
