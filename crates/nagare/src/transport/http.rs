use reqwest::header::{ACCEPT, RANGE};
use url::Url;

use super::{ContentRange, RangeResponse, RangeTransport};
use crate::{
    error::{NagareError, NagareResult},
    span::RangeSpan,
    util::http::HttpClient,
};

#[derive(Clone, Default)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl RangeTransport for HttpTransport {
    fn fetch(
        &self,
        url: &Url,
        span: RangeSpan,
    ) -> impl std::future::Future<Output = NagareResult<RangeResponse>> + Send + 'static {
        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "*/*")
            .header(RANGE, span.to_http_range());

        async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                if let Ok(body) = response.text().await {
                    tracing::warn!("Error body: {body}");
                }
                return Err(NagareError::HttpError(status));
            }

            let content_range = ContentRange::from_headers(response.headers());
            let body = response.bytes().await?;
            tracing::debug!(
                "Fetched {} bytes for {span} (content-range: {content_range:?})",
                body.len()
            );

            Ok(RangeResponse::new(content_range, body))
        }
    }
}
