use nagare::{HttpClient, HttpTransport, NagareError, RangeSpan, RangeTransport};
use reqwest::Client;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

use crate::AssertWrapper;

/// Serves `bytes=a-b` requests the way a range-capable file server does.
pub struct RangeResponder(pub Vec<u8>);

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let total = self.0.len();
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split_once('-'));
        let Some((start, end)) = range else {
            return ResponseTemplate::new(200).set_body_bytes(self.0.clone());
        };

        let start: usize = start.parse().unwrap();
        let end = end.parse::<usize>().unwrap().min(total - 1);
        if start >= total {
            return ResponseTemplate::new(416)
                .insert_header("content-range", format!("bytes */{total}"));
        }
        ResponseTemplate::new(206)
            .insert_header("content-range", format!("bytes {start}-{end}/{total}"))
            .set_body_bytes(self.0[start..=end].to_vec())
    }
}

pub async fn setup_range_server(data: Vec<u8>) -> (url::Url, MockServer) {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(RangeResponder(data))
        .mount(&mock_server)
        .await;

    let url = url::Url::parse(&format!("{}/video.mp4", mock_server.uri())).unwrap();
    (url, mock_server)
}

#[tokio::test]
async fn test_fetch_partial_content() -> anyhow::Result<()> {
    let data: Vec<u8> = (0..100).collect();
    let (url, _server) = setup_range_server(data).await;

    let transport = HttpTransport::default();
    let response = transport.fetch(&url, RangeSpan::new(10, 10)?).await?;

    let range = response.content_range.as_ref().assert_success();
    assert_eq!((range.start, range.end, range.length), (10, 19, Some(100)));
    assert_eq!(response.total_length(), Some(100));
    assert_eq!(response.body.as_ref(), (10..20).collect::<Vec<u8>>().as_slice());

    Ok(())
}

#[tokio::test]
async fn test_fetch_without_range_support() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
        .mount(&mock_server)
        .await;
    let url = url::Url::parse(&format!("{}/video.mp4", mock_server.uri()))?;

    let span = RangeSpan::new(0, 16)?;
    let response = HttpTransport::default().fetch(&url, span).await?;
    assert_eq!(response.body.len(), 64);
    assert_eq!(response.total_length(), Some(64));
    assert_eq!(response.start(&span), 0);

    Ok(())
}

#[tokio::test]
async fn test_fetch_http_error() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&mock_server)
        .await;
    let url = url::Url::parse(&format!("{}/video.mp4", mock_server.uri()))?;

    let result = HttpTransport::default()
        .fetch(&url, RangeSpan::new(0, 16)?)
        .await;
    assert!(matches!(result, Err(NagareError::HttpError(status)) if status.as_u16() == 404));

    Ok(())
}

#[tokio::test]
async fn test_fetch_sends_cookies() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .and(header("cookie", "session=abc"))
        .and(header("range", "bytes=0-3"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-3/4")
                .set_body_bytes(b"ftyp".to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    let url = url::Url::parse(&format!("{}/video.mp4", mock_server.uri()))?;

    let client = HttpClient::new(Client::builder())?;
    client.add_cookies(vec!["session=abc".to_string()], url.clone())?;
    let response = HttpTransport::new(client)
        .fetch(&url, RangeSpan::new(0, 4)?)
        .await?;
    assert_eq!(response.body.as_ref(), b"ftyp");

    Ok(())
}
