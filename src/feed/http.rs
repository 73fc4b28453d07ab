//! HTTP filter-stream transport: a long-lived POST whose body is newline-delimited
//! JSON, one event per line, with blank keep-alive lines in between.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::oauth::{authorization_header, encode_pairs};
use super::{FeedError, FeedTransport, StreamFilter};
use crate::credentials::Credentials;
use crate::ingest::types::{MalformedEvent, RawEvent};

/// Longest feed line accepted. A single post is a few KB.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

pub struct HttpFeedTransport {
    http: reqwest::Client,
    endpoint: String,
    creds: Credentials,
    response: Option<reqwest::Response>,
    lines: LineBuffer,
}

impl HttpFeedTransport {
    pub fn new(endpoint: String, creds: Credentials) -> Result<Self, reqwest::Error> {
        // No overall timeout: the response body stays open for the whole session.
        let http = reqwest::Client::builder()
            .user_agent("stream-sentiment/0.1")
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            creds,
            response: None,
            lines: LineBuffer::new(MAX_LINE_BYTES),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line {
    Complete(String),
    /// A line passed the cap; its bytes are discarded up to the next newline.
    Oversized(usize),
}

/// Byte buffer between body chunks and feed lines.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
    limit: usize,
    discarding: bool,
}

impl LineBuffer {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            discarding: false,
        }
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Next complete line without its `\r\n`, or `None` until more bytes arrive.
    pub(crate) fn next_line(&mut self) -> Option<Line> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.discarding {
                    self.buf.clear();
                } else if self.buf.len() > self.limit {
                    let n = self.buf.len();
                    self.buf.clear();
                    self.discarding = true;
                    return Some(Line::Oversized(n));
                }
                return None;
            };
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if raw.len() > self.limit {
                return Some(Line::Oversized(raw.len()));
            }
            let s = String::from_utf8_lossy(&raw);
            return Some(Line::Complete(s.trim_end_matches(['\r', '\n']).to_string()));
        }
    }

    /// Whatever is left once the body has ended.
    pub(crate) fn take_rest(&mut self) -> String {
        let rest = if self.discarding {
            String::new()
        } else {
            String::from_utf8_lossy(&self.buf).trim().to_string()
        };
        self.clear();
        rest
    }
}

fn oversized(n: usize) -> FeedError {
    FeedError::Malformed(MalformedEvent(format!(
        "line of {n} bytes exceeds {MAX_LINE_BYTES}"
    )))
}

#[async_trait::async_trait]
impl FeedTransport for HttpFeedTransport {
    async fn open(&mut self, filter: &StreamFilter) -> Result<(), FeedError> {
        self.response = None;
        self.lines.clear();

        let params = vec![
            ("track".to_string(), filter.track_param()),
            ("language".to_string(), filter.language.clone()),
        ];
        let auth = authorization_header(&self.creds, "POST", &self.endpoint, &params)
            .map_err(|e| FeedError::Network(format!("signing request: {e}")))?;

        let resp = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_pairs(&params))
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::from_status(status.as_u16()));
        }
        self.response = Some(resp);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<RawEvent, FeedError>> {
        loop {
            match self.lines.next_line() {
                Some(Line::Complete(line)) if line.trim().is_empty() => continue, // keep-alive
                Some(Line::Complete(line)) => {
                    return Some(RawEvent::from_line(&line).map_err(FeedError::from))
                }
                Some(Line::Oversized(n)) => return Some(Err(oversized(n))),
                None => {}
            }

            let resp = self.response.as_mut()?;
            match resp.chunk().await {
                Ok(Some(bytes)) => self.lines.extend(&bytes),
                Ok(None) => {
                    self.response = None;
                    let rest = self.lines.take_rest();
                    if rest.is_empty() {
                        return None;
                    }
                    return Some(RawEvent::from_line(&rest).map_err(FeedError::from));
                }
                Err(e) => {
                    self.response = None;
                    self.lines.clear();
                    return Some(Err(FeedError::Network(e.to_string())));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.response = None;
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_crlf_lines_and_keeps_partial_tail() {
        let mut lines = LineBuffer::new(MAX_LINE_BYTES);
        lines.extend(b"{\"a\":1}\r\n\r\n{\"b\"");
        assert_eq!(lines.next_line(), Some(Line::Complete("{\"a\":1}".into())));
        assert_eq!(lines.next_line(), Some(Line::Complete(String::new())));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.take_rest(), "{\"b\"");
    }

    #[test]
    fn unterminated_line_is_capped_then_skipped() {
        let mut lines = LineBuffer::new(8);
        lines.extend(b"0123456789");
        assert_eq!(lines.next_line(), Some(Line::Oversized(10)));
        // The rest of that line is dropped; the next one comes through.
        lines.extend(b"abcdef\n{}\n");
        assert_eq!(lines.next_line(), Some(Line::Complete("{}".into())));
        assert_eq!(lines.next_line(), None);
        assert!(lines.buf.is_empty());
    }

    #[test]
    fn complete_oversized_line_is_reported() {
        let mut lines = LineBuffer::new(4);
        lines.extend(b"123456\nok\n");
        assert_eq!(lines.next_line(), Some(Line::Oversized(7)));
        assert_eq!(lines.next_line(), Some(Line::Complete("ok".into())));
    }

    #[test]
    fn oversized_line_maps_to_malformed_event() {
        assert!(matches!(oversized(MAX_LINE_BYTES + 1), FeedError::Malformed(_)));
    }

    #[tokio::test]
    async fn unopened_transport_is_terminated() {
        let creds = Credentials {
            consumer_key: "k".into(),
            consumer_secret: "s".into(),
            access_token: "t".into(),
            access_token_secret: "ts".into(),
        };
        let mut t = HttpFeedTransport::new("http://127.0.0.1:9/never".into(), creds).unwrap();
        assert!(t.next_event().await.is_none());
    }
}
