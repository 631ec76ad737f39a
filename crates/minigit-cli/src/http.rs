//! Smart-HTTP transport over a blocking `reqwest` client.

use crate::error::Result;
use minigit_transfer::{TransferError, Transport};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;

/// Talks to one remote repository URL.
pub struct HttpTransport {
    client: Client,
    base: String,
}

impl HttpTransport {
    /// Creates a transport for `url`, e.g. `https://example.com/owner/repo.git`.
    pub fn new(url: &str, user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base: url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> minigit_transfer::Result<Vec<u8>> {
        let url = self.url(path);
        tracing::debug!(url = %url, "GET");
        let response = self.client.get(&url).send().map_err(transport_error)?;
        read_body(response)
    }

    fn post(&self, path: &str, body: &[u8], content_type: &str) -> minigit_transfer::Result<Vec<u8>> {
        let url = self.url(path);
        tracing::debug!(url = %url, bytes = body.len(), "POST");
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .map_err(transport_error)?;
        read_body(response)
    }
}

fn read_body(response: Response) -> minigit_transfer::Result<Vec<u8>> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::Transport(format!(
            "{} returned {}",
            response.url(),
            status
        )));
    }
    let body = response.bytes().map_err(transport_error)?;
    tracing::debug!(status = %status, bytes = body.len(), "response");
    Ok(body.to_vec())
}

#[allow(clippy::needless_pass_by_value)]
fn transport_error(error: reqwest::Error) -> TransferError {
    TransferError::Transport(error.to_string())
}
