use serde::Deserialize;

use super::client::WootricClientError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange client credentials for a bearer token.
///
/// One exchange per run; a failure here is fatal before any entity sync.
pub(crate) async fn request_access_token(
    http: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, WootricClientError> {
    let url = format!("{base_url}/oauth/token");
    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WootricClientError::AccessToken(format!("{status}: {body}")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| WootricClientError::AccessToken(format!("malformed token response: {e}")))?;

    Ok(token.access_token)
}
