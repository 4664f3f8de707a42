use reqwest::{Client, Method};
use std::time::Instant;

use super::{ProbeFailure, ProbeOutcome};
use crate::models::{HttpMethod, HttpProbe, Target};

fn configured(keyword: &Option<String>) -> Option<&str> {
    keyword.as_deref().filter(|k| !k.trim().is_empty())
}

/// Applies the pass rules to a received response: status code first, then the
/// forbidden keyword, then the required keyword.
pub fn evaluate_http_response(params: &HttpProbe, status_code: u16, body: &str) -> Result<(), ProbeFailure> {
    if !params.expected_status_codes.contains(&status_code) {
        return Err(ProbeFailure::UnexpectedStatus(status_code));
    }
    if let Some(forbidden) = configured(&params.forbidden_keyword) {
        if body.contains(forbidden) {
            return Err(ProbeFailure::ForbiddenKeyword(forbidden.to_string()));
        }
    }
    if let Some(expected) = configured(&params.expected_keyword) {
        if !body.contains(expected) {
            return Err(ProbeFailure::KeywordMissing(expected.to_string()));
        }
    }
    Ok(())
}

fn needs_body(params: &HttpProbe) -> bool {
    params.method != HttpMethod::Head
        && (configured(&params.expected_keyword).is_some()
            || configured(&params.forbidden_keyword).is_some())
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
    }
}

pub async fn check(client: &Client, target: &Target, params: &HttpProbe) -> ProbeOutcome {
    let started = Instant::now();
    let timeout = target.timeout();

    let response = match client
        .request(to_method(params.method), &target.url)
        .timeout(timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            return ProbeOutcome::down(started, 0, ProbeFailure::Timeout(timeout.as_secs()));
        }
        Err(e) => return ProbeOutcome::down(started, 0, ProbeFailure::Transport(e.to_string())),
    };

    let status_code = response.status().as_u16();
    let body = if needs_body(params) {
        match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                return ProbeOutcome::down(started, status_code, ProbeFailure::Timeout(timeout.as_secs()));
            }
            Err(_) => String::new(),
        }
    } else {
        String::new()
    };

    ProbeOutcome::from_result(started, status_code, evaluate_http_response(params, status_code, &body))
}
