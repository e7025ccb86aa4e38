use markload_core::{Cookies, JobReport, QueueItem};
use markload_logging::markload_debug;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ClientSettings, ConversionApi, EngineError, StatusError, SubmitError};

const PDF_MIME: &str = "application/pdf";

/// [`ConversionApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConversionClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpConversionClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, EngineError> {
        let base_url = Url::parse(&settings.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| EngineError::InvalidServiceUrl(settings.base_url.clone()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { base_url, client })
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    async fn multipart_form(item: &QueueItem) -> Result<Form, SubmitError> {
        let path = item
            .file_path
            .as_ref()
            .ok_or_else(|| SubmitError::File(format!("item {} has no file path", item.id)))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| SubmitError::File(format!("{}: {err}", path.display())))?;
        let part_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        let part = Part::bytes(bytes)
            .file_name(part_name)
            .mime_str(PDF_MIME)
            .map_err(|err| SubmitError::File(err.to_string()))?;
        Ok(Form::new()
            .part("file", part)
            .text("filename", item.filename.clone()))
    }
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    url: &'a str,
    filename: &'a str,
    cookies: Cookies,
    html: Option<&'a str>,
}

impl<'a> SubmitBody<'a> {
    fn from_item(item: &'a QueueItem) -> Self {
        Self {
            url: &item.url,
            filename: &item.filename,
            cookies: item.cookies.clone().unwrap_or_default(),
            html: item.html.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "jobId", default)]
    job_id: Option<Value>,
}

#[async_trait::async_trait]
impl ConversionApi for HttpConversionClient {
    async fn submit(&self, item: &QueueItem) -> Result<String, SubmitError> {
        let endpoint = item.content_type.endpoint().trim_start_matches('/');
        let url = self.url_for(&[endpoint]);
        markload_debug!("POST {} for item {}", url, item.id);

        let request = if item.content_type.is_file_backed() {
            self.client.post(url).multipart(Self::multipart_form(item).await?)
        } else {
            self.client.post(url).json(&SubmitBody::from_item(item))
        };

        let response = request.send().await.map_err(network_error)?;
        let status = response.status();
        let body = response.text().await.map_err(network_error)?;
        if !status.is_success() {
            return Err(SubmitError::Rejected(error_message(status, &body)));
        }
        parse_job_id(&body)
    }

    async fn status(&self, job_id: &str) -> Result<JobReport, StatusError> {
        let url = self.url_for(&["jobs", job_id]);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| StatusError::Transient(describe(&err)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StatusError::NotFound);
        }
        if !status.is_success() {
            return Err(StatusError::Transient(format!("HTTP {}", status.as_u16())));
        }
        response
            .json::<JobReport>()
            .await
            .map_err(|err| StatusError::Transient(format!("unreadable status body: {err}")))
    }
}

/// The most useful explanation a failed response offers: a JSON `detail`
/// field, else the raw body, else the status code.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        match fields.get("detail") {
            Some(Value::String(detail)) if !detail.trim().is_empty() => return detail.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
    }
    let text = body.trim();
    if text.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        text.to_string()
    }
}

fn parse_job_id(body: &str) -> Result<String, SubmitError> {
    let response: SubmitResponse =
        serde_json::from_str(body).map_err(|_| SubmitError::MissingJobId)?;
    match response.job_id {
        Some(Value::String(job_id)) if !job_id.trim().is_empty() => Ok(job_id),
        _ => Err(SubmitError::MissingJobId),
    }
}

fn network_error(err: reqwest::Error) -> SubmitError {
    SubmitError::Network(describe(&err))
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {err}")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_wins() {
        let body = r#"{"detail":"Both auth_token and ct0 cookies are required."}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Both auth_token and ct0 cookies are required."
        );
    }

    #[test]
    fn structured_detail_is_rendered_compactly() {
        let body = r#"{"detail":[{"loc":["body","url"],"msg":"field required"}]}"#;
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            r#"[{"loc":["body","url"],"msg":"field required"}]"#
        );
    }

    #[test]
    fn raw_text_then_status_code() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, r#"{"detail":""}"#),
            r#"{"detail":""}"#
        );
    }

    #[test]
    fn job_id_must_be_a_non_empty_string() {
        assert_eq!(parse_job_id(r#"{"jobId":"j1"}"#), Ok("j1".to_string()));
        assert_eq!(parse_job_id(r#"{"jobId":""}"#), Err(SubmitError::MissingJobId));
        assert_eq!(parse_job_id(r#"{"jobId":7}"#), Err(SubmitError::MissingJobId));
        assert_eq!(parse_job_id(r#"{"id":"j1"}"#), Err(SubmitError::MissingJobId));
        assert_eq!(parse_job_id("ok"), Err(SubmitError::MissingJobId));
    }
}
