use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    config::Config,
    error::{ApiError, ConfigError},
    models::{Appointment, BookingRequest, Branch, Page, TimeSlot},
};

/// The backend operations the two screens depend on.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_branches(&self, page: usize, size: usize) -> Result<Page<Branch>, ApiError>;

    async fn search_branches(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> Result<Page<Branch>, ApiError>;

    async fn get_branch(&self, id: i64) -> Result<Branch, ApiError>;

    async fn available_slots(&self, branch_id: i64, date: NaiveDate) -> Result<Vec<TimeSlot>, ApiError>;

    async fn book(&self, request: &BookingRequest) -> Result<Appointment, ApiError>;

    async fn lookup(&self, email: &str, booking_reference: &str) -> Result<Appointment, ApiError>;

    async fn cancel(
        &self,
        email: &str,
        booking_reference: &str,
        reason: Option<&str>,
    ) -> Result<Appointment, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(ApiClient {
            http,
            base: config.api_url.clone(),
        })
    }

    /// Appends path segments to the base URL, keeping any path prefix the
    /// base already has.
    fn endpoint(&self, segments: &[&str]) -> Url {
        endpoint(&self.base, segments)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());
        if status.is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[async_trait]
impl BookingApi for ApiClient {
    async fn list_branches(&self, page: usize, size: usize) -> Result<Page<Branch>, ApiError> {
        let url = self.endpoint(&["api", "branches"]);
        self.send(self.http.get(url).query(&[("page", page), ("size", size)]))
            .await
    }

    async fn search_branches(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> Result<Page<Branch>, ApiError> {
        let url = self.endpoint(&["api", "branches", "search"]);
        let page = page.to_string();
        let size = size.to_string();
        self.send(self.http.get(url).query(&[
            ("query", query),
            ("page", page.as_str()),
            ("size", size.as_str()),
        ]))
        .await
    }

    async fn get_branch(&self, id: i64) -> Result<Branch, ApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["api", "branches", &id]);
        self.send(self.http.get(url)).await
    }

    async fn available_slots(&self, branch_id: i64, date: NaiveDate) -> Result<Vec<TimeSlot>, ApiError> {
        let url = self.endpoint(&["api", "appointments", "slots"]);
        let branch_id = branch_id.to_string();
        let date = date.format("%Y-%m-%d").to_string();
        self.send(
            self.http
                .get(url)
                .query(&[("branchId", branch_id.as_str()), ("date", date.as_str())]),
        )
        .await
    }

    async fn book(&self, request: &BookingRequest) -> Result<Appointment, ApiError> {
        let url = self.endpoint(&["api", "appointments", "book"]);
        self.send(self.http.post(url).json(request)).await
    }

    async fn lookup(&self, email: &str, booking_reference: &str) -> Result<Appointment, ApiError> {
        let url = self.endpoint(&["api", "appointments", "lookup"]);
        self.send(
            self.http
                .get(url)
                .query(&[("email", email), ("bookingReference", booking_reference)]),
        )
        .await
    }

    async fn cancel(
        &self,
        email: &str,
        booking_reference: &str,
        reason: Option<&str>,
    ) -> Result<Appointment, ApiError> {
        let url = self.endpoint(&["api", "appointments", "cancel"]);
        let mut params = vec![("email", email), ("bookingReference", booking_reference)];
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            params.push(("reason", reason));
        }
        self.send(self.http.put(url).query(&params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_to_root_base() {
        let base = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(
            endpoint(&base, &["api", "branches", "search"]).as_str(),
            "http://localhost:8080/api/branches/search"
        );
    }

    #[test]
    fn endpoint_keeps_base_prefix_and_drops_base_query() {
        let base = Url::parse("https://example.com/booking/?debug=1").unwrap();
        assert_eq!(
            endpoint(&base, &["api", "appointments", "cancel"]).as_str(),
            "https://example.com/booking/api/appointments/cancel"
        );
    }

    #[test]
    fn endpoint_escapes_segments() {
        let base = Url::parse("http://localhost:8080/").unwrap();
        assert_eq!(
            endpoint(&base, &["api", "branches", "a/b"]).as_str(),
            "http://localhost:8080/api/branches/a%2Fb"
        );
    }
}
