//! Upstream consent service client
//!
//! Fetches the raw per-date snapshot by paging through the upstream
//! profile listing and counting what came back:
//!
//! - total = profiles returned for the civil day
//! - privacy policy / marketing = ACTIVE purposes by name
//! - channel counts = identifier prefix (`auth0|f1`, `auth0|kp`,
//!   `auth0|gwl`)
//! - new users = identifiers carrying none of the known prefixes
//! - dropoff = total - (f1 + kp), the profiles that consented but
//!   never reached a primary sales channel
//!
//! Also supports delete-by-date so the orchestrator can force a
//! non-cached refetch. Upstream absence of data to delete is success,
//! not an error.
//!
//! No retries at this layer. Retry policy belongs to the orchestrator,
//! which applies backoff across date boundaries too.

use crate::error::{SyncError, SyncResult};
use crate::types::ConsentSnapshot;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

/// Identifier prefixes of the known sales channels
const F1_PREFIX: &str = "auth0|f1";
const KP_PREFIX: &str = "auth0|kp";
const GWL_PREFIX: &str = "auth0|gwl";

/// Purpose name suffixes (upstream prefixes them with the tenant name)
const PRIVACY_POLICY_PURPOSE: &str = "Privacy Policy";
const MARKETING_PURPOSE: &str = "Marketing";

/// Abstraction over the upstream consent service
///
/// The orchestrator only sees this trait, so tests can drive the full
/// sync path against an in-memory source.
#[async_trait]
pub trait ConsentSource: Send + Sync {
    /// Retrieve raw counts for one calendar date.
    async fn fetch_snapshot(&self, date: NaiveDate) -> SyncResult<ConsentSnapshot>;

    /// Ask upstream to drop any cached data for a date. Idempotent:
    /// nothing-to-delete is Ok.
    async fn delete_snapshot(&self, date: NaiveDate) -> SyncResult<()>;
}

/// One page of the upstream profile listing
#[derive(Debug, Deserialize)]
struct ProfilePage {
    #[serde(rename = "content", default)]
    content: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(rename = "Identifier")]
    identifier: Option<String>,
    #[serde(rename = "Purposes", default)]
    purposes: Vec<Purpose>,
}

#[derive(Debug, Deserialize)]
struct Purpose {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Status")]
    status: String,
}

/// reqwest-backed implementation of [`ConsentSource`]
pub struct UpstreamConsentClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    collection_point_guid: Option<String>,
    page_size: u32,
    timeout_secs: u64,
}

impl UpstreamConsentClient {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        collection_point_guid: Option<String>,
        page_size: u32,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            collection_point_guid,
            page_size,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::UpstreamTimeout {
                seconds: self.timeout_secs,
            }
        } else if e.is_decode() {
            SyncError::UpstreamDecode(e.to_string())
        } else {
            SyncError::UpstreamUnavailable(e.to_string())
        }
    }

    /// Fetch one page of the profile listing for a civil day.
    async fn fetch_page(&self, date: NaiveDate, page: u32) -> SyncResult<ProfilePage> {
        let url = format!("{}/datasubjects/profiles", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("updatedSince", format!("{date}T00:00:00")),
            ("toDate", format!("{date}T23:59:59")),
            ("size", self.page_size.to_string()),
            ("page", page.to_string()),
            ("includeConsentData", "true".to_string()),
            ("includePurposes", "true".to_string()),
        ];
        if let Some(guid) = &self.collection_point_guid {
            query.push(("collectionPointGuid", guid.clone()));
        }

        let response = self
            .authorize(self.client.get(&url).query(&query))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::UpstreamHttp {
                status: status.as_u16(),
            });
        }

        response
            .json::<ProfilePage>()
            .await
            .map_err(|e| self.map_transport_error(e))
    }
}

#[async_trait]
impl ConsentSource for UpstreamConsentClient {
    async fn fetch_snapshot(&self, date: NaiveDate) -> SyncResult<ConsentSnapshot> {
        let mut snapshot = ConsentSnapshot {
            date,
            ..Default::default()
        };

        let mut page = 0;
        loop {
            let profiles = self.fetch_page(date, page).await?.content;
            if profiles.is_empty() {
                break;
            }

            log::debug!("📄 {} profiles on page {} for {}", profiles.len(), page, date);
            for profile in &profiles {
                count_profile(&mut snapshot, profile);
            }
            page += 1;
        }

        // Profiles that consented but show no primary-channel identity
        let channelled = snapshot.f1_channel_consents + snapshot.kp_channel_consents;
        snapshot.dropoff_count = (snapshot.total_consents - channelled).max(0);

        log::debug!(
            "📊 Snapshot {}: total={} privacy={} marketing={} new={}",
            date,
            snapshot.total_consents,
            snapshot.privacy_policy_consents,
            snapshot.marketing_consents,
            snapshot.new_users
        );

        Ok(snapshot)
    }

    async fn delete_snapshot(&self, date: NaiveDate) -> SyncResult<()> {
        let url = format!("{}/consent-data/{}", self.base_url, date);

        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        // Nothing cached for that date is a successful delete
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(SyncError::UpstreamHttp {
            status: status.as_u16(),
        })
    }
}

/// Fold one profile into the running snapshot counts.
fn count_profile(snapshot: &mut ConsentSnapshot, profile: &Profile) {
    snapshot.total_consents += 1;

    for purpose in &profile.purposes {
        if purpose.status != "ACTIVE" {
            continue;
        }
        if purpose.name.ends_with(PRIVACY_POLICY_PURPOSE) {
            snapshot.privacy_policy_consents += 1;
        } else if purpose.name.ends_with(MARKETING_PURPOSE) {
            snapshot.marketing_consents += 1;
        }
    }

    match profile.identifier.as_deref() {
        Some(id) if id.starts_with(F1_PREFIX) => snapshot.f1_channel_consents += 1,
        Some(id) if id.starts_with(KP_PREFIX) => snapshot.kp_channel_consents += 1,
        Some(id) if id.starts_with(GWL_PREFIX) => snapshot.gwl_channel_consents += 1,
        Some(_) => snapshot.new_users += 1,
        // Identifier-less profiles still count toward the total
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(identifier: Option<&str>, purposes: Vec<(&str, &str)>) -> Profile {
        Profile {
            identifier: identifier.map(|s| s.to_string()),
            purposes: purposes
                .into_iter()
                .map(|(name, status)| Purpose {
                    name: name.to_string(),
                    status: status.to_string(),
                })
                .collect(),
        }
    }

    fn empty_snapshot() -> ConsentSnapshot {
        ConsentSnapshot {
            date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_active_purposes_counted_by_name() {
        let mut snap = empty_snapshot();
        count_profile(
            &mut snap,
            &profile(
                Some("auth0|f1abc"),
                vec![
                    ("Tenant - Privacy Policy", "ACTIVE"),
                    ("Tenant - Marketing", "ACTIVE"),
                ],
            ),
        );

        assert_eq!(snap.total_consents, 1);
        assert_eq!(snap.privacy_policy_consents, 1);
        assert_eq!(snap.marketing_consents, 1);
        assert_eq!(snap.f1_channel_consents, 1);
    }

    #[test]
    fn test_withdrawn_purposes_are_ignored() {
        let mut snap = empty_snapshot();
        count_profile(
            &mut snap,
            &profile(
                Some("auth0|kp123"),
                vec![
                    ("Tenant - Privacy Policy", "ACTIVE"),
                    ("Tenant - Marketing", "WITHDRAWN"),
                ],
            ),
        );

        assert_eq!(snap.privacy_policy_consents, 1);
        assert_eq!(snap.marketing_consents, 0);
        assert_eq!(snap.kp_channel_consents, 1);
    }

    #[test]
    fn test_unknown_prefix_is_a_new_user() {
        let mut snap = empty_snapshot();
        count_profile(&mut snap, &profile(Some("auth0|652fa1"), vec![]));
        count_profile(&mut snap, &profile(Some("auth0|gwl77"), vec![]));
        count_profile(&mut snap, &profile(None, vec![]));

        assert_eq!(snap.total_consents, 3);
        assert_eq!(snap.new_users, 1);
        assert_eq!(snap.gwl_channel_consents, 1);
    }

    #[test]
    fn test_page_payload_decodes() {
        let body = r#"{
            "content": [
                {
                    "Identifier": "auth0|f1xyz",
                    "Purposes": [
                        {"Name": "Tenant - Privacy Policy", "Status": "ACTIVE"}
                    ]
                },
                {"Purposes": []}
            ]
        }"#;

        let page: ProfilePage = serde_json::from_str(body).unwrap();
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[0].identifier.as_deref(), Some("auth0|f1xyz"));
        assert!(page.content[1].identifier.is_none());
    }

    #[test]
    fn test_empty_page_payload() {
        let page: ProfilePage = serde_json::from_str("{}").unwrap();
        assert!(page.content.is_empty());
    }
}
