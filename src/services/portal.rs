use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, AppError, Result};
use crate::models::{Plan, User};

/// App identity under which subscription records and notifications are owned.
pub const APP_ID: i64 = 112;

const SUBSCRIPTION_TABLE: &str = "NotificationSubscription";
const SUBSCRIPTION_PUBLISHER_KEY: &str = "publisher";
const FOLLOW_TABLE: &str = "Follow";
const FOLLOW_USER_PUBLISHER_KEY: &str = "user_publisher";

/// Effectively "all records"; the registry pages, we don't.
const LIST_ALL_LIMIT: i64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct Subscriber {
    pub uuid: String,
    pub user_id: i64,
}

/// A user's follow record for a publisher; feeds listed here are muted.
#[derive(Debug, Clone, Default)]
pub struct FollowRecord {
    pub excluded_feeds: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub user_id: i64,
    pub app_id: i64,
    /// Scheduled delivery time, epoch seconds.
    pub time: i64,
    /// Repeat interval in seconds; 0 means one-shot.
    pub interval: i64,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Identity service, subscription registry and notification emission,
/// all served by the portal backend.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn retrieve_user(&self, access_token: &str) -> Result<User>;
    async fn list_subscribers(&self, publisher_uuid: &str) -> Result<Vec<Subscriber>>;
    async fn retrieve_follow(
        &self,
        user_id: i64,
        publisher_uuid: &str,
    ) -> Result<Option<FollowRecord>>;
    async fn create_notification(&self, notification: &NotificationPayload) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct ListRecordsParams<'a> {
    app_id: i64,
    table_name: &'a str,
    property_name: &'a str,
    property_value: &'a str,
    exact: bool,
    limit: i64,
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[allow(dead_code)]
    total: i64,
    items: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    uuid: String,
    user_id: i64,
    #[serde(default)]
    properties: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: i64,
    plan: i64,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorsResponse {
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    code: String,
}

pub struct PortalClient {
    client: Client,
    base_url: String,
}

impl PortalClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn list_records(&self, params: ListRecordsParams<'_>) -> Result<RecordList> {
        let response = self
            .client
            .get(format!("{}/v1/table_objects", self.base_url))
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::PortalApi(format!("API error: {error_text}")));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PortalApi for PortalClient {
    async fn retrieve_user(&self, access_token: &str) -> Result<User> {
        let response = self
            .client
            .get(format!("{}/v1/user", self.base_url))
            .header("Authorization", access_token)
            .send()
            .await?;

        if response.status().is_success() {
            let user: UserResponse = response.json().await?;
            return Ok(User {
                id: user.id,
                plan: Plan::from_i64(user.plan),
            });
        }

        let errors: ErrorsResponse = response.json().await.unwrap_or_default();
        if errors
            .errors
            .iter()
            .any(|e| e.code == ApiError::SESSION_EXPIRED.code)
        {
            return Err(AppError::Api(ApiError::SESSION_EXPIRED));
        }

        Err(AppError::Api(ApiError::NOT_AUTHENTICATED))
    }

    async fn list_subscribers(&self, publisher_uuid: &str) -> Result<Vec<Subscriber>> {
        let records = self
            .list_records(ListRecordsParams {
                app_id: APP_ID,
                table_name: SUBSCRIPTION_TABLE,
                property_name: SUBSCRIPTION_PUBLISHER_KEY,
                property_value: publisher_uuid,
                exact: true,
                limit: LIST_ALL_LIMIT,
                offset: 0,
            })
            .await?;

        Ok(records
            .items
            .into_iter()
            .map(|record| Subscriber {
                uuid: record.uuid,
                user_id: record.user_id,
            })
            .collect())
    }

    async fn retrieve_follow(
        &self,
        user_id: i64,
        publisher_uuid: &str,
    ) -> Result<Option<FollowRecord>> {
        let records = self
            .list_records(ListRecordsParams {
                app_id: APP_ID,
                table_name: FOLLOW_TABLE,
                property_name: FOLLOW_USER_PUBLISHER_KEY,
                property_value: &format!("{user_id}:{publisher_uuid}"),
                exact: true,
                limit: 1,
                offset: 0,
            })
            .await?;

        Ok(records.items.into_iter().next().map(|record| {
            let excluded_feeds = record
                .properties
                .get("excluded_feeds")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            FollowRecord { excluded_feeds }
        }))
    }

    async fn create_notification(&self, notification: &NotificationPayload) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/v1/notifications", self.base_url))
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::PortalApi(format!("API error: {error_text}")));
        }

        Ok(())
    }
}
