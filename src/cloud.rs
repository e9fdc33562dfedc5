//! Shared settings document kept in a remote store so several displays in
//! the same household agree on persons, feeds and slots.
//!
//! Only the settings projection travels. The timetable grid, overrides and
//! schedule state always stay local.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{non_blank, CloudOptions, Config, Person};
use crate::timetable::normalize;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("not signed in: an identity token is required to save")]
    NotSignedIn,
    #[error("settings store answered HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudDocument {
    pub city: String,
    pub persons: Vec<String>,
    /// Feed URL by person name.
    pub feeds: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub slots: Vec<String>,
}

impl CloudDocument {
    pub fn from_config(config: &Config) -> Self {
        let feeds = config
            .persons
            .iter()
            .filter_map(|p| Some((p.name.clone(), p.feed()?.to_string())))
            .collect();

        Self {
            city: config.city.clone(),
            persons: config.person_names(),
            feeds,
            proxy: non_blank(config.feed_proxy.as_deref()).map(str::to_string),
            slots: config.slots.clone(),
        }
    }
}

/// Merge a downloaded document onto the local config.
///
/// Persons are matched by position, so local per-person proxies survive a
/// rename; feed URLs are matched by name. Blank or empty fields in the
/// document leave the local value alone.
pub fn apply(doc: &CloudDocument, config: &Config) -> Config {
    let mut merged = config.clone();

    if let Some(city) = non_blank(Some(&doc.city)) {
        merged.city = city.to_string();
    }
    if let Some(proxy) = non_blank(doc.proxy.as_deref()) {
        merged.feed_proxy = Some(proxy.to_string());
    }
    if !doc.slots.is_empty() {
        merged.slots = doc.slots.clone();
    }

    if !doc.persons.is_empty() {
        for idx in (doc.persons.len()..merged.persons.len()).rev() {
            merged.timetable.remove_column(idx);
            merged.overrides.remove_column(idx);
        }
        merged.persons.truncate(doc.persons.len());
        for (i, name) in doc.persons.iter().enumerate() {
            match merged.persons.get_mut(i) {
                Some(person) => person.name = name.clone(),
                None => merged.persons.push(Person::named(name)),
            }
        }
    }
    for person in &mut merged.persons {
        if let Some(url) = doc.feeds.get(&person.name) {
            person.feed_url = Some(url.clone());
        }
    }

    normalize(&merged)
}

#[derive(Debug, Clone)]
pub struct CloudClient {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl CloudClient {
    /// `None` when no endpoint is configured.
    pub fn configured(options: &CloudOptions) -> Result<Option<Self>, CloudError> {
        let Some(endpoint) = non_blank(options.endpoint.as_deref()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        let url = format!(
            "{}/settings/{}",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(&options.document)
        );

        Ok(Some(Self {
            client,
            url,
            token: non_blank(options.token.as_deref()).map(str::to_string),
        }))
    }

    /// The stored document; `None` if nothing was ever saved.
    pub async fn load(&self) -> Result<Option<CloudDocument>, CloudError> {
        let response = self.client.get(&self.url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CloudError::Status(response.status().as_u16()));
        }
        Ok(Some(response.json().await?))
    }

    pub async fn save(&self, doc: &CloudDocument) -> Result<(), CloudError> {
        let token = self.token.as_deref().ok_or(CloudError::NotSignedIn)?;

        let response = self
            .client
            .put(&self.url)
            .bearer_auth(token)
            .json(doc)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::Status(response.status().as_u16()));
        }
        tracing::info!(url = %self.url, "settings uploaded");
        Ok(())
    }
}
