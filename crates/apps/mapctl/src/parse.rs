//! Scene records on a Parse Server over its REST API.

use foundation::MapId;
use runtime::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use session::{SceneBackend, SceneError, SceneRecord};
use tracing::debug;

pub const SCENE_CLASS: &str = "Scene";

#[derive(Debug, Deserialize)]
struct QueryResults<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneRow {
    object_id: String,
    map_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Created {
    object_id: String,
}

pub struct ParseSceneBackend {
    client: reqwest::Client,
    server_url: String,
    app_id: String,
    rest_key: String,
}

impl ParseSceneBackend {
    pub fn new(
        client: reqwest::Client,
        server_url: impl Into<String>,
        app_id: impl Into<String>,
        rest_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            rest_key: rest_key.into(),
        }
    }

    fn class_url(&self) -> String {
        format!("{}/classes/{SCENE_CLASS}", self.server_url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("X-Parse-Application-Id", &self.app_id)
            .header("X-Parse-REST-API-Key", &self.rest_key)
    }

    fn lookup_request(&self, map_id: MapId) -> reqwest::RequestBuilder {
        let filter = json!({ "mapId": map_id.0 }).to_string();
        self.authorized(self.client.get(self.class_url()))
            .query(&[("where", filter)])
    }

    fn create_request(&self, map_id: MapId) -> reqwest::RequestBuilder {
        self.authorized(self.client.post(self.class_url()))
            .json(&json!({ "mapId": map_id.0 }))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    builder: reqwest::RequestBuilder,
) -> Result<T, SceneError> {
    let resp = builder
        .send()
        .await
        .map_err(|e| SceneError::Backend(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SceneError::Backend(format!("HTTP {status}: {body}")));
    }
    resp.json()
        .await
        .map_err(|e| SceneError::Decode(e.to_string()))
}

fn first_scene(rows: Vec<SceneRow>) -> Option<SceneRecord> {
    rows.into_iter().next().map(|row| SceneRecord {
        object_id: row.object_id,
        map_id: MapId(row.map_id),
    })
}

impl SceneBackend for ParseSceneBackend {
    fn scene_by_map_id(
        &self,
        map_id: MapId,
    ) -> BoxFuture<'_, Result<Option<SceneRecord>, SceneError>> {
        let builder = self.lookup_request(map_id);
        Box::pin(async move {
            let found: QueryResults<SceneRow> = read_json(builder).await?;
            if found.results.len() > 1 {
                debug!(%map_id, count = found.results.len(), "several scenes for map, using the first");
            }
            Ok(first_scene(found.results))
        })
    }

    fn add_scene(&self, map_id: MapId) -> BoxFuture<'_, Result<SceneRecord, SceneError>> {
        let builder = self.create_request(map_id);
        Box::pin(async move {
            let created: Created = read_json(builder).await?;
            debug!(%map_id, object_id = %created.object_id, "scene created");
            Ok(SceneRecord {
                object_id: created.object_id,
                map_id,
            })
        })
    }
}
