//! REST client for the map listing and download service.

use catalog::{
    ListRequest, ListResponse, LoadRequest, MapListingService, MapLoadService, MapPayload,
    ServiceError,
};
use runtime::BoxFuture;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ListBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    latitude: f64,
    longitude: f64,
    radius: f64,
}

pub struct RestMapService {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestMapService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn token_for(&self, use_token: bool) -> Option<&str> {
        if use_token && !self.token.is_empty() {
            Some(&self.token)
        } else {
            None
        }
    }

    fn list_request(&self, request: &ListRequest) -> reqwest::RequestBuilder {
        let endpoint = if request.use_gps { "geolist" } else { "list" };
        let body = ListBody {
            token: self.token_for(request.use_token),
            latitude: request.latitude,
            longitude: request.longitude,
            radius: request.radius,
        };
        self.client
            .post(format!("{}/{endpoint}", self.base_url))
            .json(&body)
    }

    fn load_request(&self, request: &LoadRequest) -> reqwest::RequestBuilder {
        let mut query = vec![("id", request.id.to_string())];
        if let Some(token) = self.token_for(request.use_token) {
            query.push(("token", token.to_string()));
        }
        self.client
            .get(format!("{}/mapb", self.base_url))
            .query(&query)
    }
}

fn network(err: reqwest::Error) -> ServiceError {
    ServiceError::Network(err.to_string())
}

fn check_status(resp: &reqwest::Response) -> Result<(), ServiceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ServiceError::Rejected(format!("HTTP {status}")))
    }
}

impl MapListingService for RestMapService {
    fn list_maps(&self, request: ListRequest) -> BoxFuture<'_, Result<ListResponse, ServiceError>> {
        let builder = self.list_request(&request);
        Box::pin(async move {
            let resp = builder.send().await.map_err(network)?;
            check_status(&resp)?;
            let list: ListResponse = resp
                .json()
                .await
                .map_err(|e| ServiceError::Decode(e.to_string()))?;
            debug!(count = list.count, use_token = request.use_token, "map list received");
            Ok(list)
        })
    }
}

impl MapLoadService for RestMapService {
    fn load_map(&self, request: LoadRequest) -> BoxFuture<'_, Result<MapPayload, ServiceError>> {
        let builder = self.load_request(&request);
        Box::pin(async move {
            let resp = builder.send().await.map_err(network)?;
            check_status(&resp)?;
            let bytes = resp.bytes().await.map_err(network)?;
            if bytes.is_empty() {
                return Err(ServiceError::Decode(format!("map {} has no data", request.id)));
            }
            debug!(map_id = %request.id, len = bytes.len(), "map downloaded");
            Ok(MapPayload::new(request.id, bytes))
        })
    }
}

#[cfg(test)]
mod tests {
    use catalog::{ListRequest, LoadRequest};
    use foundation::MapId;
    use pretty_assertions::assert_eq;

    use super::RestMapService;

    fn service(token: &str) -> RestMapService {
        RestMapService::new(reqwest::Client::new(), "https://maps.example.com/", token)
    }

    fn list(use_token: bool, use_gps: bool) -> ListRequest {
        ListRequest {
            use_token,
            use_gps,
            latitude: 60.5,
            longitude: 24.25,
            radius: 200.0,
        }
    }

    fn body_json(req: &reqwest::Request) -> serde_json::Value {
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap_or_default();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn private_list_posts_token() {
        let req = service("secret").list_request(&list(true, false)).build().unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "https://maps.example.com/list");
        assert_eq!(
            body_json(&req),
            serde_json::json!({
                "token": "secret",
                "latitude": 60.5,
                "longitude": 24.25,
                "radius": 200.0
            })
        );
    }

    #[test]
    fn public_gps_list_omits_token() {
        let req = service("secret").list_request(&list(false, true)).build().unwrap();
        assert_eq!(req.url().path(), "/geolist");
        assert!(body_json(&req).get("token").is_none());
    }

    #[test]
    fn load_url_carries_id_and_token() {
        let svc = service("secret");
        let private = svc
            .load_request(&LoadRequest {
                id: MapId(42),
                use_token: true,
            })
            .build()
            .unwrap();
        assert_eq!(
            private.url().as_str(),
            "https://maps.example.com/mapb?id=42&token=secret"
        );

        let public = svc
            .load_request(&LoadRequest {
                id: MapId(42),
                use_token: false,
            })
            .build()
            .unwrap();
        assert_eq!(public.url().query(), Some("id=42"));
    }
}
