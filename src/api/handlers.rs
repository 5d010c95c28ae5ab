use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::services::ServiceError;
use super::ApiState;
use crate::errors::AppError;

pub const MISSING_GUILD_QUERY: &str = "Query string 'guildId' is missing from url";
pub const MISSING_GUILD_BODY: &str =
    "Missing 'Content-Type' header or 'guildId' parameter in body";
pub const MISSING_JOIN_BODY: &str =
    "Missing 'Content-Type' header or 'guildId', 'channelId' parameters in body";
pub const MISSING_ADD_BODY: &str =
    "Missing 'Content-Type' header or 'guildId', 'track' parameters in body";

/// JSON object carried by a control request.
///
/// A missing or non-JSON `Content-Type`, or a body that is not a JSON object,
/// behaves like an empty body.
struct Fields(Map<String, Value>);

impl Fields {
    fn parse(headers: &HeaderMap, body: &Bytes) -> Self {
        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false);

        if !is_json {
            return Self(Map::new());
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self(Map::new()),
        }
    }

    /// Non-empty strings and non-zero numbers count as present.
    fn get(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
            _ => None,
        }
    }
}

fn bad_request(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

fn respond<T: Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_queue(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(guild_id) = params.get("guildId").filter(|id| !id.is_empty()) else {
        return bad_request(MISSING_GUILD_QUERY);
    };

    debug!("📋 API getQueue para guild {}", guild_id);
    respond(state.services.get_queue(guild_id.clone()).await)
}

pub async fn pause_queue(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(guild_id) = Fields::parse(&headers, &body).get("guildId") else {
        return bad_request(MISSING_GUILD_BODY);
    };

    debug!("⏸️ API pauseQueue para guild {}", guild_id);
    respond(state.services.pause_queue(guild_id).await)
}

pub async fn resume_queue(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(guild_id) = Fields::parse(&headers, &body).get("guildId") else {
        return bad_request(MISSING_GUILD_BODY);
    };

    debug!("▶️ API resumeQueue para guild {}", guild_id);
    respond(state.services.resume_queue(guild_id).await)
}

pub async fn clear_queue(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(guild_id) = Fields::parse(&headers, &body).get("guildId") else {
        return bad_request(MISSING_GUILD_BODY);
    };

    debug!("🗑️ API clearQueue para guild {}", guild_id);
    respond(state.services.clear_queue(guild_id).await)
}

pub async fn join_channel(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let fields = Fields::parse(&headers, &body);
    let (Some(guild_id), Some(channel_id)) = (fields.get("guildId"), fields.get("channelId"))
    else {
        return bad_request(MISSING_JOIN_BODY);
    };

    debug!("🔊 API joinChannel {} en guild {}", channel_id, guild_id);
    respond(state.services.join_channel(guild_id, channel_id).await)
}

pub async fn skip_song(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(guild_id) = Fields::parse(&headers, &body).get("guildId") else {
        return bad_request(MISSING_GUILD_BODY);
    };

    debug!("⏭️ API skipSong para guild {}", guild_id);
    respond(state.services.skip_song(guild_id).await)
}

pub async fn add_song(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let fields = Fields::parse(&headers, &body);
    let (Some(guild_id), Some(track)) = (fields.get("guildId"), fields.get("track")) else {
        return bad_request(MISSING_ADD_BODY);
    };

    debug!("➕ API addSong '{}' en guild {}", track, guild_id);
    respond(state.services.add_song(guild_id, track).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::services::{
        AddedTracks, ClearedQueue, JoinedChannel, MockPlaybackService, PlaybackState,
        SkipOutcome,
    };
    use crate::audio::QueueSnapshot;
    use crate::errors::AudioError;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use serenity::model::id::GuildId;
    use tower::util::ServiceExt;

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_body(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_get_queue_requires_guild_query() {
        let mut services = MockPlaybackService::new();
        services.expect_get_queue().never();
        let app = router(Arc::new(services));

        let response = app
            .oneshot(Request::builder().uri("/v1/queue").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_body(response).await, MISSING_GUILD_QUERY.as_bytes());
    }

    #[tokio::test]
    async fn test_missing_fields_never_reach_services() {
        let mut services = MockPlaybackService::new();
        services.expect_get_queue().never();
        services.expect_pause_queue().never();
        services.expect_resume_queue().never();
        services.expect_clear_queue().never();
        services.expect_join_channel().never();
        services.expect_skip_song().never();
        services.expect_add_song().never();
        let app = router(Arc::new(services));

        let cases = [
            ("GET", "/v1/queue", MISSING_GUILD_QUERY),
            ("POST", "/v1/pause", MISSING_GUILD_BODY),
            ("POST", "/v1/resume", MISSING_GUILD_BODY),
            ("POST", "/v1/clear", MISSING_GUILD_BODY),
            ("POST", "/v1/join", MISSING_JOIN_BODY),
            ("POST", "/v1/skip", MISSING_GUILD_BODY),
            ("POST", "/v1/add", MISSING_ADD_BODY),
        ];

        for (method, uri, message) in cases {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(read_body(response).await, message.as_bytes(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_get_queue_returns_snapshot() {
        let mut services = MockPlaybackService::new();
        services
            .expect_get_queue()
            .times(1)
            .withf(|guild_id| guild_id == "42")
            .returning(|guild_id| {
                Ok(QueueSnapshot {
                    guild_id,
                    current: Some("enc".to_string()),
                    queue: vec!["next".to_string()],
                    paused: false,
                    volume: Some(80),
                })
            });
        let app = router(Arc::new(services));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/queue?guildId=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(json["guildId"], "42");
        assert_eq!(json["queue"], json!(["next"]));
    }

    #[tokio::test]
    async fn test_pause_without_content_type() {
        let mut services = MockPlaybackService::new();
        services.expect_pause_queue().never();
        let app = router(Arc::new(services));

        let request = Request::builder()
            .method("POST")
            .uri("/v1/pause")
            .body(Body::from(r#"{"guildId":"1"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_body(response).await, MISSING_GUILD_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_pause_and_resume_forward_guild() {
        let mut services = MockPlaybackService::new();
        services
            .expect_pause_queue()
            .times(1)
            .withf(|guild_id| guild_id == "7")
            .returning(|guild_id| Ok(PlaybackState { guild_id, paused: true }));
        services
            .expect_resume_queue()
            .times(1)
            .returning(|guild_id| Ok(PlaybackState { guild_id, paused: false }));
        let app = router(Arc::new(services));

        let paused = app
            .clone()
            .oneshot(post_json("/v1/pause", json!({"guildId": 7})))
            .await
            .unwrap();
        assert_eq!(paused.status(), StatusCode::OK);

        let resumed = app
            .oneshot(post_json("/v1/resume", json!({"guildId": "7"})))
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&read_body(resumed).await).unwrap();
        assert_eq!(json, json!({"guildId": "7", "paused": false}));
    }

    #[tokio::test]
    async fn test_clear_and_skip() {
        let mut services = MockPlaybackService::new();
        services
            .expect_clear_queue()
            .times(1)
            .returning(|guild_id| Ok(ClearedQueue { guild_id, cleared: 3 }));
        services
            .expect_skip_song()
            .times(1)
            .returning(|guild_id| Ok(SkipOutcome { guild_id, skipped: true }));
        let app = router(Arc::new(services));

        let cleared = app
            .clone()
            .oneshot(post_json("/v1/clear", json!({"guildId": "1"})))
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&read_body(cleared).await).unwrap();
        assert_eq!(json["cleared"], 3);

        let skipped = app
            .oneshot(post_json("/v1/skip", json!({"guildId": "1"})))
            .await
            .unwrap();
        assert_eq!(skipped.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_join_requires_both_fields() {
        let mut services = MockPlaybackService::new();
        services.expect_join_channel().never();
        let app = router(Arc::new(services));

        for body in [
            json!({"guildId": "1"}),
            json!({"channelId": "2"}),
            json!({"guildId": "", "channelId": "2"}),
            json!({"guildId": null, "channelId": "2"}),
        ] {
            let response = app
                .clone()
                .oneshot(post_json("/v1/join", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(read_body(response).await, MISSING_JOIN_BODY.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_join_forwards_ids() {
        let mut services = MockPlaybackService::new();
        services
            .expect_join_channel()
            .times(1)
            .withf(|guild_id, channel_id| guild_id == "1" && channel_id == "2")
            .returning(|guild_id, channel_id| {
                Ok(JoinedChannel {
                    guild_id,
                    channel_id,
                })
            });
        let app = router(Arc::new(services));

        let response = app
            .oneshot(post_json("/v1/join", json!({"guildId": "1", "channelId": "2"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_requires_track() {
        let mut services = MockPlaybackService::new();
        services.expect_add_song().never();
        let app = router(Arc::new(services));

        let response = app
            .oneshot(post_json("/v1/add", json!({"guildId": "1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_body(response).await, MISSING_ADD_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_add_returns_tracks() {
        let mut services = MockPlaybackService::new();
        services
            .expect_add_song()
            .times(1)
            .withf(|guild_id, track| guild_id == "1" && track == "lofi beats")
            .returning(|guild_id, _| {
                Ok(AddedTracks {
                    guild_id,
                    tracks: Vec::new(),
                })
            });
        let app = router(Arc::new(services));

        let response = app
            .oneshot(post_json(
                "/v1/add",
                json!({"guildId": "1", "track": "lofi beats"}),
            ))
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(json, json!({"guildId": "1", "tracks": []}));
    }

    #[tokio::test]
    async fn test_service_errors_map_to_status() {
        let mut services = MockPlaybackService::new();
        services.expect_skip_song().returning(|_| {
            Err(ServiceError::Audio(AudioError::PlayerNotFound(GuildId::new(1))))
        });
        services.expect_clear_queue().returning(|_| {
            Err(ServiceError::InvalidId {
                field: "guildId",
                value: "abc".to_string(),
            })
        });
        services
            .expect_pause_queue()
            .returning(|_| Err(ServiceError::Audio(AudioError::NodeUnavailable)));
        let app = router(Arc::new(services));

        let skip = app
            .clone()
            .oneshot(post_json("/v1/skip", json!({"guildId": "1"})))
            .await
            .unwrap();
        assert_eq!(skip.status(), StatusCode::NOT_FOUND);

        let clear = app
            .clone()
            .oneshot(post_json("/v1/clear", json!({"guildId": "abc"})))
            .await
            .unwrap();
        assert_eq!(clear.status(), StatusCode::BAD_REQUEST);

        let pause = app
            .oneshot(post_json("/v1/pause", json!({"guildId": "1"})))
            .await
            .unwrap();
        assert_eq!(pause.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_slice(&read_body(pause).await).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
