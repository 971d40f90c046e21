use crate::generator::profile::{build_dataset_from_config, GeneratorConfig};
use crate::gui_bridge::model::{ChannelModel, StatsModel};
use log::{info, warn};
use playbackcore::reveal::PlaybackSession;
use playbackcore::{Channel, RawDetection};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{http::StatusCode, reply, Filter};

pub fn gui_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

type JsonReply = reply::WithStatus<reply::Json>;

fn respond(value: &serde_json::Value, status: StatusCode) -> JsonReply {
    reply::with_status(reply::json(value), status)
}

/// HTTP surface the dashboard polls for revealed detections.
///
/// `/ingest` is the live-feed seam: a record posted there goes through the
/// same validation as dataset construction and the same fold as replayed
/// records, so consumers cannot tell the two sources apart.
pub struct DashboardBridge {
    session: Arc<PlaybackSession>,
}

impl DashboardBridge {
    pub fn new(session: Arc<PlaybackSession>) -> Self {
        Self { session }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone + Send + Sync + 'static
    {
        let session = self.session.clone();
        let session_filter = warp::any().map(move || session.clone());

        let all_route = warp::path!("detections")
            .and(warp::get())
            .and(session_filter.clone())
            .map(|session: Arc<PlaybackSession>| reply::json(&session.snapshot()));

        let channel_route = warp::path!("detections" / String)
            .and(warp::get())
            .and(session_filter.clone())
            .map(|name: String, session: Arc<PlaybackSession>| channel_reply(&name, &session));

        let stats_route = warp::path!("stats")
            .and(warp::get())
            .and(session_filter.clone())
            .map(|session: Arc<PlaybackSession>| reply::json(&stats_model(&session)));

        let ingest_route = warp::path!("ingest")
            .and(warp::post())
            .and(warp::body::json())
            .and(session_filter.clone())
            .map(|raw: RawDetection, session: Arc<PlaybackSession>| ingest_reply(raw, &session));

        let replay_route = warp::path!("replay")
            .and(warp::post())
            .and(warp::body::json())
            .and(session_filter)
            .map(|config: GeneratorConfig, session: Arc<PlaybackSession>| {
                replay_reply(&config, &session)
            });

        all_route
            .or(channel_route)
            .or(stats_route)
            .or(ingest_route)
            .or(replay_route)
    }

    pub async fn serve(self, address: SocketAddr) {
        self.publish_status(&format!("HTTP bridge listening on {}", address));
        warp::serve(self.routes()).run(address).await;
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
    }
}

fn channel_reply(name: &str, session: &PlaybackSession) -> JsonReply {
    match name.parse::<Channel>() {
        Ok(channel) => {
            let snapshot = session.snapshot();
            let model = ChannelModel {
                channel,
                label: channel.label(),
                count: snapshot.count(channel),
                detections: snapshot.records(channel).to_vec(),
            };
            reply::with_status(reply::json(&model), StatusCode::OK)
        }
        Err(err) => respond(&json!({"error": err.to_string()}), StatusCode::NOT_FOUND),
    }
}

fn stats_model(session: &PlaybackSession) -> StatsModel {
    let counts = session.counts();
    StatsModel {
        total: counts.values().sum(),
        counts,
        pending: session.pending(),
        running: session.is_running(),
        metrics: session.metrics(),
    }
}

fn ingest_reply(raw: RawDetection, session: &PlaybackSession) -> JsonReply {
    let record = match raw.validate(None) {
        Ok(record) => record,
        Err(defect) => {
            warn!("ingest rejected: {}", defect);
            return respond(
                &json!({"status": "rejected", "error": defect.to_string()}),
                StatusCode::BAD_REQUEST,
            );
        }
    };
    let channel = record.channel();
    let id = record.id().to_string();
    session.deliver_live(record);
    respond(
        &json!({"status": "ok", "channel": channel, "id": id}),
        StatusCode::OK,
    )
}

fn replay_reply(config: &GeneratorConfig, session: &PlaybackSession) -> JsonReply {
    match build_dataset_from_config(config, session.now_ms()) {
        Ok(dataset) => {
            let run = session.start(&dataset);
            if let Some(name) = config.scenario.as_ref() {
                info!("[GUI] Scenario {} -> run {} with {} records", name, run, dataset.len());
            }
            respond(
                &json!({
                    "status": "ok",
                    "run": run,
                    "records": dataset.len(),
                    "description": config.description.clone().unwrap_or_default()
                }),
                StatusCode::OK,
            )
        }
        Err(err) => {
            warn!("replay error: {:#}", err);
            respond(
                &json!({"status": "error", "error": format!("{:#}", err)}),
                StatusCode::BAD_REQUEST,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbackcore::playback::{ManualClock, PlaybackScheduler};
    use playbackcore::reveal::DuplicatePolicy;
    use playbackcore::EventDataset;
    use serde_json::Value;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000_000;

    fn session(clock: &ManualClock) -> Arc<PlaybackSession> {
        Arc::new(PlaybackSession::new(
            PlaybackScheduler::manual(clock.clone()),
            DuplicatePolicy::Replace,
        ))
    }

    fn body<B: AsRef<[u8]>>(response: &warp::http::Response<B>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn bridge_serves_revealed_detections_per_channel() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);
        let dataset = EventDataset::from_json_str(&format!(
            r#"{{"pothole": [
                {{"id": 1, "detectedAt": {}}},
                {{"id": 2, "detectedAt": {}}}
            ]}}"#,
            NOW - 1_000,
            NOW + 500
        ))
        .unwrap();
        session.start(&dataset);
        let routes = DashboardBridge::new(session.clone()).routes();

        let response = warp::test::request()
            .method("GET")
            .path("/detections/pothole")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body(&response);
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["label"], "Pothole Detection");
        assert_eq!(payload["detections"][0]["id"], "1");

        clock.advance(Duration::from_millis(500));
        let response = warp::test::request()
            .method("GET")
            .path("/detections")
            .reply(&routes)
            .await;
        let payload = body(&response);
        assert_eq!(payload["pothole"].as_array().unwrap().len(), 2);
        assert_eq!(payload["wrongWay"], serde_json::json!([]));

        let response = warp::test::request()
            .method("GET")
            .path("/detections/hovercraft")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bridge_ingest_validates_live_records() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);
        let routes = DashboardBridge::new(session.clone()).routes();

        let accepted = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&serde_json::json!({
                "id": "cam-7",
                "channel": "wrongWay",
                "activationTime": NOW,
                "plateNumber": "KA01AB1234"
            }))
            .reply(&routes)
            .await;
        assert_eq!(accepted.status(), StatusCode::OK);
        assert_eq!(session.snapshot().ids(Channel::WrongWay), vec!["cam-7"]);

        let rejected = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&serde_json::json!({"id": "cam-8", "channel": "wrongWay"}))
            .reply(&routes)
            .await;
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&rejected)["error"], "missing activation time");
        assert_eq!(session.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn bridge_replay_restarts_session() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);
        let routes = DashboardBridge::new(session.clone()).routes();

        let response = warp::test::request()
            .method("POST")
            .path("/replay")
            .json(&serde_json::json!({
                "channels": ["pothole"],
                "records_per_channel": 3,
                "backlog": 1,
                "jitter_ms": 0,
                "scenario": "morning rush"
            }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["records"], 3);
        assert_eq!(session.counts()[&Channel::Pothole], 2);

        let stats = warp::test::request()
            .method("GET")
            .path("/stats")
            .reply(&routes)
            .await;
        let payload = body(&stats);
        assert_eq!(payload["total"], 2);
        assert_eq!(payload["pending"], 1);
        assert_eq!(payload["running"], true);

        clock.run_until_idle();
        assert_eq!(session.counts()[&Channel::Pothole], 3);
    }

    #[tokio::test]
    async fn bridge_replay_rejects_oversized_generator_request() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);
        let routes = DashboardBridge::new(session.clone()).routes();

        let response = warp::test::request()
            .method("POST")
            .path("/replay")
            .json(&serde_json::json!({"records_per_channel": 1_000_000_000u64}))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["status"], "error");
        assert!(!session.is_running());
        assert!(session.snapshot().is_empty());
    }
}
