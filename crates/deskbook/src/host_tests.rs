use super::*;
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use deskbook_client::{BookingApi, BookingRequest, Building, CatalogSource, RemoteBooking};
use deskbook_config::{DeskbookConfig, NotificationPermission};
use deskbook_core::{AppResult, FixedClock};
use deskbook_store::MemoryStore;
use std::sync::Mutex;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

#[derive(Default)]
struct FakeApi {
    booked: Mutex<Vec<String>>,
}

#[async_trait]
impl BookingApi for FakeApi {
    async fn create_booking(&self, _token: &str, request: &BookingRequest) -> AppResult<()> {
        self.booked.lock().unwrap().push(request.start_time.clone());
        Ok(())
    }

    async fn upcoming_bookings(&self, _token: &str) -> AppResult<Vec<RemoteBooking>> {
        Ok(Vec::new())
    }
}

struct EmptyCatalog;

#[async_trait]
impl CatalogSource for EmptyCatalog {
    async fn fetch_buildings(&self, _city: &str, _build_id: Option<&str>) -> AppResult<Vec<Building>> {
        Ok(Vec::new())
    }
}

struct Client {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
    server: tokio::task::JoinHandle<Result<()>>,
}

impl Client {
    async fn send(&mut self, message: Value) {
        write_frame(&mut self.writer, &message).await.unwrap();
    }

    async fn next(&mut self) -> Value {
        let frame = read_frame(&mut self.reader).await.unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    /// Frames up to and including the response tagged `request_id`.
    async fn until_response(&mut self, request_id: &str) -> (Vec<Value>, Value) {
        let mut events = Vec::new();
        loop {
            let frame = self.next().await;
            if frame[REQUEST_ID] == request_id {
                return (events, frame);
            }
            events.push(frame);
        }
    }

    async fn request(&mut self, mut message: Value, request_id: &str) -> Value {
        message[REQUEST_ID] = json!(request_id);
        self.send(message).await;
        self.until_response(request_id).await.1
    }

    async fn close(self) {
        let Client {
            mut reader,
            mut writer,
            server,
        } = self;
        writer.shutdown().await.unwrap();
        while read_frame(&mut reader).await.unwrap().is_some() {}
        server.await.unwrap().unwrap();
    }
}

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn start(permission: NotificationPermission) -> (Client, Arc<FakeApi>) {
    let mut config = DeskbookConfig::default();
    config.reminders.notification_permission = permission;
    let api = Arc::new(FakeApi::default());
    let offset = FixedOffset::east_opt(19_800).unwrap();
    let app = App::with_backends(
        config,
        Arc::new(MemoryStore::new()),
        api.clone(),
        Arc::new(EmptyCatalog),
        Arc::new(FixedClock::at(offset, date("2025-03-09"), 12)),
    )
    .unwrap();

    let (client_end, host_end) = tokio::io::duplex(64 * 1024);
    let (host_reader, host_writer) = tokio::io::split(host_end);
    let (reader, writer) = tokio::io::split(client_end);
    let server = tokio::spawn(serve(Arc::new(app), host_reader, host_writer));
    (
        Client {
            reader,
            writer,
            server,
        },
        api,
    )
}

const TOKEN: &str = "eyJhbGciOiJSUzI1NiJ9.payload.signature";

#[tokio::test]
async fn test_get_token_before_capture_is_null() {
    let (mut client, _) = start(NotificationPermission::Granted);
    let reply = client.request(json!({"action": "getToken"}), "1").await;
    assert_eq!(
        reply,
        json!({"token": null, "headers": null, "requestId": "1"})
    );
    client.close().await;
}

#[tokio::test]
async fn test_set_token_round_trip() {
    let (mut client, _) = start(NotificationPermission::Granted);
    let reply = client
        .request(
            json!({"action": "setToken", "token": TOKEN, "headers": {"accept": "application/json"}}),
            "set",
        )
        .await;
    assert_eq!(reply["success"], true);

    let reply = client.request(json!({"action": "getToken"}), "get").await;
    assert_eq!(reply["token"], TOKEN);
    assert_eq!(reply["headers"]["accept"], "application/json");
    client.close().await;
}

#[tokio::test]
async fn test_unknown_action_gets_error() {
    let (mut client, _) = start(NotificationPermission::Granted);
    let reply = client
        .request(json!({"action": "deleteEverything"}), "u1")
        .await;
    assert_eq!(reply["error"], "unknown action");

    let reply = client.request(json!({"hello": "world"}), "u2").await;
    assert_eq!(reply["error"], "unknown action");
    client.close().await;
}

#[tokio::test]
async fn test_bad_payload_for_known_action_is_reported() {
    let (mut client, _) = start(NotificationPermission::Granted);
    let reply = client
        .request(json!({"action": "bookDates", "dates": "soon"}), "b")
        .await;
    assert!(
        reply["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid host message")
    );
    client.close().await;
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let (mut client, _) = start(NotificationPermission::Granted);
    let garbage = b"not json";
    client
        .writer
        .write_all(&(garbage.len() as u32).to_ne_bytes())
        .await
        .unwrap();
    client.writer.write_all(garbage).await.unwrap();

    let reply = client.request(json!({"action": "getToken"}), "after").await;
    assert_eq!(reply["token"], Value::Null);
    client.close().await;
}

#[tokio::test]
async fn test_observed_bearer_is_announced() {
    let (mut client, _) = start(NotificationPermission::Granted);
    client
        .send(json!({
            "action": "observeRequest",
            "requestId": "obs",
            "url": "https://members.wework.com/workplaceone/api/spaces",
            "requestHeaders": [{"name": "Authorization", "value": format!("Bearer {TOKEN}")}]
        }))
        .await;

    let mut saw_reply = false;
    let mut saw_event = false;
    while !(saw_reply && saw_event) {
        let frame = client.next().await;
        if frame[REQUEST_ID] == "obs" {
            assert_eq!(frame["captured"], true);
            saw_reply = true;
        } else if frame["action"] == "tokenCaptured" {
            assert_eq!(frame["token"], TOKEN);
            saw_event = true;
        }
    }
    client.close().await;
}

#[tokio::test]
async fn test_book_dates_requires_token() {
    let (mut client, api) = start(NotificationPermission::Granted);
    let reply = client
        .request(json!({"action": "bookDates", "dates": ["2025-03-10"]}), "b")
        .await;
    assert_eq!(
        reply["error"],
        "Not authenticated: no bearer token captured yet"
    );
    assert!(api.booked.lock().unwrap().is_empty());
    client.close().await;
}

#[tokio::test]
async fn test_book_dates_streams_progress_before_summary() {
    let (mut client, api) = start(NotificationPermission::Granted);
    client
        .request(json!({"action": "setToken", "token": TOKEN}), "t")
        .await;

    client
        .send(json!({"action": "bookDates", "requestId": "b", "dates": ["2025-03-10", "2025-03-16"]}))
        .await;
    let (events, reply) = client.until_response("b").await;

    let progress: Vec<&Value> = events
        .iter()
        .filter(|event| event["action"] == "bookingProgress")
        .collect();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["date"], "2025-03-10");
    assert_eq!(progress[0]["outcome"], "success");

    assert_eq!(reply["summary"]["successful"], json!(["2025-03-10"]));
    assert_eq!(reply["summary"]["excluded"], json!(["2025-03-16"]));
    assert_eq!(api.booked.lock().unwrap().len(), 1);

    let reply = client.request(json!({"action": "getBookedDates"}), "d").await;
    assert_eq!(reply["dates"], json!(["2025-03-10"]));
    client.close().await;
}

#[tokio::test]
async fn test_set_reminders_schedules_and_confirms() {
    let (mut client, _) = start(NotificationPermission::Granted);
    client
        .send(json!({"action": "setReminders", "requestId": "r", "dates": ["2025-03-20"], "leadDays": 2}))
        .await;

    let mut reply = None;
    let mut confirmed = false;
    while reply.is_none() || !confirmed {
        let frame = client.next().await;
        if frame[REQUEST_ID] == "r" {
            reply = Some(frame);
        } else if frame["action"] == "notification"
            && frame["message"] == "You'll be reminded 2 day(s) before 1 booking(s) expire"
        {
            confirmed = true;
        }
    }
    let reply = reply.unwrap();
    assert_eq!(reply["reminders"][0]["alarmName"], "reminder-2025-03-20-2");
    client.close().await;
}

#[tokio::test]
async fn test_set_reminders_denied() {
    let (mut client, _) = start(NotificationPermission::Denied);
    let reply = client
        .request(
            json!({"action": "setReminders", "dates": ["2025-03-20"], "leadDays": 2}),
            "r",
        )
        .await;
    assert_eq!(reply["error"], "Notification permission not granted");
    client.close().await;
}

#[tokio::test]
async fn test_available_locations_use_bundled_snapshot() {
    let (mut client, _) = start(NotificationPermission::Granted);
    let reply = client
        .request(json!({"action": "getAvailableLocations"}), "l")
        .await;
    let locations = reply["locations"].as_array().unwrap();
    assert!(!locations.is_empty());
    assert!(locations.iter().all(|l| l["locationId"].is_string()));
    client.close().await;
}
