//! Typed endpoint calls against a mock backend.

use std::sync::Arc;

use fleetdesk_core::auth::{CredentialStore, FileCredentialStore, Session, SessionController, UserIdentity};
use fleetdesk_core::models::{DeviceForm, NewUser, RecordId};
use fleetdesk_core::{ApiError, Config, ErrorKind, Operation};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Controller restored from a stored session, so requests carry `tok-admin`
fn logged_in(server: &MockServer) -> (SessionController, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path());
    store
        .save(&Session::new(
            UserIdentity::new("voanhdung", Some("admin")),
            "tok-admin".to_string(),
        ))
        .unwrap();

    let config = Config {
        api_base_url: server.uri(),
        ..Config::default()
    };
    let controller = SessionController::new(&config, Arc::new(store)).unwrap();
    assert!(controller.is_authenticated());
    (controller, dir)
}

#[tokio::test]
async fn test_list_users_sends_keyword_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("keyword", "lan"))
        .and(header("authorization", "tok-admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {"id": 1, "username": "lan", "device_id": 4, "updated_at": "2025-03-01T08:00:00Z"},
                {"id": "u-2", "username": "lanh", "device_id": null}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let users = controller.api().list_users(" lan ").await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].device_id, Some(RecordId::Int(4)));
    assert_eq!(users[1].id, RecordId::Text("u-2".into()));
}

#[tokio::test]
async fn test_delete_user_then_list_excludes_it() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 8, "username": "minh"}]
        })))
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    controller.api().delete_user(&RecordId::Int(7)).await.unwrap();
    let users = controller.api().list_users("").await.unwrap();
    assert!(users.iter().all(|u| u.id != RecordId::Int(7)));
}

#[tokio::test]
async fn test_create_user_sends_null_device() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/register"))
        .and(body_json(json!({"username": "minh", "password": "secret1", "device_id": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let user = NewUser {
        username: "minh".into(),
        password: "secret1".into(),
        device_id: None,
    };
    controller.api().create_user(&user).await.unwrap();
}

#[tokio::test]
async fn test_create_user_with_blank_fields_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let err = controller
        .api()
        .create_user(&NewUser::default())
        .await
        .unwrap_err();
    match err {
        ApiError::Validation(errors) => {
            assert!(errors.get("username").is_some());
            assert!(errors.get("password").is_some());
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_change_device_can_unassign() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/users/changedevice/3"))
        .and(body_json(json!({"device_id": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/users/changedevice/3"))
        .and(body_json(json!({"device_id": 9})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let api = controller.api();
    api.change_device(&RecordId::Int(3), None).await.unwrap();
    api.change_device(&RecordId::Int(3), Some(RecordId::Int(9)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_password_failure_uses_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/users/reset/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Không thể reset mật khẩu cho Super Admin"
        })))
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let err = controller
        .api()
        .reset_password(&RecordId::Int(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(
        err.user_message(Operation::ResetPassword),
        "Không thể reset mật khẩu cho Super Admin"
    );
    assert!(controller.is_authenticated());
}

#[tokio::test]
async fn test_empty_external_id_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let form = DeviceForm {
        external_id: "  ".into(),
        name: "Kho A".into(),
        description: String::new(),
    };
    let err = controller.api().create_device(&form).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.user_message(Operation::CreateDevice),
        "Mã thiết bị không được để trống"
    );
}

#[tokio::test]
async fn test_device_crud() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .and(body_json(json!({"external_id": "DEV-01", "name": "Kho A", "description": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": 12, "external_id": "DEV-01", "name": "Kho A", "description": null}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/devices/12"))
        .and(body_json(json!({"external_id": "DEV-01", "name": "Kho B", "description": "tầng 2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/devices/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);
    let api = controller.api();

    api.create_device(&DeviceForm {
        external_id: "DEV-01".into(),
        name: "Kho A".into(),
        description: String::new(),
    })
    .await
    .unwrap();

    let device = api.get_device(&RecordId::Int(12)).await.unwrap();
    assert_eq!(device.display_name(), "Kho A");

    let mut form = DeviceForm::from_device(&device);
    form.name = "Kho B".into();
    form.description = "tầng 2".into();
    api.update_device(&device.id, &form).await.unwrap();

    api.delete_device(&device.id).await.unwrap();
}

#[tokio::test]
async fn test_text_ids_are_encoded_as_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/kho%2F1%3Fx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/DEV%2001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": "DEV 01", "external_id": "DEV 01"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);
    let api = controller.api();

    api.delete_user(&RecordId::Text("kho/1?x".into()))
        .await
        .unwrap();
    let device = api.get_device(&RecordId::Text("DEV 01".into())).await.unwrap();
    assert_eq!(device.id, RecordId::Text("DEV 01".into()));
}

#[tokio::test]
async fn test_server_error_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    let (controller, _dir) = logged_in(&server);

    let err = controller.api().list_devices("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(
        err.user_message(Operation::ListDevices),
        "Không thể lấy danh sách thiết bị"
    );
    assert!(controller.is_authenticated());
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        api_base_url: "http://127.0.0.1:9".into(),
        request_timeout_secs: 2,
        ..Config::default()
    };
    let controller =
        SessionController::new(&config, Arc::new(FileCredentialStore::new(dir.path()))).unwrap();

    let err = controller.api().list_users("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(
        err.user_message(Operation::ListUsers),
        "Không thể lấy danh sách người dùng"
    );
}
