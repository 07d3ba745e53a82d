//! End-to-end lifecycle against a mocked pair of arrays, driven exclusively
//! through the public API.

use httpmock::{Method::DELETE, Method::GET, Method::POST, Method::PUT, MockServer};
use hypermetro_client::{ClientConfig, DeviceConfig, MetroClient, PairStatus};

const DEV: &str = "/deviceManager/rest/dev-1";

fn device_config(server: &MockServer) -> DeviceConfig {
    DeviceConfig {
        controllers: vec![server.base_url()],
        username: "admin".into(),
        password: "secret".into(),
        accept_invalid_certs: false,
    }
}

fn client_config(local: &MockServer, remote: &MockServer) -> ClientConfig {
    ClientConfig {
        local: device_config(local),
        remote: device_config(remote),
        port_group: "pg0".into(),
        retry_budget: 10,
        copy_timeout_secs: 1,
        poll_interval_ms: 1,
    }
}

fn mock_login<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(POST).path("/deviceManager/rest/xx/sessions");
        then.status(200).json_body(serde_json::json!({
            "data": {"iBaseToken": token, "deviceid": "dev-1"},
            "error": {"code": 0, "description": "", "suggestion": ""},
        }));
    })
}

fn ok_unit() -> serde_json::Value {
    serde_json::json!({"data": {}, "error": {"code": 0}})
}

#[tokio::test]
async fn connect_logs_in_eagerly_on_both_sides() {
    let local = MockServer::start();
    let remote = MockServer::start();
    let local_login = mock_login(&local, "tok-l");
    let remote_login = mock_login(&remote, "tok-r");

    let client = MetroClient::connect(client_config(&local, &remote)).await.unwrap();

    local_login.assert_hits(1);
    remote_login.assert_hits(1);

    // The active base URL embeds the device id the array reported.
    let endpoint = client.local().active_endpoint().await.unwrap();
    assert_eq!(endpoint.as_str(), format!("{}{}", local.base_url(), DEV));
}

#[tokio::test]
async fn connect_fails_over_to_the_second_controller() {
    let local = MockServer::start();
    let remote = MockServer::start();
    mock_login(&local, "tok-l");
    mock_login(&remote, "tok-r");

    let mut config = client_config(&local, &remote);
    // A dead endpoint first: login must skip it and use the live one.
    config.local.controllers.insert(0, "http://127.0.0.1:1".into());

    let client = MetroClient::connect(config).await.unwrap();

    let endpoint = client.local().active_endpoint().await.unwrap();
    assert!(endpoint.as_str().starts_with(&local.base_url()));
    assert!(!endpoint.as_str().contains("127.0.0.1:1"));
}

#[tokio::test]
async fn volume_create_then_delete_roundtrip() {
    let local = MockServer::start();
    let remote = MockServer::start();
    mock_login(&local, "tok-l");
    mock_login(&remote, "tok-r");

    for (server, lun_id) in [(&local, 11), (&remote, 22)] {
        server.mock(|when, then| {
            when.method(GET)
                .path(format!("{DEV}/storagepool"))
                .query_param("filter", "NAME::pool-0");
            then.status(200).json_body(serde_json::json!({
                "data": [{"ID": "1", "NAME": "pool-0"}],
                "error": {"code": 0},
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path(format!("{DEV}/lun"));
            then.status(200).json_body(serde_json::json!({
                "data": {"ID": lun_id.to_string(), "NAME": "vol-1"},
                "error": {"code": 0},
            }));
        });
        // Never attached: delete needs no group unwinding.
        server.mock(|when, then| {
            when.method(GET).path(format!("{DEV}/lun/{lun_id}"));
            then.status(200).json_body(serde_json::json!({
                "data": {"ID": lun_id.to_string(), "NAME": "vol-1", "ISADD2LUNGROUP": "false"},
                "error": {"code": 0},
            }));
        });
        server.mock(|when, then| {
            when.method(DELETE).path(format!("{DEV}/lun/{lun_id}"));
            then.status(200).json_body(ok_unit());
        });
    }

    let pair = serde_json::json!({
        "ID": "pair-1",
        "DOMAINID": "domain-1",
        "LOCALOBJID": "11",
        "REMOTEOBJID": "22",
        "RUNNINGSTATUS": "1",
        "HEALTHSTATUS": "1",
    });
    local.mock(|when, then| {
        when.method(POST).path(format!("{DEV}/HyperMetroPair"));
        then.status(200)
            .json_body(serde_json::json!({"data": pair.clone(), "error": {"code": 0}}));
    });
    local.mock(|when, then| {
        when.method(GET).path(format!("{DEV}/HyperMetroPair/pair-1"));
        then.status(200)
            .json_body(serde_json::json!({"data": pair.clone(), "error": {"code": 0}}));
    });
    let suspend = local.mock(|when, then| {
        when.method(PUT).path(format!("{DEV}/HyperMetroPair/disable_hcpair"));
        then.status(200).json_body(ok_unit());
    });
    let pair_delete = local.mock(|when, then| {
        when.method(DELETE).path(format!("{DEV}/HyperMetroPair/pair-1"));
        then.status(200).json_body(ok_unit());
    });

    let client = MetroClient::connect(client_config(&local, &remote)).await.unwrap();

    let created = client.create_volume("vol-1", 10, "pool-0", "domain-1").await.unwrap();
    assert_eq!(created.id, "pair-1");
    assert_eq!(created.local_lun_id, 11);
    assert_eq!(created.remote_lun_id, 22);
    assert_eq!(created.running_status, PairStatus::Normal);

    let fetched = client.hyper_metro_pair("pair-1").await.unwrap();
    assert_eq!(fetched.local_lun_id, created.local_lun_id);
    assert_eq!(fetched.remote_lun_id, created.remote_lun_id);

    client.delete_volume("pair-1").await.unwrap();
    suspend.assert_hits(1);
    pair_delete.assert_hits(1);
}

#[tokio::test]
async fn expired_session_is_refreshed_transparently_mid_workflow() {
    let local = MockServer::start();
    let remote = MockServer::start();
    let remote_login = mock_login(&remote, "tok-r");

    // Local side: first login yields a token the array then rejects once.
    let mut local_login = mock_login(&local, "tok-l");
    let rejected = local.mock(|when, then| {
        when.method(GET)
            .path(format!("{DEV}/HyperMetroPair/pair-1"))
            .header("iBaseToken", "tok-l");
        then.status(200).json_body(serde_json::json!({
            "data": {},
            "error": {"code": -401, "description": "Unauthorized token.", "suggestion": ""},
        }));
    });

    let client = MetroClient::connect(client_config(&local, &remote)).await.unwrap();
    local_login.assert_hits(1);
    remote_login.assert_hits(1);

    // Swap the login response to a fresh token and answer for it.
    local_login.delete();
    mock_login(&local, "tok-l2");
    local.mock(|when, then| {
        when.method(GET)
            .path(format!("{DEV}/HyperMetroPair/pair-1"))
            .header("iBaseToken", "tok-l2");
        then.status(200).json_body(serde_json::json!({
            "data": {
                "ID": "pair-1",
                "LOCALOBJID": "11",
                "REMOTEOBJID": "22",
                "RUNNINGSTATUS": "1",
            },
            "error": {"code": 0},
        }));
    });

    let pair = client.hyper_metro_pair("pair-1").await.unwrap();
    assert_eq!(pair.local_lun_id, 11);
    rejected.assert_hits(1);
}
