//! `nsxt_sdk::HttpClient` against the mock manager.

mod common;

use std::time::Duration;

use nsxt_sdk::{
    ClientConfig, ClientError, HttpClient, IpProtocolNsServiceEntry, ManagerApi, NsService,
    NsServiceElement, StatusCode, Tag,
};

fn client_for(server: &common::TestServer) -> HttpClient {
    HttpClient::new(ClientConfig {
        host: format!("http://{}", server.addr),
        username: "admin".to_string(),
        password: "secret".to_string(),
        allow_unverified_ssl: false,
        timeout: Duration::from_secs(5),
    })
    .expect("Failed to build client")
}

fn ip_protocol_service(name: &str, protocol_number: i64) -> NsService {
    let mut service = NsService::new(NsServiceElement::IpProtocol(IpProtocolNsServiceEntry {
        protocol_number,
    }));
    service.display_name = Some(name.to_string());
    service.description = Some("ip protocol service".to_string());
    service.tags = vec![Tag::new("scope1", "tag1")];
    service
}

#[tokio::test]
async fn test_crud_cycle() {
    let server = common::TestServer::spawn().await;
    let client = client_for(&server);

    let created = client
        .create_ns_service(&ip_protocol_service("tcp", 6))
        .await
        .unwrap();
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body.id.clone().unwrap();

    let read = client.read_ns_service(&id).await.unwrap();
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body, created.body);

    let mut update = ip_protocol_service("udp", 17);
    update.revision = read.body.revision;
    let updated = client.update_ns_service(&id, &update).await.unwrap();
    assert_eq!(updated.body.revision, 1);
    assert_eq!(
        updated.body.nsservice_element,
        NsServiceElement::IpProtocol(IpProtocolNsServiceEntry {
            protocol_number: 17
        })
    );

    let listed = client.list_ns_services().await.unwrap();
    assert_eq!(listed.body.result_count, 1);

    client.delete_ns_service(&id).await.unwrap();
    let err = client.read_ns_service(&id).await.unwrap_err();
    assert!(err.is_not_found());

    server.shutdown().await;
}

#[tokio::test]
async fn test_error_body_is_decoded() {
    let server = common::TestServer::spawn().await;
    let client = client_for(&server);

    let err = client.read_ns_service("missing-id").await.unwrap_err();
    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            let body = body.expect("error body");
            assert_eq!(body.error_code, Some(600));
            assert!(body.error_message.contains("missing-id"));
        }
        other => panic!("Unexpected error: {:?}", other),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_stale_revision_is_precondition_failed() {
    let server = common::TestServer::spawn().await;
    let client = client_for(&server);

    let created = client
        .create_ns_service(&ip_protocol_service("tcp", 6))
        .await
        .unwrap();
    let id = created.body.id.unwrap();

    let mut update = ip_protocol_service("tcp", 6);
    update.revision = 7;
    let err = client.update_ns_service(&id, &update).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::PRECONDITION_FAILED));

    server.shutdown().await;
}
