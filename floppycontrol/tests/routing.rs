mod common;

use std::sync::Arc;

use common::*;
use floppycontrol::{AvTransportRenderer, BackendError, CloudPlayback, RoutedPlayback};
use mockito::Matcher;

#[tokio::test]
async fn http_uris_go_to_the_renderer() {
    let mut upnp = mockito::Server::new_async().await;
    let set_uri = upnp
        .mock("POST", "/AVTransport/Control")
        .match_header(
            "soapaction",
            "\"urn:schemas-upnp-org:service:AVTransport:1#SetAVTransportURI\"",
        )
        .match_body(Matcher::Regex(
            "<CurrentURI>http://host:8080/track.mp3</CurrentURI>".to_string(),
        ))
        .with_status(200)
        .create_async()
        .await;
    let play = upnp
        .mock("POST", "/AVTransport/Control")
        .match_header("soapaction", "\"urn:schemas-upnp-org:service:AVTransport:1#Play\"")
        .with_status(200)
        .create_async()
        .await;

    let cloud = Arc::new(FakeCloud::new(vec![]));
    let renderer =
        AvTransportRenderer::new(format!("{}/AVTransport/Control", upnp.url())).unwrap();
    let routed = RoutedPlayback::new(cloud.clone(), Some(renderer));

    routed
        .play("fresh-id", "http://host:8080/track.mp3", &token_expiring_in(3600))
        .await
        .unwrap();

    set_uri.assert_async().await;
    play.assert_async().await;
    assert!(cloud.plays().is_empty());
}

#[tokio::test]
async fn catalog_uris_go_to_the_cloud() {
    let cloud = Arc::new(FakeCloud::new(vec![floppycontrol::DeviceInfo::new(SPEAKER, "fresh-id")]));
    let renderer = AvTransportRenderer::new("http://127.0.0.1:9/unused").unwrap();
    let routed = RoutedPlayback::new(cloud.clone(), Some(renderer));

    routed
        .play("fresh-id", "spotify:track:XYZ", &token_expiring_in(3600))
        .await
        .unwrap();
    assert_eq!(
        cloud.plays(),
        vec![("fresh-id".to_string(), "spotify:track:XYZ".to_string())]
    );
}

#[tokio::test]
async fn upnp_fault_is_a_rejection() {
    let mut upnp = mockito::Server::new_async().await;
    let _fault = upnp
        .mock("POST", "/ctl")
        .with_status(500)
        .with_body(
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body><s:Fault>\
             <detail><UPnPError><errorCode>714</errorCode>\
             <errorDescription>Illegal MIME-type</errorDescription></UPnPError></detail>\
             </s:Fault></s:Body></s:Envelope>",
        )
        .create_async()
        .await;

    let renderer = AvTransportRenderer::new(format!("{}/ctl", upnp.url())).unwrap();
    let err = renderer.play_uri("http://host:8080/a.xyz").await.unwrap_err();
    match err {
        BackendError::Rejected(reason) => assert!(reason.contains("714")),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn pause_follows_the_last_route() {
    let mut upnp = mockito::Server::new_async().await;
    let _set_uri = upnp
        .mock("POST", "/ctl")
        .match_header(
            "soapaction",
            "\"urn:schemas-upnp-org:service:AVTransport:1#SetAVTransportURI\"",
        )
        .with_status(200)
        .create_async()
        .await;
    let _play = upnp
        .mock("POST", "/ctl")
        .match_header("soapaction", "\"urn:schemas-upnp-org:service:AVTransport:1#Play\"")
        .with_status(200)
        .create_async()
        .await;
    let pause = upnp
        .mock("POST", "/ctl")
        .match_header("soapaction", "\"urn:schemas-upnp-org:service:AVTransport:1#Pause\"")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let cloud = Arc::new(FakeCloud::new(vec![floppycontrol::DeviceInfo::new(SPEAKER, "fresh-id")]));
    let renderer = AvTransportRenderer::new(format!("{}/ctl", upnp.url())).unwrap();
    let routed = RoutedPlayback::new(cloud.clone(), Some(renderer));
    let token = token_expiring_in(3600);

    routed.play("fresh-id", "http://host:8080/track.mp3", &token).await.unwrap();
    routed.pause("fresh-id", &token).await.unwrap();
    pause.assert_async().await;
    assert!(cloud.pauses().is_empty());

    routed.play("fresh-id", "spotify:track:XYZ", &token).await.unwrap();
    routed.pause("fresh-id", &token).await.unwrap();
    assert_eq!(cloud.pauses(), vec!["fresh-id"]);
}
