mod common;

use common::*;
use floppycontrol::{BackendError, ControlError, DeviceInfo, ScanOutcome};

#[tokio::test]
async fn unregistered_tag_is_ignored_without_play_call() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    let outcome = orchestrator.on_tag_scanned("UNKNOWN").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Ignored {
            tag_uid: "UNKNOWN".into()
        }
    );
    assert!(fx.cloud.plays().is_empty());
    assert_eq!(fx.cloud.list_calls(), 0);
    assert_eq!(fx.prompt.prompts(), 0);
}

#[tokio::test]
async fn scenario_a_cached_device_accepted() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("cached-id");
    fx.cloud
        .devices
        .lock()
        .unwrap()
        .push(DeviceInfo::new("Other", "cached-id"));
    let mut orchestrator = fx.orchestrator();

    let outcome = orchestrator.on_tag_scanned("TAG001").await.unwrap();

    assert_eq!(
        fx.cloud.plays(),
        vec![("cached-id".to_string(), "spotify:track:XYZ".to_string())]
    );
    assert_eq!(fx.cloud.list_calls(), 0);
    match outcome {
        ScanOutcome::Played(request) => {
            assert_eq!(request.tag_uid, "TAG001");
            assert_eq!(request.resolved_device_id, "cached-id");
            assert_eq!(request.resolved_uri, "spotify:track:XYZ");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn scenario_b_stale_cache_is_rediscovered_once() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("stale-id");
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();

    assert_eq!(
        fx.cloud.plays(),
        vec![
            ("stale-id".to_string(), "spotify:track:XYZ".to_string()),
            ("fresh-id".to_string(), "spotify:track:XYZ".to_string()),
        ]
    );
    assert_eq!(fx.cloud.list_calls(), 1);
    assert_eq!(fx.cached_device().as_deref(), Some("fresh-id"));
}

#[tokio::test]
async fn scenario_c_local_file_uri() {
    let fx = Fixture::new(TAG_LOCAL);
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG002").await.unwrap();

    assert_eq!(
        fx.cloud.plays(),
        vec![("fresh-id".to_string(), "http://host:8080/track.mp3".to_string())]
    );
}

#[tokio::test]
async fn empty_cache_discovers_and_caches() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    orchestrator.on_tag_scanned("TAG001").await.unwrap();

    // la deuxième lecture réutilise l'id en cache
    assert_eq!(fx.cloud.list_calls(), 1);
    assert_eq!(fx.cloud.plays().len(), 2);
    assert_eq!(fx.cached_device().as_deref(), Some("fresh-id"));
}

#[tokio::test]
async fn rediscovery_is_bounded_when_device_keeps_failing() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("stale-id");
    fx.cloud
        .script_play(Err(BackendError::device_not_found("stale-id")));
    fx.cloud
        .script_play(Err(BackendError::device_not_found("fresh-id")));
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();

    assert!(matches!(err, ControlError::DeviceUnavailable { .. }));
    assert_eq!(fx.cloud.plays().len(), 2);
    assert_eq!(fx.cloud.list_calls(), 1);
    assert_eq!(fx.cached_device(), None);
}

#[tokio::test]
async fn missing_device_is_unavailable_and_cache_invalidated() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("stale-id");
    fx.cloud.devices.lock().unwrap().clear();
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();

    assert!(matches!(err, ControlError::DeviceUnavailable { .. }));
    assert_eq!(fx.cloud.plays().len(), 1);
    assert_eq!(fx.cached_device(), None);
}

#[tokio::test]
async fn ambiguous_device_name_is_a_configuration_error() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cloud
        .devices
        .lock()
        .unwrap()
        .push(DeviceInfo::new("WOHNZIMMER TV", "other-id"));
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();

    assert!(err.is_configuration());
    assert!(fx.cloud.plays().is_empty());
    assert_eq!(fx.cached_device(), None);
}

#[tokio::test]
async fn rejected_uri_is_playback_failed_and_cache_kept() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("fresh-id");
    fx.cloud
        .script_play(Err(BackendError::rejected("Invalid track uri")));
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();

    assert!(matches!(err, ControlError::PlaybackFailed(_)));
    assert_eq!(fx.cloud.plays().len(), 1);
    assert_eq!(fx.cloud.list_calls(), 0);
    assert_eq!(fx.cached_device().as_deref(), Some("fresh-id"));
}

#[tokio::test]
async fn network_error_is_retried_once() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("fresh-id");
    fx.cloud.script_play(Err(BackendError::network("timeout")));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    assert_eq!(fx.cloud.plays().len(), 2);

    fx.cloud.script_play(Err(BackendError::network("timeout")));
    fx.cloud.script_play(Err(BackendError::network("timeout")));
    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();
    assert!(matches!(err, ControlError::PlaybackFailed(_)));
    assert_eq!(fx.cloud.plays().len(), 4);
}

#[tokio::test]
async fn device_listing_network_error_escalates_to_unavailable() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cloud.script_list(Err(BackendError::network("reset")));
    fx.cloud.script_list(Err(BackendError::network("reset")));
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();
    assert!(matches!(err, ControlError::DeviceUnavailable { .. }));
    assert_eq!(fx.cloud.list_calls(), 2);
    assert!(fx.cloud.plays().is_empty());
}

#[tokio::test]
async fn first_scan_without_token_runs_the_handshake() {
    let fx = Fixture::new(TAG001);
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();

    assert_eq!(fx.prompt.prompts(), 1);
    assert_eq!(*fx.cloud.exchanged_codes.lock().unwrap(), vec!["good-code"]);
    assert_eq!(fx.cloud.plays().len(), 1);

    // le jeton est conservé pour le scan suivant
    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    assert_eq!(fx.prompt.prompts(), 1);
}

#[tokio::test]
async fn token_near_expiry_is_refreshed_before_playing() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(30));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    assert_eq!(fx.cloud.refresh_calls(), 1);
    assert_eq!(fx.cloud.plays().len(), 1);
}

#[tokio::test]
async fn refused_token_on_cached_device_requires_authorization() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("fresh-id");
    fx.cloud
        .script_play(Err(BackendError::unauthorized("The access token expired")));
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();

    assert!(matches!(err, ControlError::AuthRequired(_)));
    assert_eq!(fx.cloud.plays().len(), 1);
    assert_eq!(fx.cloud.list_calls(), 0);
    assert_eq!(fx.settings.read_path(&["state", "auth"]).unwrap(), None);
    assert!(!fx.auth(60).has_token());
    assert_eq!(fx.cached_device().as_deref(), Some("fresh-id"));
    assert_eq!(fx.prompt.prompts(), 0);
}

#[tokio::test]
async fn refused_token_while_rediscovering_keeps_the_cache() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("stale-id");
    fx.cloud
        .script_list(Err(BackendError::unauthorized("The access token expired")));
    let mut orchestrator = fx.orchestrator();

    let err = orchestrator.on_tag_scanned("TAG001").await.unwrap_err();

    assert!(matches!(err, ControlError::AuthRequired(_)));
    assert_eq!(fx.cloud.list_calls(), 1);
    assert_eq!(fx.cached_device().as_deref(), Some("stale-id"));
    assert!(!fx.auth(60).has_token());
}

#[tokio::test]
async fn next_scan_after_a_refused_token_authorizes_again() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("fresh-id");
    fx.cloud
        .script_play(Err(BackendError::unauthorized("revoked")));
    let mut orchestrator = fx.orchestrator();

    assert!(orchestrator.on_tag_scanned("TAG001").await.is_err());
    orchestrator.on_tag_scanned("TAG001").await.unwrap();

    assert_eq!(fx.prompt.prompts(), 1);
    assert_eq!(fx.cloud.plays().len(), 2);
    assert!(fx.auth(60).has_token());
}

#[tokio::test]
async fn shuffle_flag_is_applied_after_play() {
    let fx = Fixture::new(&format!(
        "{}  TAG003:\n    kind: stream_uri\n    value: \"spotify:album:ABC\"\n    shuffle: true\n",
        TAG001
    ));
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG003").await.unwrap();
    orchestrator.on_tag_scanned("TAG001").await.unwrap();

    assert_eq!(
        fx.cloud.shuffles(),
        vec![("fresh-id".to_string(), true), ("fresh-id".to_string(), false)]
    );
}

#[tokio::test]
async fn removed_tag_pauses_and_comes_back_resumed() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    assert!(orchestrator.on_tag_removed(" TAG001 ").await.unwrap());
    assert_eq!(fx.cloud.pauses(), vec!["fresh-id"]);

    let outcome = orchestrator.on_tag_scanned("TAG001").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Resumed {
            tag_uid: "TAG001".into(),
            device_id: "fresh-id".into()
        }
    );
    assert_eq!(fx.cloud.resumes(), vec!["fresh-id"]);
    assert_eq!(fx.cloud.plays().len(), 1);

    // deuxième retrait : la lecture a repris, elle se remet en pause
    assert!(orchestrator.on_tag_removed("TAG001").await.unwrap());
    assert_eq!(fx.cloud.pauses().len(), 2);
}

#[tokio::test]
async fn other_tag_after_pause_starts_fresh() {
    let fx = Fixture::new(&format!("{}{}", TAG001, TAG_LOCAL));
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    orchestrator.on_tag_removed("TAG001").await.unwrap();
    let outcome = orchestrator.on_tag_scanned("TAG002").await.unwrap();

    assert!(matches!(outcome, ScanOutcome::Played(_)));
    assert!(fx.cloud.resumes().is_empty());
    assert_eq!(fx.cloud.plays().len(), 2);
}

#[tokio::test]
async fn failed_resume_falls_back_to_a_fresh_play() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    orchestrator.on_tag_removed("TAG001").await.unwrap();
    fx.cloud
        .script_resume(Err(BackendError::rejected("Restriction violated")));

    let outcome = orchestrator.on_tag_scanned("TAG001").await.unwrap();

    assert!(matches!(outcome, ScanOutcome::Played(_)));
    assert_eq!(fx.cloud.resumes().len(), 1);
    assert_eq!(fx.cloud.plays().len(), 2);
}

#[tokio::test]
async fn removing_a_tag_that_is_not_playing_does_nothing() {
    let fx = Fixture::new(&format!("{}{}", TAG001, TAG_LOCAL));
    fx.store_token(&token_expiring_in(3600));
    let mut orchestrator = fx.orchestrator();

    assert!(!orchestrator.on_tag_removed("TAG001").await.unwrap());
    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    assert!(!orchestrator.on_tag_removed("TAG002").await.unwrap());

    assert!(fx.cloud.pauses().is_empty());
}

#[tokio::test]
async fn refused_token_on_pause_requires_authorization_without_prompt() {
    let fx = Fixture::new(TAG001);
    fx.store_token(&token_expiring_in(3600));
    fx.cache_device("fresh-id");
    let mut orchestrator = fx.orchestrator();

    orchestrator.on_tag_scanned("TAG001").await.unwrap();
    fx.cloud.script_pause(Err(BackendError::unauthorized("revoked")));

    let err = orchestrator.on_tag_removed("TAG001").await.unwrap_err();
    assert!(matches!(err, ControlError::AuthRequired(_)));
    assert!(!fx.auth(60).has_token());
    assert_eq!(fx.cached_device().as_deref(), Some("fresh-id"));

    // sans jeton, un nouveau retrait ne sollicite pas l'opérateur
    assert!(!orchestrator.on_tag_removed("TAG001").await.unwrap());
    assert_eq!(fx.prompt.prompts(), 0);
}
