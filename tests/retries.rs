mod common;

use d2x::bungie_api::BungieClient;

fn client(fake: &common::Fake, retries: u32) -> BungieClient {
    BungieClient::anonymous(fake.base.clone(), Some("k".into()), 5_000, retries)
}

#[tokio::test]
async fn throttled_and_unavailable_responses_are_retried() {
    let fake = common::start().await;
    fake.fail_next(&[429, 503]);

    let settings = client(&fake, 2).get_common_settings().await.unwrap();
    assert_eq!(settings.destiny2_core_settings.current_season_hash, 77);
    assert_eq!(fake.hits("/Platform/Settings/"), 3);
}

#[tokio::test]
async fn retries_run_out() {
    let fake = common::start().await;
    fake.fail_next(&[503, 503]);

    let err = client(&fake, 1).get_common_settings().await.unwrap_err();
    assert!(err.to_string().contains("503"), "{err}");
    assert_eq!(fake.hits("/Platform/Settings/"), 2);
}

#[tokio::test]
async fn no_retries_surfaces_the_first_failure() {
    let fake = common::start().await;
    fake.fail_next(&[503]);

    let err = client(&fake, 0).get_common_settings().await.unwrap_err();
    assert!(err.to_string().contains("503"), "{err}");
    assert_eq!(fake.hits("/Platform/Settings/"), 1);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let fake = common::start().await;

    let err = client(&fake, 3)
        .fetch_text("/content/missing.json")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
    assert_eq!(fake.hits("/content/missing.json"), 1);
}
