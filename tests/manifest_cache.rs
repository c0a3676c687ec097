mod common;

use d2x::{bungie_api::BungieClient, defs::DefTable, manifest::DefsLoader, storage::Store};

fn client(fake: &common::Fake) -> BungieClient {
    BungieClient::anonymous(fake.base.clone(), Some("test-key".into()), 5_000, 0)
}

#[tokio::test]
async fn unchanged_manifest_is_served_from_cache() {
    let fake = common::start().await;
    let db = common::temp_db("manifest-reuse");
    let store = Store::open(&db).unwrap();

    let defs = DefsLoader::new(client(&fake), store.clone(), "en")
        .load_defs()
        .await
        .unwrap();
    assert_eq!(defs.version, "v1");
    assert_eq!(fake.downloads(), 3);
    assert_eq!(
        defs.get_inventory_item_lite_def(2575506895)
            .unwrap()
            .display_properties
            .name,
        "Kindled Orchid"
    );
    assert_eq!(defs.get_season_def(77).unwrap().season_number, 24);

    let again = DefsLoader::new(client(&fake), store, "en")
        .load_defs()
        .await
        .unwrap();
    assert_eq!(fake.downloads(), 3);
    assert_eq!(again.table_len(DefTable::Stat), 2);
    assert_eq!(again.table_len(DefTable::InventoryItemLite), 4);

    let _ = std::fs::remove_file(&db);
}

#[tokio::test]
async fn new_manifest_version_downloads_and_prunes() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();

    DefsLoader::new(client(&fake), store.clone(), "en")
        .load_defs()
        .await
        .unwrap();
    fake.set_manifest_version("v2");
    let defs = DefsLoader::new(client(&fake), store.clone(), "en")
        .load_defs()
        .await
        .unwrap();

    assert_eq!(defs.version, "v2");
    assert_eq!(fake.downloads(), 6);
    let stale = store
        .call(|s| s.get_table("v1", "en", "InventoryItemLite"))
        .await
        .unwrap();
    assert!(stale.is_none());
    let fresh = store
        .call(|s| s.get_table("v2", "en", "InventoryItemLite"))
        .await
        .unwrap();
    assert!(fresh.is_some());
}

#[tokio::test]
async fn excluded_tables_stay_empty() {
    let fake = common::start().await;
    let defs = DefsLoader::new(client(&fake), Store::in_memory().unwrap(), "en")
        .include_tables(&[DefTable::Season])
        .load_defs()
        .await
        .unwrap();

    assert_eq!(fake.downloads(), 1);
    assert_eq!(defs.all_inventory_item_lite_defs().count(), 0);
    assert!(defs.get_inventory_item_lite_def(2575506895).is_none());
    assert!(defs.get_season_def(77).is_some());
}

#[tokio::test]
async fn missing_language_fails_the_load() {
    let fake = common::start().await;
    let err = DefsLoader::new(client(&fake), Store::in_memory().unwrap(), "fr")
        .load_defs()
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("'fr'"), "{err:#}");
    assert_eq!(fake.downloads(), 0);
}

#[tokio::test]
async fn error_envelope_and_http_errors_surface() {
    let fake = common::start().await;
    let c = client(&fake);

    // needs a bearer token; the fake answers 401 with a WebAuthRequired envelope
    let err = c.get_membership_data_for_current_user().await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("WebAuthRequired"), "{msg}");
    assert!(msg.contains("Please sign-in"), "{msg}");

    let err = c.fetch_text("/content/nope.json").await.unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");

    let settings = c.get_common_settings().await.unwrap();
    assert_eq!(settings.destiny2_core_settings.current_season_hash, 77);
}
