use std::env;
use std::sync::Arc;

use study_planner::models::{Material, NewMaterial};
use study_planner::notify::ChangeHub;
use study_planner::store::{RestConfig, RestStore, StoreClient};
use study_planner::sync::{CollectionCache, Mutation, MutationOutcome};
use uuid::Uuid;

fn rest_client() -> (StoreClient, Uuid) {
    dotenvy::dotenv().ok();

    let config = RestConfig {
        base_url: env::var("SUPABASE_URL").expect("SUPABASE_URL not set"),
        api_key: env::var("SUPABASE_ANON_KEY").expect("SUPABASE_ANON_KEY not set"),
    };
    let user_id = env::var("PLANNER_USER_ID")
        .expect("PLANNER_USER_ID not set")
        .parse()
        .expect("PLANNER_USER_ID is not a uuid");
    let token = env::var("PLANNER_ACCESS_TOKEN").ok();

    let store = RestStore::new(config)
        .expect("Failed to build client")
        .with_access_token(token);
    (StoreClient::new(Arc::new(store), ChangeHub::default()), user_id)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_material_round_trip_against_hosted_store() {
    let (client, user_id) = rest_client();
    let cache = CollectionCache::<Material>::open(client.clone(), user_id).await;
    assert!(cache.error().is_none(), "initial load failed: {:?}", cache.error());
    let before = cache.snapshot().len();

    let outcome = cache
        .mutate(Mutation::Insert(NewMaterial {
            subject: "integration test".to_string(),
            file_url: "https://example.invalid/notes.pdf".to_string(),
        }))
        .await
        .expect("insert failed");
    let MutationOutcome::Applied { id } = outcome else {
        panic!("insert was not applied");
    };
    assert_eq!(cache.snapshot().len(), before + 1);
    assert!(cache.find(id).is_some());

    let outcome = cache.mutate(Mutation::Delete(id)).await.expect("delete failed");
    assert_eq!(outcome, MutationOutcome::Applied { id });
    assert!(cache.find(id).is_none());

    // Deleting again finds nothing.
    let outcome = cache.mutate(Mutation::Delete(id)).await.expect("delete failed");
    assert_eq!(outcome, MutationOutcome::Missing);

    cache.close().await;
}

#[tokio::test]
#[ignore]
async fn test_rows_are_scoped_to_the_signed_in_user() {
    let (client, user_id) = rest_client();
    let materials = client
        .fetch_all::<Material>(user_id)
        .await
        .expect("Failed to fetch materials");
    assert!(materials.iter().all(|m| m.owner_id == user_id));
}
