use chrono::Duration;
use std::sync::{Arc, Mutex};

use review_core::model::{Card, CardId, Deck, DeckSettings, Language, ReviewGrade, ReviewOutcome};
use review_core::time::{Clock, fixed_now};
use services::{CompletionStatus, ReviewSessionService, SessionError};
use storage::repository::Storage;

fn lang() -> Language {
    "ell".parse().unwrap()
}

async fn seed(storage: &Storage, ids: &[&str]) {
    let deck = Deck::new(lang(), "Greek", DeckSettings::new(10, 0.9).unwrap(), fixed_now()).unwrap();
    storage.decks.upsert_deck(&deck).await.unwrap();
    for (i, id) in ids.iter().enumerate() {
        let created = fixed_now() - Duration::hours(24) + Duration::minutes(i64::try_from(i).unwrap());
        let card = Card::new(CardId::new(*id), lang(), format!("prompt {id}"), format!("answer {id}"), created)
            .unwrap();
        storage.cards.upsert_card(&card).await.unwrap();
    }
}

#[tokio::test]
async fn full_day_review_persists_and_resumes() {
    let storage = Storage::in_memory();
    seed(&storage, &["alpha", "beta", "gamma"]).await;

    let failures = Arc::new(Mutex::new(0_usize));
    let counter = Arc::clone(&failures);
    let service = ReviewSessionService::new(Clock::fixed(fixed_now()), storage.clone())
        .with_persist_error_handler(Arc::new(move |_: &ReviewOutcome, _: &SessionError| {
            *counter.lock().unwrap() += 1;
        }));
    let key = service.today(lang());

    let mut session = service.start_session(key).await.unwrap().expect("cards due");
    assert_eq!(session.store().len(), 3);
    assert_eq!(session.current_card(), Some(&CardId::new("alpha")));

    session.reveal();
    session.grade(ReviewGrade::Good).unwrap().await.unwrap();
    session.reveal();
    session.grade(ReviewGrade::Again).unwrap().await.unwrap();
    assert_eq!(session.current_card(), Some(&CardId::new("gamma")));

    let stored = storage.reviews.reviews_for_day(&key).await.unwrap();
    assert_eq!(stored.len(), 2);
    let alpha = storage.cards.get_card(lang(), &CardId::new("alpha")).await.unwrap();
    assert!(!alpha.is_new());
    assert_eq!(alpha.last_review_at(), Some(fixed_now()));

    // a fresh session for the same day picks up where this one stopped
    let resumed = service.start_session(key).await.unwrap().expect("still open");
    assert_eq!(resumed.store().manifest(), session.store().manifest());
    assert_eq!(resumed.current_card(), Some(&CardId::new("gamma")));
    assert_eq!(resumed.store().outcomes().len(), 2);

    let mut resumed = resumed;
    resumed.reveal();
    resumed.grade(ReviewGrade::Easy).unwrap().await.unwrap();
    // first pass done, the again card comes back
    assert_eq!(resumed.current_card(), Some(&CardId::new("beta")));
    resumed.reveal();
    resumed.grade(ReviewGrade::Good).unwrap().await.unwrap();

    assert_eq!(resumed.status(), CompletionStatus::Complete);
    assert_eq!(storage.reviews.reviews_for_day(&key).await.unwrap().len(), 3);
    assert_eq!(*failures.lock().unwrap(), 0);
}

#[tokio::test]
async fn language_without_cards_has_nothing_due() {
    let storage = Storage::in_memory();
    seed(&storage, &[]).await;

    let service = ReviewSessionService::new(Clock::fixed(fixed_now()), storage.clone());
    let key = service.today(lang());
    assert!(service.start_session(key).await.unwrap().is_none());
    assert!(storage.manifests.get_manifest(&key).await.unwrap().is_none());
}
