//! Poll stage integration tests with a paused clock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use sofa_core::{
    poll::{PollStage, Provider},
    testing::MockProvider,
};

#[tokio::test(start_paused = true)]
async fn test_providers_poll_at_their_own_interval() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(MockProvider::counting("fast", Duration::from_secs(1))),
        Arc::new(MockProvider::counting("medium", Duration::from_secs(2))),
        Arc::new(MockProvider::counting("slow", Duration::from_secs(5))),
    ];
    let stage = PollStage::new(providers);
    let mut rx = stage.start().await;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(5500);
    let mut titles = Vec::new();
    while let Ok(Some(item)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        titles.push(item.unique_title().to_string());
    }
    stage.stop().await;

    let mut per_provider: HashMap<String, usize> = HashMap::new();
    for title in &titles {
        let provider = title.split(' ').next().unwrap().to_string();
        *per_provider.entry(provider).or_default() += 1;
    }
    assert!(per_provider["fast"] >= 4, "{:?}", per_provider);
    assert!(per_provider["medium"] >= 2, "{:?}", per_provider);
    assert!(per_provider["slow"] >= 1, "{:?}", per_provider);

    let unique: HashSet<_> = titles.iter().collect();
    assert_eq!(unique.len(), titles.len());
}

#[tokio::test(start_paused = true)]
async fn test_fixed_provider_repeats_items() {
    let provider = Arc::new(MockProvider::fixed(
        "watchlist",
        vec![sofa_core::SearchItem::movie("Heat", 1995)],
        Duration::from_secs(1),
    ));
    let stage = PollStage::new(vec![provider]);
    let mut rx = stage.start().await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first, second);

    stage.stop().await;
}

#[tokio::test]
async fn test_stream_ends_when_no_providers() {
    let stage = PollStage::new(vec![]);
    let mut rx = stage.start().await;
    assert!(rx.recv().await.is_none());
    stage.stop().await;
}
