mod common;

use hummn_ratelimit::ratelimit::TokenBucket;

use common::{manual_harness, START_MILLIS};

#[tokio::test]
async fn burst_up_to_capacity() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 5).unwrap().with_clock(clock)));

    for expected in [4, 3, 2, 1, 0] {
        let res = h.limiter.limit("u").await.unwrap();
        assert!(res.success);
        assert_eq!(res.limit, 5);
        assert_eq!(res.remaining, expected);
        assert_eq!(res.reset, START_MILLIS + 1_000);
    }

    let res = h.limiter.limit("u").await.unwrap();
    assert!(!res.success);
    assert_eq!(res.remaining, 0);
    assert_eq!(res.reset, START_MILLIS + 1_000);
}

#[tokio::test]
async fn refills_after_the_interval() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 5).unwrap().with_clock(clock)));

    for _ in 0..5 {
        assert!(h.limiter.limit("u").await.unwrap().success);
    }
    assert!(!h.limiter.limit("u").await.unwrap().success);

    h.clock.advance(1_100);

    let res = h.limiter.limit("u").await.unwrap();
    assert!(res.success);
    assert_eq!(res.remaining, 0);
}

#[tokio::test]
async fn refill_is_capped_at_max_tokens() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(10, "1s", 5).unwrap().with_clock(clock)));

    h.limiter.limit("u").await.unwrap();
    h.limiter.limit("u").await.unwrap();

    h.clock.advance(3_000);

    let res = h.limiter.get_remaining("u").await.unwrap();
    assert!(res.remaining <= 5);
    assert_eq!(res.remaining, 5);

    // a full burst is available again, not more
    for expected in [4, 3, 2, 1, 0] {
        let res = h.limiter.limit("u").await.unwrap();
        assert!(res.success);
        assert_eq!(res.remaining, expected);
    }
    assert!(!h.limiter.limit("u").await.unwrap().success);
}

#[tokio::test]
async fn remaining_without_prior_state_is_the_full_bucket() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 5).unwrap().with_clock(clock)));

    let res = h.limiter.get_remaining("u").await.unwrap();
    assert_eq!(res.remaining, 5);
    assert_eq!(res.reset, START_MILLIS + 1_000);
}

#[tokio::test]
async fn refusal_writes_nothing_back() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 5).unwrap().with_clock(clock)));

    let res = h.limiter.limit_with_rate("u", 3).await.unwrap();
    assert!(res.success);
    assert_eq!(res.remaining, 2);

    let res = h.limiter.limit_with_rate("u", 3).await.unwrap();
    assert!(!res.success);
    assert_eq!(res.remaining, 0);

    // the refused request did not consume the two tokens still in the bucket
    let res = h.limiter.limit("u").await.unwrap();
    assert!(res.success);
    assert_eq!(res.remaining, 1);
}

#[tokio::test]
async fn sub_interval_progress_is_preserved() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 2).unwrap().with_clock(clock)));

    assert!(h.limiter.limit("u").await.unwrap().success);
    assert!(h.limiter.limit("u").await.unwrap().success);

    // one and a half intervals later only one whole refill has happened,
    // and the half interval counts toward the next one
    h.clock.advance(1_500);
    let res = h.limiter.limit("u").await.unwrap();
    assert!(res.success);
    assert_eq!(res.remaining, 0);

    h.clock.advance(700);
    assert!(h.limiter.limit("u").await.unwrap().success);
}

#[tokio::test]
async fn reset_restores_full_bucket() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 5).unwrap().with_clock(clock)));

    h.limiter.limit("u").await.unwrap();
    h.limiter.limit("u").await.unwrap();

    h.limiter.reset_used_tokens("u").await.unwrap();

    let res = h.limiter.limit("u").await.unwrap();
    assert!(res.success);
    assert_eq!(res.remaining, 4);
}

#[tokio::test]
async fn identifiers_are_isolated() {
    let h =
        manual_harness(|clock| Box::new(TokenBucket::new(1, "1s", 1).unwrap().with_clock(clock)));

    assert!(h.limiter.limit("a").await.unwrap().success);
    assert!(!h.limiter.limit("a").await.unwrap().success);
    assert!(h.limiter.limit("b").await.unwrap().success);
}
