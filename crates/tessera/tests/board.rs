//! End-to-end tests of the board over both store backends.

use std::sync::Arc;
use std::time::Duration;

use tessera::core::{canonical_bytes, day_bucket, verify, RecordBuilder, EPOCH};
use tessera::store::{keys, GraphStore, MemoryStore, SqliteStore};
use tessera::{Board, BoardConfig, BoardError, ParentRef, SettingsError};
use tessera_testkit::fixtures::{
    captcha_post, participants, with_selector, TestFixture, AFTER_EPOCH,
};

const WAIT: Duration = Duration::from_secs(30);

fn test_config() -> BoardConfig {
    let mut config = BoardConfig::default();
    config.identity.rsa_bits = 1024;
    config
}

async fn memory_board(config: BoardConfig) -> anyhow::Result<(Arc<MemoryStore>, Board)> {
    let store = Arc::new(MemoryStore::new());
    let board = Board::open(store.clone(), store.clone(), config).await?;
    Ok((store, board))
}

#[tokio::test]
async fn test_identical_post_stored_once() -> anyhow::Result<()> {
    let (store, board) = memory_board(test_config()).await?;
    let post = RecordBuilder::post("same", "content")
        .timestamp(AFTER_EPOCH)
        .build();

    let first = board.submit_post(post.clone(), None).await?;
    let second = board.submit_post(post, None).await?;
    assert_eq!(first, second);
    assert_eq!(store.node_count()?, 1);

    let mut feed = board.all_posts().await?;
    assert_eq!(feed.drain().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_tampered_record_excluded() -> anyhow::Result<()> {
    let (store, board) = memory_board(test_config()).await?;
    let me = board.identities().await?.remove(0);

    let good = board
        .submit_post(
            RecordBuilder::post("t", "genuine").timestamp(AFTER_EPOCH).build(),
            Some(&me),
        )
        .await?;

    let mut forged = board.load_post(&good).await?.expect("stored");
    forged.text = "not what was signed".into();
    let forged_id = forged.id();
    store
        .put(&keys::post_key(&forged_id), &canonical_bytes(&forged))
        .await?;
    store.set(keys::POSTS, forged_id.to_hex().as_bytes()).await?;

    assert!(matches!(
        board.load_post(&forged_id).await,
        Err(BoardError::Core(_))
    ));

    let mut feed = board.all_posts().await?;
    let posts = feed.drain().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id(), good);
    assert!(verify(&posts[0]));
    assert_eq!(feed.stats().crypto_errors, 1);
    Ok(())
}

#[tokio::test]
async fn test_selector_picks_chain_entry() -> anyhow::Result<()> {
    let fixture = TestFixture::with_seed([2; 32]);
    let board = Board::open(fixture.store.clone(), fixture.store.clone(), test_config()).await?;
    // Nearest first; answers c002, c001, c000.
    let chain = fixture.plant_chain(3).await?;

    let post = with_selector(captcha_post(AFTER_EPOCH + 10, Some(chain[0].0), "next"), 0x0a);
    assert!(post.id().to_hex().ends_with("0a"));

    let binding = board.load_captcha(&post).await?.expect("bound");
    // 10 mod 3 = 1.
    assert_eq!(binding.index, 1);
    assert_eq!(binding.source, chain[1].0);
    assert_eq!(binding.challenge.answer, "c001");
    assert_eq!(binding.chain_len, 3);

    // Same snapshot, same answer.
    assert_eq!(board.load_captcha(&post).await?, Some(binding));
    Ok(())
}

#[tokio::test]
async fn test_comment_on_legacy_thread_uses_fallback_genesis() -> anyhow::Result<()> {
    let seed = captcha_post(AFTER_EPOCH, None, "seed");
    let genesis = captcha_post(AFTER_EPOCH + 1, Some(seed.id()), "genesis");
    let mut config = test_config();
    config.resolver.fallback_genesis = genesis.id();
    let (_, board) = memory_board(config).await?;

    board.submit_post(seed.clone(), None).await?;
    board.submit_post(genesis, None).await?;
    let legacy_root = board
        .submit_post(captcha_post(EPOCH - 60, None, "old"), None)
        .await?;

    let comment = RecordBuilder::comment(legacy_root, "late reply")
        .timestamp(AFTER_EPOCH + 5)
        .build();
    let comment = with_selector(comment, 3);
    board
        .submit_comment(comment.clone(), ParentRef::Post(legacy_root), None)
        .await?;

    let binding = board.load_captcha(&comment).await?.expect("bound");
    assert_eq!(binding.source, seed.id());
    assert_eq!(binding.challenge.answer, "seed");

    let mut comments = board.get_comments(&legacy_root).await?;
    assert_eq!(comments.drain().await, vec![comment]);
    Ok(())
}

#[tokio::test]
async fn test_load_chunk_returns_day_bucket() -> anyhow::Result<()> {
    let (_, board) = memory_board(test_config()).await?;
    let day = day_bucket(AFTER_EPOCH + 86_400);

    let morning = RecordBuilder::post("a", "morning").timestamp(day + 60).build();
    let evening = RecordBuilder::post("b", "evening").timestamp(day + 80_000).build();
    let next_day = RecordBuilder::post("c", "tomorrow").timestamp(day + 90_000).build();
    for post in [&morning, &evening, &next_day] {
        board.submit_post(post.clone(), None).await?;
    }

    let mut chunk = board.load_chunk(day + 3_600).await?;
    let items = chunk.drain().await;
    assert_eq!(
        items,
        vec![(morning.timestamp, morning), (evening.timestamp, evening)]
    );
    Ok(())
}

#[tokio::test]
async fn test_load_post_rich_attaches_content() -> anyhow::Result<()> {
    let (store, board) = memory_board(test_config()).await?;
    store.put(&keys::content_key("body-1"), b"long form body").await?;

    let id = board
        .submit_post(
            RecordBuilder::post("t", "")
                .content("body-1")
                .timestamp(AFTER_EPOCH)
                .build(),
            None,
        )
        .await?;

    let rich = board.load_post_rich(&id).await?.expect("stored");
    assert_eq!(rich.content.as_deref(), Some(&b"long form body"[..]));
    assert!(board
        .load_post_rich(&tessera::RecordId::from_bytes([0; 32]))
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn test_messages_reach_recipient_and_sender() -> anyhow::Result<()> {
    let (_, board) = memory_board(test_config()).await?;
    board.generate_identity().await?;
    let identities = board.identities().await?;
    assert_eq!(identities.len(), 2);
    let (alice, bob) = (&identities[0], &identities[1]);

    let message = RecordBuilder::message("meet at noon")
        .timestamp(AFTER_EPOCH)
        .build();
    board
        .submit_message(message, alice, &bob.encryption().public)
        .await?;

    let mut bob_inbox = board.inbox(bob).await?;
    let received = tokio::time::timeout(WAIT, bob_inbox.next())
        .await?
        .expect("delivered");
    assert_eq!(received.text, "meet at noon");
    assert_eq!(received.pub_key, Some(alice.public_key()));
    assert_eq!(received.recipient, Some(bob.bucket()?));
    assert!(verify(&received));

    let mut sent = board.inbox(alice).await?;
    let copy = tokio::time::timeout(WAIT, sent.next())
        .await?
        .expect("sent copy");
    assert_eq!(copy, received);
    Ok(())
}

#[tokio::test]
async fn test_stale_settings_edit_rejected() -> anyhow::Result<()> {
    let (_, board) = memory_board(test_config()).await?;
    let before = board.settings().await?;

    board.set_theme("dark").await?;

    let mut edit = before.clone();
    edit.theme = "light".into();
    assert!(matches!(
        board.modified_settings(edit).await,
        Err(BoardError::Settings(SettingsError::Stale { .. }))
    ));

    let mut edit = board.settings().await?;
    edit.theme = "light".into();
    board.modified_settings(edit).await?;
    assert_eq!(board.settings().await?.theme, "light");
    Ok(())
}

#[tokio::test]
async fn test_removed_identity_leaves_content() -> anyhow::Result<()> {
    let (_, board) = memory_board(test_config()).await?;
    let me = board.identities().await?.remove(0);
    let id = board
        .submit_post(
            RecordBuilder::post("t", "mine").timestamp(AFTER_EPOCH).build(),
            Some(&me),
        )
        .await?;

    let settings = board.remove_identity(me.public_key()).await?;
    assert!(settings.identities.is_empty());
    assert!(board.identity(&me.public_key()).await?.is_none());

    let post = board.load_post(&id).await?.expect("still stored");
    assert_eq!(post.pub_key, Some(me.public_key()));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_board_persists_across_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("board.db");

    let (id, settings) = {
        let store = Arc::new(SqliteStore::open(&path)?);
        let board = Board::open(store.clone(), store, test_config()).await?;
        let me = board.identities().await?.remove(0);
        let id = board
            .submit_post(
                RecordBuilder::post("t", "durable").timestamp(AFTER_EPOCH).build(),
                Some(&me),
            )
            .await?;
        let settings = board.set_theme("dark").await?;
        board.shutdown().await?;
        (id, settings)
    };

    let store = Arc::new(SqliteStore::open(&path)?);
    let board = Board::open(store.clone(), store, test_config()).await?;
    assert_eq!(board.settings().await?, settings);
    let post = board.load_post(&id).await?.expect("persisted");
    assert_eq!(post.text, "durable");
    assert!(verify(&post));

    let mut feed = board.all_posts().await?;
    assert_eq!(feed.drain().await, vec![post]);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_ends_feeds() -> anyhow::Result<()> {
    let (_, board) = memory_board(test_config()).await?;
    let mut feed = board.all_posts().await?;
    board.shutdown().await?;
    assert!(tokio::time::timeout(WAIT, feed.next()).await?.is_none());
    assert!(board.settings().await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_anonymous_and_signed_posts_coexist() -> anyhow::Result<()> {
    let (_, board) = memory_board(test_config()).await?;
    let authors = participants(2);
    for (i, keypair) in authors.iter().enumerate() {
        let presigned = RecordBuilder::post("t", format!("presigned {}", i))
            .timestamp(AFTER_EPOCH)
            .sign(keypair);
        board.submit_post(presigned, None).await?;
    }
    board
        .submit_post(RecordBuilder::post("t", "anon").timestamp(AFTER_EPOCH).build(), None)
        .await?;

    let mut feed = board.all_posts().await?;
    let posts = feed.drain().await;
    assert_eq!(posts.len(), 3);
    let signers: Vec<_> = posts.iter().filter_map(|p| p.pub_key).collect();
    assert_eq!(
        signers,
        authors.iter().map(|k| k.public_key()).collect::<Vec<_>>()
    );
    Ok(())
}
