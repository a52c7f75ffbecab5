//! Integration tests for the race-room coordinator
//!
//! These tests drive the whole system through in-memory transports:
//! - Complete races in every mode, from CONNECT to GAME_END
//! - Winner resolution, elimination and disconnect handling
//! - Bot opponents racing at their configured pace
//! - Concurrent matchmaking and graceful shutdown
//! - Protocol error handling

mod fixtures;

use fixtures::{
    connect, expect_game_start, expect_race_over, progress, recv_until, start_match,
    test_config, wait_in_progress, FailingResultStore, FixedContentSource, TestServer,
    ATTACK_WORDS,
};
use race_room::coordinator::SHUTDOWN_REASON;
use race_room::metrics::MetricsCollector;
use race_room::protocol::{TIE_WINNER_ID, WAITING_NOTICE};
use race_room::{Coordinator, GameMode, Message, ParticipantKind, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::{sleep, Instant};

fn winner_of(message: &Message) -> Option<String> {
    match message {
        Message::GameEnd { winner_id, .. } => winner_id.clone(),
        other => panic!("expected GAME_END, got {:?}", other),
    }
}

fn text_of(message: &Message) -> &str {
    match message {
        Message::GameEnd { message, .. }
        | Message::GameOver { message }
        | Message::Error { message } => message,
        other => panic!("message has no text: {:?}", other),
    }
}

/// Wait until no race is running
async fn wait_for_idle(coordinator: &Coordinator) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while coordinator.sessions().count() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sessions did not wind down");
}

#[tokio::test(start_paused = true)]
async fn test_first_to_finish_wins() {
    let server = TestServer::with_words(5);
    let mut race = start_match(&server, GameMode::VsFriend).await;
    let alice = race.first_start.player_id.clone();
    let bob = race.second_start.player_id.clone();

    assert_eq!(race.first_start.words.len(), 5);
    assert_eq!(race.first_start.words, race.second_start.words);
    assert_eq!(race.first_start.opponent.as_deref(), Some("bob"));
    assert_eq!(race.second_start.opponent.as_deref(), Some("alice"));

    race.second.send(&progress(3, 80.0, 100.0)).unwrap();
    race.first.send(&progress(5, 40.0, 95.0)).unwrap();

    let first_end = expect_race_over(&mut race.first).await;
    let second_end = expect_race_over(&mut race.second).await;
    assert_eq!(winner_of(&first_end), Some(alice.clone()));
    assert_eq!(winner_of(&second_end), Some(alice.clone()));
    assert!(text_of(&first_end).starts_with("alice wins!"));

    let results = server.store.wait_for(2).await;
    assert_eq!(results.len(), 2);
    let winner = server.store.result_for(&alice).unwrap();
    let loser = server.store.result_for(&bob).unwrap();
    assert!(winner.won);
    assert!(!loser.won);
    assert_eq!(winner.words_typed, 5);
    assert_eq!(loser.kind, ParticipantKind::Human);
    assert_eq!(loser.mode, GameMode::VsFriend);

    println!("✅ First to finish wins test passed");
}

#[tokio::test(start_paused = true)]
async fn test_three_wrong_words_eliminate() {
    let server = TestServer::with_words(5);
    let mut race = start_match(&server, GameMode::Elimination).await;
    let alice = race.first_start.player_id.clone();
    let bob = race.second_start.player_id.clone();

    for _ in 0..3 {
        race.first
            .send(&Message::WordValidation {
                typed_word: "definitely-wrong".to_string(),
            })
            .unwrap();
    }

    let mut seen_health = Vec::new();
    let over = recv_until(&mut race.first, |m| {
        if let Message::HealthUpdate { health, .. } = m {
            seen_health.push(*health);
        }
        matches!(m, Message::GameOver { .. })
    })
    .await;
    assert_eq!(text_of(&over), "You have been eliminated! No health remaining.");
    assert_eq!(seen_health, vec![2, 1, 0]);

    // The opponent sees every hit, then the win
    let mut opponent_hits = 0;
    let end = recv_until(&mut race.second, |m| {
        if let Message::HealthUpdate {
            player_id,
            word_correct,
            ..
        } = m
        {
            assert_eq!(player_id, &alice);
            assert!(!word_correct);
            opponent_hits += 1;
        }
        matches!(m, Message::GameEnd { .. })
    })
    .await;
    assert_eq!(opponent_hits, 3);
    assert_eq!(winner_of(&end), Some(bob.clone()));
    assert_eq!(text_of(&end), "bob wins! Opponent eliminated.");

    server.store.wait_for(2).await;
    assert!(server.store.result_for(&bob).unwrap().won);

    println!("✅ Elimination test passed");
}

#[tokio::test(start_paused = true)]
async fn test_correct_word_keeps_health() {
    let server = TestServer::with_words(5);
    let mut race = start_match(&server, GameMode::Elimination).await;
    let first_word = race.first_start.words[0].clone();

    race.first
        .send(&Message::WordValidation {
            typed_word: first_word.to_uppercase(),
        })
        .unwrap();

    let update = recv_until(&mut race.first, |m| {
        matches!(m, Message::HealthUpdate { .. })
    })
    .await;
    assert_eq!(
        update,
        Message::HealthUpdate {
            player_id: race.first_start.player_id.clone(),
            health: 3,
            max_health: 3,
            word_correct: true,
        }
    );

    println!("✅ Correct word test passed");
}

#[tokio::test(start_paused = true)]
async fn test_identical_standings_tie_at_time_limit() {
    let mut config = test_config(50);
    config.race.max_duration_seconds = 2;
    let server = TestServer::new(config);
    let mut race = start_match(&server, GameMode::VsFriend).await;

    race.first.send(&progress(12, 45.0, 97.0)).unwrap();
    race.second.send(&progress(12, 45.0, 97.0)).unwrap();

    for client in [&mut race.first, &mut race.second] {
        let end = expect_race_over(client).await;
        assert_eq!(winner_of(&end).as_deref(), Some(TIE_WINNER_ID));
        assert_eq!(
            text_of(&end),
            "Time's up! It's a tie! Both players had identical scores!"
        );
    }

    let results = server.store.wait_for(2).await;
    assert!(results.iter().all(|r| !r.won));

    println!("✅ Tie test passed");
}

#[tokio::test(start_paused = true)]
async fn test_time_limit_resolves_by_standings() {
    let mut config = test_config(50);
    config.race.max_duration_seconds = 2;
    let server = TestServer::new(config);
    let mut race = start_match(&server, GameMode::VsFriend).await;
    let bob = race.second_start.player_id.clone();

    race.first.send(&progress(20, 50.0, 99.0)).unwrap();
    race.second.send(&progress(20, 55.0, 90.0)).unwrap();

    let end = expect_race_over(&mut race.first).await;
    assert_eq!(winner_of(&end), Some(bob));
    assert!(text_of(&end).starts_with("Time's up! bob wins!"));

    println!("✅ Time limit test passed");
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_race_awards_opponent() {
    let mut config = test_config(50);
    config.race.max_duration_seconds = 300;
    let server = TestServer::new(config);
    let mut race = start_match(&server, GameMode::VsFriend).await;
    let alice = race.first_start.player_id.clone();
    let bob = race.second_start.player_id.clone();

    race.second.send(&progress(4, 70.0, 100.0)).unwrap();
    let started = Instant::now();
    race.second.close();

    let end = expect_race_over(&mut race.first).await;
    assert_eq!(winner_of(&end), Some(alice.clone()));
    assert_eq!(text_of(&end), "Opponent disconnected. You win!");
    assert!(started.elapsed() < Duration::from_secs(5));

    server.store.wait_for(2).await;
    assert!(server.store.result_for(&alice).unwrap().won);
    assert!(!server.store.result_for(&bob).unwrap().won);

    wait_for_idle(&server.coordinator).await;
    assert_eq!(server.coordinator.stats().races_finished, 1);

    println!("✅ Disconnect mid-race test passed");
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_before_ready() {
    let server = TestServer::with_words(5);
    let mut alice = server.join("alice", GameMode::VsFriend);
    let mut bob = server.join("bob", GameMode::VsFriend);

    let alice_start = expect_game_start(&mut alice).await;
    expect_game_start(&mut bob).await;

    alice.send(&Message::Ready).unwrap();
    bob.send(&Message::Disconnect).unwrap();

    let end = expect_race_over(&mut alice).await;
    assert_eq!(winner_of(&end), Some(alice_start.player_id));
    assert_eq!(text_of(&end), "Opponent disconnected. You win!");

    wait_for_idle(&server.coordinator).await;
    // The race never started, so there is nothing to report
    assert!(server.store.results().is_empty());

    println!("✅ Disconnect before ready test passed");
}

#[tokio::test(start_paused = true)]
async fn test_attack_fires_once_per_player() {
    let server = TestServer::with_words(5);
    let mut race = start_match(&server, GameMode::Elimination).await;
    let alice = race.first_start.player_id.clone();

    let mut attacks = Vec::new();
    let mut watch = |m: &Message, words: u32| {
        if let Message::Attack {
            player_id,
            attack_words,
        } = m
        {
            attacks.push((player_id.clone(), attack_words.clone()));
        }
        matches!(m, Message::OpponentProgress { progress, .. } if progress.words_completed == words)
    };

    race.first.send(&progress(1, 65.0, 100.0)).unwrap();
    recv_until(&mut race.second, |m| watch(m, 1)).await;
    race.first.send(&progress(2, 80.0, 100.0)).unwrap();
    recv_until(&mut race.second, |m| watch(m, 2)).await;

    // Give several more ticks a chance to fire again
    sleep(Duration::from_millis(500)).await;
    race.first.send(&progress(3, 85.0, 100.0)).unwrap();
    recv_until(&mut race.second, |m| watch(m, 3)).await;

    assert_eq!(attacks.len(), 1);
    assert_eq!(attacks[0].0, alice);
    assert_eq!(attacks[0].1, ATTACK_WORDS.to_vec());

    println!("✅ Attack at most once test passed");
}

#[tokio::test(start_paused = true)]
async fn test_no_attacks_in_vs_friend() {
    let server = TestServer::with_words(5);
    let mut race = start_match(&server, GameMode::VsFriend).await;

    race.first.send(&progress(1, 120.0, 100.0)).unwrap();
    race.first.send(&progress(5, 120.0, 100.0)).unwrap();

    let mut attacked = false;
    recv_until(&mut race.second, |m| {
        attacked |= matches!(m, Message::Attack { .. });
        matches!(m, Message::GameEnd { .. })
    })
    .await;
    assert!(!attacked);

    println!("✅ No attacks outside elimination test passed");
}

#[tokio::test(start_paused = true)]
async fn test_bot_races_at_target_pace() {
    let server = TestServer::with_words(5);
    let mut human = server.join_bot("carol", "easy");

    let start = expect_game_start(&mut human).await;
    assert_eq!(start.mode, GameMode::VsBot);
    assert_eq!(start.opponent.as_deref(), Some("Easy Bot"));

    let session = server.single_session();
    human.send(&Message::Ready).unwrap();
    wait_in_progress(&session).await;
    let started = Instant::now();

    let update = recv_until(&mut human, |m| {
        matches!(m, Message::OpponentProgress { .. })
    })
    .await;
    match update {
        Message::OpponentProgress {
            player_id,
            player_name,
            progress,
        } => {
            assert_eq!(player_id, "BOT-1");
            assert_eq!(player_name, "Easy Bot");
            assert_eq!(progress.words_completed, 1);
            assert_eq!(progress.accuracy, 100.0);
        }
        other => panic!("unexpected {:?}", other),
    }

    // 26 characters at 30 WPM is 10.4s, give or take the jitter
    let end = expect_race_over(&mut human).await;
    let elapsed = started.elapsed();
    assert_eq!(winner_of(&end), Some("BOT-1".to_string()));
    assert!(elapsed >= Duration::from_secs(9), "{:?}", elapsed);
    assert!(elapsed <= Duration::from_secs(12), "{:?}", elapsed);

    let results = server.store.wait_for(2).await;
    let bot = results.iter().find(|r| r.participant_id == "BOT-1").unwrap();
    assert_eq!(bot.kind, ParticipantKind::Bot);
    assert!(bot.won);
    assert_eq!(bot.words_typed, 5);

    println!("✅ Bot pace test passed");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_difficulty_uses_default_bot() {
    let server = TestServer::with_words(5);
    let mut human = server.join_bot("dave", "nightmare");

    let start = expect_game_start(&mut human).await;
    assert_eq!(start.opponent.as_deref(), Some("Medium Bot"));

    println!("✅ Default bot difficulty test passed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_pair_off() {
    let server = TestServer::with_words(5);
    const PLAYERS: usize = 7;

    let joins = (0..PLAYERS).map(|i| {
        let coordinator = server.coordinator.clone();
        async move {
            let (transport, client) = Transport::memory();
            coordinator.accept(transport);
            client
                .send(&connect(&format!("player{}", i), "ELIMINATION"))
                .unwrap();
            client
        }
    });
    let clients = futures::future::join_all(joins).await;

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let stats = server.coordinator.stats();
            if stats.races_started == (PLAYERS / 2) as u64 && stats.players_waiting == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("players were not paired");

    // Nothing else gets paired afterwards
    sleep(Duration::from_millis(100)).await;
    let stats = server.coordinator.stats();
    assert_eq!(stats.races_started, 3);
    assert_eq!(stats.active_races, 3);
    assert_eq!(stats.players_waiting, 1);
    assert_eq!(server.coordinator.waiting(GameMode::Elimination), 1);
    assert_eq!(server.coordinator.waiting(GameMode::VsFriend), 0);
    assert_eq!(stats.active_races_by_mode.get("ELIMINATION"), Some(&3));

    drop(clients);
    println!("✅ Concurrent pairing test passed");
}

#[tokio::test(start_paused = true)]
async fn test_waiting_player_is_told_and_can_leave() {
    let server = TestServer::with_words(5);
    let mut alice = server.join("alice", GameMode::VsFriend);

    assert_eq!(alice.recv().await, Some(Message::error(WAITING_NOTICE)));
    alice.send(&Message::Ready).unwrap();
    assert_eq!(alice.recv().await, Some(Message::error("Not in a race yet")));
    assert_eq!(server.coordinator.waiting(GameMode::VsFriend), 1);

    alice.send(&Message::Disconnect).unwrap();
    assert!(alice.recv().await.is_none());
    assert_eq!(server.coordinator.waiting(GameMode::VsFriend), 0);

    // A later player waits alone instead of matching the one who left
    let mut bob = server.join("bob", GameMode::VsFriend);
    assert_eq!(bob.recv().await, Some(Message::error(WAITING_NOTICE)));
    assert_eq!(server.coordinator.stats().races_started, 0);

    println!("✅ Waiting player test passed");
}

#[tokio::test(start_paused = true)]
async fn test_practice_reports_last_progress() {
    let server = TestServer::with_words(8);
    let mut client = server.join("erin", GameMode::Practice);

    let start = expect_game_start(&mut client).await;
    assert_eq!(start.mode, GameMode::Practice);
    assert_eq!(start.words.len(), 8);
    assert_eq!(start.opponent, None);

    client.send(&progress(3, 52.0, 98.0)).unwrap();
    client.send(&progress(6, 60.5, 97.5)).unwrap();
    client.send(&Message::Disconnect).unwrap();

    let results = server.store.wait_for(1).await;
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.participant_id, start.player_id);
    assert_eq!(result.participant_name, "erin");
    assert_eq!(result.mode, GameMode::Practice);
    assert_eq!(result.words_typed, 6);
    assert_eq!(result.wpm, 60.5);
    assert!(!result.won);
    assert_eq!(server.coordinator.stats().races_started, 0);

    println!("✅ Practice result test passed");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_mode_falls_back_to_practice() {
    let server = TestServer::with_words(5);
    let mut client = server.open();
    client.send(&connect("frank", "RANKED")).unwrap();

    let start = expect_game_start(&mut client).await;
    assert_eq!(start.mode, GameMode::Practice);

    println!("✅ Unknown mode fallback test passed");
}

#[tokio::test(start_paused = true)]
async fn test_first_frame_must_be_connect() {
    let server = TestServer::with_words(5);
    let mut client = server.open();
    client.send(&Message::Ready).unwrap();

    assert_eq!(
        client.recv().await,
        Some(Message::error("First message must be CONNECT"))
    );
    assert!(client.recv().await.is_none());

    println!("✅ Handshake rejection test passed");
}

#[tokio::test(start_paused = true)]
async fn test_silent_connection_times_out() {
    let server = TestServer::with_words(5);
    let mut client = server.open();

    assert_eq!(
        client.recv().await,
        Some(Message::error("Timed out waiting for CONNECT"))
    );
    assert!(client.recv().await.is_none());
    assert_eq!(server.coordinator.stats().active_connections, 0);

    println!("✅ Handshake timeout test passed");
}

#[tokio::test(start_paused = true)]
async fn test_protocol_errors_keep_connection_open() {
    let server = TestServer::with_words(5);
    let mut client = server.join("gina", GameMode::Practice);
    expect_game_start(&mut client).await;

    client.send_raw("this is not json").unwrap();
    let reply = client.recv().await.unwrap();
    assert_eq!(reply.tag(), "ERROR");

    client
        .send(&Message::GameEnd {
            winner_id: None,
            message: "I win".to_string(),
        })
        .unwrap();
    assert_eq!(
        client.recv().await,
        Some(Message::error("Unexpected message type: GAME_END"))
    );

    client.send(&connect("gina", "PRACTICE")).unwrap();
    assert_eq!(client.recv().await, Some(Message::error("Already connected")));

    client.send(&progress(4, 40.0, 99.0)).unwrap();
    client.send(&progress(2, 40.0, 99.0)).unwrap();
    let reply = client.recv().await.unwrap();
    assert!(text_of(&reply).contains("wordsCompleted went backwards"));

    println!("✅ Protocol error test passed");
}

#[tokio::test(start_paused = true)]
async fn test_progress_before_start_is_rejected() {
    let server = TestServer::with_words(5);
    let mut alice = server.join("alice", GameMode::VsFriend);
    let mut bob = server.join("bob", GameMode::VsFriend);
    expect_game_start(&mut alice).await;
    expect_game_start(&mut bob).await;

    alice.send(&progress(1, 30.0, 100.0)).unwrap();
    let reply = recv_until(&mut alice, |m| matches!(m, Message::Error { .. })).await;
    assert!(text_of(&reply).starts_with("Race is not in progress"));

    println!("✅ Progress before start test passed");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_running_races() {
    let server = TestServer::with_words(50);
    let mut race = start_match(&server, GameMode::VsFriend).await;
    race.first.send(&progress(2, 40.0, 100.0)).unwrap();

    server.coordinator.shutdown(Duration::from_secs(5)).await;

    for client in [&mut race.first, &mut race.second] {
        let end = expect_race_over(client).await;
        assert_eq!(winner_of(&end), None);
        assert_eq!(text_of(&end), SHUTDOWN_REASON);
        // Then the connection closes
        while client.recv().await.is_some() {}
    }

    let stats = server.coordinator.stats();
    assert_eq!(stats.active_races, 0);
    assert_eq!(stats.races_finished, 1);
    assert!(!server.coordinator.is_accepting());

    let results = server.store.wait_for(2).await;
    assert!(results.iter().all(|r| !r.won));

    println!("✅ Shutdown cancellation test passed");
}

#[tokio::test(start_paused = true)]
async fn test_failing_store_does_not_affect_outcome() {
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let coordinator = Coordinator::new(
        test_config(5),
        Arc::new(FixedContentSource),
        Arc::new(FailingResultStore),
        metrics.clone(),
    );

    let mut clients = Vec::new();
    for name in ["alice", "bob"] {
        let (transport, client) = Transport::memory();
        coordinator.accept(transport);
        client.send(&connect(name, "VS_FRIEND")).unwrap();
        clients.push(client);
    }

    let mut ids = Vec::new();
    for client in clients.iter_mut() {
        ids.push(expect_game_start(client).await.player_id);
        client.send(&Message::Ready).unwrap();
    }
    let session = coordinator.sessions().snapshot().remove(0);
    wait_in_progress(&session).await;

    clients[1].send(&progress(5, 70.0, 100.0)).unwrap();
    let end = expect_race_over(&mut clients[0]).await;
    assert_eq!(winner_of(&end), Some(ids[1].clone()));

    wait_for_idle(&coordinator).await;
    assert_eq!(metrics.race().result_report_failures_total.get(), 2);

    println!("✅ Failing store test passed");
}

#[tokio::test]
async fn test_tcp_practice_round_trip() {
    let server = TestServer::with_words(3);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve = tokio::spawn(server.coordinator.clone().serve(listener));

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(b"{\"type\":\"CONNECT\",\"playerName\":\"hank\",\"gameMode\":\"PRACTICE\"}\n")
        .await
        .unwrap();

    let mut lines = BufReader::new(reader).lines();
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["type"], "GAME_START");
    assert_eq!(value["gameMode"], "PRACTICE");
    assert_eq!(value["attackWords"].as_array().unwrap().len(), 3);

    server.coordinator.shutdown(Duration::from_millis(100)).await;
    serve.await.unwrap().unwrap();

    // The server hangs up after shutdown
    let rest = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_none());

    println!("✅ TCP round trip test passed");
}

async fn next_json(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
) -> serde_json::Value {
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .expect("server closed the connection");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn test_tcp_bad_lines_get_error_replies() {
    let mut config = test_config(3);
    config.service.max_frame_bytes = 1024;
    let server = TestServer::new(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve = tokio::spawn(server.coordinator.clone().serve(listener));

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer
        .write_all(b"{\"type\":\"CONNECT\",\"playerName\":\"ivy\",\"gameMode\":\"PRACTICE\"}\n")
        .await
        .unwrap();
    assert_eq!(next_json(&mut lines).await["type"], "GAME_START");

    // Not UTF-8
    writer.write_all(b"\xff\xfe garbage\n").await.unwrap();
    let reply = next_json(&mut lines).await;
    assert_eq!(reply["type"], "ERROR");
    assert_eq!(reply["message"], "Frame is not valid UTF-8");

    // Longer than the frame limit
    let mut long_line = vec![b'x'; 4_000];
    long_line.push(b'\n');
    writer.write_all(&long_line).await.unwrap();
    let reply = next_json(&mut lines).await;
    assert_eq!(reply["type"], "ERROR");
    assert_eq!(reply["message"], "Frame exceeds 1024 bytes");

    // Still connected and in step with the stream
    writer
        .write_all(b"{\"type\":\"GAME_END\",\"message\":\"mine\"}\n")
        .await
        .unwrap();
    let reply = next_json(&mut lines).await;
    assert_eq!(reply["message"], "Unexpected message type: GAME_END");

    writer.write_all(b"{\"type\":\"DISCONNECT\"}\n").await.unwrap();
    let rest = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_none());

    server.coordinator.shutdown(Duration::from_millis(100)).await;
    serve.await.unwrap().unwrap();

    println!("✅ Bad line handling test passed");
}
