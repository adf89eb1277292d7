mod common;

use common::Harness;
use globchess::game::STARTING_FEN;
use globchess::models::{GameResult, GameState};
use globchess::services::Settings;
use globchess::store::{Store, Transaction, Write};

const FOOLS_MATE_FEN: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

#[actix_rt::test]
async fn checkmate_archives_and_resets_the_board() {
    let h = Harness::new(Settings::default()).await;
    let ann = h.player("u1", "Ann", 5).await;
    let bob = h.player("u2", "Bob", 5).await;

    h.play(&ann, "f2", "f3").await;
    h.play(&bob, "e7", "e5").await;
    h.play(&ann, "g2", "g4").await;
    let mate = h.play(&bob, "d8", "h4").await;

    assert_eq!(mate.san, "Qh4#");
    assert_eq!(mate.fen, FOOLS_MATE_FEN);
    assert_eq!(mate.accuracy, 100.0);
    assert_eq!(mate.result, Some(GameResult::BlackWins));

    let finished = mate.finished_game.expect("mate should archive the game");
    assert_eq!(finished.game_number, 1);
    assert_eq!(finished.result, GameResult::BlackWins);
    assert_eq!(finished.last_move_by.as_deref(), Some("Bob"));
    let sans: Vec<&str> = finished.moves.iter().map(|m| m.san.as_str()).collect();
    assert_eq!(sans, ["f3", "e5", "g4", "Qh4#"]);
    assert_eq!(finished.replay().unwrap(), finished.fen);

    let game = h.store.game().await.unwrap().value.unwrap();
    assert_eq!(game, GameState::new());
    assert_eq!(h.store.ledger_len().await.unwrap(), 0);
    assert!(h.store.move_count().await.unwrap().value.is_empty());

    let messages = h.announcer.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "Game #1 has ended. Result: Black wins");
    assert_eq!(messages[0].game_number, 1);

    let listed = h.service.finished_games(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].move_count, 4);
    assert_eq!(h.service.finished_game(&finished.id).await.unwrap(), finished);
}

#[actix_rt::test]
async fn archiving_the_same_ending_twice_is_a_no_op() {
    let h = Harness::new(Settings::default()).await;
    let ann = h.player("u1", "Ann", 10).await;

    for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
        h.play(&ann, from, to).await;
    }

    assert!(h
        .service
        .lifecycle()
        .archive(FOOLS_MATE_FEN)
        .await
        .unwrap()
        .is_none());
    assert!(h
        .service
        .lifecycle()
        .complete_if_terminal()
        .await
        .unwrap()
        .is_none());
    assert_eq!(h.store.archive_count().await.unwrap().value, 1);
    assert_eq!(h.announcer.messages().len(), 1);

    // The next game gets the next number
    for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
        h.play(&ann, from, to).await;
    }
    let games = h.service.finished_games(10).await.unwrap();
    let mut numbers: Vec<u64> = games.iter().map(|g| g.game_number).collect();
    numbers.sort();
    assert_eq!(numbers, [1, 2]);
}

#[actix_rt::test]
async fn in_progress_game_is_not_archived() {
    let h = Harness::new(Settings::default()).await;
    let ann = h.player("u1", "Ann", 5).await;
    let played = h.play(&ann, "e2", "e4").await;

    assert!(h
        .service
        .lifecycle()
        .archive(&played.fen)
        .await
        .unwrap()
        .is_none());
    assert_eq!(h.store.ledger_len().await.unwrap(), 1);
}

#[actix_rt::test]
async fn threefold_repetition_ends_in_a_draw() {
    let h = Harness::new(Settings::default()).await;
    let ann = h.player("u1", "Ann", 10).await;

    let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
    let mut last = None;
    for (from, to) in shuffle.iter().chain(shuffle.iter()) {
        last = Some(h.play(&ann, from, to).await);
    }

    let last = last.unwrap();
    assert_eq!(last.result, Some(GameResult::DrawByRepetition));
    assert_eq!(last.accuracy, 50.0);
    let finished = last.finished_game.unwrap();
    assert_eq!(finished.moves.len(), 8);
    assert_eq!(h.store.game().await.unwrap().value.unwrap().fen, STARTING_FEN);
}

#[actix_rt::test]
async fn bootstrap_archives_a_finished_board() {
    let h = Harness::new(Settings::default()).await;
    let mut mated = GameState::new();
    mated.fen = FOOLS_MATE_FEN.to_string();
    h.store
        .commit(Transaction::new().write(Write::SetGame(mated)))
        .await
        .unwrap();

    let game = h.service.bootstrap().await.unwrap();
    assert_eq!(game.fen, STARTING_FEN);
    let games = h.service.finished_games(10).await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].result, GameResult::BlackWins);
}

#[actix_rt::test]
async fn account_average_tracks_every_move() {
    let h = Harness::new(Settings::default()).await;
    let ann = h.player("u1", "Ann", 10).await;

    for (from, to) in [("e2", "e4"), ("e7", "e5"), ("g1", "f3")] {
        h.play(&ann, from, to).await;
    }

    let account = h.service.account("u1").await.unwrap();
    assert_eq!(account.total_moves, 3);
    assert_eq!(account.moves.len(), 3);
    assert_eq!(
        account.average_accuracy,
        account.total_accuracy / f64::from(account.total_moves)
    );

    let page = h.service.move_page(1).await.unwrap();
    assert_eq!(page.total_moves, 3);
    assert_eq!(page.moves[0].san, "Nf3");
    assert!(page.moves[0].timestamp > page.moves[1].timestamp);
}
