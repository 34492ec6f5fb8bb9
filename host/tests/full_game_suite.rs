mod common;

use common::{address, column_fleet, stacked_fleet, table};
use duel_core::{
    bitmap, Fleet, GameKind, LetterStatus, Move, Outcome, Phase, Position, Salt, SecretLayout, ShipType, Word,
};
use duel_host::coordinator::{Decision, Event, ResolveReport};
use duel_host::error::ClientError;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

// End-to-end flows through one client holding both identities, against the
// in-process ledger.

#[tokio::test]
async fn two_identities_commit_fire_and_resolve() {
    let mut t = table(GameKind::Battleship).await;
    let c = &mut t.coordinator;
    let (alice, bob) = (address("alice"), address("bob"));

    c.refresh().await.unwrap();
    assert_eq!(c.dispatch(Event::Polled), Decision::Commit);
    let alice_commitment = c.commit_layout(SecretLayout::Fleet(stacked_fleet()), Salt::from(11)).await.unwrap();
    assert_eq!(c.dispatch(Event::Submitted), Decision::Wait);

    c.switch_identity("bob").await.unwrap();
    assert!(c.local_state().secret.is_none());
    c.commit_layout(SecretLayout::Fleet(column_fleet()), Salt::from(22)).await.unwrap();

    let session = t.ledger.session(t.session).unwrap();
    assert_eq!(session.phase, Phase::InProgress);
    assert_eq!(session.commitment_of(&alice), Some(&alice_commitment));
    assert_eq!(session.turn, Some(alice.clone()));

    // alice fires at bob's carrier
    c.switch_identity("alice").await.unwrap();
    assert_eq!(c.dispatch(Event::IdentitySwitched), Decision::Move);
    c.fire(Position::new(9, 0)).await.unwrap();
    assert_eq!(c.dispatch(Event::Submitted), Decision::Wait);

    c.switch_identity("bob").await.unwrap();
    assert_eq!(c.dispatch(Event::IdentitySwitched), Decision::Resolve);
    let report = c.resolve_pending().await.unwrap();
    assert_eq!(report, ResolveReport::Resolved(Outcome::Shot { hit: true, sunk: None }));
    assert_eq!(t.prover.calls(), 1);

    let session = t.ledger.session(t.session).unwrap();
    assert_eq!(session.history.len(), 1);
    assert!(session.pending.is_none());
    assert_eq!(session.turn, Some(bob.clone()));
    assert_eq!(session.hits_taken, [0, 1]);
    assert_eq!(c.dispatch(Event::Submitted), Decision::Move);
    assert_eq!(c.local_state().own_hits.len(), 1);

    // alice sees her shot landed
    c.switch_identity("alice").await.unwrap();
    c.refresh().await.unwrap();
    assert_eq!(c.local_state().shot_marks().get(&Position::new(9, 0)), Some(&true));
    assert_eq!(c.dispatch(Event::Polled), Decision::Wait);
}

#[tokio::test]
async fn defender_resolves_automatically_on_switch() {
    let mut t = table(GameKind::Battleship).await;
    let c = &mut t.coordinator;
    c.commit_layout(SecretLayout::Fleet(stacked_fleet()), Salt::from(1)).await.unwrap();
    c.switch_identity("bob").await.unwrap();
    c.commit_layout(SecretLayout::Fleet(column_fleet()), Salt::from(2)).await.unwrap();
    c.switch_identity("alice").await.unwrap();
    c.fire(Position::new(4, 4)).await.unwrap();

    c.switch_identity("bob").await.unwrap();
    // resolved, and the turn moved to bob
    assert_eq!(c.handle(Event::IdentitySwitched).await.unwrap(), Decision::Move);
    let session = t.ledger.session(t.session).unwrap();
    assert_eq!(session.history[0].outcome, Outcome::Shot { hit: false, sunk: None });
}

#[tokio::test]
async fn sinking_reports_the_ship_once() {
    let mut t = table(GameKind::Battleship).await;
    let c = &mut t.coordinator;
    c.commit_layout(SecretLayout::Fleet(stacked_fleet()), Salt::from(5)).await.unwrap();
    c.switch_identity("bob").await.unwrap();
    c.commit_layout(SecretLayout::Fleet(column_fleet()), Salt::from(6)).await.unwrap();

    // alice works down bob's destroyer at (1,0),(1,1); bob shoots water
    let alice_shots = [Position::new(1, 0), Position::new(1, 1)];
    let bob_shots = [Position::new(9, 9), Position::new(9, 8)];
    for (a, b) in alice_shots.into_iter().zip(bob_shots) {
        c.switch_identity("alice").await.unwrap();
        c.handle(Event::IdentitySwitched).await.unwrap();
        c.fire(a).await.unwrap();
        c.switch_identity("bob").await.unwrap();
        c.handle(Event::IdentitySwitched).await.unwrap();
        c.fire(b).await.unwrap();
    }
    c.switch_identity("alice").await.unwrap();
    c.handle(Event::IdentitySwitched).await.unwrap();

    let session = t.ledger.session(t.session).unwrap();
    let alice = address("alice");
    let outcomes: Vec<Outcome> = session.history.iter().filter(|r| r.mover == alice).map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Shot { hit: true, sunk: None },
            Outcome::Shot { hit: true, sunk: Some(ShipType::Destroyer) },
        ]
    );
    assert_eq!(session.sunk_ships[1], ShipType::Destroyer.mask_bit());
}

#[tokio::test]
async fn wordle_game_to_a_correct_guess() {
    let mut t = table(GameKind::Wordle).await;
    let c = &mut t.coordinator;
    let bob = address("bob");

    // the guesser has nothing to commit
    c.switch_identity("bob").await.unwrap();
    c.refresh().await.unwrap();
    assert_eq!(c.dispatch(Event::Polled), Decision::Wait);
    let err = c.commit_layout(SecretLayout::Word("CRANE".parse().unwrap()), Salt::from(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidMoveState(_)));

    c.switch_identity("alice").await.unwrap();
    c.commit_layout(SecretLayout::Word("ALLOY".parse().unwrap()), Salt::from(77)).await.unwrap();

    c.switch_identity("bob").await.unwrap();
    assert_eq!(c.dispatch(Event::IdentitySwitched), Decision::Move);
    c.guess("LOLLY".parse().unwrap()).await.unwrap();

    c.switch_identity("alice").await.unwrap();
    let report = c.resolve_pending().await.unwrap();
    use LetterStatus::*;
    assert_eq!(
        report,
        ResolveReport::Resolved(Outcome::Guess { feedback: [Present, Present, Correct, Absent, Correct], is_correct: false })
    );
    assert_eq!(c.local_state().own_hits, [2u32, 4].into_iter().collect());

    c.switch_identity("bob").await.unwrap();
    c.guess("ALLOY".parse().unwrap()).await.unwrap();
    c.switch_identity("alice").await.unwrap();
    c.resolve_pending().await.unwrap();

    let session = t.ledger.session(t.session).unwrap();
    assert_eq!(session.phase, Phase::Ended);
    assert_eq!(session.winner, Some(bob.clone()));
    assert_eq!(session.guess_count, 2);
    assert_eq!(c.dispatch(Event::Polled), Decision::Finished { winner: Some(bob) });

    // guessed letters are marked in the guesser's bitmap
    let (w, h) = GameKind::Wordle.bitmap_dims();
    let letters = bitmap::decode(session.fired[1], w, h);
    let word: Word = "ALLOY".parse().unwrap();
    for l in word.letters() {
        assert!(letters.contains(&Position::new(*l as u32, 0)));
    }
}

#[tokio::test]
async fn wordle_setter_wins_after_six_misses() {
    let mut t = table(GameKind::Wordle).await;
    let c = &mut t.coordinator;
    c.commit_layout(SecretLayout::Word("ALLOY".parse().unwrap()), Salt::from(3)).await.unwrap();

    let words = ["CRANE", "BRICK", "FUDGE", "SHIMS", "PETTY", "WHIRL"];
    for (i, word) in words.into_iter().enumerate() {
        c.switch_identity("bob").await.unwrap();
        c.guess(word.parse().unwrap()).await.unwrap();
        c.switch_identity("alice").await.unwrap();
        let decision = c.handle(Event::IdentitySwitched).await.unwrap();
        if i + 1 < words.len() {
            assert_eq!(decision, Decision::Wait);
        } else {
            assert_eq!(decision, Decision::Finished { winner: Some(address("alice")) });
        }
    }
    let session = t.ledger.session(t.session).unwrap();
    assert_eq!(session.winner, Some(address("alice")));
    assert_eq!(session.history.len(), 6);

    // no seventh guess
    c.switch_identity("bob").await.unwrap();
    assert!(c.guess("ALLOY".parse().unwrap()).await.is_err());
}

fn unfired(fired: u128, rng: &mut StdRng) -> Position {
    let (w, h) = GameKind::Battleship.bitmap_dims();
    let taken = bitmap::decode(fired, w, h);
    let mut open: Vec<Position> = (0..w * h).map(Position::from_index).filter(|p| !taken.contains(p)).collect();
    open.shuffle(rng);
    open[0]
}

fn random_fleet(rng: &mut StdRng) -> Fleet {
    let mut fleet = Fleet::new();
    for _ in 0..10 {
        if fleet.place_ships_randomly(rng) {
            return fleet;
        }
    }
    panic!("random placement failed repeatedly");
}

#[tokio::test]
async fn randomized_full_games() {
    for seed in 0_u64..3 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut t = table(GameKind::Battleship).await;
        let c = &mut t.coordinator;

        c.commit_layout(SecretLayout::Fleet(random_fleet(&mut rng)), Salt::random(&mut rng)).await.unwrap();
        c.switch_identity("bob").await.unwrap();
        c.commit_layout(SecretLayout::Fleet(random_fleet(&mut rng)), Salt::random(&mut rng)).await.unwrap();

        let mut moves = 0;
        loop {
            let session = c.session().unwrap().clone();
            if session.phase == Phase::Ended {
                break;
            }
            moves += 1;
            assert!(moves <= 200, "seed {}: game did not end", seed);

            let shooter = session.turn.clone().unwrap();
            let label = c.keys().label_of(&shooter).unwrap().to_string();
            let other = if label == "alice" { "bob" } else { "alice" };

            c.switch_identity(&label).await.unwrap();
            let target = unfired(session.fired_by(&shooter), &mut rng);
            c.fire(target).await.unwrap();
            c.switch_identity(other).await.unwrap();
            c.handle(Event::IdentitySwitched).await.unwrap();

            let after = c.session().unwrap();
            assert!(after.pending.is_none(), "seed {}: move left unresolved", seed);
            if after.phase != Phase::Ended {
                assert_eq!(after.turn.as_ref().map(|a| a.as_str()), Some(c.active_identity().as_str()));
            }
            if rng.gen_bool(0.1) {
                c.refresh().await.unwrap();
            }
        }

        let session = t.ledger.session(t.session).unwrap();
        let winner = session.winner.clone().unwrap();
        let loser_seat = session.seat_of(&winner).unwrap().other();
        assert_eq!(session.hits_taken[loser_seat.index()], 17);
        assert_eq!(session.sunk_ships[loser_seat.index()].count_ones(), 5);
        assert_eq!(session.history.len(), moves);
        let hits_logged = session
            .history
            .iter()
            .filter(|r| r.mover == winner && matches!(r.outcome, Outcome::Shot { hit: true, .. }))
            .count();
        assert_eq!(hits_logged, 17);
        assert!(session.history.iter().all(|r| matches!(r.action, Move::Shot(_))));
        assert_eq!(t.prover.calls(), moves);
    }
}
