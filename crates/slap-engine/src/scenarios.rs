//! Full-game scenarios exercising the reducer end to end.

use super::*;
use slap_cards::Card;
use slap_cards::Deck;
use slap_cards::Seed;
use std::collections::VecDeque;

fn entrants(n: usize) -> Vec<Entrant> {
    (0..n)
        .map(|i| Entrant {
            user_id: UserId::default(),
            display_name: format!("player-{}", i),
        })
        .collect()
}

fn fixed_game(players: Vec<Vec<Card>>) -> GameState {
    let players = players
        .into_iter()
        .enumerate()
        .map(|(seat, hand)| PlayerState {
            user_id: UserId::default(),
            display_name: format!("player-{}", seat),
            seat,
            connected: true,
            ready: true,
            hand: VecDeque::from(hand),
        })
        .collect();
    GameState {
        status: GameStatus::InGame,
        players,
        current_turn_seat: 0,
        chant_index: 0,
        pile: Vec::new(),
        last_revealed: None,
        slap_window: SlapWindow::idle(),
        winner_user_id: None,
        version: 1,
        next_slap_event_nonce: 1,
        config: GameConfig::default(),
    }
}

fn dealt_game(deck: Vec<Card>, n: usize) -> GameState {
    let setup = MatchSetup {
        seed: None,
        deck: Some(Deck::from_cards(deck)),
        shuffle: false,
    };
    GameState::deal(&entrants(n), GameConfig::default(), setup).expect("deal")
}

fn flip(state: &GameState, seat: usize, now: u64) -> Transition {
    let user = state.players[seat].user_id;
    apply(state, &GameEvent::Flip { user_id: user }, now).expect("flip accepted")
}

fn slap_event(
    state: &GameState,
    seat: usize,
    gesture: Option<Card>,
    client_seq: u64,
    client_time: u64,
) -> GameEvent {
    GameEvent::Slap {
        user_id: state.players[seat].user_id,
        event_id: state.slap_window.event_id.clone(),
        gesture,
        client_seq,
        client_time,
        offset_ms: 0,
        rtt_ms: 40,
    }
}

#[test]
fn deterministic_deal() {
    let deck = vec![
        Card::Taco,
        Card::Cat,
        Card::Goat,
        Card::Cheese,
        Card::Pizza,
        Card::Gorilla,
    ];
    let e = entrants(2);
    let setup = || MatchSetup {
        seed: Some(Seed::from("seed-1")),
        deck: Some(Deck::from_cards(deck.clone())),
        shuffle: true,
    };
    let a = GameState::deal(&e, GameConfig::default(), setup()).expect("deal");
    let b = GameState::deal(&e, GameConfig::default(), setup()).expect("deal");
    assert_eq!(a.players[0].hand.len(), 3);
    assert_eq!(a.players[1].hand.len(), 3);
    assert_eq!(a.players[0].hand, b.players[0].hand);
    assert_eq!(a.players[1].hand, b.players[1].hand);
}

#[test]
fn chant_increments_on_windowless_flips() {
    let state = dealt_game(vec![Card::Cat, Card::Goat, Card::Cheese, Card::Pizza], 2);
    let first = flip(&state, 0, 1_000);
    assert_eq!(first.state.chant_index, 1);
    assert!(first.effects.is_empty());
    assert_eq!(first.state.current_turn_seat, 1);
    let second = flip(&first.state, 1, 2_000);
    assert_eq!(second.state.chant_index, 2);
    assert_eq!(second.state.current_turn_seat, 0);
    assert_eq!(second.state.pile, vec![Card::Cat, Card::Goat]);
}

#[test]
fn action_window_then_wrong_gesture() {
    let state = dealt_game(vec![Card::Gorilla, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    match &opened.effects[..] {
        [Effect::SlapWindowOpen {
            event_id,
            reason,
            action_card,
            slap_window_ms,
            deadline_server_time,
            ..
        }] => {
            assert_eq!(event_id, "slap-000000000001");
            assert_eq!(*reason, WindowReason::Action);
            assert_eq!(*action_card, Some(Card::Gorilla));
            assert_eq!(*slap_window_ms, 3_200);
            assert_eq!(*deadline_server_time, 4_200);
        }
        other => panic!("expected window open, got {:?}", other),
    }
    let wrong = slap_event(&opened.state, 1, Some(Card::Narwhal), 1, 1_100);
    let punished = apply(&opened.state, &wrong, 1_120).expect("slap accepted");
    match &punished.effects[..] {
        [Effect::Penalty {
            user_id,
            penalty_type,
            pile_taken,
        }] => {
            assert_eq!(*user_id, opened.state.players[1].user_id);
            assert_eq!(*penalty_type, PenaltyKind::WrongGesture);
            assert_eq!(*pile_taken, 1);
        }
        other => panic!("expected penalty, got {:?}", other),
    }
    assert_eq!(punished.state.current_turn_seat, 1);
    assert!(!punished.state.slap_window.active);
    assert_eq!(
        punished.state.players[1].hand,
        VecDeque::from(vec![Card::Cat, Card::Cheese, Card::Gorilla])
    );
}

#[test]
fn equal_reactions_tie_break_by_arrival() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    assert!(opened.state.slap_window.active);
    let by_u2 = slap_event(&opened.state, 1, None, 1, 1_060);
    let mid = apply(&opened.state, &by_u2, 1_020).expect("first slap");
    let by_u1 = slap_event(&mid.state, 0, None, 2, 1_060);
    let done = apply(&mid.state, &by_u1, 1_030).expect("second slap");
    match &done.effects[..] {
        [Effect::SlapResult {
            ordered_user_ids,
            loser_user_id,
            reason,
            pile_taken,
            ..
        }] => {
            let u1 = state.players[0].user_id;
            let u2 = state.players[1].user_id;
            assert_eq!(ordered_user_ids, &vec![u2, u1]);
            assert_eq!(*loser_user_id, Some(u1));
            assert_eq!(*reason, SlapResultReason::LastSlapper);
            assert_eq!(*pile_taken, 1);
        }
        other => panic!("expected slap result, got {:?}", other),
    }
    assert_eq!(done.state.current_turn_seat, 0);
    assert_eq!(
        done.state.players[0].hand,
        VecDeque::from(vec![Card::Goat, Card::Taco])
    );
}

#[test]
fn unanswered_window_charges_the_flipper() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    let resolved = apply(&opened.state, &GameEvent::ResolveSlapWindow, 3_100).expect("resolve");
    let u1 = state.players[0].user_id;
    match &resolved.effects[..] {
        [Effect::Penalty {
            user_id,
            penalty_type,
            ..
        }, Effect::SlapResult {
            ordered_user_ids,
            loser_user_id,
            reason,
            pile_taken,
            ..
        }] => {
            assert_eq!(*user_id, u1);
            assert_eq!(*penalty_type, PenaltyKind::NoSlaps);
            assert!(ordered_user_ids.is_empty());
            assert_eq!(*loser_user_id, Some(u1));
            assert_eq!(*reason, SlapResultReason::NoSlaps);
            assert_eq!(*pile_taken, 1);
        }
        other => panic!("expected penalty then result, got {:?}", other),
    }
    assert_eq!(resolved.state.current_turn_seat, 0);
    assert!(resolved.state.pile.is_empty());
}

#[test]
fn zero_card_seats_are_skipped() {
    let state = fixed_game(vec![
        vec![Card::Cat, Card::Pizza],
        vec![],
        vec![Card::Goat, Card::Cheese],
    ]);
    let flipped = flip(&state, 0, 1_000);
    assert!(flipped.effects.is_empty());
    assert_eq!(flipped.state.current_turn_seat, 2);
}

#[test]
fn emptying_flip_wins_even_on_action_card() {
    let state = fixed_game(vec![
        vec![Card::Gorilla],
        vec![Card::Cat, Card::Goat],
    ]);
    let finished = flip(&state, 0, 1_000);
    let u1 = state.players[0].user_id;
    match &finished.effects[..] {
        [Effect::GameFinished { winner_user_id }] => assert_eq!(*winner_user_id, u1),
        other => panic!("expected game finished, got {:?}", other),
    }
    assert_eq!(finished.state.status, GameStatus::Finished);
    assert_eq!(finished.state.winner_user_id, Some(u1));
    assert!(!finished.state.slap_window.active);
    assert_eq!(finished.state.chant_index, 1);
}

#[test]
fn same_card_outranks_match() {
    // second CAT lands while the chant word is also CAT
    let state = fixed_game(vec![
        vec![Card::Cat, Card::Goat],
        vec![Card::Cat, Card::Cheese],
    ]);
    let first = flip(&state, 0, 1_000);
    assert!(first.effects.is_empty());
    let second = flip(&first.state, 1, 2_000);
    match &second.effects[..] {
        [Effect::SlapWindowOpen { reason, .. }] => {
            assert_eq!(*reason, WindowReason::SameCard)
        }
        other => panic!("expected window open, got {:?}", other),
    }
}

#[test]
fn flip_rejected_during_active_window() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    let user = opened.state.players[0].user_id;
    let err = apply(&opened.state, &GameEvent::Flip { user_id: user }, 1_500);
    assert_eq!(err.unwrap_err(), EngineError::SlapWindowActive);
    let err = apply(&opened.state, &GameEvent::TurnTimeout, 9_000);
    assert_eq!(err.unwrap_err(), EngineError::SlapWindowActive);
}

#[test]
fn empty_handed_first_slapper_wins_action_window() {
    let state = fixed_game(vec![
        vec![Card::Gorilla, Card::Goat],
        vec![],
        vec![Card::Cat, Card::Cheese],
    ]);
    let opened = flip(&state, 0, 1_000);
    let winner = opened.state.players[1].user_id;
    let slap = slap_event(&opened.state, 1, Some(Card::Gorilla), 1, 1_200);
    let finished = apply(&opened.state, &slap, 1_210).expect("slap accepted");
    match &finished.effects[..] {
        [Effect::SlapResult {
            ordered_user_ids,
            loser_user_id,
            reason,
            ..
        }, Effect::GameFinished { winner_user_id }] => {
            assert_eq!(ordered_user_ids, &vec![winner]);
            assert_eq!(*loser_user_id, None);
            assert_eq!(*reason, SlapResultReason::FirstValidSlapWin);
            assert_eq!(*winner_user_id, winner);
        }
        other => panic!("expected win, got {:?}", other),
    }
    assert_eq!(finished.state.status, GameStatus::Finished);
}

#[test]
fn slap_without_window_is_a_false_slap() {
    let state = dealt_game(vec![Card::Cat, Card::Goat, Card::Cheese, Card::Pizza], 2);
    let flipped = flip(&state, 0, 1_000);
    let stray = GameEvent::Slap {
        user_id: state.players[1].user_id,
        event_id: "slap-00000000000f".into(),
        gesture: None,
        client_seq: 1,
        client_time: 1_050,
        offset_ms: 0,
        rtt_ms: 40,
    };
    let punished = apply(&flipped.state, &stray, 1_060).expect("false slap accepted");
    match &punished.effects[..] {
        [Effect::Penalty {
            penalty_type,
            pile_taken,
            ..
        }] => {
            assert_eq!(*penalty_type, PenaltyKind::FalseSlap);
            assert_eq!(*pile_taken, 1);
        }
        other => panic!("expected penalty, got {:?}", other),
    }
    assert_eq!(punished.state.current_turn_seat, 1);
}

#[test]
fn duplicate_slap_is_silently_rejected() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    let slap = slap_event(&opened.state, 1, None, 1, 1_060);
    let once = apply(&opened.state, &slap, 1_020).expect("first slap");
    let twice = apply(&once.state, &slap, 1_040);
    assert_eq!(twice.unwrap_err(), EngineError::AlreadySlapped);
}

#[test]
fn lone_holdout_loses_as_non_slapper() {
    let state = fixed_game(vec![
        vec![Card::Taco, Card::Goat],
        vec![Card::Cat, Card::Cheese],
        vec![Card::Pizza, Card::Cat],
    ]);
    let opened = flip(&state, 0, 1_000);
    assert_eq!(opened.state.slap_window.reason, Some(WindowReason::Match));
    let slap = slap_event(&opened.state, 1, None, 1, 1_150);
    let mid = apply(&opened.state, &slap, 1_160).expect("slap");
    let resolved = apply(&mid.state, &GameEvent::ResolveSlapWindow, 3_100).expect("resolve");
    let u3 = state.players[2].user_id;
    match &resolved.effects[..] {
        [Effect::SlapResult {
            loser_user_id,
            reason,
            ..
        }] => {
            assert_eq!(*loser_user_id, Some(u3));
            assert_eq!(*reason, SlapResultReason::NonSlapper);
        }
        other => panic!("expected slap result, got {:?}", other),
    }
    assert_eq!(resolved.state.current_turn_seat, 2);
}

#[test]
fn faster_estimated_reaction_outranks_arrival() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    let slow = slap_event(&opened.state, 1, None, 1, 1_500);
    let mid = apply(&opened.state, &slow, 1_510).expect("slow slap");
    let fast = slap_event(&mid.state, 0, None, 2, 1_200);
    let done = apply(&mid.state, &fast, 1_600).expect("fast slap");
    let u1 = state.players[0].user_id;
    let u2 = state.players[1].user_id;
    match &done.effects[..] {
        [Effect::SlapResult {
            ordered_user_ids,
            loser_user_id,
            ..
        }] => {
            assert_eq!(ordered_user_ids, &vec![u1, u2]);
            assert_eq!(*loser_user_id, Some(u2));
        }
        other => panic!("expected slap result, got {:?}", other),
    }
}

#[test]
fn turn_timeout_penalizes_current_seat() {
    let state = dealt_game(vec![Card::Cat, Card::Goat, Card::Cheese, Card::Pizza], 2);
    let flipped = flip(&state, 0, 1_000);
    let timed = apply(&flipped.state, &GameEvent::TurnTimeout, 7_000).expect("timeout");
    let u2 = state.players[1].user_id;
    match &timed.effects[..] {
        [Effect::Penalty {
            user_id,
            penalty_type,
            pile_taken,
        }] => {
            assert_eq!(*user_id, u2);
            assert_eq!(*penalty_type, PenaltyKind::TurnTimeout);
            assert_eq!(*pile_taken, 1);
        }
        other => panic!("expected penalty, got {:?}", other),
    }
    assert_eq!(timed.state.current_turn_seat, 1);
}

#[test]
fn skip_dismisses_window_without_a_loser() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    let skipped = apply(&opened.state, &GameEvent::SkipSlapWindow, 1_500).expect("skip");
    assert!(skipped.effects.is_empty());
    assert!(!skipped.state.slap_window.active);
    assert_eq!(skipped.state.current_turn_seat, 1);
    assert_eq!(skipped.state.pile, vec![Card::Taco]);
}

#[test]
fn reaction_estimates_clamp_to_human_bounds() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let opened = flip(&state, 0, 1_000);
    // clientTime before the window even opened: floors to the minimum
    let impossible = GameEvent::Slap {
        user_id: opened.state.players[1].user_id,
        event_id: opened.state.slap_window.event_id.clone(),
        gesture: None,
        client_seq: 1,
        client_time: 500,
        offset_ms: -600,
        rtt_ms: 40,
    };
    let mid = apply(&opened.state, &impossible, 1_010).expect("slap");
    // clientTime far past the deadline: capped, still ranked last
    let glacial = GameEvent::Slap {
        user_id: opened.state.players[0].user_id,
        event_id: opened.state.slap_window.event_id.clone(),
        gesture: None,
        client_seq: 2,
        client_time: 99_000,
        offset_ms: 0,
        rtt_ms: 40,
    };
    let done = apply(&mid.state, &glacial, 1_020).expect("slap");
    let u1 = state.players[0].user_id;
    let u2 = state.players[1].user_id;
    match &done.effects[..] {
        [Effect::SlapResult {
            ordered_user_ids, ..
        }] => assert_eq!(ordered_user_ids, &vec![u2, u1]),
        other => panic!("expected slap result, got {:?}", other),
    }
}

#[test]
fn event_ids_are_stable_across_replays() {
    let run = || {
        let state = dealt_game(
            vec![
                Card::Taco,
                Card::Cat,
                Card::Goat,
                Card::Cheese,
                Card::Pizza,
                Card::Gorilla,
            ],
            2,
        );
        let opened = flip(&state, 0, 1_000);
        let resolved = apply(&opened.state, &GameEvent::ResolveSlapWindow, 3_100).expect("resolve");
        let next = flip(&resolved.state, 0, 4_000);
        (opened.state.slap_window.event_id.clone(), next.state.clone())
    };
    let (first_a, _) = run();
    let (first_b, _) = run();
    assert_eq!(first_a, first_b);
    assert_eq!(first_a, "slap-000000000001");
}

#[test]
fn apply_never_mutates_its_input() {
    let state = dealt_game(vec![Card::Taco, Card::Cat, Card::Goat, Card::Cheese], 2);
    let before = state.clone();
    let _ = flip(&state, 0, 1_000);
    assert_eq!(state, before);
}

#[test]
fn versions_strictly_increase() {
    let state = dealt_game(vec![Card::Cat, Card::Goat, Card::Cheese, Card::Pizza], 2);
    let a = flip(&state, 0, 1_000);
    let b = flip(&a.state, 1, 2_000);
    assert!(a.state.version > state.version);
    assert!(b.state.version > a.state.version);
}
