use super::effect::Effect;
use super::effect::PenaltyKind;
use super::effect::SlapResultReason;
use super::error::EngineError;
use super::event::GameEvent;
use super::state::GameState;
use super::state::GameStatus;
use super::state::LastRevealed;
use super::state::SlapAttempt;
use super::state::SlapWindow;
use super::state::UserId;
use super::state::WindowReason;
use slap_cards::Card;
use slap_core::CHANT_CYCLE;
use slap_core::Millis;
use slap_core::REACTION_CAP_SLACK_MS;
use slap_core::Seat;
use std::collections::HashSet;

/// An accepted event: the successor state and the effects it produced.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: GameState,
    pub effects: Vec<Effect>,
}

/// The reducer. Pure and total: clones `state`, runs the event against the
/// clone, and returns it with the produced effects. On `Err` the caller's
/// state is the authoritative one — nothing happened.
///
/// `now` is the only clock the engine ever sees.
pub fn apply(
    state: &GameState,
    event: &GameEvent,
    now: Millis,
) -> Result<Transition, EngineError> {
    let mut next = state.clone();
    let effects = match event {
        GameEvent::Flip { user_id } => flip(&mut next, *user_id, now)?,
        GameEvent::Slap { .. } => slap(&mut next, event, now)?,
        GameEvent::ResolveSlapWindow => resolve(&mut next)?,
        GameEvent::TurnTimeout => timeout(&mut next)?,
        GameEvent::SkipSlapWindow => skip(&mut next)?,
    };
    next.version += 1;
    Ok(Transition {
        state: next,
        effects,
    })
}

fn flip(s: &mut GameState, user: UserId, now: Millis) -> Result<Vec<Effect>, EngineError> {
    if s.status != GameStatus::InGame {
        return Err(EngineError::NotInGame);
    }
    if s.slap_window.active && !s.slap_window.resolved {
        return Err(EngineError::SlapWindowActive);
    }
    normalize_turn(s);
    let seat = seat_of(s, user)?;
    if seat != s.current_turn_seat {
        return Err(EngineError::NotYourTurn);
    }
    let prior = s.last_revealed;
    let card = match s.players[seat].hand.pop_front() {
        Some(card) => card,
        None => return Err(EngineError::Internal(format!("seat {} flipped empty", seat))),
    };
    s.pile.push(card);
    s.last_revealed = Some(LastRevealed { card, seat });
    if s.players[seat].hand.is_empty() {
        // emptying your own hand wins on the spot, even on a card that
        // would otherwise open a window
        s.status = GameStatus::Finished;
        s.winner_user_id = Some(user);
        s.slap_window = SlapWindow::idle();
        s.chant_index = (s.chant_index + 1) % CHANT_CYCLE;
        return Ok(vec![Effect::GameFinished {
            winner_user_id: user,
        }]);
    }
    let chant = s.chant_word();
    let reason = if card.is_action() {
        Some(WindowReason::Action)
    } else if prior.map_or(false, |p| p.card == card) {
        Some(WindowReason::SameCard)
    } else if card == chant {
        Some(WindowReason::Match)
    } else {
        None
    };
    let effects = match reason {
        Some(reason) => vec![open_window(s, reason, card, now)],
        None => {
            advance_turn(s);
            Vec::new()
        }
    };
    s.chant_index = (s.chant_index + 1) % CHANT_CYCLE;
    Ok(effects)
}

fn slap(s: &mut GameState, event: &GameEvent, now: Millis) -> Result<Vec<Effect>, EngineError> {
    let GameEvent::Slap {
        user_id,
        event_id,
        gesture,
        client_seq,
        client_time,
        offset_ms,
        rtt_ms,
    } = event
    else {
        return Err(EngineError::Internal("slap handler on non-slap".into()));
    };
    if s.status != GameStatus::InGame {
        return Err(EngineError::NotInGame);
    }
    let seat = seat_of(s, *user_id)?;
    if !s.slap_window.active || *event_id != s.slap_window.event_id {
        return Ok(vec![penalize(s, seat, PenaltyKind::FalseSlap)]);
    }
    if s.slap_window.has_attempt_from(*user_id) {
        return Err(EngineError::AlreadySlapped);
    }
    let Some(reason) = s.slap_window.reason else {
        return Err(EngineError::Internal("active window without reason".into()));
    };
    if reason == WindowReason::Action && *gesture != s.slap_window.action_card {
        return Ok(vec![penalize(s, seat, PenaltyKind::WrongGesture)]);
    }
    s.slap_window.attempts.push(SlapAttempt {
        user_id: *user_id,
        event_id: event_id.clone(),
        gesture: *gesture,
        client_seq: *client_seq,
        client_time: *client_time,
        offset_ms: *offset_ms,
        rtt_ms: *rtt_ms,
        received_at: now,
    });
    if s.slap_window.received_slaps_count() == 1 && s.players[seat].hand.is_empty() {
        // first valid slap from an empty-handed player ends the game
        let event_id = s.slap_window.event_id.clone();
        s.status = GameStatus::Finished;
        s.winner_user_id = Some(*user_id);
        s.slap_window = SlapWindow::idle();
        return Ok(vec![
            Effect::SlapResult {
                event_id,
                ordered_user_ids: vec![*user_id],
                loser_user_id: None,
                reason: SlapResultReason::FirstValidSlapWin,
                pile_taken: 0,
            },
            Effect::GameFinished {
                winner_user_id: *user_id,
            },
        ]);
    }
    match s.slap_window.received_slaps_count() >= s.required_slaps(reason) {
        true => resolve_active(s),
        false => Ok(Vec::new()),
    }
}

fn resolve(s: &mut GameState) -> Result<Vec<Effect>, EngineError> {
    if s.status != GameStatus::InGame {
        return Err(EngineError::NotInGame);
    }
    if !s.slap_window.active {
        return Err(EngineError::NoSlapWindow);
    }
    resolve_active(s)
}

fn timeout(s: &mut GameState) -> Result<Vec<Effect>, EngineError> {
    if s.status != GameStatus::InGame {
        return Err(EngineError::NotInGame);
    }
    if s.slap_window.active {
        return Err(EngineError::SlapWindowActive);
    }
    normalize_turn(s);
    Ok(vec![penalize(s, s.current_turn_seat, PenaltyKind::TurnTimeout)])
}

/// Dismisses the window without ranking anyone; the turn moves past the
/// flipper as if the reveal had been unremarkable.
fn skip(s: &mut GameState) -> Result<Vec<Effect>, EngineError> {
    if s.status != GameStatus::InGame {
        return Err(EngineError::NotInGame);
    }
    if !s.slap_window.active {
        return Err(EngineError::NoSlapWindow);
    }
    let flipper = s.slap_window.flipper_seat;
    s.slap_window = SlapWindow::idle();
    s.current_turn_seat = flipper;
    advance_turn(s);
    Ok(Vec::new())
}

/// Ranks attempts, picks the loser, moves the pile, and resets the window.
fn resolve_active(s: &mut GameState) -> Result<Vec<Effect>, EngineError> {
    let window = std::mem::replace(&mut s.slap_window, SlapWindow::idle());
    let Some(reason) = window.reason else {
        return Err(EngineError::Internal("active window without reason".into()));
    };
    let mut ordered = window.attempts.clone();
    match reason {
        // raw arrival order settles SAME_CARD races
        WindowReason::SameCard => ordered.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then(a.client_seq.cmp(&b.client_seq))
                .then(a.user_id.cmp(&b.user_id))
        }),
        // estimated reaction time settles the rest
        _ => ordered.sort_by(|a, b| {
            reaction_ms(a, &window, s.config.min_reaction_ms)
                .cmp(&reaction_ms(b, &window, s.config.min_reaction_ms))
                .then(a.received_at.cmp(&b.received_at))
                .then(a.client_seq.cmp(&b.client_seq))
                .then(a.user_id.cmp(&b.user_id))
        }),
    }
    let ordered_ids: Vec<UserId> = ordered.iter().map(|a| a.user_id).collect();
    if ordered_ids.is_empty() {
        let flipper = window.flipper_seat;
        let loser = s.players[flipper].user_id;
        let pile_taken = s.pile.len();
        let penalty = penalize(s, flipper, PenaltyKind::NoSlaps);
        return Ok(vec![
            penalty,
            Effect::SlapResult {
                event_id: window.event_id,
                ordered_user_ids: ordered_ids,
                loser_user_id: Some(loser),
                reason: SlapResultReason::NoSlaps,
                pile_taken,
            },
        ]);
    }
    let first = ordered_ids[0];
    if s.player(first).map_or(false, |p| p.hand.is_empty()) {
        // the zero-card player slapped first: they win instead of losing
        s.status = GameStatus::Finished;
        s.winner_user_id = Some(first);
        return Ok(vec![
            Effect::SlapResult {
                event_id: window.event_id,
                ordered_user_ids: ordered_ids,
                loser_user_id: None,
                reason: SlapResultReason::FirstValidSlapWin,
                pile_taken: 0,
            },
            Effect::GameFinished {
                winner_user_id: first,
            },
        ]);
    }
    let (loser, result) = match reason {
        WindowReason::SameCard => (ordered_ids[ordered_ids.len() - 1], SlapResultReason::LastSlapper),
        _ => {
            let slapped: HashSet<UserId> = ordered_ids.iter().copied().collect();
            let last_non_slapper = s
                .players
                .iter()
                .filter(|p| !slapped.contains(&p.user_id))
                .map(|p| p.user_id)
                .last();
            match last_non_slapper {
                Some(user) => (user, SlapResultReason::NonSlapper),
                None => (
                    ordered_ids[ordered_ids.len() - 1],
                    SlapResultReason::LastSlapper,
                ),
            }
        }
    };
    let loser_seat = seat_of(s, loser)?;
    let pile_taken = s.pile.len();
    take_pile(s, loser_seat);
    Ok(vec![Effect::SlapResult {
        event_id: window.event_id,
        ordered_user_ids: ordered_ids,
        loser_user_id: Some(loser),
        reason: result,
        pile_taken,
    }])
}

/// Estimated reaction: `(clientTime + offsetMs) − windowStart`, negatives
/// floored to zero, clamped into `[minReaction, windowMs + slack]`.
fn reaction_ms(attempt: &SlapAttempt, window: &SlapWindow, min_reaction: Millis) -> Millis {
    let raw = attempt.client_time as i64 + attempt.offset_ms - window.start_server_time as i64;
    (raw.max(0) as Millis)
        .max(min_reaction)
        .min(window.slap_window_ms + REACTION_CAP_SLACK_MS)
}

/// The penalized seat eats the pile, takes the turn, and the window dies.
fn penalize(s: &mut GameState, seat: Seat, kind: PenaltyKind) -> Effect {
    let user_id = s.players[seat].user_id;
    let pile_taken = s.pile.len();
    take_pile(s, seat);
    Effect::Penalty {
        user_id,
        penalty_type: kind,
        pile_taken,
    }
}

/// Pile onto the bottom of the seat's hand, turn to that seat, window reset.
fn take_pile(s: &mut GameState, seat: Seat) {
    let pile: Vec<Card> = s.pile.drain(..).collect();
    s.players[seat].hand.extend(pile);
    s.current_turn_seat = seat;
    s.slap_window = SlapWindow::idle();
    s.last_revealed = None;
    normalize_turn(s);
}

fn advance_turn(s: &mut GameState) {
    s.current_turn_seat = (s.current_turn_seat + 1) % s.players.len();
    normalize_turn(s);
}

/// Outside an active window the turn must point at a nonempty hand if one
/// exists: walk forward from the seat after the current one.
fn normalize_turn(s: &mut GameState) {
    if s.slap_window.active {
        return;
    }
    let n = s.players.len();
    if !s.players[s.current_turn_seat].hand.is_empty() {
        return;
    }
    for step in 1..=n {
        let seat = (s.current_turn_seat + step) % n;
        if !s.players[seat].hand.is_empty() {
            s.current_turn_seat = seat;
            return;
        }
    }
}

fn seat_of(s: &GameState, user: UserId) -> Result<Seat, EngineError> {
    s.seat_of(user)
        .ok_or_else(|| EngineError::Internal(format!("unknown user {}", user)))
}

fn open_window(s: &mut GameState, reason: WindowReason, card: Card, now: Millis) -> Effect {
    let slap_window_ms = s.config.window_ms(reason);
    let event_id = format!("slap-{:012x}", s.next_slap_event_nonce);
    s.next_slap_event_nonce += 1;
    let action_card = matches!(reason, WindowReason::Action).then_some(card);
    s.slap_window = SlapWindow {
        active: true,
        resolved: false,
        event_id: event_id.clone(),
        reason: Some(reason),
        action_card,
        start_server_time: now,
        deadline_server_time: now + slap_window_ms,
        slap_window_ms,
        flipper_seat: s.current_turn_seat,
        attempts: Vec::new(),
    };
    Effect::SlapWindowOpen {
        event_id,
        reason,
        action_card,
        start_server_time: now,
        deadline_server_time: now + slap_window_ms,
        slap_window_ms,
    }
}
